use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    media::Asset,
    schema::{FieldSpec, FieldValues, Schema, ValidationError},
};

lazy_static! {
    pub static ref COURSE_SCHEMA: Schema = Schema {
        fields: vec![
            FieldSpec::text("title")
                .required("Title is required")
                .trim()
                .min_len(8, "Title must be at least 8 characters")
                .max_len(59, "Title must not exceed 59 characters"),
            FieldSpec::text("description")
                .required("Description is required")
                .trim()
                .min_len(8, "Description must be at least 8 characters")
                .max_len(200, "Description must not exceed 200 characters"),
            FieldSpec::text("category")
                .required("Category is required")
                .trim(),
            FieldSpec::text("createdBy")
                .required("Course instructor is required")
                .trim(),
        ],
    };

    pub static ref LECTURE_SCHEMA: Schema = Schema {
        fields: vec![
            FieldSpec::text("title")
                .required("Lecture title is required")
                .trim(),
            FieldSpec::text("description")
                .required("Lecture description is required")
                .trim(),
        ],
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lecture {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub lecture: Option<Asset>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub created_by: String,
    pub thumbnail: Option<Asset>,
    pub lectures: Vec<Lecture>,
    pub number_of_lectures: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Course {
    /// Every media object the course owns, lecture media included.
    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.thumbnail
            .iter()
            .chain(self.lectures.iter().filter_map(|l| l.lecture.as_ref()))
    }
}

/// Mutable course fields as submitted by a client. Absent fields are left
/// unchanged on update and rejected on create.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_by: Option<String>,
}

impl CourseFields {
    fn to_values(&self, all: bool) -> FieldValues {
        let mut values = FieldValues::new();
        for (name, v) in [
            ("title", &self.title),
            ("description", &self.description),
            ("category", &self.category),
            ("createdBy", &self.created_by),
        ] {
            if all || v.is_some() {
                values.insert(name, v.clone());
            }
        }
        values
    }

    fn from_values(mut values: FieldValues) -> Self {
        let mut take = |name: &str| values.remove(name).flatten();
        Self {
            title: take("title"),
            description: take("description"),
            category: take("category"),
            created_by: take("createdBy"),
        }
    }

    /// Checks a full set of fields for a new course.
    pub fn validate_new(&self) -> Result<NewCourse, ValidationError> {
        let mut values = self.to_values(true);
        COURSE_SCHEMA.apply(&mut values)?;
        let f = Self::from_values(values);
        match (f.title, f.description, f.category, f.created_by) {
            (Some(title), Some(description), Some(category), Some(created_by)) => Ok(NewCourse {
                title,
                description,
                category,
                created_by,
            }),
            _ => Err(ValidationError::field("course", "All fields are required")),
        }
    }

    /// Checks only the fields present, for a partial update.
    pub fn validate_changes(&self) -> Result<CourseFields, ValidationError> {
        let mut values = self.to_values(false);
        if values.is_empty() {
            return Err(ValidationError::field("course", "Nothing to update"));
        }
        COURSE_SCHEMA.apply(&mut values)?;
        Ok(Self::from_values(values))
    }
}

/// Validated fields of a course about to be created.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub category: String,
    pub created_by: String,
}

impl NewCourse {
    pub fn into_course(self, id: Uuid, thumbnail: Option<Asset>) -> Course {
        let now = OffsetDateTime::now_utc();
        Course {
            id,
            title: self.title,
            description: self.description,
            category: self.category,
            created_by: self.created_by,
            thumbnail,
            lectures: Vec::new(),
            number_of_lectures: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LectureFields {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl LectureFields {
    pub fn validate(&self, media: Option<Asset>) -> Result<Lecture, ValidationError> {
        let mut values = FieldValues::new();
        values.insert("title", self.title.clone());
        values.insert("description", self.description.clone());
        LECTURE_SCHEMA.apply(&mut values)?;
        let mut take = |name: &str| values.remove(name).flatten().unwrap_or_default();
        Ok(Lecture {
            id: Uuid::new_v4(),
            title: take("title"),
            description: take("description"),
            lecture: media,
            created_at: OffsetDateTime::now_utc(),
        })
    }
}
