use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::model::{Course, CourseFields, Lecture};
use crate::{error::AppResult, media::Asset};

/// Persistence for courses and their lectures.
///
/// `list` returns courses without their lectures; every other read loads them.
#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Course>>;
    async fn find(&self, id: Uuid) -> AppResult<Option<Course>>;
    async fn insert(&self, course: &Course) -> AppResult<Course>;
    /// Applies the fields that are present. `None` when no course has `id`.
    async fn update(&self, id: Uuid, changes: &CourseFields) -> AppResult<Option<Course>>;
    /// Removes the course and returns it as it was, lectures included.
    async fn delete(&self, id: Uuid) -> AppResult<Option<Course>>;
    async fn add_lecture(&self, course_id: Uuid, lecture: &Lecture) -> AppResult<Option<Course>>;
}

#[derive(Debug, FromRow)]
struct CourseRow {
    id: Uuid,
    title: String,
    description: String,
    category: String,
    created_by: String,
    thumbnail_public_id: Option<String>,
    thumbnail_secure_url: Option<String>,
    number_of_lectures: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct LectureRow {
    id: Uuid,
    title: String,
    description: String,
    lecture_public_id: Option<String>,
    lecture_secure_url: Option<String>,
    created_at: OffsetDateTime,
}

fn asset(public_id: Option<String>, secure_url: Option<String>) -> Option<Asset> {
    match (public_id, secure_url) {
        (Some(public_id), Some(secure_url)) => Some(Asset {
            public_id,
            secure_url,
        }),
        _ => None,
    }
}

impl From<CourseRow> for Course {
    fn from(r: CourseRow) -> Self {
        Course {
            id: r.id,
            title: r.title,
            description: r.description,
            category: r.category,
            created_by: r.created_by,
            thumbnail: asset(r.thumbnail_public_id, r.thumbnail_secure_url),
            lectures: Vec::new(),
            number_of_lectures: r.number_of_lectures.max(0) as usize,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl From<LectureRow> for Lecture {
    fn from(r: LectureRow) -> Self {
        Lecture {
            id: r.id,
            title: r.title,
            description: r.description,
            lecture: asset(r.lecture_public_id, r.lecture_secure_url),
            created_at: r.created_at,
        }
    }
}

const COURSE_COLUMNS: &str = "id, title, description, category, created_by, \
     thumbnail_public_id, thumbnail_secure_url, number_of_lectures, created_at, updated_at";

#[derive(Clone)]
pub struct PgCourseStore {
    db: PgPool,
}

impl PgCourseStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn load(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> anyhow::Result<Option<Course>> {
        let row = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {} FROM courses WHERE id = $1",
            COURSE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .context("select course")?;
        let Some(row) = row else {
            return Ok(None);
        };

        let lectures = sqlx::query_as::<_, LectureRow>(
            r#"
            SELECT id, title, description, lecture_public_id, lecture_secure_url, created_at
              FROM lectures
             WHERE course_id = $1
             ORDER BY created_at, id
            "#,
        )
        .bind(id)
        .fetch_all(&mut **tx)
        .await
        .context("select lectures")?;

        let mut course = Course::from(row);
        course.lectures = lectures.into_iter().map(Lecture::from).collect();
        Ok(Some(course))
    }
}

#[async_trait]
impl CourseStore for PgCourseStore {
    #[instrument(skip(self))]
    async fn list(&self) -> AppResult<Vec<Course>> {
        let rows = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {} FROM courses ORDER BY created_at DESC",
            COURSE_COLUMNS
        ))
        .fetch_all(&self.db)
        .await
        .context("list courses")?;
        Ok(rows.into_iter().map(Course::from).collect())
    }

    #[instrument(skip(self))]
    async fn find(&self, id: Uuid) -> AppResult<Option<Course>> {
        let mut tx = self.db.begin().await.context("begin")?;
        let course = Self::load(&mut tx, id).await?;
        tx.commit().await.context("commit")?;
        Ok(course)
    }

    #[instrument(skip(self, course), fields(course_id = %course.id))]
    async fn insert(&self, course: &Course) -> AppResult<Course> {
        let row = sqlx::query_as::<_, CourseRow>(&format!(
            r#"
            INSERT INTO courses (id, title, description, category, created_by,
                                 thumbnail_public_id, thumbnail_secure_url, number_of_lectures,
                                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $9)
            RETURNING {}
            "#,
            COURSE_COLUMNS
        ))
        .bind(course.id)
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.category)
        .bind(&course.created_by)
        .bind(course.thumbnail.as_ref().map(|a| a.public_id.clone()))
        .bind(course.thumbnail.as_ref().map(|a| a.secure_url.clone()))
        .bind(course.created_at)
        .bind(course.updated_at)
        .fetch_one(&self.db)
        .await
        .context("insert course")?;
        Ok(row.into())
    }

    #[instrument(skip(self, changes))]
    async fn update(&self, id: Uuid, changes: &CourseFields) -> AppResult<Option<Course>> {
        let mut tx = self.db.begin().await.context("begin")?;
        let updated = sqlx::query(
            r#"
            UPDATE courses
               SET title = COALESCE($2, title),
                   description = COALESCE($3, description),
                   category = COALESCE($4, category),
                   created_by = COALESCE($5, created_by),
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(&changes.category)
        .bind(&changes.created_by)
        .execute(&mut *tx)
        .await
        .context("update course")?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        let course = Self::load(&mut tx, id).await?;
        tx.commit().await.context("commit")?;
        Ok(course)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> AppResult<Option<Course>> {
        let mut tx = self.db.begin().await.context("begin")?;
        let Some(course) = Self::load(&mut tx, id).await? else {
            return Ok(None);
        };
        // lectures go with it through ON DELETE CASCADE
        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete course")?;
        tx.commit().await.context("commit")?;
        Ok(Some(course))
    }

    #[instrument(skip(self, lecture), fields(lecture_id = %lecture.id))]
    async fn add_lecture(&self, course_id: Uuid, lecture: &Lecture) -> AppResult<Option<Course>> {
        let mut tx = self.db.begin().await.context("begin")?;
        let bumped = sqlx::query(
            r#"
            UPDATE courses
               SET number_of_lectures = number_of_lectures + 1, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(course_id)
        .execute(&mut *tx)
        .await
        .context("count lecture")?;
        if bumped.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query(
            r#"
            INSERT INTO lectures (id, course_id, title, description,
                                  lecture_public_id, lecture_secure_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(lecture.id)
        .bind(course_id)
        .bind(&lecture.title)
        .bind(&lecture.description)
        .bind(lecture.lecture.as_ref().map(|a| a.public_id.clone()))
        .bind(lecture.lecture.as_ref().map(|a| a.secure_url.clone()))
        .bind(lecture.created_at)
        .execute(&mut *tx)
        .await
        .context("insert lecture")?;

        let course = Self::load(&mut tx, course_id).await?;
        tx.commit().await.context("commit")?;
        Ok(course)
    }
}
