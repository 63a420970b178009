use std::{collections::HashMap, sync::RwLock};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    model::{Course, CourseFields, Lecture},
    repo::CourseStore,
};
use crate::error::{AppError, AppResult};

/// Course store held in process memory, for tests and local runs.
#[derive(Default)]
pub struct MemoryCourseStore {
    rows: RwLock<HashMap<Uuid, Course>>,
}

fn poisoned() -> AppError {
    anyhow::anyhow!("course store lock poisoned").into()
}

#[async_trait]
impl CourseStore for MemoryCourseStore {
    async fn list(&self) -> AppResult<Vec<Course>> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        let mut courses: Vec<Course> = rows
            .values()
            .map(|c| Course {
                lectures: Vec::new(),
                ..c.clone()
            })
            .collect();
        courses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(courses)
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Course>> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(&id).cloned())
    }

    async fn insert(&self, course: &Course) -> AppResult<Course> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        if rows.contains_key(&course.id) {
            return Err(anyhow::anyhow!("course {} already exists", course.id).into());
        }
        let stored = Course {
            lectures: Vec::new(),
            number_of_lectures: 0,
            ..course.clone()
        };
        rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: Uuid, changes: &CourseFields) -> AppResult<Option<Course>> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let Some(course) = rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = &changes.title {
            course.title = v.clone();
        }
        if let Some(v) = &changes.description {
            course.description = v.clone();
        }
        if let Some(v) = &changes.category {
            course.category = v.clone();
        }
        if let Some(v) = &changes.created_by {
            course.created_by = v.clone();
        }
        course.updated_at = OffsetDateTime::now_utc();
        Ok(Some(course.clone()))
    }

    async fn delete(&self, id: Uuid) -> AppResult<Option<Course>> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        Ok(rows.remove(&id))
    }

    async fn add_lecture(&self, course_id: Uuid, lecture: &Lecture) -> AppResult<Option<Course>> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let Some(course) = rows.get_mut(&course_id) else {
            return Ok(None);
        };
        course.lectures.push(lecture.clone());
        course.number_of_lectures = course.lectures.len();
        course.updated_at = OffsetDateTime::now_utc();
        Ok(Some(course.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::courses::model::LectureFields;

    fn course() -> Course {
        CourseFields {
            title: Some("Async Rust in Depth".into()),
            description: Some("Futures, executors and pinning".into()),
            category: Some("programming".into()),
            created_by: Some("ferris".into()),
        }
        .validate_new()
        .unwrap()
        .into_course(Uuid::new_v4(), None)
    }

    fn lecture(title: &str) -> Lecture {
        LectureFields {
            title: Some(title.into()),
            description: Some("walkthrough".into()),
        }
        .validate(None)
        .unwrap()
    }

    #[tokio::test]
    async fn list_omits_lectures_but_keeps_count() {
        let store = MemoryCourseStore::default();
        let c = store.insert(&course()).await.unwrap();
        store.add_lecture(c.id, &lecture("one")).await.unwrap();
        store.add_lecture(c.id, &lecture("two")).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].lectures.is_empty());
        assert_eq!(listed[0].number_of_lectures, 2);

        let found = store.find(c.id).await.unwrap().unwrap();
        let titles: Vec<_> = found.lectures.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn update_touches_only_given_fields() {
        let store = MemoryCourseStore::default();
        let c = store.insert(&course()).await.unwrap();
        let changes = CourseFields {
            category: Some("systems".into()),
            ..Default::default()
        };
        let updated = store.update(c.id, &changes).await.unwrap().unwrap();
        assert_eq!(updated.category, "systems");
        assert_eq!(updated.title, c.title);
    }

    #[tokio::test]
    async fn missing_course_yields_none() {
        let store = MemoryCourseStore::default();
        let id = Uuid::new_v4();
        assert!(store.find(id).await.unwrap().is_none());
        assert!(store.update(id, &CourseFields::default()).await.unwrap().is_none());
        assert!(store.delete(id).await.unwrap().is_none());
        assert!(store.add_lecture(id, &lecture("x")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_returns_course_with_lectures() {
        let store = MemoryCourseStore::default();
        let c = store.insert(&course()).await.unwrap();
        store.add_lecture(c.id, &lecture("one")).await.unwrap();
        let removed = store.delete(c.id).await.unwrap().unwrap();
        assert_eq!(removed.lectures.len(), 1);
        assert!(store.find(c.id).await.unwrap().is_none());
    }
}
