use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{Ack, CourseEnvelope, CourseList, LectureList},
    model::{CourseFields, LectureFields},
};
use crate::{
    app::API_PREFIX,
    error::{AppError, AppResult},
    media::{remove_assets, save_upload},
    routing::RequestContext,
    state::AppState,
};

fn course_id(ctx: &RequestContext) -> AppResult<Uuid> {
    let raw = ctx
        .param("id")
        .ok_or_else(|| AppError::bad_request("missing course id"))?;
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request(format!("invalid course id {:?}", raw)))
}

fn course_not_found(id: Uuid) -> AppError {
    AppError::not_found(format!("Course {} not found", id))
}

#[instrument(skip_all)]
pub async fn list_courses(state: AppState, _ctx: RequestContext) -> AppResult<Response> {
    let courses = state.courses.list().await?;
    Ok(Json(CourseList {
        success: true,
        message: "All courses",
        courses,
    })
    .into_response())
}

#[instrument(skip_all)]
pub async fn create_course(state: AppState, mut ctx: RequestContext) -> AppResult<Response> {
    let fields: CourseFields = ctx.payload().await?;
    let new_course = fields.validate_new()?;

    let id = Uuid::new_v4();
    let thumbnail = match ctx.upload.take() {
        Some(file) => Some(save_upload(state.storage.as_ref(), &format!("courses/{}", id), &file).await?),
        None => None,
    };
    let course = new_course.into_course(id, thumbnail);

    let saved = match state.courses.insert(&course).await {
        Ok(c) => c,
        Err(e) => {
            remove_assets(state.storage.as_ref(), course.thumbnail.iter()).await;
            return Err(e);
        }
    };

    info!(course_id = %saved.id, title = %saved.title, "course created");
    let location = format!("{}/courses/{}", API_PREFIX, saved.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(CourseEnvelope {
            success: true,
            message: "Course created successfully",
            course: saved,
        }),
    )
        .into_response())
}

#[instrument(skip_all)]
pub async fn get_lectures(state: AppState, ctx: RequestContext) -> AppResult<Response> {
    let id = course_id(&ctx)?;
    let course = state
        .courses
        .find(id)
        .await?
        .ok_or_else(|| course_not_found(id))?;
    Ok(Json(LectureList {
        success: true,
        message: "Course lectures fetched successfully",
        lectures: course.lectures,
    })
    .into_response())
}

#[instrument(skip_all)]
pub async fn update_course(state: AppState, mut ctx: RequestContext) -> AppResult<Response> {
    let id = course_id(&ctx)?;
    let fields: CourseFields = ctx.payload().await?;
    if state.courses.find(id).await?.is_none() {
        return Err(course_not_found(id));
    }
    let changes = fields.validate_changes()?;
    let course = state
        .courses
        .update(id, &changes)
        .await?
        .ok_or_else(|| course_not_found(id))?;
    info!(course_id = %id, "course updated");
    Ok(Json(CourseEnvelope {
        success: true,
        message: "Course updated successfully",
        course,
    })
    .into_response())
}

#[instrument(skip_all)]
pub async fn delete_course(state: AppState, ctx: RequestContext) -> AppResult<Response> {
    let id = course_id(&ctx)?;
    let course = state
        .courses
        .delete(id)
        .await?
        .ok_or_else(|| course_not_found(id))?;
    remove_assets(state.storage.as_ref(), course.assets()).await;
    info!(course_id = %id, lectures = course.lectures.len(), "course deleted");
    Ok(Json(Ack {
        success: true,
        message: "Course deleted successfully",
    })
    .into_response())
}

#[instrument(skip_all)]
pub async fn add_lecture(state: AppState, mut ctx: RequestContext) -> AppResult<Response> {
    let id = course_id(&ctx)?;
    let fields: LectureFields = ctx.payload().await?;
    // validate before touching storage
    fields.validate(None)?;
    if state.courses.find(id).await?.is_none() {
        return Err(course_not_found(id));
    }

    let media = match ctx.upload.take() {
        Some(file) => Some(
            save_upload(state.storage.as_ref(), &format!("courses/{}/lectures", id), &file).await?,
        ),
        None => None,
    };
    let lecture = fields.validate(media)?;

    let course = match state.courses.add_lecture(id, &lecture).await {
        Ok(Some(c)) => c,
        other => {
            remove_assets(state.storage.as_ref(), lecture.lecture.iter()).await;
            return match other {
                Ok(_) => {
                    warn!(course_id = %id, "course removed while adding lecture");
                    Err(course_not_found(id))
                }
                Err(e) => Err(e),
            };
        }
    };

    info!(course_id = %id, lecture_id = %lecture.id, "lecture added");
    Ok((
        StatusCode::CREATED,
        Json(CourseEnvelope {
            success: true,
            message: "Lecture added successfully",
            course,
        }),
    )
        .into_response())
}
