pub mod dto;
pub mod handlers;
pub mod memory;
pub mod model;
pub mod repo;

use axum::http::Method;

use crate::{
    accounts::Role,
    auth::guards::{Authenticated, AuthorizedRoles},
    routing::{upload::SingleUpload, Route, RouteTable},
};

pub use memory::MemoryCourseStore;
pub use model::{Course, Lecture};
pub use repo::{CourseStore, PgCourseStore};

const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Course endpoints, mounted under `/courses`.
pub fn route_table() -> RouteTable {
    RouteTable::new("/courses")
        .route(Route::new(Method::GET, "/", handlers::list_courses))
        .route(
            Route::new(Method::POST, "/", handlers::create_course)
                .guard(Authenticated)
                .guard(AuthorizedRoles::new(ADMIN_ONLY))
                .guard(SingleUpload::new("thumbnail")),
        )
        .route(Route::new(Method::GET, "/:id", handlers::get_lectures).guard(Authenticated))
        .route(
            Route::new(Method::PUT, "/:id", handlers::update_course)
                .guard(Authenticated)
                .guard(AuthorizedRoles::new(ADMIN_ONLY)),
        )
        .route(
            Route::new(Method::DELETE, "/:id", handlers::delete_course)
                .guard(Authenticated)
                .guard(AuthorizedRoles::new(ADMIN_ONLY)),
        )
        .route(
            Route::new(Method::POST, "/:id", handlers::add_lecture)
                .guard(Authenticated)
                .guard(AuthorizedRoles::new(ADMIN_ONLY))
                .guard(SingleUpload::new("lecture")),
        )
}
