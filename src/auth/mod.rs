use axum::http::Method;

use crate::routing::{upload::SingleUpload, Route, RouteTable};

pub mod claims;
mod dto;
pub mod guards;
pub mod handlers;
pub mod jwt;
pub mod password;

pub use claims::Identity;
pub use guards::{Authenticated, AuthorizedRoles};
pub use jwt::JwtKeys;

/// Account endpoints, mounted under `/user`.
pub fn route_table() -> RouteTable {
    RouteTable::new("/user")
        .route(Route::new(Method::POST, "/register", handlers::register).guard(SingleUpload::new("avatar")))
        .route(Route::new(Method::POST, "/login", handlers::login))
        .route(Route::new(Method::GET, "/me", handlers::me).guard(guards::Authenticated))
        .route(
            Route::new(Method::POST, "/change-password", handlers::change_password)
                .guard(guards::Authenticated),
        )
}
