pub mod accounts;
pub mod app;
pub mod auth;
pub mod config;
pub mod courses;
pub mod db;
pub mod error;
pub mod media;
pub mod routing;
pub mod schema;
pub mod state;
pub mod storage;
