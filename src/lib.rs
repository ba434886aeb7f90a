pub mod access;
pub mod api;
pub mod app;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod database;
pub mod effects;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pagination;
pub mod services;
pub mod storage;

pub use app::{app, AppState};
pub use error::ApiError;
