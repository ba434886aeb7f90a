pub mod albums;
pub mod auth;
pub mod images;
