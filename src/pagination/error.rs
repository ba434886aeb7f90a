use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaginationError {
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
}
