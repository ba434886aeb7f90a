//! Keyset pagination over `(created_at, id)`, newest first.
//!
//! Lists are fetched with `WHERE (created_at, id) < (cursor) ORDER BY
//! created_at DESC, id DESC LIMIT n + 1`; the extra row only tells whether
//! another page exists.

pub mod cursor;
pub mod error;
pub mod page;

pub use cursor::Cursor;
pub use error::PaginationError;
pub use page::{Keyset, Page, PageQuery, PageRequest, Position};
