// handlers/protected/uploads/mod.rs - Multipart image uploads
pub mod upload; // POST /api/uploads, POST /api/uploads/unsorted

pub use upload::{unsorted_post, upload_post, ALBUM_ID_HEADER};
