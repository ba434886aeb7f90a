// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition, service info and file serving.
// Route Prefix: no /api prefix (e.g., /auth/*, /files/*)
pub mod auth;
pub mod files;
pub mod root;

pub use files::file_get;
pub use root::{health, root};
