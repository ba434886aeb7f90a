// handlers/protected/auth/mod.rs - Session handlers for authenticated users
pub mod whoami; // GET /api/auth/whoami

pub use whoami::whoami_get;
