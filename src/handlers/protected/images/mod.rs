// handlers/protected/images/mod.rs - Single image handlers
pub mod effects; // POST /api/images/:image_id/effects
pub mod image; // GET|DELETE /api/images/:image_id

pub use effects::effects_post;
pub use image::{image_delete, image_get};
