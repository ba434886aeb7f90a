// handlers/protected/albums/mod.rs - Album, album image and membership handlers
pub mod album; // GET|PATCH|DELETE /api/albums/:album_id
pub mod collection; // GET|POST /api/albums
pub mod images; // GET /api/albums/:album_id/images
pub mod members; // POST /api/albums/:album_id/members, PUT|DELETE .../members/:user_id

pub use album::{album_delete, album_get, album_patch};
pub use collection::{albums_get, albums_post};
pub use images::album_images_get;
pub use members::{member_delete, member_put, members_post};
