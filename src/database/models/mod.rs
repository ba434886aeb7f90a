pub mod album;
pub mod image;
pub mod user;

pub use album::{Album, AlbumMember, AlbumRole};
pub use image::{Image, NewImage};
pub use user::{NewUser, User};
