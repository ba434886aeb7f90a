pub mod account_service;
pub mod album_service;
pub mod image_service;

pub use account_service::AccountService;
pub use album_service::AlbumService;
pub use image_service::{ImageService, UploadFile, UNSORTED_ALBUM};
