use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

use super::EffectsError;

const SUPPORTED: [ImageFormat; 5] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
    ImageFormat::Bmp,
];

/// Format and size of an uploaded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub content_type: &'static str,
    pub extension: &'static str,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn for_source(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => OutputFormat::Jpeg,
            _ => OutputFormat::Png,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
        }
    }

    pub fn content_type(self) -> &'static str {
        self.image_format().to_mime_type()
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

fn extension_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        ImageFormat::Bmp => "bmp",
        _ => "png",
    }
}

/// Decode bytes of a supported format
pub fn decode(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat), EffectsError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| EffectsError::Decode(e.to_string()))?;

    let format = reader.format().ok_or(EffectsError::UnsupportedFormat)?;
    if !SUPPORTED.contains(&format) {
        return Err(EffectsError::UnsupportedFormat);
    }

    let image = reader
        .decode()
        .map_err(|e| EffectsError::Decode(e.to_string()))?;
    Ok((image, format))
}

/// Fully decode to validate, then report format and dimensions
pub fn inspect(bytes: &[u8]) -> Result<ImageInfo, EffectsError> {
    let (image, format) = decode(bytes)?;
    Ok(ImageInfo {
        format,
        content_type: format.to_mime_type(),
        extension: extension_for(format),
        width: image.width(),
        height: image.height(),
    })
}

pub fn encode(image: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>, EffectsError> {
    let mut out = Cursor::new(Vec::new());
    let result = match format {
        // the JPEG encoder has no alpha channel
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut out, ImageFormat::Jpeg),
        OutputFormat::Png => image.write_to(&mut out, ImageFormat::Png),
    };
    result.map_err(|e| EffectsError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}
