//! Pixel effects applied to stored images.
//!
//! Effects always run in a fixed order: grayscale, invert, horizontal flip,
//! vertical flip. The result is encoded as JPEG when the source was JPEG and
//! as PNG otherwise.

pub mod codec;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use codec::{decode, encode, inspect, ImageInfo, OutputFormat};

#[derive(Debug, Error)]
pub enum EffectsError {
    #[error("At least one effect must be selected")]
    NoEffects,

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Selected effects. Missing fields default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Effects {
    pub grayscale: bool,
    pub invert: bool,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl Effects {
    pub fn is_empty(&self) -> bool {
        !(self.grayscale || self.invert || self.flip_horizontal || self.flip_vertical)
    }

    /// Names of the selected effects, in application order
    pub fn names(&self) -> Vec<&'static str> {
        [
            (self.grayscale, "grayscale"),
            (self.invert, "invert"),
            (self.flip_horizontal, "flip_horizontal"),
            (self.flip_vertical, "flip_vertical"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }

    pub fn ensure_selected(&self) -> Result<(), EffectsError> {
        if self.is_empty() {
            Err(EffectsError::NoEffects)
        } else {
            Ok(())
        }
    }

    pub fn apply(&self, image: DynamicImage) -> DynamicImage {
        let mut image = image;
        if self.grayscale {
            image = image.grayscale();
        }
        if self.invert {
            image.invert();
        }
        if self.flip_horizontal {
            image = image.fliph();
        }
        if self.flip_vertical {
            image = image.flipv();
        }
        image
    }
}

/// Output of [`process`]
#[derive(Debug, Clone)]
pub struct Processed {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

/// Decode, transform and re-encode. CPU bound; run on a blocking thread.
pub fn process(source: &[u8], effects: Effects) -> Result<Processed, EffectsError> {
    effects.ensure_selected()?;
    let (image, format) = decode(source)?;
    let output = OutputFormat::for_source(format);
    let transformed = effects.apply(image);
    let bytes = encode(&transformed, output)?;
    Ok(Processed {
        bytes,
        format: output,
        width: transformed.width(),
        height: transformed.height(),
    })
}

/// `<stem>_<effect>_<effect>.<ext>` for a derived image
pub fn derived_filename(original: &str, effects: &Effects, output: OutputFormat) -> String {
    let stem = match original.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => original,
    };
    let stem = if stem.is_empty() { "image" } else { stem };
    format!("{}_{}.{}", stem, effects.names().join("_"), output.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn two_tone(width: u32, height: u32) -> DynamicImage {
        // left column white, everything else black
        let mut buffer = ImageBuffer::from_pixel(width, height, Rgba([0, 0, 0, 255]));
        for y in 0..height {
            buffer.put_pixel(0, y, Rgba([255, 255, 255, 255]));
        }
        DynamicImage::ImageRgba8(buffer)
    }

    #[test]
    fn names_follow_fixed_order() {
        let effects = Effects {
            flip_vertical: true,
            grayscale: true,
            ..Default::default()
        };
        assert_eq!(effects.names(), vec!["grayscale", "flip_vertical"]);
    }

    #[test]
    fn empty_selection_is_rejected() {
        assert!(Effects::default().is_empty());
        assert!(matches!(Effects::default().ensure_selected(), Err(EffectsError::NoEffects)));
    }

    #[test]
    fn missing_fields_default_to_off() {
        let effects: Effects = serde_json::from_str(r#"{"invert": true}"#).unwrap();
        assert!(effects.invert);
        assert!(!effects.grayscale);
    }

    #[test]
    fn flip_horizontal_mirrors_pixels() {
        let effects = Effects { flip_horizontal: true, ..Default::default() };
        let out = effects.apply(two_tone(4, 2)).to_rgba8();
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(3, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn flip_vertical_mirrors_rows() {
        let mut buffer = ImageBuffer::from_pixel(2, 3, Rgba([0, 0, 0, 255]));
        buffer.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let effects = Effects { flip_vertical: true, ..Default::default() };
        let out = effects.apply(DynamicImage::ImageRgba8(buffer)).to_rgba8();
        assert_eq!(out.get_pixel(0, 2).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn invert_keeps_alpha() {
        let buffer = ImageBuffer::from_pixel(1, 1, Rgba([10, 20, 30, 128]));
        let effects = Effects { invert: true, ..Default::default() };
        let out = effects.apply(DynamicImage::ImageRgba8(buffer)).to_rgba8();
        assert_eq!(out.get_pixel(0, 0).0, [245, 235, 225, 128]);
    }

    #[test]
    fn grayscale_equalizes_channels() {
        let buffer = ImageBuffer::from_pixel(1, 1, Rgba([200, 40, 90, 255]));
        let effects = Effects { grayscale: true, ..Default::default() };
        let out = effects.apply(DynamicImage::ImageRgba8(buffer)).to_rgba8();
        let [r, g, b, _] = out.get_pixel(0, 0).0;
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn grayscale_then_invert_inverts_the_gray_value() {
        let buffer = ImageBuffer::from_pixel(1, 1, Rgba([200, 40, 90, 255]));
        let gray = Effects { grayscale: true, ..Default::default() }
            .apply(DynamicImage::ImageRgba8(buffer.clone()))
            .to_rgba8()
            .get_pixel(0, 0)
            .0[0];
        let both = Effects { grayscale: true, invert: true, ..Default::default() }
            .apply(DynamicImage::ImageRgba8(buffer))
            .to_rgba8()
            .get_pixel(0, 0)
            .0[0];
        assert_eq!(both, 255 - gray);
    }

    #[test]
    fn process_keeps_dimensions_and_encodes_png() {
        let source = encode(&two_tone(5, 3), OutputFormat::Png).unwrap();
        let effects = Effects { flip_horizontal: true, ..Default::default() };
        let processed = process(&source, effects).unwrap();
        assert_eq!(processed.format, OutputFormat::Png);
        assert_eq!((processed.width, processed.height), (5, 3));
        let info = inspect(&processed.bytes).unwrap();
        assert_eq!(info.content_type, "image/png");
    }

    #[test]
    fn jpeg_sources_stay_jpeg() {
        let source = encode(&two_tone(8, 8), OutputFormat::Jpeg).unwrap();
        let processed = process(&source, Effects { invert: true, ..Default::default() }).unwrap();
        assert_eq!(processed.format, OutputFormat::Jpeg);
        assert_eq!(inspect(&processed.bytes).unwrap().content_type, "image/jpeg");
    }

    #[test]
    fn derived_filenames() {
        let effects = Effects { grayscale: true, flip_vertical: true, ..Default::default() };
        assert_eq!(
            derived_filename("beach.jpg", &effects, OutputFormat::Jpeg),
            "beach_grayscale_flip_vertical.jpg"
        );
        assert_eq!(
            derived_filename("scan.gif", &effects, OutputFormat::Png),
            "scan_grayscale_flip_vertical.png"
        );
        assert_eq!(
            derived_filename("noext", &effects, OutputFormat::Png),
            "noext_grayscale_flip_vertical.png"
        );
    }
}
