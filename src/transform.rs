//! Image Transformer: decode, flatten, downsample and re-encode as JPEG.

use crate::error::ImageError;
use crate::model::{ImageCandidate, ImageTranscoder};
use crate::quality::QualitySettings;
use image::{DynamicImage, GrayImage, RgbImage};

/// Default transcoder backed by the `image` and `jpeg-encoder` crates
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegTranscoder;

impl ImageTranscoder for JpegTranscoder {
    fn transcode(
        &self,
        candidate: &ImageCandidate,
        settings: &QualitySettings,
    ) -> Result<Vec<u8>, ImageError> {
        let decoded = image::load_from_memory(&candidate.data)
            .map_err(|e| ImageError::Decode(e.to_string()))?;

        let img = normalize_color(decoded);

        let img = match scaled_dimensions(img.width(), img.height(), settings.resize_factor) {
            Some((target_width, target_height)) => {
                log::debug!(
                    "  Resampling {} from {}x{} to {}x{}",
                    candidate.reference,
                    img.width(),
                    img.height(),
                    target_width,
                    target_height
                );
                resample_image(&img, target_width, target_height)
            }
            None => img,
        };

        encode_jpeg(&img, settings.image_quality)
    }
}

/// Reduce an image to 8-bit gray or 8-bit RGB, compositing any alpha over white
pub fn normalize_color(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
        DynamicImage::ImageLuma16(_) => DynamicImage::ImageLuma8(img.to_luma8()),
        DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
            let la = img.to_luma_alpha8();
            let (width, height) = la.dimensions();
            let gray = GrayImage::from_fn(width, height, |x, y| {
                let p = la.get_pixel(x, y).0;
                image::Luma([over_white(p[0], p[1])])
            });
            DynamicImage::ImageLuma8(gray)
        }
        other if other.color().has_alpha() => {
            let rgba = other.to_rgba8();
            let (width, height) = rgba.dimensions();
            let rgb = RgbImage::from_fn(width, height, |x, y| {
                let p = rgba.get_pixel(x, y).0;
                image::Rgb([
                    over_white(p[0], p[3]),
                    over_white(p[1], p[3]),
                    over_white(p[2], p[3]),
                ])
            });
            DynamicImage::ImageRgb8(rgb)
        }
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Blend one channel value with the given alpha onto white
fn over_white(value: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((value as u32 * a + 255 * (255 - a) + 127) / 255) as u8
}

/// Target size for a resize, or `None` when it would not shrink both dimensions
pub fn scaled_dimensions(width: u32, height: u32, factor: f64) -> Option<(u32, u32)> {
    if !factor.is_finite() || factor <= 0.0 {
        return None;
    }

    let target_width = (width as f64 * factor).floor() as u32;
    let target_height = (height as f64 * factor).floor() as u32;

    if target_width == 0 || target_height == 0 {
        return None;
    }
    if target_width < width && target_height < height {
        Some((target_width, target_height))
    } else {
        None
    }
}

/// Resample an image to target dimensions
fn resample_image(img: &DynamicImage, target_width: u32, target_height: u32) -> DynamicImage {
    img.resize_exact(
        target_width,
        target_height,
        image::imageops::FilterType::Lanczos3,
    )
}

/// Encode an 8-bit gray or RGB image as baseline JPEG with optimized Huffman tables
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let (width, height) = (img.width(), img.height());
    let (w, h) = match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(ImageError::Encode(format!(
                "{}x{} exceeds JPEG dimension limits",
                width, height
            )))
        }
    };

    let mut jpeg_bytes = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut jpeg_bytes, quality.clamp(1, 100));
    encoder.set_optimized_huffman_tables(true);

    let result = match img {
        DynamicImage::ImageLuma8(gray) => {
            encoder.encode(gray.as_raw(), w, h, jpeg_encoder::ColorType::Luma)
        }
        _ => {
            let rgb = img.to_rgb8();
            encoder.set_sampling_factor(jpeg_encoder::SamplingFactor::R_4_2_0);
            encoder.encode(rgb.as_raw(), w, h, jpeg_encoder::ColorType::Rgb)
        }
    };
    result.map_err(|e| ImageError::Encode(e.to_string()))?;

    Ok(jpeg_bytes)
}
