//! Admission policy: which images are worth recompressing.

use crate::model::ImageCandidate;
use crate::report::SkipReason;

/// Format tags eligible for recompression (case-sensitive)
pub const ALLOWED_FORMATS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

/// Images smaller than this are not worth the risk of growing
pub const MIN_IMAGE_BYTES: usize = 10 * 1024;

/// Icons and glyphs below this size in either dimension are left alone
pub const MIN_IMAGE_DIMENSION: u32 = 100;

/// Decide whether a candidate should go through the transformer
pub fn admit(candidate: &ImageCandidate) -> Result<(), SkipReason> {
    if !ALLOWED_FORMATS.contains(&candidate.format.as_str()) {
        return Err(SkipReason::UnsupportedFormat(candidate.format.clone()));
    }

    if candidate.data.len() < MIN_IMAGE_BYTES {
        return Err(SkipReason::TooFewBytes(candidate.data.len()));
    }

    if candidate.width < MIN_IMAGE_DIMENSION || candidate.height < MIN_IMAGE_DIMENSION {
        return Err(SkipReason::TooFewPixels {
            width: candidate.width,
            height: candidate.height,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageRef;

    fn candidate(format: &str, len: usize, width: u32, height: u32) -> ImageCandidate {
        ImageCandidate {
            reference: ImageRef::new(1, 0),
            data: vec![0u8; len],
            format: format.to_string(),
            width,
            height,
            stored_len: len,
        }
    }

    #[test]
    fn admits_large_photos() {
        for format in ALLOWED_FORMATS {
            assert_eq!(admit(&candidate(format, 50_000, 800, 600)), Ok(()));
        }
    }

    #[test]
    fn rejects_unknown_formats_regardless_of_size() {
        for format in ["jpx", "jb2", "fax", "JPEG", "Png", ""] {
            assert_eq!(
                admit(&candidate(format, 5_000_000, 4000, 4000)),
                Err(SkipReason::UnsupportedFormat(format.to_string()))
            );
        }
    }

    #[test]
    fn byte_floor_is_exclusive() {
        assert_eq!(
            admit(&candidate("png", MIN_IMAGE_BYTES - 1, 500, 500)),
            Err(SkipReason::TooFewBytes(MIN_IMAGE_BYTES - 1))
        );
        assert_eq!(admit(&candidate("png", MIN_IMAGE_BYTES, 500, 500)), Ok(()));
    }

    #[test]
    fn rejects_small_dimensions() {
        assert_eq!(
            admit(&candidate("jpeg", 20_000, 99, 500)),
            Err(SkipReason::TooFewPixels {
                width: 99,
                height: 500
            })
        );
        assert_eq!(
            admit(&candidate("jpeg", 20_000, 500, 99)),
            Err(SkipReason::TooFewPixels {
                width: 500,
                height: 99
            })
        );
        assert_eq!(admit(&candidate("jpeg", 20_000, 100, 100)), Ok(()));
    }

    #[test]
    fn tiny_png_is_rejected() {
        assert!(admit(&candidate("png", 8 * 1024, 50, 50)).is_err());
    }
}
