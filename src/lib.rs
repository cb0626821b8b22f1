//! PDF Shrink Library
//!
//! Reduces PDF size by recompressing embedded raster images page by page,
//! then compacting the object graph. Shared between CLI and WASM targets.
//!
//! Each image is admitted or rejected on format and size, downsampled and
//! re-encoded as JPEG, and only swapped in when the result is strictly
//! smaller than what the document already stores.

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub mod engine;
pub mod error;
pub mod model;
pub mod pdf;
pub mod quality;
pub mod report;
pub mod selector;
pub mod transform;

pub use engine::compress_document;
pub use error::{CompressError, ImageError};
pub use model::{DocumentModel, ExtractedImage, ImageCandidate, ImageRef, ImageTranscoder, SaveOptions};
pub use pdf::PdfDocument;
pub use quality::{QualitySettings, QualityTier};
pub use report::{format_file_size, CompressionStats, Report, SkipReason, TraceEvent};
pub use transform::JpegTranscoder;

/// Largest input accepted by default (50 MiB)
pub const DEFAULT_MAX_INPUT_SIZE: usize = 50 * 1024 * 1024;

/// Options for PDF compression
#[derive(Debug, Clone)]
pub struct CompressOptions {
    /// Quality preset controlling resize factor, JPEG quality and garbage collection
    pub tier: QualityTier,
    /// Inputs larger than this are rejected before parsing
    pub max_input_size: usize,
}

impl CompressOptions {
    /// Options for a tier given by name; unknown names mean medium
    pub fn for_tier(name: &str) -> Self {
        let tier = QualityTier::parse(name).unwrap_or_else(|| {
            log::warn!("Unknown quality tier {:?}, using medium", name.trim());
            QualityTier::default()
        });
        CompressOptions {
            tier,
            ..Self::default()
        }
    }
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            tier: QualityTier::default(),
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
        }
    }
}

fn check_input_size(size: usize, options: &CompressOptions) -> Result<(), CompressError> {
    if size == 0 {
        return Err(CompressError::EmptyInput);
    }
    if size > options.max_input_size {
        return Err(CompressError::TooLarge {
            size,
            limit: options.max_input_size,
        });
    }
    Ok(())
}

/// Compress PDF bytes and return the new PDF bytes with a report
pub fn compress_pdf_bytes(
    input_bytes: &[u8],
    options: &CompressOptions,
) -> Result<(Vec<u8>, Report), CompressError> {
    check_input_size(input_bytes.len(), options)?;

    let mut doc = PdfDocument::load_mem(input_bytes)
        .map_err(|e| CompressError::Load(e.to_string()))?;

    log::info!(
        "[Compress] {} pages, tier {}",
        doc.page_count(),
        options.tier
    );

    let settings = options.tier.settings();
    compress_document(&mut doc, &JpegTranscoder, &settings, input_bytes.len())
}

#[cfg(not(target_arch = "wasm32"))]
pub mod file_ops {
    use super::*;
    use std::path::{Path, PathBuf};

    /// `<dir>/<stem>_compressed.pdf` next to the input
    pub fn default_output_path(input_path: &Path) -> PathBuf {
        let stem = input_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        input_path.with_file_name(format!("{}_compressed.pdf", stem))
    }

    /// Compress PDF from file path to file path
    pub fn compress_pdf_file(
        input_path: &Path,
        output_path: &Path,
        options: &CompressOptions,
    ) -> Result<Report, CompressError> {
        let input_bytes = std::fs::read(input_path)
            .map_err(|e| CompressError::Load(format!("{:?}: {}", input_path, e)))?;

        let (output_bytes, report) = compress_pdf_bytes(&input_bytes, options)?;

        std::fs::write(output_path, output_bytes)
            .map_err(|e| CompressError::Save(format!("{:?}: {}", output_path, e)))?;

        Ok(report)
    }

}
