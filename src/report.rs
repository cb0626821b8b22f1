//! Compression statistics and the structured trace returned to callers.

use crate::model::ImageRef;
use std::fmt;

/// Running counters for one compression run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionStats {
    pub images_compressed: usize,
    pub images_skipped: usize,
}

/// Why an image was left untouched
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    UnsupportedFormat(String),
    TooFewBytes(usize),
    TooFewPixels { width: u32, height: u32 },
    ExtractFailed(String),
    TransformFailed(String),
    NotSmaller { original: usize, candidate: usize },
    ReplaceFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedFormat(format) => write!(f, "unsupported format {:?}", format),
            SkipReason::TooFewBytes(len) => write!(f, "only {} bytes", len),
            SkipReason::TooFewPixels { width, height } => {
                write!(f, "only {}x{} px", width, height)
            }
            SkipReason::ExtractFailed(msg) => write!(f, "extraction failed: {}", msg),
            SkipReason::TransformFailed(msg) => write!(f, "transform failed: {}", msg),
            SkipReason::NotSmaller {
                original,
                candidate,
            } => write!(f, "re-encoded {} bytes is not below {} bytes", candidate, original),
            SkipReason::ReplaceFailed(msg) => write!(f, "replacement failed: {}", msg),
        }
    }
}

/// One step of the per-document walk
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    PageScanned {
        page: usize,
        images: usize,
    },
    ImageSkipped {
        page: usize,
        image: ImageRef,
        reason: SkipReason,
    },
    ImageCompressed {
        page: usize,
        image: ImageRef,
        original_bytes: usize,
        new_bytes: usize,
    },
    /// The image object was already handled through an earlier reference
    SharedImageReused {
        page: usize,
        image: ImageRef,
    },
    Compacted {
        garbage_level: u8,
        bytes: usize,
    },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::PageScanned { page, images } => {
                write!(f, "page {}: {} image reference(s)", page, images)
            }
            TraceEvent::ImageSkipped {
                page,
                image,
                reason,
            } => write!(f, "page {}: skipped {}: {}", page, image, reason),
            TraceEvent::ImageCompressed {
                page,
                image,
                original_bytes,
                new_bytes,
            } => write!(
                f,
                "page {}: compressed {} from {} to {} bytes",
                page, image, original_bytes, new_bytes
            ),
            TraceEvent::SharedImageReused { page, image } => {
                write!(f, "page {}: {} already processed", page, image)
            }
            TraceEvent::Compacted {
                garbage_level,
                bytes,
            } => write!(f, "compacted at garbage level {} to {} bytes", garbage_level, bytes),
        }
    }
}

/// Outcome of one compression run
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub images_compressed: usize,
    pub images_skipped: usize,
    pub original_bytes: usize,
    pub final_bytes: usize,
    /// Whole-document size change; may be negative
    pub reduction_percent: f64,
    pub events: Vec<TraceEvent>,
}

impl Report {
    pub fn new(
        original_bytes: usize,
        final_bytes: usize,
        stats: CompressionStats,
        events: Vec<TraceEvent>,
    ) -> Self {
        Report {
            images_compressed: stats.images_compressed,
            images_skipped: stats.images_skipped,
            original_bytes,
            final_bytes,
            reduction_percent: reduction_percent(original_bytes, final_bytes),
            events,
        }
    }

    /// True when the output is strictly smaller than the input
    pub fn is_reduced(&self) -> bool {
        self.final_bytes < self.original_bytes
    }
}

/// `(original - final) / original * 100`, or 0 for an empty original
pub fn reduction_percent(original_bytes: usize, final_bytes: usize) -> f64 {
    if original_bytes == 0 {
        return 0.0;
    }
    (original_bytes as f64 - final_bytes as f64) / original_bytes as f64 * 100.0
}

/// Human-readable size with 1024-based units, e.g. "1.5 KB"
pub fn format_file_size(bytes: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (value * 100.0).round() / 100.0;

    format!("{} {}", rounded, UNITS[exponent])
}
