//! WebAssembly bindings for PDF Shrink

use crate::{compress_pdf_bytes, CompressOptions, Report, TraceEvent};
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Compress the images in a PDF and compact it
///
/// # Arguments
/// * `pdf_bytes` - The input PDF file as a byte array
/// * `level` - Quality tier "low", "medium" or "high" (default: medium)
///
/// # Returns
/// The compressed PDF as a byte array, or throws an error
#[wasm_bindgen]
pub fn compress_pdf(pdf_bytes: &[u8], level: Option<String>) -> Result<Vec<u8>, JsError> {
    let options = CompressOptions::for_tier(level.as_deref().unwrap_or("medium"));

    let (output_bytes, _report) =
        compress_pdf_bytes(pdf_bytes, &options).map_err(|e| JsError::new(&e.to_string()))?;

    Ok(output_bytes)
}

/// Compress a PDF and return the result together with its statistics
///
/// # Arguments
/// * `pdf_bytes` - The input PDF file as a byte array
/// * `level` - Quality tier "low", "medium" or "high" (default: medium)
///
/// # Returns
/// A `CompressResultJs` object containing the compressed PDF and statistics
#[wasm_bindgen]
pub fn compress_pdf_with_info(
    pdf_bytes: &[u8],
    level: Option<String>,
) -> Result<CompressResultJs, JsError> {
    let options = CompressOptions::for_tier(level.as_deref().unwrap_or("medium"));

    let (output_bytes, report) =
        compress_pdf_bytes(pdf_bytes, &options).map_err(|e| JsError::new(&e.to_string()))?;

    let report_json =
        serde_json::to_string(&report_to_json(&report)).unwrap_or_else(|_| "{}".to_string());

    Ok(CompressResultJs {
        pdf_bytes: output_bytes,
        images_compressed: report.images_compressed,
        images_skipped: report.images_skipped,
        reduction_percent: report.reduction_percent,
        report_json,
    })
}

/// Convert a report to a JSON-serializable structure
fn report_to_json(report: &Report) -> serde_json::Value {
    serde_json::json!({
        "imagesCompressed": report.images_compressed,
        "imagesSkipped": report.images_skipped,
        "originalBytes": report.original_bytes,
        "finalBytes": report.final_bytes,
        "reductionPercent": report.reduction_percent,
        "events": report.events.iter().map(event_to_json).collect::<Vec<_>>()
    })
}

fn event_to_json(event: &TraceEvent) -> serde_json::Value {
    let kind = match event {
        TraceEvent::PageScanned { .. } => "pageScanned",
        TraceEvent::ImageSkipped { .. } => "imageSkipped",
        TraceEvent::ImageCompressed { .. } => "imageCompressed",
        TraceEvent::SharedImageReused { .. } => "sharedImageReused",
        TraceEvent::Compacted { .. } => "compacted",
    };
    serde_json::json!({
        "kind": kind,
        "message": event.to_string()
    })
}

/// Result of PDF compression with statistics
#[wasm_bindgen]
pub struct CompressResultJs {
    pdf_bytes: Vec<u8>,
    images_compressed: usize,
    images_skipped: usize,
    reduction_percent: f64,
    report_json: String,
}

#[wasm_bindgen]
impl CompressResultJs {
    /// Get the compressed PDF bytes
    #[wasm_bindgen(getter)]
    pub fn pdf_bytes(&self) -> Vec<u8> {
        self.pdf_bytes.clone()
    }

    /// Get the number of images that were replaced
    #[wasm_bindgen(getter)]
    pub fn images_compressed(&self) -> usize {
        self.images_compressed
    }

    /// Get the number of images that were left untouched
    #[wasm_bindgen(getter)]
    pub fn images_skipped(&self) -> usize {
        self.images_skipped
    }

    /// Get the whole-document size reduction in percent
    #[wasm_bindgen(getter)]
    pub fn reduction_percent(&self) -> f64 {
        self.reduction_percent
    }

    /// Get the full report as a JSON string
    #[wasm_bindgen(getter)]
    pub fn report_json(&self) -> String {
        self.report_json.clone()
    }
}
