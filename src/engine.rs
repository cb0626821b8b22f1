//! The per-document walk: select, transform, gate, compact, report.

use crate::error::{CompressError, ImageError};
use crate::model::{DocumentModel, ImageCandidate, ImageRef, ImageTranscoder, SaveOptions};
use crate::quality::QualitySettings;
use crate::report::{CompressionStats, Report, SkipReason, TraceEvent};
use crate::selector;
use std::collections::HashSet;

/// Collects counters and trace events for one document
#[derive(Debug, Default)]
struct Run {
    stats: CompressionStats,
    events: Vec<TraceEvent>,
}

impl Run {
    fn skip(&mut self, page: usize, image: ImageRef, reason: SkipReason) {
        log::debug!("[Compress] page {}: skipping {}: {}", page, image, reason);
        self.stats.images_skipped += 1;
        self.events.push(TraceEvent::ImageSkipped {
            page,
            image,
            reason,
        });
    }

    fn compressed(&mut self, page: usize, image: ImageRef, original_bytes: usize, new_bytes: usize) {
        log::debug!(
            "[Compress] page {}: replaced {} ({} -> {} bytes)",
            page,
            image,
            original_bytes,
            new_bytes
        );
        self.stats.images_compressed += 1;
        self.events.push(TraceEvent::ImageCompressed {
            page,
            image,
            original_bytes,
            new_bytes,
        });
    }
}

/// Compress every eligible image in `doc`, then serialize it once.
///
/// `original_size` is the byte length of the input the document was loaded
/// from and must be non-zero.
pub fn compress_document<D, T>(
    doc: &mut D,
    transcoder: &T,
    settings: &QualitySettings,
    original_size: usize,
) -> Result<(Vec<u8>, Report), CompressError>
where
    D: DocumentModel,
    T: ImageTranscoder + ?Sized,
{
    if original_size == 0 {
        return Err(CompressError::EmptyInput);
    }

    let mut run = Run::default();
    let mut visited: HashSet<ImageRef> = HashSet::new();

    for page in 0..doc.page_count() {
        let images = doc.page_images(page);
        run.events.push(TraceEvent::PageScanned {
            page,
            images: images.len(),
        });

        for image in images {
            if !visited.insert(image) {
                run.events.push(TraceEvent::SharedImageReused { page, image });
                continue;
            }
            process_image(doc, transcoder, settings, page, image, &mut run);
        }
    }

    let options = SaveOptions::from(settings);
    let output = doc
        .save(&options)
        .map_err(|e| CompressError::Save(e.to_string()))?;
    run.events.push(TraceEvent::Compacted {
        garbage_level: options.garbage_level,
        bytes: output.len(),
    });

    let report = Report::new(original_size, output.len(), run.stats, run.events);
    log::info!(
        "[Compress] {} compressed, {} skipped, {} -> {} bytes ({:.1}%)",
        report.images_compressed,
        report.images_skipped,
        report.original_bytes,
        report.final_bytes,
        report.reduction_percent
    );

    Ok((output, report))
}

fn process_image<D, T>(
    doc: &mut D,
    transcoder: &T,
    settings: &QualitySettings,
    page: usize,
    image: ImageRef,
    run: &mut Run,
) where
    D: DocumentModel,
    T: ImageTranscoder + ?Sized,
{
    let candidate = match doc.extract_image(image) {
        Ok(extracted) => ImageCandidate::new(image, extracted),
        Err(e) => {
            log::warn!("[Compress] {}: {}", image, e);
            run.skip(page, image, SkipReason::ExtractFailed(e.to_string()));
            return;
        }
    };

    if let Err(reason) = selector::admit(&candidate) {
        run.skip(page, image, reason);
        return;
    }

    match transcoder.transcode(&candidate, settings) {
        Ok(new_bytes) => maybe_replace(doc, page, &candidate, new_bytes, run),
        Err(e) => {
            log::warn!("[Compress] {}: {}", image, e);
            run.skip(page, image, SkipReason::TransformFailed(e.to_string()));
        }
    }
}

/// Commit `new_bytes` only when it is strictly smaller than what is stored now
fn maybe_replace<D: DocumentModel>(
    doc: &mut D,
    page: usize,
    candidate: &ImageCandidate,
    new_bytes: Vec<u8>,
    run: &mut Run,
) {
    let original = candidate.stored_len;
    let new_len = new_bytes.len();

    if new_len >= original {
        run.skip(
            page,
            candidate.reference,
            SkipReason::NotSmaller {
                original,
                candidate: new_len,
            },
        );
        return;
    }

    match doc.replace_image(candidate.reference, new_bytes) {
        Ok(()) => run.compressed(page, candidate.reference, original, new_len),
        Err(e) => {
            log::warn!("[Compress] {}: {}", candidate.reference, e);
            let msg = match e {
                ImageError::Replace(msg) => msg,
                other => other.to_string(),
            };
            run.skip(page, candidate.reference, SkipReason::ReplaceFailed(msg));
        }
    }
}
