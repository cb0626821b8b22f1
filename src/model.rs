//! Seams between the compression engine and the document / codec backends.
//!
//! The engine only talks to a document through [`DocumentModel`] and to the
//! image stack through [`ImageTranscoder`], so both can be swapped for
//! in-memory fakes.

use crate::error::ImageError;
use crate::quality::QualitySettings;
use std::fmt;

/// Opaque handle to an image object in a document's shared object table.
///
/// Two pages that draw the same image hold equal references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageRef {
    pub id: u32,
    pub generation: u16,
}

impl ImageRef {
    pub fn new(id: u32, generation: u16) -> Self {
        ImageRef { id, generation }
    }
}

impl From<(u32, u16)> for ImageRef {
    fn from((id, generation): (u32, u16)) -> Self {
        ImageRef { id, generation }
    }
}

impl From<ImageRef> for (u32, u16) {
    fn from(image: ImageRef) -> Self {
        (image.id, image.generation)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.id, self.generation)
    }
}

/// Image bytes pulled out of a document
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    /// Standalone encoded image (JPEG, PNG, ...)
    pub data: Vec<u8>,
    /// Lowercase format tag, e.g. "jpeg" or "png"
    pub format: String,
    pub width: u32,
    pub height: u32,
    /// Bytes the image currently occupies inside the document
    pub stored_len: usize,
}

/// One image under evaluation by the selector and transformer
#[derive(Debug, Clone)]
pub struct ImageCandidate {
    pub reference: ImageRef,
    pub data: Vec<u8>,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub stored_len: usize,
}

impl ImageCandidate {
    pub fn new(reference: ImageRef, extracted: ExtractedImage) -> Self {
        ImageCandidate {
            reference,
            data: extracted.data,
            format: extracted.format,
            width: extracted.width,
            height: extracted.height,
            stored_len: extracted.stored_len,
        }
    }
}

/// Options for the final serialization pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// 0 disables garbage collection; 1-4 are increasingly aggressive
    pub garbage_level: u8,
    /// Flate-compress every stream that has no filter yet
    pub deflate: bool,
}

impl From<&QualitySettings> for SaveOptions {
    fn from(settings: &QualitySettings) -> Self {
        SaveOptions {
            garbage_level: settings.garbage_level,
            deflate: true,
        }
    }
}

/// A mutable document whose images can be enumerated and swapped out
pub trait DocumentModel {
    /// Error raised by the final save
    type SaveError: fmt::Display;

    fn page_count(&self) -> usize;

    /// Image references drawn by page `page` (zero-based), in order
    fn page_images(&self, page: usize) -> Vec<ImageRef>;

    fn extract_image(&self, image: ImageRef) -> Result<ExtractedImage, ImageError>;

    /// Replace the image's encoded bytes with a JPEG. Affects every page that references it.
    fn replace_image(&mut self, image: ImageRef, jpeg: Vec<u8>) -> Result<(), ImageError>;

    /// Serialize the whole document. Called once, after all replacements.
    fn save(&mut self, options: &SaveOptions) -> Result<Vec<u8>, Self::SaveError>;
}

/// Produces a smaller JPEG rendition of an admitted image
pub trait ImageTranscoder {
    fn transcode(
        &self,
        candidate: &ImageCandidate,
        settings: &QualitySettings,
    ) -> Result<Vec<u8>, ImageError>;
}
