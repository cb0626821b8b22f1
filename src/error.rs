use thiserror::Error;

/// Document-level failures. These abort the whole operation.
#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Input PDF is empty")]
    EmptyInput,

    #[error("Input PDF is {size} bytes, exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Failed to load PDF: {0}")]
    Load(String),

    #[error("Failed to save PDF: {0}")]
    Save(String),
}

/// Failures scoped to a single image. The engine absorbs these as skips.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("could not extract image: {0}")]
    Extract(String),

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("could not encode image: {0}")]
    Encode(String),

    #[error("could not replace image: {0}")]
    Replace(String),
}
