//! HTML parsing errors

/// Result type for parsing operations
pub type HtmlResult<T> = Result<T, HtmlError>;

/// Errors surfaced to the caller. Malformed markup and unusable in-document
/// encoding declarations are recovered from and never reported here.
#[derive(Debug, thiserror::Error)]
pub enum HtmlError {
    /// Reading the input failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller-declared encoding label is not recognised
    #[error("unknown encoding label: {0:?}")]
    UnknownEncoding(String),

    /// Fragment parsing was requested with an unusable context element
    #[error("invalid fragment context: {0:?}")]
    InvalidContext(String),
}
