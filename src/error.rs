use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the decoding pipeline.
#[derive(Debug, Error)]
pub enum SoftstripError {
    /// The image carries no usable black-pixel signal.
    #[error("malformed image: {0}")]
    MalformedImage(String),

    /// No stable synchronization header was found.
    #[error("synchronization header not found: {0}")]
    HeaderNotFound(String),

    /// The row extractor produced no rows.
    #[error("no rows could be extracted from the strip")]
    NoRowsExtracted,

    /// A row never reached a parity-valid form.
    #[error("row {row} could not be decoded")]
    RowDecodeFailure { row: usize },

    /// No row combination satisfied the strip checksum.
    #[error("checksum invalid: declared {declared:#04x}, computed {computed:?}")]
    ChecksumInvalid { declared: u8, computed: Option<u8> },

    /// The per-file deadline elapsed.
    #[error("decoding timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// The decoded rows never contained the 0x00 0x00 0x00 data transition.
    #[error("data synchronization bytes not found")]
    DataSyncNotFound,

    /// The byte stream ended inside a header field.
    #[error("byte stream ended inside field `{field}`")]
    TruncatedFields { field: &'static str },

    /// A file header was assembled without one of its required fields.
    #[error("file header is missing field `{0}`")]
    MissingField(&'static str),

    /// A classifier strategy was configured without a classifier.
    #[error("{0} strategy selected but no classifier was supplied")]
    MissingClassifier(&'static str),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SoftstripError>;
