//! softstrip - Decoder for Cauzin Softstrip optical barcodes
//!
//! A Softstrip is a vertical band of dibit rows printed under a
//! synchronization header. Given rectified strip images, this crate finds
//! the header, groups pixel lines into rows, decodes each row with parity
//! validation, and reassembles the file the strips carry.
//!
//! ```no_run
//! use softstrip::{DecoderConfig, Pipeline};
//! use softstrip::tools::load_strip;
//!
//! let strip = load_strip("strip.png", Some(127))?;
//! let file = Pipeline::new(DecoderConfig::default())?.decode_file(&[strip])?;
//! println!("{:?}: {} bytes", file.filename(), file.data.len());
//! # Ok::<(), softstrip::SoftstripError>(())
//! ```

/// Decoder configuration
pub mod config;
/// Row decoding, checksum and field extraction
pub mod decoder;
/// Sync header detection and row extraction
pub mod detector;
/// Error types
pub mod error;
/// Core data structures (BitMatrix, rows, file headers)
pub mod models;
/// Strip and file orchestration
pub mod pipeline;
/// Image loading and synthetic strips
pub mod tools;
/// Utility functions (binarization, morphology, deadline)
pub mod utils;

pub use config::{ChecksumPolicy, DecoderConfig, Strategy, WireOrder};
pub use decoder::{DibitClassifier, DibitPrediction, StripData};
pub use detector::SplitClassifier;
pub use error::{Result, SoftstripError};
pub use models::{BitMatrix, FileHeader, FirstStripInfo};
pub use pipeline::{Classifiers, DecodedFile, Pipeline, StripImage, StripReport};

/// Decode the strips of one file with the default configuration.
pub fn decode(strips: &[StripImage]) -> Result<DecodedFile> {
    Pipeline::new(DecoderConfig::default())?.decode_file(strips)
}
