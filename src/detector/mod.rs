//! Strip layout detection
//!
//! This module finds the structure of a rectified strip:
//! - Run components and line features
//! - Horizontal/vertical sync header (bits per row)
//! - Row boundaries, structurally or through a split classifier

/// Classifier-driven row splitting
pub mod classifier_rows;
/// Per-line runs and normalized features
pub mod components;
/// Synchronization header parsing
pub mod header;
/// Checkerboard/rack based row extraction
pub mod rows;

pub use classifier_rows::{ClassifierRowExtractor, SplitClassifier};
pub use header::{HeaderExtractor, SyncHeader, SyncHeaderParser};
pub use rows::{AlgorithmicRowExtractor, RowExtractor};
