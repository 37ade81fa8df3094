//! Strip decoding modules
//!
//! This module turns grouped pixel rows into file data:
//! - Row decoding (structural or classifier-driven) with parity validation
//! - Bisection search over noisy rows
//! - Field extraction, checksum validation and backtracking

use log::{debug, warn};

use crate::error::{Result, SoftstripError};
use crate::models::{DecodedRow, GroupedRow};
use crate::utils::deadline::Deadline;

/// Structural row decoding from run widths
pub mod algorithmic;
/// Breadth-first bisection of grouped rows
pub mod bisect;
/// Strip checksum
pub mod checksum;
/// Classifier-driven row decoding
pub mod classifier;
/// File field extraction
pub mod fields;
/// Row parity
pub mod parity;

pub use algorithmic::AlgorithmicRowDecoder;
pub use classifier::{ClassifierRowDecoder, DibitClassifier, DibitPrediction};
pub use fields::{FieldExtractor, StripData};

/// Row decoding contract shared by the algorithmic and classifier strategies.
pub trait RowDecoder: Send + Sync {
    /// Decode every row, dropping rows that never validate. Fails only when
    /// the deadline expires.
    fn decode_rows(
        &self,
        rows: &[GroupedRow],
        bits_per_row: usize,
        deadline: &Deadline,
    ) -> Result<Vec<DecodedRow>>;
}

/// Run `decode` over each non-empty row, checking the deadline before every
/// row.
pub(crate) fn decode_each<F>(
    rows: &[GroupedRow],
    deadline: &Deadline,
    mut decode: F,
) -> Result<Vec<DecodedRow>>
where
    F: FnMut(&GroupedRow) -> Option<DecodedRow>,
{
    let mut decoded = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        deadline.check()?;
        if row.is_empty() {
            continue;
        }
        match decode(row) {
            Some(result) => decoded.push(result),
            None => warn!("dropping row: {}", SoftstripError::RowDecodeFailure { row: index }),
        }
    }
    debug!("decoded {} of {} rows", decoded.len(), rows.len());
    Ok(decoded)
}
