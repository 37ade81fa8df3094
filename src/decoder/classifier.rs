//! Classifier-driven row decoding.
//!
//! Each dibit block of a row's grayscale lines is labeled by an external
//! [`DibitClassifier`]. Rows failing parity are repaired by flipping the
//! least confident dibits and by bisecting the row, and the whole search is
//! repeated with the sampling window shifted by a few pixels.

use std::sync::Arc;

use image::{GrayImage, Luma};
use itertools::Itertools;
use log::trace;

use crate::decoder::bisect::bisect_search;
use crate::decoder::parity::parity_check;
use crate::decoder::{RowDecoder, decode_each};
use crate::error::Result;
use crate::models::{DecodedRow, DibitRow, GroupedRow};
use crate::utils::deadline::Deadline;

/// Pixel shifts of the sampling window, tried in order.
pub const SHIFT_OFFSETS: [i32; 5] = [0, 1, -1, 2, -2];
/// Predictions below this confidence are candidates for flipping.
pub const MIN_CONFIDENCE: f32 = 0.9;
/// Upper bound on the number of dibits flipped combinatorially.
pub const MAX_UNCERTAIN_DIBITS: usize = 12;

/// Start bar, space and checkerboard emitted in front of the predicted dibits.
const ROW_PREFIX: [u8; 5] = [1, 1, 0, 1, 0];
/// Right space and rack emitted after the predicted dibits.
const ROW_SUFFIX: [u8; 5] = [0, 0, 1, 1, 0];

/// Label of one dibit block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DibitPrediction {
    /// `[1, 0]` or `[0, 1]`.
    pub dibit: [u8; 2],
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Labels a grayscale dibit block.
pub trait DibitClassifier: Send + Sync {
    fn classify(&self, block: &GrayImage) -> DibitPrediction;
}

/// Row decoder delegating dibit recognition to a [`DibitClassifier`].
pub struct ClassifierRowDecoder<C: ?Sized> {
    classifier: Arc<C>,
}

impl<C: DibitClassifier + ?Sized> ClassifierRowDecoder<C> {
    pub fn new(classifier: Arc<C>) -> Self {
        Self { classifier }
    }

    /// Predict every dibit between the checkerboard and the rack.
    fn predict_row(
        &self,
        row: &GroupedRow,
        bits_per_row: usize,
        offset: i32,
    ) -> (DibitRow, Vec<f32>) {
        let width = row.gray.iter().map(Vec::len).min().unwrap_or(0);
        let block_width = width as f64 / bits_per_row.max(1) as f64;
        let dibits = bits_per_row.saturating_sub(10) / 2;

        let mut units = ROW_PREFIX.to_vec();
        let mut confidences = Vec::with_capacity(dibits);
        for i in 0..dibits {
            let start = (block_width * 5.0 + i as f64 * block_width * 2.0 + offset as f64)
                .round()
                .max(0.0) as usize;
            let end = start + (block_width * 2.0).round() as usize;
            let block = block_image(&row.gray, start, end);
            let prediction = self.classifier.classify(&block);
            units.extend(prediction.dibit);
            confidences.push(prediction.confidence);
        }
        units.extend(ROW_SUFFIX);
        (DibitRow::new(units), confidences)
    }

    /// Valid rows for one sub-group: the prediction itself, or the flip
    /// combinations of its uncertain dibits.
    fn valid_predictions(
        &self,
        row: &GroupedRow,
        bits_per_row: usize,
        offset: i32,
    ) -> Vec<DibitRow> {
        let (predicted, confidences) = self.predict_row(row, bits_per_row, offset);
        if parity_check(&predicted) {
            return vec![predicted];
        }
        flip_uncertain_dibits(&predicted, &confidences)
    }

    /// Decode one grouped row.
    pub fn decode_row(&self, row: &GroupedRow, bits_per_row: usize) -> Option<DecodedRow> {
        let mut candidates: Vec<DibitRow> = Vec::new();
        for offset in SHIFT_OFFSETS {
            let (predicted, confidences) = self.predict_row(row, bits_per_row, offset);
            if parity_check(&predicted) {
                merge(&mut candidates, vec![predicted]);
                break;
            }
            merge(&mut candidates, flip_uncertain_dibits(&predicted, &confidences));
            let found = bisect_search(row, |node| {
                self.valid_predictions(node, bits_per_row, offset)
            });
            merge(&mut candidates, found);
            trace!("offset {offset}: {} candidates so far", candidates.len());
        }
        DecodedRow::new(candidates)
    }
}

fn merge(candidates: &mut Vec<DibitRow>, found: Vec<DibitRow>) {
    for candidate in found {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
}

/// Grayscale block of columns `start..end` across all lines.
fn block_image(lines: &[Vec<u8>], start: usize, end: usize) -> GrayImage {
    let width = end.saturating_sub(start) as u32;
    GrayImage::from_fn(width, lines.len() as u32, |x, y| {
        let line = &lines[y as usize];
        Luma([line.get(start + x as usize).copied().unwrap_or(255)])
    })
}

/// Every parity-valid row reachable by flipping uncertain dibits, fewest
/// flips first. Only the least confident dibits are considered.
pub fn flip_uncertain_dibits(row: &DibitRow, confidences: &[f32]) -> Vec<DibitRow> {
    let uncertain: Vec<usize> = confidences
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c < MIN_CONFIDENCE)
        .sorted_by(|a, b| a.1.total_cmp(b.1))
        .take(MAX_UNCERTAIN_DIBITS)
        .map(|(i, _)| i)
        .sorted()
        .collect();

    let mut valid = Vec::new();
    for flips in 1..=uncertain.len() {
        for combination in uncertain.iter().combinations(flips) {
            let mut units = row.units().to_vec();
            for &pos in combination {
                let at = pos * 2 + ROW_PREFIX.len();
                if at + 1 >= units.len() {
                    continue;
                }
                let dibit = if units[at] == 0 { [1, 0] } else { [0, 1] };
                units[at..at + 2].copy_from_slice(&dibit);
            }
            let candidate = DibitRow::new(units);
            if parity_check(&candidate) && !valid.contains(&candidate) {
                valid.push(candidate);
            }
        }
    }
    valid
}

impl<C: DibitClassifier + ?Sized> RowDecoder for ClassifierRowDecoder<C> {
    fn decode_rows(
        &self,
        rows: &[GroupedRow],
        bits_per_row: usize,
        deadline: &Deadline,
    ) -> Result<Vec<DecodedRow>> {
        decode_each(rows, deadline, |row| self.decode_row(row, bits_per_row))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::decoder::parity::assemble_row;
    use crate::models::{Pattern, PatternLine};

    const UNIT: usize = 4;

    /// Compares the darkness of the two halves of a block.
    struct ContrastClassifier {
        calls: Mutex<usize>,
        /// Call index answered wrongly with low confidence.
        sabotage: Option<usize>,
    }

    impl ContrastClassifier {
        fn new(sabotage: Option<usize>) -> Self {
            Self {
                calls: Mutex::new(0),
                sabotage,
            }
        }
    }

    impl DibitClassifier for ContrastClassifier {
        fn classify(&self, block: &GrayImage) -> DibitPrediction {
            let mut calls = self.calls.lock().unwrap();
            let call = *calls;
            *calls += 1;

            let half = block.width() / 2;
            let (mut left, mut right) = (0u64, 0u64);
            for (x, _, p) in block.enumerate_pixels() {
                if x < half {
                    left += p[0] as u64;
                } else {
                    right += p[0] as u64;
                }
            }
            let dibit = if left < right { [1, 0] } else { [0, 1] };
            if Some(call) == self.sabotage {
                let flipped = if dibit == [1, 0] { [0, 1] } else { [1, 0] };
                return DibitPrediction {
                    dibit: flipped,
                    confidence: 0.6,
                };
            }
            DibitPrediction {
                dibit,
                confidence: 0.99,
            }
        }
    }

    fn gray_row(row: &DibitRow, lines: usize) -> GroupedRow {
        let gray: Vec<u8> = row
            .units()
            .iter()
            .flat_map(|&u| std::iter::repeat_n(if u == 1 { 0 } else { 255 }, UNIT))
            .collect();
        let binary: Vec<u8> = gray.iter().map(|&g| u8::from(g == 0)).collect();
        GroupedRow {
            lines: vec![
                PatternLine {
                    pattern: Pattern::BlackWhite,
                    pixels: binary,
                };
                lines
            ],
            gray: vec![gray; lines],
        }
    }

    #[test]
    fn test_clean_row_decodes_on_first_offset() {
        let expected = assemble_row(&[1, 0, 0, 1, 1, 0], Pattern::BlackWhite);
        let classifier = Arc::new(ContrastClassifier::new(None));
        let decoder = ClassifierRowDecoder::new(classifier.clone());
        let decoded = decoder.decode_row(&gray_row(&expected, 4), expected.len()).unwrap();
        assert_eq!(decoded.candidates(), &[expected]);
        // one prediction per dibit, no retries
        assert_eq!(*classifier.calls.lock().unwrap(), 8);
    }

    #[test]
    fn test_uncertain_dibit_is_flipped() {
        let expected = assemble_row(&[1, 1, 0, 1], Pattern::BlackWhite);
        let decoder = ClassifierRowDecoder::new(Arc::new(ContrastClassifier::new(Some(2))));
        let decoded = decoder.decode_row(&gray_row(&expected, 4), expected.len()).unwrap();
        assert_eq!(decoded.primary(), &expected);
    }

    #[test]
    fn test_flips_prefer_fewest_changes() {
        let expected = assemble_row(&[0, 1], Pattern::BlackWhite);
        let mut units = expected.units().to_vec();
        // corrupt the first data dibit
        units.swap(7, 8);
        let corrupted = DibitRow::new(units);
        let found = flip_uncertain_dibits(&corrupted, &[0.99, 0.5, 0.99, 0.7]);
        assert_eq!(found.first(), Some(&expected));
        assert!(flip_uncertain_dibits(&corrupted, &[0.99; 4]).is_empty());
    }
}
