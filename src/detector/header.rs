//! Horizontal/vertical synchronization header detection.
//!
//! The top of a strip repeats one bar pattern (horizontal sync) whose
//! white-to-black transitions encode the row width in nibbles. It is
//! followed by the vertical sync section, the first lines laid out like
//! data rows. Everything above the vertical sync is removed from the matrix.

use log::debug;

use crate::detector::components::{RowComponents, white_to_black_transitions};
use crate::error::{Result, SoftstripError};
use crate::models::BitMatrix;

/// Exclusive upper bound on the feature distance of two similar lines.
pub const HORIZONTAL_SYNC_DELTA: f64 = 0.1;
/// Lines following the horizontal sync line that must be similar to it.
pub const HORIZONTAL_SIMILARITY_MINIMUM: usize = 5;
/// Consecutive similar lines required for the vertical sync.
pub const VERTICAL_SIMILARITY_MINIMUM: usize = 3;
/// Minimum run-count difference between horizontal and vertical sync lines.
pub const MINIMUM_BAR_DIFFERENCE: usize = 10;
/// Bits per row not covered by nibbles: start bar (2), space (1),
/// checkerboard (2), parities (2 + 2), right space and rack (5).
pub const ROW_OVERHEAD_BITS: usize = 14;

/// Header extraction contract.
pub trait HeaderExtractor {
    /// Remove every line above the vertical sync from `matrix` and return the
    /// number of lines removed.
    fn remove_horizontal_header(&mut self, matrix: &mut BitMatrix) -> Result<usize>;

    /// Bits per row, known once the header was parsed.
    fn bits_per_row(&self) -> Option<usize>;
}

/// Result of parsing the synchronization header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncHeader {
    pub nibbles: usize,
    pub horizontal_sync: usize,
    pub vertical_sync: usize,
}

impl SyncHeader {
    pub fn bits_per_row(&self) -> usize {
        bits_per_row_for_nibbles(self.nibbles)
    }
}

/// Nibbles per row encoded by a horizontal sync line.
pub fn nibbles_from_transitions(transitions: usize) -> usize {
    (transitions + 5) / 2
}

pub fn bits_per_row_for_nibbles(nibbles: usize) -> usize {
    ROW_OVERHEAD_BITS + nibbles * 8
}

/// Strict similarity test used by both sync searches.
pub fn within_sync_delta(distance: f64) -> bool {
    distance < HORIZONTAL_SYNC_DELTA
}

/// Header parser comparing normalized run features between lines.
#[derive(Debug, Default, Clone)]
pub struct SyncHeaderParser {
    header: Option<SyncHeader>,
}

impl SyncHeaderParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// The parsed header, if `remove_horizontal_header` succeeded.
    pub fn header(&self) -> Option<SyncHeader> {
        self.header
    }

    /// Locate both sync sections without modifying the matrix.
    pub fn parse(matrix: &BitMatrix) -> Result<SyncHeader> {
        let components = RowComponents::from_lines(matrix.binary_lines());

        let horizontal = (0..components.len())
            .find(|&i| lines_similar(&components, i, HORIZONTAL_SIMILARITY_MINIMUM + 1))
            .ok_or_else(|| {
                SoftstripError::HeaderNotFound("no stable horizontal sync line".to_string())
            })?;
        let transitions = white_to_black_transitions(&components.components[horizontal]);
        let nibbles = nibbles_from_transitions(transitions);
        let horizontal_runs = components.run_count(horizontal);

        let vertical = (horizontal..components.len())
            .find(|&i| {
                components.run_count(i).abs_diff(horizontal_runs) > MINIMUM_BAR_DIFFERENCE
                    && lines_similar(&components, i, VERTICAL_SIMILARITY_MINIMUM)
            })
            .ok_or_else(|| {
                SoftstripError::HeaderNotFound(format!(
                    "no vertical sync after horizontal sync line {horizontal}"
                ))
            })?;

        debug!(
            "sync header: horizontal line {horizontal}, vertical line {vertical}, \
             {transitions} transitions, {nibbles} nibbles per row"
        );

        Ok(SyncHeader {
            nibbles,
            horizontal_sync: horizontal,
            vertical_sync: vertical,
        })
    }
}

/// Lines `start..start + count` are all similar to line `start`.
fn lines_similar(components: &RowComponents, start: usize, count: usize) -> bool {
    if start + count > components.len() {
        return false;
    }
    let reference = &components.features[start];
    components.features[start..start + count]
        .iter()
        .all(|f| within_sync_delta(reference.distance(f)))
}

impl HeaderExtractor for SyncHeaderParser {
    fn remove_horizontal_header(&mut self, matrix: &mut BitMatrix) -> Result<usize> {
        let header = Self::parse(matrix)?;
        matrix.drop_leading_lines(header.vertical_sync);
        self.header = Some(header);
        Ok(header.vertical_sync)
    }

    fn bits_per_row(&self) -> Option<usize> {
        self.header.map(|h| h.bits_per_row())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Start bar followed by `transitions` white/black bar pairs.
    fn sync_line(transitions: usize, bar: usize) -> Vec<u8> {
        let mut line = vec![1; bar];
        for _ in 0..transitions {
            line.extend(std::iter::repeat_n(0, bar));
            line.extend(std::iter::repeat_n(1, bar));
        }
        line
    }

    fn data_line(width: usize) -> Vec<u8> {
        (0..width).map(|i| u8::from(i % 3 == 0)).collect()
    }

    fn matrix(lines: Vec<Vec<u8>>) -> BitMatrix {
        BitMatrix::from_lines(lines.clone(), lines).unwrap()
    }

    #[test]
    fn test_bits_per_row_formula() {
        for t in 0..20 {
            assert_eq!(
                bits_per_row_for_nibbles(nibbles_from_transitions(t)),
                14 + ((t + 5) / 2) * 8
            );
        }
    }

    #[test]
    fn test_sync_delta_boundary_is_exclusive() {
        assert!(!within_sync_delta(HORIZONTAL_SYNC_DELTA));
        assert!(within_sync_delta(0.0999));
        assert!(!within_sync_delta(0.1001));
    }

    #[test]
    fn test_parse_and_remove_header() {
        let width = 6 * 7;
        let mut lines = vec![sync_line(3, 6); 7];
        lines.extend(vec![data_line(width); 6]);
        let mut m = matrix(lines);

        let mut parser = SyncHeaderParser::new();
        assert!(parser.bits_per_row().is_none());
        let removed = parser.remove_horizontal_header(&mut m).unwrap();

        assert_eq!(removed, 7);
        assert_eq!(m.height(), 6);
        assert_eq!(parser.header().unwrap().nibbles, 4);
        assert_eq!(parser.bits_per_row(), Some(46));
    }

    #[test]
    fn test_too_few_similar_lines_is_header_not_found() {
        // five sync lines are one short of the required six
        let mut lines = vec![sync_line(3, 6); 5];
        lines.push(data_line(42));
        let m = matrix(lines);
        assert!(matches!(
            SyncHeaderParser::parse(&m),
            Err(SoftstripError::HeaderNotFound(_))
        ));
    }

    #[test]
    fn test_missing_vertical_sync_is_header_not_found() {
        let m = matrix(vec![sync_line(3, 6); 10]);
        assert!(SyncHeaderParser::parse(&m).is_err());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let mut lines = vec![sync_line(5, 4); 8];
        lines.extend(vec![data_line(44); 4]);
        let m = matrix(lines);
        let a = SyncHeaderParser::parse(&m).unwrap();
        let b = SyncHeaderParser::parse(&m).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.nibbles, 5);
    }
}
