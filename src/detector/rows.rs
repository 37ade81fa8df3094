//! Row extraction: grouping pixel lines into logical strip rows.
//!
//! Every row starts with a checkerboard square and ends with a rack square
//! whose colors alternate from row to row. Sampling one column inside each
//! marker classifies a line's [`Pattern`]; contiguous lines that alternate
//! between the two expected patterns form the rows.

use std::collections::HashMap;

use log::debug;

use crate::error::{Result, SoftstripError};
use crate::models::{BitMatrix, GroupedRow, Pattern, PatternLine};

/// Lines per boundary segment.
pub const SEGMENT_SIZE: usize = 75;
/// Minimum occurrences for a marker position to be trusted.
pub const MIN_OCCURRENCE: usize = 6;

/// Row extraction contract shared by the algorithmic and classifier
/// strategies.
pub trait RowExtractor: Send + Sync {
    fn extract_rows(&self, matrix: &BitMatrix, bits_per_row: usize) -> Result<Vec<GroupedRow>>;
}

/// Marker boundaries measured over one segment of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentBoundary {
    pub start: usize,
    pub end: usize,
    pub min_left_start: usize,
    pub max_left_end: usize,
    pub min_right_end: usize,
    pub max_right_end: usize,
}

impl SegmentBoundary {
    /// Column sampled for the checkerboard square.
    pub fn checkerboard_column(&self) -> usize {
        midpoint(self.min_left_start, self.max_left_end)
    }

    /// Column sampled for the last rack square.
    pub fn rack_column(&self) -> usize {
        midpoint(self.min_right_end, self.max_right_end)
    }
}

fn midpoint(lo: usize, hi: usize) -> usize {
    (lo as f64 + (hi as f64 - lo as f64) * 0.5).round() as usize
}

/// Segment ranges of `SEGMENT_SIZE` lines; a shorter remainder joins the
/// previous segment.
fn segment_ranges(height: usize) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < height {
        let end = if height - start < 2 * SEGMENT_SIZE {
            height
        } else {
            start + SEGMENT_SIZE
        };
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Start of the second black run of a line (the checkerboard's black square
/// in a row starting with the start bar).
fn checkerboard_position(line: &[u8]) -> Option<usize> {
    let mut last = 0u8;
    let mut black_runs = 0;
    for (i, &pixel) in line.iter().enumerate() {
        if pixel == 1 && last == 0 {
            black_runs += 1;
            if black_runs == 2 {
                return Some(i);
            }
        }
        last = pixel;
    }
    None
}

fn frequent_positions(positions: &[usize], keep: impl Fn(usize) -> bool) -> Vec<usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for &p in positions {
        *counts.entry(p).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|&(p, n)| n >= MIN_OCCURRENCE && keep(p))
        .map(|(p, _)| p)
        .collect()
}

fn min_max(filtered: &[usize], fallback: &[usize]) -> Option<(usize, usize)> {
    let values = if filtered.is_empty() { fallback } else { filtered };
    Some((*values.iter().min()?, *values.iter().max()?))
}

fn segment_boundary(
    lines: &[Vec<u8>],
    start: usize,
    end: usize,
    bits_per_row: usize,
) -> Option<SegmentBoundary> {
    let segment = &lines[start..end];
    let checkerboard: Vec<usize> = segment
        .iter()
        .filter_map(|l| checkerboard_position(l))
        .collect();
    let rack: Vec<usize> = segment
        .iter()
        .filter_map(|l| l.iter().rposition(|&p| p == 1))
        .collect();

    let unit = segment.first().map_or(0, Vec::len) as f64 / bits_per_row.max(1) as f64;
    let (window_start, window_end) = (unit * 2.25, unit * 4.25);
    let filtered_checkerboard = frequent_positions(&checkerboard, |p| {
        (p as f64) > window_start && (p as f64) < window_end
    });
    let filtered_rack = frequent_positions(&rack, |_| true);

    let (min_left_start, max_left_end) = min_max(&filtered_checkerboard, &checkerboard)?;
    let (min_right_end, max_right_end) = min_max(&filtered_rack, &rack)?;
    Some(SegmentBoundary {
        start,
        end,
        min_left_start,
        max_left_end,
        min_right_end,
        max_right_end,
    })
}

/// Robust marker boundaries for every segment of the matrix. A segment
/// without usable markers borrows its predecessor's boundaries.
pub fn matrix_boundaries(matrix: &BitMatrix, bits_per_row: usize) -> Result<Vec<SegmentBoundary>> {
    let lines = matrix.binary_lines();
    let mut boundaries: Vec<SegmentBoundary> = Vec::new();
    let mut pending = Vec::new();

    for (start, end) in segment_ranges(lines.len()) {
        match segment_boundary(lines, start, end, bits_per_row) {
            Some(boundary) => {
                for (s, e) in pending.drain(..) {
                    boundaries.push(SegmentBoundary {
                        start: s,
                        end: e,
                        ..boundary
                    });
                }
                boundaries.push(boundary);
            }
            None => match boundaries.last() {
                Some(previous) => boundaries.push(SegmentBoundary {
                    start,
                    end,
                    ..*previous
                }),
                None => pending.push((start, end)),
            },
        }
    }

    if boundaries.is_empty() {
        return Err(SoftstripError::NoRowsExtracted);
    }
    Ok(boundaries)
}

/// Tag every line of the matrix with its pattern.
pub fn tag_patterns(matrix: &BitMatrix, boundaries: &[SegmentBoundary]) -> Vec<Pattern> {
    let mut patterns = Vec::with_capacity(matrix.height());
    for boundary in boundaries {
        let checkerboard = boundary.checkerboard_column();
        let rack = boundary.rack_column();
        for line in &matrix.binary_lines()[boundary.start..boundary.end] {
            patterns.push(Pattern::classify(line, checkerboard, rack));
        }
    }
    patterns
}

/// Group tagged lines into rows. Rows alternate between black-white and
/// white-black lines; a line showing the next expected pattern opens a new
/// row, lines with any other pattern are skipped.
pub fn group_by_pattern(matrix: &BitMatrix, patterns: &[Pattern]) -> Vec<GroupedRow> {
    let mut current = Pattern::BlackWhite;
    let mut next = Pattern::WhiteBlack;
    let mut rows = Vec::new();
    let mut row = GroupedRow::default();

    let lines = matrix.binary_lines().iter().zip(matrix.gray_lines());
    for ((pixels, gray), &pattern) in lines.zip(patterns) {
        if pattern == next {
            rows.push(std::mem::take(&mut row));
            std::mem::swap(&mut current, &mut next);
        } else if pattern != current {
            continue;
        }
        row.lines.push(PatternLine {
            pattern,
            pixels: pixels.clone(),
        });
        row.gray.push(gray.clone());
    }
    rows.push(row);
    rows.retain(|r| !r.is_empty());
    rows
}

/// Structural row extractor using checkerboard and rack markers.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlgorithmicRowExtractor;

impl RowExtractor for AlgorithmicRowExtractor {
    fn extract_rows(&self, matrix: &BitMatrix, bits_per_row: usize) -> Result<Vec<GroupedRow>> {
        let boundaries = matrix_boundaries(matrix, bits_per_row)?;
        let patterns = tag_patterns(matrix, &boundaries);
        let rows = group_by_pattern(matrix, &patterns);
        debug!(
            "extracted {} rows from {} lines over {} segments",
            rows.len(),
            matrix.height(),
            boundaries.len()
        );
        if rows.is_empty() {
            return Err(SoftstripError::NoRowsExtracted);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: usize = 4;

    /// Units of a row: start bar, space, checkerboard, 4 data units, rack.
    fn row_units(black_first: bool) -> Vec<u8> {
        let mut units = vec![1, 1, 0];
        units.extend(if black_first { [1, 0] } else { [0, 1] });
        units.extend([1, 0, 0, 1]);
        units.extend(if black_first {
            [0, 0, 1, 1, 0]
        } else {
            [0, 0, 1, 1, 1]
        });
        units
    }

    fn widen(units: &[u8]) -> Vec<u8> {
        units
            .iter()
            .flat_map(|&u| std::iter::repeat_n(u, UNIT))
            .collect()
    }

    fn strip(rows: usize, lines_per_row: usize) -> BitMatrix {
        let mut lines = Vec::new();
        for r in 0..rows {
            let line = widen(&row_units(r % 2 == 0));
            lines.extend(std::iter::repeat_n(line, lines_per_row));
        }
        BitMatrix::from_lines(lines.clone(), lines).unwrap()
    }

    #[test]
    fn test_segment_ranges_merge_remainder() {
        assert_eq!(segment_ranges(80), vec![(0, 80)]);
        assert_eq!(segment_ranges(160), vec![(0, 75), (75, 160)]);
        assert!(segment_ranges(0).is_empty());
    }

    #[test]
    fn test_checkerboard_position() {
        assert_eq!(checkerboard_position(&widen(&row_units(true))), Some(3 * UNIT));
        assert_eq!(checkerboard_position(&widen(&row_units(false))), Some(4 * UNIT));
        assert_eq!(checkerboard_position(&[1, 1, 0, 0]), None);
    }

    #[test]
    fn test_boundaries_and_patterns() {
        let m = strip(4, 6);
        let bits = row_units(true).len();
        let boundaries = matrix_boundaries(&m, bits).unwrap();
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].min_left_start, 3 * UNIT);
        assert_eq!(boundaries[0].max_left_end, 4 * UNIT);
        let patterns = tag_patterns(&m, &boundaries);
        assert_eq!(patterns[0], Pattern::BlackWhite);
        assert_eq!(patterns[6], Pattern::WhiteBlack);
    }

    #[test]
    fn test_extract_rows_groups_alternating_lines() {
        let m = strip(5, 6);
        let bits = row_units(true).len();
        let rows = AlgorithmicRowExtractor.extract_rows(&m, bits).unwrap();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.len() == 6 && r.gray.len() == 6));
        assert_eq!(rows[1].pattern(), Some(Pattern::WhiteBlack));
    }

    #[test]
    fn test_group_skips_unexpected_patterns() {
        let m = strip(2, 3);
        let patterns = vec![
            Pattern::BlackWhite,
            Pattern::BlackBlack,
            Pattern::BlackWhite,
            Pattern::WhiteBlack,
            Pattern::WhiteWhite,
            Pattern::WhiteBlack,
        ];
        let rows = group_by_pattern(&m, &patterns);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[1].len(), 2);
    }

    #[test]
    fn test_leading_white_black_row_opens_first_row() {
        let m = strip(2, 2);
        let patterns = vec![
            Pattern::WhiteBlack,
            Pattern::WhiteBlack,
            Pattern::BlackWhite,
            Pattern::BlackWhite,
        ];
        let rows = group_by_pattern(&m, &patterns);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pattern(), Some(Pattern::WhiteBlack));
    }
}
