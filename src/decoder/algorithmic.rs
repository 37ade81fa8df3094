//! Structural row decoding.
//!
//! The lines of a grouped row are merged into one line by a per-column
//! majority vote. The widths of the resulting color runs tell how many units
//! each run covers: most runs are one or two units wide, and the rack can
//! add a three-unit run near the end of the row.

use log::trace;

use crate::decoder::bisect::bisect_search;
use crate::decoder::parity::is_valid_row;
use crate::decoder::{RowDecoder, decode_each};
use crate::error::Result;
use crate::models::{DecodedRow, DibitRow, GroupedRow, Pattern, PatternLine};
use crate::utils::deadline::Deadline;
use crate::utils::morphology::repair_row;

/// Noise repair passes before the run sizes are accepted as they are.
const MAX_REPAIR_PASSES: usize = 4;
/// Pixel difference between the widest runs that signals a three-unit run.
const TRIPLE_WIDTH_DELTA: usize = 2;

/// One color run of a merged line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub value: u8,
    pub size: usize,
}

/// Run width classification of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunWidths {
    /// Runs at least this wide cover two (or three) units.
    pub epsilon: usize,
    /// A three-unit run precedes the rack.
    pub triple: bool,
}

/// Turn the trailing white pixels of a white-black line black, up to the
/// first black pixel from the right.
pub fn extend_rack(line: &mut [u8]) {
    for pixel in line.iter_mut().rev() {
        if *pixel == 1 {
            break;
        }
        *pixel = 1;
    }
}

/// Per-column majority over the lines, ties going to the first line.
pub fn majority_line(lines: &[PatternLine]) -> Vec<u8> {
    let prepared: Vec<Vec<u8>> = lines
        .iter()
        .map(|line| {
            let mut pixels = line.pixels.clone();
            if line.pattern == Pattern::WhiteBlack {
                extend_rack(&mut pixels);
            }
            pixels
        })
        .collect();
    let Some(first) = prepared.first() else {
        return Vec::new();
    };
    let width = prepared.iter().map(Vec::len).min().unwrap_or(0);

    (0..width)
        .map(|x| {
            let black = prepared.iter().filter(|l| l[x] == 1).count();
            let white = prepared.len() - black;
            match black.cmp(&white) {
                std::cmp::Ordering::Greater => 1,
                std::cmp::Ordering::Less => 0,
                std::cmp::Ordering::Equal => first[x],
            }
        })
        .collect()
}

pub fn line_runs(line: &[u8]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for &value in line {
        match runs.last_mut() {
            Some(run) if run.value == value => run.size += 1,
            _ => runs.push(Run { value, size: 1 }),
        }
    }
    runs
}

/// Decide which runs are wide from the sorted run sizes.
pub fn run_widths(runs: &[Run], pattern: Pattern, bits_per_row: usize) -> Option<RunWidths> {
    if runs.len() < 3 {
        return None;
    }
    let mut sorted: Vec<usize> = runs.iter().map(|r| r.size).collect();
    sorted.sort_unstable();
    let n = sorted.len();
    let (widest, second, third) = (sorted[n - 1], sorted[n - 2], sorted[n - 3]);

    let mut doubles = bits_per_row as isize - n as isize;
    let mut offset = 0;
    let mut triple = false;
    match pattern {
        Pattern::WhiteBlack => {
            // the rack always ends in a three-unit black run
            doubles -= 2;
            offset += 1;
            if second == widest || second.abs_diff(third) >= TRIPLE_WIDTH_DELTA {
                doubles -= 2;
                triple = true;
                offset += 1;
            }
        }
        Pattern::BlackWhite => {
            if widest.abs_diff(second) >= TRIPLE_WIDTH_DELTA {
                doubles -= 2;
                triple = true;
                offset += 1;
            }
        }
        Pattern::WhiteWhite | Pattern::BlackBlack => {}
    }
    if doubles < 0 {
        return None;
    }

    let wide = doubles as usize + offset;
    let epsilon = match wide {
        0 => usize::MAX,
        w if w > n => return None,
        w => sorted[n - w],
    };
    Some(RunWidths { epsilon, triple })
}

/// Expand runs into units.
pub fn expand_runs(runs: &[Run], widths: RunWidths, pattern: Pattern) -> DibitRow {
    let last = runs.len().saturating_sub(1);
    let mut units = Vec::new();
    for (k, run) in runs.iter().enumerate() {
        let count = if run.size < widths.epsilon {
            1
        } else {
            let triple = match pattern {
                Pattern::WhiteBlack => k == last || (widths.triple && k + 1 == last),
                Pattern::BlackWhite => widths.triple && k + 2 == last,
                _ => false,
            };
            if triple { 3 } else { 2 }
        };
        units.extend(std::iter::repeat_n(run.value, count));
    }
    DibitRow::new(units)
}

fn repaired(row: &GroupedRow) -> GroupedRow {
    let pixels: Vec<Vec<u8>> = row.lines.iter().map(|l| l.pixels.clone()).collect();
    let lines = repair_row(&pixels)
        .into_iter()
        .zip(&row.lines)
        .map(|(pixels, line)| PatternLine {
            pattern: line.pattern,
            pixels,
        })
        .collect();
    GroupedRow {
        lines,
        gray: row.gray.clone(),
    }
}

/// Reduce a grouped row to a single unit row without validating it.
pub fn reduce_row(row: &GroupedRow, bits_per_row: usize) -> Option<DibitRow> {
    let pattern = row.pattern()?;
    let mut current = row.clone();
    let mut runs = line_runs(&majority_line(&current.lines));

    let mut passes = 0;
    while runs.iter().any(|r| r.size == 1) && passes < MAX_REPAIR_PASSES {
        current = repaired(&current);
        let next = line_runs(&majority_line(&current.lines));
        if next == runs {
            break;
        }
        runs = next;
        passes += 1;
    }

    let widths = run_widths(&runs, pattern, bits_per_row)?;
    trace!(
        "{} runs, epsilon {}, triple {}",
        runs.len(),
        widths.epsilon,
        widths.triple
    );
    Some(expand_runs(&runs, widths, pattern))
}

/// Structural decoder: direct reduction, then bisection, then bisection of
/// the repaired row.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlgorithmicRowDecoder;

impl AlgorithmicRowDecoder {
    fn valid_reduction(row: &GroupedRow, bits_per_row: usize) -> Option<DibitRow> {
        reduce_row(row, bits_per_row).filter(|r| is_valid_row(r, bits_per_row))
    }

    /// Decode one grouped row.
    pub fn decode_row(&self, row: &GroupedRow, bits_per_row: usize) -> Option<DecodedRow> {
        if let Some(valid) = Self::valid_reduction(row, bits_per_row) {
            return Some(DecodedRow::single(valid));
        }
        let search = |row: &GroupedRow| {
            bisect_search(row, |node| {
                Self::valid_reduction(node, bits_per_row).into_iter().collect()
            })
        };
        DecodedRow::new(search(row)).or_else(|| DecodedRow::new(search(&repaired(row))))
    }
}

impl RowDecoder for AlgorithmicRowDecoder {
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
    use std::time::Duration;

    use super::*;
    use crate::decoder::parity::assemble_row;
    use crate::error::SoftstripError;

    const UNIT: usize = 4;

    fn widen(row: &DibitRow) -> Vec<u8> {
        row.units()
            .iter()
            .flat_map(|&u| std::iter::repeat_n(u, UNIT))
            .collect()
    }

    fn group(lines: Vec<Vec<u8>>, pattern: Pattern) -> GroupedRow {
        let gray = vec![Vec::new(); lines.len()];
        GroupedRow {
            lines: lines
                .into_iter()
                .map(|pixels| PatternLine { pattern, pixels })
                .collect(),
            gray,
        }
    }

    #[test]
    fn test_extend_rack() {
        let mut line = vec![1, 0, 1, 1, 0, 0];
        extend_rack(&mut line);
        assert_eq!(line, vec![1, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn test_majority_tie_goes_to_first_line() {
        let row = group(vec![vec![1, 0, 1], vec![0, 1, 1]], Pattern::BlackWhite);
        assert_eq!(majority_line(&row.lines), vec![1, 0, 1]);
    }

    #[test]
    fn test_clean_rows_decode() {
        for (payload, pattern) in [
            (vec![1, 0], Pattern::BlackWhite),
            (vec![0, 0, 1, 1, 0, 1], Pattern::BlackWhite),
            (vec![1, 0], Pattern::WhiteBlack),
            (vec![1, 1, 1, 0, 0, 0], Pattern::WhiteBlack),
        ] {
            let expected = assemble_row(&payload, pattern);
            let row = group(vec![widen(&expected); 5], pattern);
            let decoded = AlgorithmicRowDecoder
                .decode_row(&row, expected.len())
                .unwrap();
            assert_eq!(decoded.primary(), &expected, "payload {payload:?}");
            assert!(!decoded.is_ambiguous());
        }
    }

    #[test]
    fn test_flipped_pixel_is_outvoted() {
        let expected = assemble_row(&[0, 1, 1, 0], Pattern::BlackWhite);
        let mut lines = vec![widen(&expected); 5];
        lines[2][9 * UNIT + 1] ^= 1;
        let decoded = AlgorithmicRowDecoder
            .decode_row(&group(lines, Pattern::BlackWhite), expected.len())
            .unwrap();
        assert_eq!(decoded.primary(), &expected);
    }

    #[test]
    fn test_speckle_is_repaired() {
        let expected = assemble_row(&[1, 0], Pattern::BlackWhite);
        let mut line = widen(&expected);
        // white speckle inside the start bar
        line[5] = 0;
        let decoded = AlgorithmicRowDecoder
            .decode_row(&group(vec![line; 3], Pattern::BlackWhite), expected.len())
            .unwrap();
        assert_eq!(decoded.primary(), &expected);
    }

    #[test]
    fn test_bisection_recovers_minority_lines() {
        let expected = assemble_row(&[1, 1, 0, 1], Pattern::BlackWhite);
        let good = widen(&expected);
        let mut garbage = vec![0; good.len()];
        garbage[..2 * UNIT].fill(1);
        let lines = vec![good.clone(), good, garbage.clone(), garbage.clone(), garbage.clone(), garbage];
        let decoded = AlgorithmicRowDecoder
            .decode_row(&group(lines, Pattern::BlackWhite), expected.len())
            .unwrap();
        assert_eq!(decoded.candidates(), &[expected]);
    }

    #[test]
    fn test_undecodable_rows_are_dropped() {
        let expected = assemble_row(&[1, 0], Pattern::BlackWhite);
        let rows = vec![
            group(vec![widen(&expected); 3], Pattern::BlackWhite),
            group(vec![vec![1; 72]; 3], Pattern::WhiteBlack),
        ];
        let decoded = AlgorithmicRowDecoder
            .decode_rows(&rows, expected.len(), &Deadline::unbounded())
            .unwrap();
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn test_expired_deadline_aborts() {
        let expected = assemble_row(&[1, 0], Pattern::BlackWhite);
        let rows = vec![group(vec![widen(&expected); 3], Pattern::BlackWhite)];
        let deadline = Deadline::start(Some(Duration::ZERO));
        std::thread::sleep(Duration::from_millis(2));
        let result = AlgorithmicRowDecoder.decode_rows(&rows, expected.len(), &deadline);
        assert!(matches!(result, Err(SoftstripError::Timeout { .. })));
    }

    #[test]
    fn test_run_widths_rejects_too_few_runs() {
        let runs = line_runs(&[1, 1, 0, 0]);
        assert_eq!(run_widths(&runs, Pattern::BlackWhite, 18), None);
    }
}
