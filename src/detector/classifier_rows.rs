//! Classifier-driven row extraction.
//!
//! A sliding window over the checkerboard columns of the grayscale lines is
//! handed to an external [`SplitClassifier`], which predicts where the first
//! row inside the window ends.

use std::ops::Range;
use std::sync::Arc;

use image::{GrayImage, Luma};
use log::debug;

use crate::detector::rows::{RowExtractor, matrix_boundaries, tag_patterns};
use crate::error::{Result, SoftstripError};
use crate::models::{BitMatrix, GroupedRow, PatternLine};

/// Nominal pixel lines per row seen by the split classifier.
pub const ROW_HEIGHT: usize = 10;
/// Lines in one classifier window.
pub const WINDOW_HEIGHT: usize = 2 * ROW_HEIGHT;

/// Predicts the line offset at which a window splits into one row and the
/// remainder.
pub trait SplitClassifier: Send + Sync {
    fn predict_split(&self, window: &GrayImage) -> usize;
}

/// Row extractor delegating row boundaries to a [`SplitClassifier`].
pub struct ClassifierRowExtractor<C: ?Sized> {
    classifier: Arc<C>,
}

impl<C: SplitClassifier + ?Sized> ClassifierRowExtractor<C> {
    pub fn new(classifier: Arc<C>) -> Self {
        Self { classifier }
    }
}

/// Grayscale window of `lines` restricted to columns `cols`.
fn window_image(lines: &[Vec<u8>], cols: Range<usize>) -> GrayImage {
    let width = cols.len() as u32;
    GrayImage::from_fn(width, lines.len() as u32, |x, y| {
        let line = &lines[y as usize];
        Luma([line.get(cols.start + x as usize).copied().unwrap_or(0)])
    })
}

impl<C: SplitClassifier + ?Sized> RowExtractor for ClassifierRowExtractor<C> {
    fn extract_rows(&self, matrix: &BitMatrix, bits_per_row: usize) -> Result<Vec<GroupedRow>> {
        let unit = matrix.width() as f64 / bits_per_row.max(1) as f64;
        let cols = (unit * 3.0).round() as usize..(unit * 5.0).round() as usize;
        let boundaries = matrix_boundaries(matrix, bits_per_row)?;
        let patterns = tag_patterns(matrix, &boundaries);
        let gray = matrix.gray_lines();

        let mut rows = Vec::new();
        let mut start = 0;
        while start < matrix.height() {
            let end = (start + WINDOW_HEIGHT).min(matrix.height());
            let window = window_image(&gray[start..end], cols.clone());
            if window.is_empty() || window.pixels().all(|p| p[0] == 0) {
                break;
            }
            let split = self.classifier.predict_split(&window).clamp(1, end - start);
            let row = GroupedRow {
                lines: (start..start + split)
                    .map(|i| PatternLine {
                        pattern: patterns[i],
                        pixels: matrix.binary_lines()[i].clone(),
                    })
                    .collect(),
                gray: gray[start..start + split].to_vec(),
            };
            rows.push(row);
            start += split;
        }

        debug!("classifier split {} lines into {} rows", matrix.height(), rows.len());
        if rows.is_empty() {
            return Err(SoftstripError::NoRowsExtracted);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSplit(usize);

    impl SplitClassifier for FixedSplit {
        fn predict_split(&self, window: &GrayImage) -> usize {
            assert!(window.height() as usize <= WINDOW_HEIGHT);
            self.0
        }
    }

    fn matrix(height: usize) -> BitMatrix {
        let bw = vec![1, 1, 0, 1, 0, 0, 1, 0, 0, 1];
        let binary = vec![bw; height];
        let gray = binary
            .iter()
            .map(|l| l.iter().map(|&p| if p == 1 { 0 } else { 255 }).collect())
            .collect();
        BitMatrix::from_lines(binary, gray).unwrap()
    }

    #[test]
    fn test_fixed_splits_partition_lines() {
        let m = matrix(25);
        let extractor = ClassifierRowExtractor::new(Arc::new(FixedSplit(5)));
        let rows = extractor.extract_rows(&m, 10).unwrap();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.len() == 5));
    }

    #[test]
    fn test_split_is_clamped_to_window() {
        let m = matrix(12);
        let rows = ClassifierRowExtractor::new(Arc::new(FixedSplit(0)))
            .extract_rows(&m, 10)
            .unwrap();
        assert_eq!(rows.len(), 12);

        let rows = ClassifierRowExtractor::new(Arc::new(FixedSplit(100)))
            .extract_rows(&m, 10)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 12);
    }

    #[test]
    fn test_black_window_stops_extraction() {
        let binary = vec![vec![1; 10]; 6];
        let gray = vec![vec![0; 10]; 6];
        let m = BitMatrix::from_lines(binary, gray).unwrap();
        let result = ClassifierRowExtractor::new(Arc::new(FixedSplit(2))).extract_rows(&m, 10);
        assert!(matches!(result, Err(SoftstripError::NoRowsExtracted)));
    }
}
