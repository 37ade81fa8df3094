use image::GrayImage;

use crate::error::{Result, SoftstripError};
use crate::utils::morphology::dilate_black_vertical;

/// Lines the dilated scan reaches upwards.
const START_BAR_DILATION: usize = 3;

/// Rectified strip as row-aligned binary and grayscale pixel lines.
///
/// Each line starts at the strip's left start bar (the quiet zone is cut
/// off), binary pixels are `1` for black and `0` for white, and after
/// normalization every line has the same length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMatrix {
    binary: Vec<Vec<u8>>,
    gray: Vec<Vec<u8>>,
}

impl BitMatrix {
    /// Build the matrix from a binary image (dark = black) and the grayscale
    /// image it was thresholded from.
    ///
    /// The left margin and start bar come from a vertically dilated copy of
    /// the binary image, the rest of each line from the original pixels.
    pub fn from_images(binary: &GrayImage, gray: &GrayImage) -> Result<Self> {
        if binary.dimensions() != gray.dimensions() {
            return Err(SoftstripError::MalformedImage(format!(
                "binary image is {:?} but grayscale image is {:?}",
                binary.dimensions(),
                gray.dimensions()
            )));
        }

        let original: Vec<Vec<u8>> = binary
            .rows()
            .map(|row| row.map(|p| u8::from(p[0] < 128)).collect())
            .collect();
        let dilated = dilate_black_vertical(&original, START_BAR_DILATION);

        let mut binary_lines = Vec::with_capacity(original.len());
        let mut gray_lines = Vec::with_capacity(original.len());
        let mut last_black: Option<usize> = None;

        for (y, gray_row) in gray.rows().enumerate() {
            let gray_row: Vec<u8> = gray_row.map(|p| p[0]).collect();
            let mut in_start_bar = true;
            let mut line = Vec::new();
            let mut gray_line = Vec::new();

            for x in 0..original[y].len() {
                let pixel = if in_start_bar {
                    dilated[y][x]
                } else {
                    original[y][x]
                };
                if pixel == 1 {
                    last_black = Some(last_black.map_or(line.len(), |l| l.max(line.len())));
                    line.push(1);
                    gray_line.push(gray_row[x]);
                } else if !line.is_empty() {
                    in_start_bar = false;
                    line.push(0);
                    gray_line.push(gray_row[x]);
                }
            }
            binary_lines.push(line);
            gray_lines.push(gray_line);
        }

        let Some(last_black) = last_black else {
            return Err(SoftstripError::MalformedImage(
                "image contains no black pixels".to_string(),
            ));
        };

        let mut matrix = Self {
            binary: binary_lines,
            gray: gray_lines,
        };
        matrix.normalize_to(last_black + 1);
        Ok(matrix)
    }

    /// Build a matrix from lines that already start at the start bar.
    pub fn from_lines(binary: Vec<Vec<u8>>, gray: Vec<Vec<u8>>) -> Result<Self> {
        if binary.len() != gray.len()
            || binary.iter().zip(&gray).any(|(b, g)| b.len() != g.len())
        {
            return Err(SoftstripError::MalformedImage(
                "binary and grayscale lines differ in shape".to_string(),
            ));
        }
        let mut matrix = Self { binary, gray };
        if matrix.last_black_position().is_none() {
            return Err(SoftstripError::MalformedImage(
                "image contains no black pixels".to_string(),
            ));
        }
        matrix.normalize();
        Ok(matrix)
    }

    fn last_black_position(&self) -> Option<usize> {
        self.binary
            .iter()
            .filter_map(|line| line.iter().rposition(|&p| p == 1))
            .max()
    }

    /// Normalize line lengths to the last black column of the matrix.
    /// Running it on a normalized matrix changes nothing.
    pub fn normalize(&mut self) {
        if let Some(last_black) = self.last_black_position() {
            self.normalize_to(last_black + 1);
        }
    }

    /// Truncate lines to `width`, pad short ones by repeating their last
    /// pixel, then drop every line shorter than the mean line length.
    fn normalize_to(&mut self, width: usize) {
        let mut total = 0usize;
        for (line, gray) in self.binary.iter_mut().zip(self.gray.iter_mut()) {
            if let (Some(&last), Some(&last_gray)) = (line.last(), gray.last()) {
                line.truncate(width);
                gray.truncate(width);
                line.resize(width, last);
                gray.resize(width, last_gray);
            }
            total += line.len();
        }
        if self.binary.is_empty() {
            return;
        }
        let mean = total as f64 / self.binary.len() as f64;

        let keep: Vec<bool> = self.binary.iter().map(|l| l.len() as f64 >= mean).collect();
        let mut flags = keep.iter();
        self.binary.retain(|_| *flags.next().unwrap_or(&false));
        let mut flags = keep.iter();
        self.gray.retain(|_| *flags.next().unwrap_or(&false));
    }

    /// Number of pixel lines.
    pub fn height(&self) -> usize {
        self.binary.len()
    }

    /// Line length (0 for an empty matrix).
    pub fn width(&self) -> usize {
        self.binary.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.binary.is_empty()
    }

    /// Binary pixel lines.
    pub fn binary_lines(&self) -> &[Vec<u8>] {
        &self.binary
    }

    /// Grayscale pixel lines, parallel to `binary_lines`.
    pub fn gray_lines(&self) -> &[Vec<u8>] {
        &self.gray
    }

    /// Drop the first `count` lines.
    pub fn drop_leading_lines(&mut self, count: usize) {
        let count = count.min(self.binary.len());
        self.binary.drain(..count);
        self.gray.drain(..count);
    }
}
