//! Synthetic strip rendering.
//!
//! Produces clean strip images from file content: horizontal sync bars,
//! vertical sync rows, then the data rows. Used by tests, benches and the
//! `render` command.

use image::{GrayImage, Luma};

use crate::config::WireOrder;
use crate::decoder::checksum::checksum;
use crate::decoder::parity::assemble_row;
use crate::error::Result;
use crate::models::{DibitRow, FirstStripInfo, Pattern};
use crate::pipeline::StripImage;
use crate::utils::binarization::DEFAULT_THRESHOLD;

/// Filler byte of the vertical sync rows.
const VSYNC_FILLER: u8 = 0xAA;

/// Everything one strip carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripContent {
    /// Padded or truncated to six characters.
    pub strip_id: String,
    pub seq_no: u8,
    pub strip_type: u8,
    pub first_strip: Option<FirstStripInfo>,
    pub payload: Vec<u8>,
}

impl StripContent {
    /// A single strip holding a whole text file.
    pub fn single_file(filename: &str, data: &[u8]) -> Self {
        Self {
            strip_id: "SYNTH0".to_string(),
            seq_no: 1,
            strip_type: 0,
            first_strip: Some(FirstStripInfo {
                os_type: 0x14,
                num_files: 1,
                cauzin_type: 0x01,
                os_filetype: 0x01,
                file_length: data.len() as u32,
                filename: filename.to_string(),
            }),
            payload: data.to_vec(),
        }
    }

    /// Byte stream of the strip, from the data sync byte to the end of the
    /// payload.
    pub fn encode(&self, order: WireOrder) -> Vec<u8> {
        let mut body: Vec<u8> = self
            .strip_id
            .bytes()
            .chain(std::iter::repeat(b' '))
            .take(6)
            .collect();
        body.extend([self.seq_no, self.strip_type, 0, 0]);
        if let Some(first) = &self.first_strip {
            body.extend([first.os_type, first.num_files, first.cauzin_type, first.os_filetype]);
            body.extend(order.encode_multi_byte(first.file_length, 3));
            // one byte per character, as the decoder reads it back
            body.extend(first.filename.chars().map(|c| c as u8));
            body.extend([0x00, 0x00]);
        }
        body.extend(&self.payload);

        let length = body.len() + 1;
        let sum = checksum(&body, length).unwrap_or(0);
        let mut bytes = vec![0, 0, 0];
        bytes.extend(order.encode_multi_byte(length as u32, 2));
        bytes.push(sum);
        bytes.extend(body);
        bytes
    }
}

/// Geometry of a rendered strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripLayout {
    /// Data nibbles per row, at least 3.
    pub nibbles: usize,
    /// Pixels per unit.
    pub unit_width: u32,
    /// Pixel lines per row.
    pub line_height: u32,
    /// Pixel lines of horizontal sync bars.
    pub hsync_lines: u32,
    /// Rows of vertical sync filler before the data.
    pub vsync_rows: usize,
    /// White margin around the strip.
    pub quiet: u32,
}

impl Default for StripLayout {
    fn default() -> Self {
        Self {
            nibbles: 4,
            unit_width: 4,
            line_height: 8,
            hsync_lines: 10,
            vsync_rows: 2,
            quiet: 12,
        }
    }
}

impl StripLayout {
    pub fn bits_per_row(&self) -> usize {
        14 + self.nibbles * 8
    }

    fn payload_bits(&self) -> usize {
        self.nibbles * 4
    }

    /// Start bar followed by white/black bar pairs whose count encodes the
    /// nibbles per row.
    fn hsync_units(&self) -> Vec<u8> {
        let transitions = (2 * self.nibbles).saturating_sub(5);
        let mut units = vec![1, 1];
        for _ in 0..transitions {
            units.extend([0, 1]);
        }
        units
    }
}

/// Lay out `bytes` as rows behind the vertical sync rows. Rows alternate
/// between black-white and white-black, starting with black-white.
pub fn strip_rows(bytes: &[u8], layout: &StripLayout, order: WireOrder) -> Vec<DibitRow> {
    let per_row = layout.payload_bits();
    let vsync_bits: Vec<u8> = std::iter::repeat_n(VSYNC_FILLER, per_row.div_ceil(8))
        .flat_map(|b| order.unpack(b))
        .take(per_row)
        .collect();
    let data_bits: Vec<u8> = bytes.iter().flat_map(|&b| order.unpack(b)).collect();

    let payloads = std::iter::repeat_n(vsync_bits, layout.vsync_rows).chain(
        data_bits.chunks(per_row.max(1)).map(|chunk| {
            let mut bits = chunk.to_vec();
            bits.resize(per_row, 0);
            bits
        }),
    );
    payloads
        .enumerate()
        .map(|(i, bits)| {
            let pattern = if i % 2 == 0 {
                Pattern::BlackWhite
            } else {
                Pattern::WhiteBlack
            };
            assemble_row(&bits, pattern)
        })
        .collect()
}

/// Draw the sync header and `rows` as a grayscale image (black = 0).
pub fn render_rows(rows: &[DibitRow], layout: &StripLayout) -> GrayImage {
    let unit = layout.unit_width as usize;
    let width = layout.bits_per_row() * unit + 2 * layout.quiet as usize;
    let height = layout.hsync_lines as usize
        + rows.len() * layout.line_height as usize
        + 2 * layout.quiet as usize;
    let mut image = GrayImage::from_pixel(width as u32, height as u32, Luma([255]));

    let hsync = layout.hsync_units();
    let mut lines: Vec<&[u8]> = vec![hsync.as_slice(); layout.hsync_lines as usize];
    for row in rows {
        lines.extend(std::iter::repeat_n(row.units(), layout.line_height as usize));
    }

    for (i, units) in lines.iter().enumerate() {
        let y = layout.quiet + i as u32;
        for (u, &value) in units.iter().enumerate() {
            if value == 0 {
                continue;
            }
            for dx in 0..unit {
                let x = layout.quiet as usize + u * unit + dx;
                image.put_pixel(x as u32, y, Luma([0]));
            }
        }
    }
    image
}

/// Render one strip as a decodable image.
pub fn render_strip(
    content: &StripContent,
    layout: &StripLayout,
    order: WireOrder,
) -> Result<StripImage> {
    let rows = strip_rows(&content.encode(order), layout, order);
    StripImage::from_gray(render_rows(&rows, layout), DEFAULT_THRESHOLD)
}
