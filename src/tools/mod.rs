//! Helpers shared by the command line tool, benches and tests.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use image::{GenericImageView, GrayImage};

use crate::error::Result;
use crate::pipeline::StripImage;

/// Synthetic strip rendering
pub mod synth;

fn max_dim_from_env() -> Option<u32> {
    match env::var("SOFTSTRIP_MAX_DIM") {
        Ok(value) => match value.trim().parse::<u32>() {
            Ok(0) => None,
            Ok(v) => Some(v),
            Err(_) => None,
        },
        Err(_) => None,
    }
}

/// Load an image as grayscale, downscaled when `SOFTSTRIP_MAX_DIM` is set.
pub fn load_gray<P: AsRef<Path>>(path: P) -> Result<GrayImage> {
    let img = image::open(path)?;
    let img = match max_dim_from_env() {
        Some(max_dim) if img.dimensions().0.max(img.dimensions().1) > max_dim => {
            img.resize(max_dim, max_dim, image::imageops::FilterType::Triangle)
        }
        _ => img,
    };
    Ok(img.to_luma8())
}

/// Load and binarize a strip image. `None` selects Otsu's threshold.
pub fn load_strip<P: AsRef<Path>>(path: P, threshold: Option<u8>) -> Result<StripImage> {
    let gray = load_gray(path)?;
    match threshold {
        Some(t) => StripImage::from_gray(gray, t),
        None => StripImage::from_gray_otsu(gray),
    }
}

/// Summary statistics for grayscale data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrayStats {
    pub min: u8,
    pub max: u8,
    pub avg: u8,
    /// Share of pixels that binarized to black.
    pub black_ratio: f64,
}

/// Compute grayscale and binarization statistics for a strip.
pub fn strip_stats(strip: &StripImage) -> GrayStats {
    let gray = strip.gray().as_raw();
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    let mut sum: u64 = 0;
    for &v in gray {
        min = min.min(v);
        max = max.max(v);
        sum += v as u64;
    }
    let avg = if gray.is_empty() {
        0
    } else {
        (sum / gray.len() as u64) as u8
    };
    let binary = strip.binary().as_raw();
    let black = binary.iter().filter(|&&p| p == 0).count();
    let black_ratio = if binary.is_empty() {
        0.0
    } else {
        black as f64 / binary.len() as f64
    };
    GrayStats {
        min,
        max,
        avg,
        black_ratio,
    }
}

/// Expand directories into their image files, sorted by name. Plain files
/// are kept in the order given.
pub fn strip_paths<P: AsRef<Path>>(inputs: &[P]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if !input.is_dir() {
            paths.push(input.to_path_buf());
            continue;
        }
        let mut images: Vec<PathBuf> = match fs::read_dir(input) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| is_image(p))
                .collect(),
            Err(_) => continue,
        };
        images.sort();
        paths.extend(images);
    }
    paths
}

fn is_image(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_lowercase();
            matches!(
                ext.as_str(),
                "png" | "jpg" | "jpeg" | "gif" | "bmp" | "tif" | "tiff"
            )
        }
        None => false,
    }
}
