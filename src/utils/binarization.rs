use image::{GrayImage, Luma};

/// Default global threshold: pixels brighter than this are white.
pub const DEFAULT_THRESHOLD: u8 = 127;

/// Binarize a grayscale image with a global threshold.
/// Pixels `> threshold` become white (255), the rest black (0).
pub fn threshold_binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Binarize using Otsu's threshold
pub fn otsu_binarize(gray: &GrayImage) -> GrayImage {
    threshold_binarize(gray, calculate_otsu_threshold(gray.as_raw()))
}

/// Calculate Otsu's optimal threshold
fn calculate_otsu_threshold(gray: &[u8]) -> u8 {
    let mut histogram = [0u32; 256];
    for &pixel in gray {
        histogram[pixel as usize] += 1;
    }

    let total_pixels = gray.len() as f64;
    let mut max_variance = 0.0;
    let mut optimal_threshold = DEFAULT_THRESHOLD;

    for threshold in 0..=255u32 {
        let mut class1_pixels = 0u64;
        let mut class1_sum = 0u64;
        let mut class2_pixels = 0u64;
        let mut class2_sum = 0u64;

        for (intensity, &count) in histogram.iter().enumerate() {
            let count = count as u64;
            if intensity as u32 <= threshold {
                class1_pixels += count;
                class1_sum += count * intensity as u64;
            } else {
                class2_pixels += count;
                class2_sum += count * intensity as u64;
            }
        }

        if class1_pixels == 0 || class2_pixels == 0 {
            continue;
        }

        let class1_mean = class1_sum as f64 / class1_pixels as f64;
        let class2_mean = class2_sum as f64 / class2_pixels as f64;
        let weight1 = class1_pixels as f64 / total_pixels;
        let weight2 = class2_pixels as f64 / total_pixels;
        let variance = weight1 * weight2 * (class1_mean - class2_mean).powi(2);

        if variance > max_variance {
            max_variance = variance;
            optimal_threshold = threshold as u8;
        }
    }

    optimal_threshold
}
