//! Image comparison helpers.

use image::RgbaImage;

use crate::{Result, TestError};

/// Mean absolute RGB difference between two images, normalized to
/// 0.0..=1.0. Alpha is ignored.
pub fn mean_absolute_diff(a: &RgbaImage, b: &RgbaImage) -> Result<f64> {
    if a.dimensions() != b.dimensions() {
        return Err(TestError::ImageComparison(format!(
            "Image dimensions don't match: {:?} vs {:?}",
            a.dimensions(),
            b.dimensions()
        )));
    }

    let total_diff: u64 = a
        .pixels()
        .zip(b.pixels())
        .map(|(pa, pb)| {
            let diff_r = (i32::from(pa[0]) - i32::from(pb[0])).unsigned_abs() as u64;
            let diff_g = (i32::from(pa[1]) - i32::from(pb[1])).unsigned_abs() as u64;
            let diff_b = (i32::from(pa[2]) - i32::from(pb[2])).unsigned_abs() as u64;
            diff_r + diff_g + diff_b
        })
        .sum();

    let max_diff = (u64::from(a.width()) * u64::from(a.height()) * 3 * 255) as f64;
    Ok(total_diff as f64 / max_diff)
}

/// Fail with a comparison error when the difference exceeds `threshold`.
pub fn assert_images_match(a: &RgbaImage, b: &RgbaImage, threshold: f64) -> Result<()> {
    let diff = mean_absolute_diff(a, b)?;
    if diff > threshold {
        return Err(TestError::ImageComparison(format!(
            "Image difference {diff:.4} exceeds threshold {threshold:.4}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba(rgba))
    }

    #[test]
    fn identical_images_have_zero_diff() {
        let a = solid(8, 8, [10, 20, 30, 255]);
        let b = solid(8, 8, [10, 20, 30, 255]);
        assert_eq!(mean_absolute_diff(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn alpha_differences_are_ignored() {
        let a = solid(8, 8, [10, 20, 30, 255]);
        let b = solid(8, 8, [10, 20, 30, 0]);
        assert_eq!(mean_absolute_diff(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn uniform_offset_diff_is_exact() {
        let a = solid(4, 4, [0, 0, 0, 255]);
        // One channel off by 255 in every pixel is a third of the max.
        let b = solid(4, 4, [255, 0, 0, 255]);
        let diff = mean_absolute_diff(&a, &b).unwrap();
        assert!((diff - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn dimension_mismatch_errors() {
        let a = solid(4, 4, [0, 0, 0, 255]);
        let b = solid(8, 4, [0, 0, 0, 255]);
        assert!(mean_absolute_diff(&a, &b).is_err());
    }

    #[test]
    fn threshold_assertion() {
        let a = solid(4, 4, [100, 100, 100, 255]);
        let b = solid(4, 4, [101, 100, 100, 255]);
        assert!(assert_images_match(&a, &b, 0.01).is_ok());
        assert!(assert_images_match(&a, &b, 0.000001).is_err());
    }
}
