//! Median blur for denoising before circle detection.
//!
//! Wraps [`imageproc::filter::median_filter`]. Circle detection runs on an
//! image blurred twice: once with the first kernel and again with the
//! second. A single pass leaves enough high-frequency residue on rendered
//! faces (anti-aliased ring edges and tick marks) to scatter the Hough
//! votes.

use image::GrayImage;

/// Apply a square median filter with the given odd kernel size.
///
/// Kernel sizes of 0 or 1 return the image unchanged.
#[must_use = "returns the blurred image"]
pub fn median_blur(image: &GrayImage, kernel: u32) -> GrayImage {
    let radius = kernel / 2;
    if radius == 0 {
        return image.clone();
    }
    imageproc::filter::median_filter(image, radius, radius)
}

/// Two median passes: `first` kernel, then `second` kernel.
#[must_use = "returns the denoised image"]
pub fn denoise(image: &GrayImage, first: u32, second: u32) -> GrayImage {
    median_blur(&median_blur(image, first), second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_kernel_returns_identical_image() {
        let img = GrayImage::from_fn(8, 8, |x, y| image::Luma([((x * 31 + y * 7) % 256) as u8]));
        assert_eq!(median_blur(&img, 1), img);
        assert_eq!(median_blur(&img, 0), img);
    }

    #[test]
    fn output_dimensions_preserved() {
        let img = GrayImage::new(17, 31);
        let blurred = denoise(&img, 5, 3);
        assert_eq!(blurred.width(), 17);
        assert_eq!(blurred.height(), 31);
    }

    #[test]
    fn isolated_speck_is_removed() {
        let mut img = GrayImage::from_pixel(11, 11, image::Luma([255]));
        img.put_pixel(5, 5, image::Luma([0]));
        let blurred = median_blur(&img, 3);
        assert_eq!(blurred.get_pixel(5, 5).0[0], 255);
    }

    #[test]
    fn wide_stroke_survives_both_passes() {
        // A 7-pixel-wide dark band is wider than either kernel.
        let img = GrayImage::from_fn(21, 21, |x, _| {
            if (7..14).contains(&x) {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        });
        let blurred = denoise(&img, 5, 3);
        assert_eq!(blurred.get_pixel(10, 10).0[0], 0);
        assert_eq!(blurred.get_pixel(2, 10).0[0], 255);
    }

    #[test]
    fn uniform_image_unchanged() {
        let img = GrayImage::from_pixel(10, 10, image::Luma([128]));
        assert_eq!(denoise(&img, 5, 3), img);
    }
}
