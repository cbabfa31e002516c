//! Image decoding and grayscale conversion.
//!
//! The pipeline works on single-channel intensity. Color input is reduced
//! with the standard luminance weights (`0.299*R + 0.587*G + 0.114*B`).
//! Transparent pixels are composited over white first, so a clock drawn
//! on a transparent canvas reads like one drawn on paper.

use image::{DynamicImage, GrayImage, Luma, RgbaImage};

use crate::types::PipelineError;

/// Decode raw image bytes (PNG, JPEG, BMP, WebP) to grayscale.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_and_grayscale(bytes: &[u8]) -> Result<GrayImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let img = image::load_from_memory(bytes)?;
    Ok(to_gray(&img))
}

/// Convert any decoded image to grayscale, flattening alpha onto white.
#[must_use]
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    if image.color().has_alpha() {
        rgba_to_gray(&image.to_rgba8())
    } else {
        image.to_luma8()
    }
}

/// Luminance of an RGBA image composited over a white background.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::many_single_char_names
)]
pub fn rgba_to_gray(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let alpha = f32::from(a) / 255.0;
        let luma = 0.114f32.mul_add(
            f32::from(b),
            0.299f32.mul_add(f32::from(r), 0.587 * f32::from(g)),
        );
        let over_white = alpha.mul_add(luma, (1.0 - alpha) * 255.0);
        Luma([over_white.round().clamp(0.0, 255.0) as u8])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Encode an RGBA image as PNG bytes.
    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    fn solid(r: u8, g: u8, b: u8, a: u8) -> RgbaImage {
        RgbaImage::from_pixel(1, 1, image::Rgba([r, g, b, a]))
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(
            decode_and_grayscale(&[]),
            Err(PipelineError::EmptyInput)
        ));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        assert!(matches!(
            decode_and_grayscale(&[0xFF, 0xFE, 0x00, 0x01]),
            Err(PipelineError::ImageDecode(_))
        ));
    }

    #[test]
    fn decoded_dimensions_match_input() {
        let img = RgbaImage::from_pixel(17, 31, image::Rgba([128, 64, 32, 255]));
        let gray = decode_and_grayscale(&png_bytes(&img)).unwrap();
        assert_eq!(gray.dimensions(), (17, 31));
    }

    #[test]
    fn luminance_weights_green_over_red_over_blue() {
        let value = |r, g, b| rgba_to_gray(&solid(r, g, b, 255)).get_pixel(0, 0).0[0];
        let (red, green, blue) = (value(255, 0, 0), value(0, 255, 0), value(0, 0, 255));
        assert!(
            green > red && red > blue,
            "expected green > red > blue, got R={red} G={green} B={blue}",
        );
    }

    #[test]
    fn transparent_pixels_become_white() {
        let gray = rgba_to_gray(&solid(0, 0, 0, 0));
        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
        let opaque = rgba_to_gray(&solid(0, 0, 0, 255));
        assert_eq!(opaque.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn decode_flattens_alpha() {
        let bytes = png_bytes(&solid(0, 0, 0, 0));
        assert_eq!(decode_and_grayscale(&bytes).unwrap().get_pixel(0, 0).0[0], 255);
    }
}
