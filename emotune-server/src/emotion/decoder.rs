//! Data-URL image decoding
//!
//! Turns `<header>,<base64-payload>` into the classifier's input tensor:
//! grayscale (ITU-R 601-2 luma), 128×128, scaled to `[0, 1]`, with a
//! leading batch axis. Shape is `(1, 128, 128)`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, GrayImage, RgbImage};
use ndarray::Array3;
use thiserror::Error;

/// Side length of the square classifier input
pub const IMAGE_SIZE: u32 = 128;

/// Reasons a data-URL cannot be turned into a classifier input
#[derive(Debug, Error)]
pub enum InvalidImageError {
    #[error("data URL has no ',' separator")]
    MissingSeparator,

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("cannot decode image: {0}")]
    Undecodable(#[from] image::ImageError),

    #[error("cannot shape tensor: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Decode a data-URL into a normalized `(1, 128, 128)` tensor
///
/// The header before the first comma is ignored; the image format is
/// sniffed from the decoded bytes.
pub fn decode_data_url(data_url: &str) -> Result<Array3<f32>, InvalidImageError> {
    let (_header, payload) = data_url
        .split_once(',')
        .ok_or(InvalidImageError::MissingSeparator)?;

    // Browsers and some clients wrap long payloads
    let payload: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD.decode(payload)?;

    decode_image_bytes(&bytes)
}

/// Decode raw image bytes (PNG, JPEG, GIF, BMP, WebP) into the classifier tensor
pub fn decode_image_bytes(bytes: &[u8]) -> Result<Array3<f32>, InvalidImageError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let gray = luma(&rgb);

    let gray = if gray.dimensions() == (IMAGE_SIZE, IMAGE_SIZE) {
        gray
    } else {
        image::imageops::resize(&gray, IMAGE_SIZE, IMAGE_SIZE, FilterType::Lanczos3)
    };

    let side = IMAGE_SIZE as usize;
    let pixels: Vec<f32> = gray
        .into_raw()
        .into_iter()
        .map(|p| f32::from(p) / 255.0)
        .collect();

    Ok(Array3::from_shape_vec((1, side, side), pixels)?)
}

/// Build a base64 data-URL for `bytes`
pub fn encode_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// ITU-R 601-2 luma in 16-bit fixed point: `L = (R*299 + G*587 + B*114) / 1000`
fn luma(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let l = (u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000) >> 16;
        image::Luma([l as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_round_trip_gray_128() {
        let gray = GrayImage::from_fn(IMAGE_SIZE, IMAGE_SIZE, |x, y| {
            image::Luma([((x + y) % 256) as u8])
        });
        let url = encode_data_url(&png_bytes(DynamicImage::ImageLuma8(gray.clone())), "image/png");

        let tensor = decode_data_url(&url).unwrap();
        assert_eq!(tensor.shape(), &[1, 128, 128]);

        for (x, y, pixel) in gray.enumerate_pixels() {
            let expected = f32::from(pixel.0[0]) / 255.0;
            let actual = tensor[[0, y as usize, x as usize]];
            assert!((expected - actual).abs() < 1e-6, "pixel ({}, {})", x, y);
        }
    }

    #[test]
    fn test_other_sizes_resized_into_unit_range() {
        let rgb = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 200]));
        let url = encode_data_url(&png_bytes(DynamicImage::ImageRgb8(rgb)), "image/png");

        let tensor = decode_data_url(&url).unwrap();
        assert_eq!(tensor.shape(), &[1, 128, 128]);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_luma_weights_and_alpha_ignored() {
        let red = RgbaImage::from_pixel(IMAGE_SIZE, IMAGE_SIZE, Rgba([255, 0, 0, 0]));
        let url = encode_data_url(&png_bytes(DynamicImage::ImageRgba8(red)), "image/png");

        let tensor = decode_data_url(&url).unwrap();
        // 255 * 0.299 rounds to 76
        assert!((tensor[[0, 10, 10]] - 76.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_header_is_ignored_and_whitespace_tolerated() {
        let gray = GrayImage::from_pixel(8, 8, image::Luma([255]));
        let encoded = STANDARD.encode(png_bytes(DynamicImage::ImageLuma8(gray)));
        let (a, b) = encoded.split_at(encoded.len() / 2);
        let url = format!("whatever,{}\n{}", a, b);

        let tensor = decode_data_url(&url).unwrap();
        assert!(tensor.iter().all(|v| (v - 1.0).abs() < 1e-3));
    }

    #[test]
    fn test_missing_comma() {
        assert!(matches!(
            decode_data_url("data:image/png;base64"),
            Err(InvalidImageError::MissingSeparator)
        ));
    }

    #[test]
    fn test_bad_base64() {
        assert!(matches!(
            decode_data_url("data:image/png;base64,@@not-base64@@"),
            Err(InvalidImageError::Base64(_))
        ));
    }

    #[test]
    fn test_undecodable_bytes() {
        let url = encode_data_url(b"definitely not an image", "image/png");
        assert!(matches!(
            decode_data_url(&url),
            Err(InvalidImageError::Undecodable(_))
        ));
    }
}
