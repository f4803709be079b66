//! Image encoding for analysis maps and RGB previews.
//!
//! Float planes are rescaled to 8-bit with their finite min/max and encoded
//! as grayscale PNG. Color maps and previews are `H × W × 3` byte arrays in
//! RGB order, which is also the order the `image` encoders expect.

use std::fmt;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use ndarray::{Array2, ArrayView2, ArrayView3};
use serde::{Serialize, Serializer};

use crate::config::PreviewFormat;
use crate::constants::MIN_DYNAMIC_RANGE;
use crate::error::{HsiError, Result};
use crate::stats::finite_range;

/// Encoded image bytes.
///
/// Serializes as a lowercase hex string, the form remote callers receive.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub format: PreviewFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn to_hex(&self) -> String {
        to_hex(&self.bytes)
    }

    /// File extension matching the format.
    pub fn extension(&self) -> &'static str {
        match self.format {
            PreviewFormat::Png => "png",
            PreviewFormat::Jpeg => "jpg",
        }
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Serialize for EncodedImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Lowercase hex encoding.
pub fn to_hex(bytes: &[u8]) -> String {
    use fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        // Writing to a String cannot fail
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Rescale a float plane to `0..=255` using its finite min/max.
///
/// Non-finite samples map to 0. The result is all zeros when the plane is
/// empty, has no finite values, or its range is below [`MIN_DYNAMIC_RANGE`].
pub fn normalize_to_u8(values: ArrayView2<'_, f32>) -> Array2<u8> {
    match finite_range(values.iter().copied()) {
        Some((min, max)) if max - min >= MIN_DYNAMIC_RANGE => {
            let range = max - min;
            values.mapv(|v| {
                if v.is_finite() {
                    (((f64::from(v) - min) / range).clamp(0.0, 1.0) * 255.0) as u8
                } else {
                    0
                }
            })
        }
        _ => Array2::zeros(values.raw_dim()),
    }
}

fn dimensions(height: usize, width: usize) -> Result<(u32, u32)> {
    Ok((
        u32::try_from(width).map_err(HsiError::encode)?,
        u32::try_from(height).map_err(HsiError::encode)?,
    ))
}

fn write_png(bytes: &[u8], width: u32, height: u32, color: ExtendedColorType) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(bytes, width, height, color)
        .map_err(HsiError::encode)?;
    Ok(out)
}

/// Normalize a float plane and encode it as single-channel PNG.
pub fn encode_grayscale(values: ArrayView2<'_, f32>) -> Result<EncodedImage> {
    let (height, width) = values.dim();
    let (w, h) = dimensions(height, width)?;
    let pixels: Vec<u8> = normalize_to_u8(values).iter().copied().collect();

    Ok(EncodedImage {
        format: PreviewFormat::Png,
        width: w,
        height: h,
        bytes: write_png(&pixels, w, h, ExtendedColorType::L8)?,
    })
}

fn rgb_bytes(rgb: &ArrayView3<'_, u8>) -> Result<(u32, u32, Vec<u8>)> {
    let (height, width, channels) = rgb.dim();
    if channels != 3 {
        return Err(HsiError::encode(format!(
            "expected 3 color channels, got {channels}"
        )));
    }
    let (w, h) = dimensions(height, width)?;
    Ok((w, h, rgb.iter().copied().collect()))
}

/// Encode an `H × W × 3` RGB byte array as PNG.
pub fn encode_color(rgb: ArrayView3<'_, u8>) -> Result<EncodedImage> {
    let (width, height, pixels) = rgb_bytes(&rgb)?;
    Ok(EncodedImage {
        format: PreviewFormat::Png,
        width,
        height,
        bytes: write_png(&pixels, width, height, ExtendedColorType::Rgb8)?,
    })
}

/// Encode an `H × W × 3` RGB byte array as PNG or JPEG.
pub fn encode_preview(
    rgb: ArrayView3<'_, u8>,
    format: PreviewFormat,
    jpeg_quality: u8,
) -> Result<EncodedImage> {
    match format {
        PreviewFormat::Png => encode_color(rgb),
        PreviewFormat::Jpeg => {
            let (width, height, pixels) = rgb_bytes(&rgb)?;
            let mut out = Vec::new();
            JpegEncoder::new_with_quality(&mut out, jpeg_quality.clamp(1, 100))
                .write_image(&pixels, width, height, ExtendedColorType::Rgb8)
                .map_err(HsiError::encode)?;
            Ok(EncodedImage {
                format,
                width,
                height,
                bytes: out,
            })
        }
    }
}
