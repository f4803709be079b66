//! Band selection and synthetic cubes.
//!
//! Hyperspectral cubes contain many spectral bands, typically ranging from
//! visible light through near-infrared. This module provides:
//! - Band selection for RGB composites (clamped to the cube's band count)
//! - A synthetic reflectance cube for demos and tests

use ndarray::Array3;

use crate::data::{BandAxis, Cube};

/// Band selection for RGB composite display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandSelection {
    /// Band index for red channel (0-based)
    pub red: usize,
    /// Band index for green channel (0-based)
    pub green: usize,
    /// Band index for blue channel (0-based)
    pub blue: usize,
}

impl BandSelection {
    pub fn new(red: usize, green: usize, blue: usize) -> Self {
        Self { red, green, blue }
    }

    /// Bands 0, 1, 2.
    pub fn default_rgb() -> Self {
        Self::new(0, 1, 2)
    }

    pub fn from_array(bands: [usize; 3]) -> Self {
        Self::new(bands[0], bands[1], bands[2])
    }

    /// Indices in red, green, blue order.
    pub fn as_array(&self) -> [usize; 3] {
        [self.red, self.green, self.blue]
    }

    /// Clamp band indices to valid range.
    pub fn clamp(&self, num_bands: usize) -> Self {
        let max_index = num_bands.saturating_sub(1);
        Self {
            red: self.red.min(max_index),
            green: self.green.min(max_index),
            blue: self.blue.min(max_index),
        }
    }

    /// True when all channels map to one band (grayscale composite).
    pub fn is_grayscale(&self) -> bool {
        self.red == self.green && self.green == self.blue
    }
}

impl Default for BandSelection {
    fn default() -> Self {
        Self::default_rgb()
    }
}

/// Reflectance of one synthetic sample.
///
/// Each band carries a different spatial pattern so band selection and the
/// analysers have structure to find.
fn synthetic_value(band: usize, x: usize, y: usize, width: usize, height: usize) -> f32 {
    let fx = x as f32 / width as f32;
    let fy = y as f32 / height as f32;
    let dist = ((fx - 0.5).powi(2) + (fy - 0.5).powi(2)).sqrt();

    match band {
        // Horizontal gradient
        0 => fx,
        // Vertical gradient
        1 => fy,
        2 => (fx + fy) / 2.0,
        3 => 1.0 - fx,
        // Checkerboard
        4 => {
            if ((x / 32) + (y / 32)) % 2 == 0 {
                0.8
            } else {
                0.2
            }
        }
        // Central disc
        5 => (1.0 - dist * 2.0).clamp(0.0, 1.0),
        // Concentric rings
        6 => ((dist * 20.0).sin() * 0.5 + 0.5).clamp(0.0, 1.0),
        // Hash noise over a vertical ramp
        7 => {
            let noise = ((x as f32 * 12.9898 + y as f32 * 78.233).sin() * 43758.547).fract().abs();
            noise * 0.5 + fy * 0.5
        }
        _ => {
            let offset = (band as f32 * 0.1) % 1.0;
            ((fx + offset) % 1.0 + fy) / 2.0
        }
    }
}

/// Generate a synthetic reflectance cube with wavelengths 400, 450, ... nm.
pub fn generate_test_cube(width: usize, height: usize, num_bands: usize) -> (Cube, BandAxis) {
    let data = Array3::from_shape_fn((height, width, num_bands), |(y, x, band)| {
        synthetic_value(band, x, y, width, height)
    });
    let wavelengths = (0..num_bands).map(|i| 400.0 + 50.0 * i as f64).collect();

    log::debug!(
        "Generated synthetic cube {}x{} with {} bands",
        height,
        width,
        num_bands
    );

    (Cube::new(data), BandAxis::Wavelengths(wavelengths))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_creation() {
        let (cube, bands) = generate_test_cube(64, 48, 8);
        assert_eq!(cube.shape(), (48, 64, 8));
        assert_eq!(bands.len(), 8);
    }

    #[test]
    fn test_values_are_reflectance() {
        let (cube, _) = generate_test_cube(40, 40, 12);
        assert!(
            cube.data()
                .iter()
                .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
        );
    }

    #[test]
    fn test_band_selection_clamp() {
        let selection = BandSelection::new(10, 5, 20);
        let clamped = selection.clamp(8);
        assert_eq!(clamped.red, 7);
        assert_eq!(clamped.green, 5);
        assert_eq!(clamped.blue, 7);
    }

    #[test]
    fn test_band_selection_array() {
        let selection = BandSelection::from_array([3, 2, 1]);
        assert_eq!(selection.as_array(), [3, 2, 1]);
        assert!(!selection.is_grayscale());
        assert!(BandSelection::new(1, 1, 1).is_grayscale());
    }

    #[test]
    fn test_wavelengths() {
        let (_, bands) = generate_test_cube(4, 4, 4);
        assert_eq!(bands.to_vec(), vec![400.0, 450.0, 500.0, 550.0]);
    }
}
