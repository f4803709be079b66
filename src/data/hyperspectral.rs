//! Calibrated cube and band axis.

use ndarray::{Array3, ArrayView2, ShapeError};
use serde::{Serialize, Serializer};

/// A dense reflectance cube with axes (row, column, band).
///
/// The backing array is always kept in standard (row-major) layout so the
/// pixel matrix view is free.
#[derive(Debug, Clone)]
pub struct Cube {
    data: Array3<f32>,
}

impl Cube {
    /// Wrap an array with axes (row, column, band).
    pub fn new(data: Array3<f32>) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Self { data }
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    /// Number of spectral bands.
    pub fn num_bands(&self) -> usize {
        self.data.dim().2
    }

    /// `(height, width, bands)`
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn pixel_count(&self) -> usize {
        self.height() * self.width()
    }

    /// Borrow the underlying array.
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// All pixels as a (pixels × bands) matrix in row-major pixel order.
    pub fn pixels(&self) -> Result<ArrayView2<'_, f32>, ShapeError> {
        let (h, w, b) = self.shape();
        self.data.view().into_shape_with_order((h * w, b))
    }
}

/// Per-band labels: measured wavelengths, or synthetic indices when the
/// metadata was absent or unusable.
#[derive(Debug, Clone, PartialEq)]
pub enum BandAxis {
    /// Physical wavelengths, one per band
    Wavelengths(Vec<f64>),
    /// `0..n` fallback
    Indices(usize),
}

impl BandAxis {
    pub fn len(&self) -> usize {
        match self {
            BandAxis::Wavelengths(w) => w.len(),
            BandAxis::Indices(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether entries carry physical wavelengths.
    pub fn is_physical(&self) -> bool {
        matches!(self, BandAxis::Wavelengths(_))
    }

    /// Label of band `index` as a number (wavelength or index).
    pub fn value(&self, index: usize) -> Option<f64> {
        match self {
            BandAxis::Wavelengths(w) => w.get(index).copied(),
            BandAxis::Indices(n) => (index < *n).then_some(index as f64),
        }
    }

    /// Physical wavelength of band `index`, if the axis has them.
    pub fn wavelength(&self, index: usize) -> Option<f64> {
        match self {
            BandAxis::Wavelengths(w) => w.get(index).copied(),
            BandAxis::Indices(_) => None,
        }
    }

    /// All labels as numbers.
    pub fn to_vec(&self) -> Vec<f64> {
        (0..self.len()).filter_map(|i| self.value(i)).collect()
    }
}

impl Serialize for BandAxis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BandAxis::Wavelengths(w) => serializer.collect_seq(w),
            BandAxis::Indices(n) => serializer.collect_seq(0..*n as u64),
        }
    }
}
