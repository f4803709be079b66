//! Numeric constants for calibration and analysis

/// Added to the white/dark difference during radiometric correction
pub const CALIBRATION_EPSILON: f32 = 1e-8;

/// Dynamic range below which normalisation yields an all-zero array
pub const MIN_DYNAMIC_RANGE: f64 = 1e-9;

/// Class mean spectra with a norm at or below this are degenerate
pub const MIN_CLASS_NORM: f64 = 1e-12;

/// Allowed range for the number of principal components
pub const PCA_COMPONENTS_MIN: usize = 1;
pub const PCA_COMPONENTS_MAX: usize = 10;

/// Allowed range for the number of k-means clusters
pub const KMEANS_CLUSTERS_MIN: usize = 2;
pub const KMEANS_CLUSTERS_MAX: usize = 20;

/// Iteration cap for k-means
pub const KMEANS_MAX_ITERATIONS: usize = 30;

/// Per-element center shift under which k-means has converged
pub const KMEANS_TOLERANCE: f32 = 1e-4;

/// Seed for k-means center initialisation and empty-cluster reseeding
pub const KMEANS_SEED: u64 = 0;

/// Seed for palette colors beyond the built-in set
pub const PALETTE_SEED: u64 = 42;

/// Default preview bands
pub const DEFAULT_RGB_BANDS: [usize; 3] = [10, 20, 30];

/// Default JPEG quality for RGB previews
pub const DEFAULT_JPEG_QUALITY: u8 = 90;
