//! K-means segmentation of pixel spectra.
//!
//! Deterministic: the generator is seeded with [`KMEANS_SEED`] on every
//! call, so identical cubes produce identical assignments.

use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use web_time::Instant;

use crate::codec::{EncodedImage, encode_color};
use crate::color_utils::{Rgb, format_hex_color, palette};
use crate::constants::{
    KMEANS_CLUSTERS_MAX, KMEANS_CLUSTERS_MIN, KMEANS_MAX_ITERATIONS, KMEANS_SEED,
    KMEANS_TOLERANCE,
};
use crate::data::{BandAxis, Cube};
use crate::error::{HsiError, Result};

/// Raw outcome of Lloyd iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster index per pixel
    pub labels: Vec<usize>,
    /// (clusters × bands)
    pub centers: Array2<f32>,
    pub iterations: usize,
    pub converged: bool,
}

/// Per-cluster statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub cluster: usize,
    pub color: String,
    pub count: usize,
    /// Share of all pixels, in percent
    pub percentage: f64,
    /// Mean reflectance across the center spectrum
    pub mean: f64,
    pub spectrum: Vec<f64>,
    pub peak_band_index: usize,
    /// Only present when the band axis carries wavelengths
    pub peak_wavelength: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KmeansResult {
    pub method: &'static str,
    /// Cluster map, color PNG
    pub map: EncodedImage,
    pub clusters: usize,
    pub iterations: usize,
    pub converged: bool,
    pub cluster_summaries: Vec<ClusterSummary>,
    /// Cluster index per pixel, (rows × columns)
    #[serde(skip)]
    pub labels: Array2<usize>,
}

/// Index of the nearest center for every pixel.
///
/// Squared distances use `|x|² - 2 x·c + |c|²` over one matrix product.
fn assign(
    pixels: &ArrayView2<'_, f32>,
    pixel_norms: &Array1<f32>,
    centers: &Array2<f32>,
    labels: &mut [usize],
) {
    let center_norms = centers.map_axis(Axis(1), |c| c.dot(&c));
    let cross = pixels.dot(&centers.t());

    for ((label, row), &norm) in labels.iter_mut().zip(cross.outer_iter()).zip(pixel_norms) {
        let mut best = 0;
        let mut best_distance = f32::INFINITY;
        for (j, (&xc, &cn)) in row.iter().zip(&center_norms).enumerate() {
            let distance = norm - 2.0 * xc + cn;
            if distance < best_distance {
                best_distance = distance;
                best = j;
            }
        }
        *label = best;
    }
}

/// Cluster the rows of `pixels` into `k` groups.
///
/// `k` must be between 1 and the number of rows.
pub fn cluster(pixels: ArrayView2<'_, f32>, k: usize) -> Clustering {
    let (n, bands) = pixels.dim();
    let mut rng = StdRng::seed_from_u64(KMEANS_SEED);

    let mut centers = Array2::<f32>::zeros((k, bands));
    for (center, index) in rand::seq::index::sample(&mut rng, n, k).iter().enumerate() {
        centers.row_mut(center).assign(&pixels.row(index));
    }

    let pixel_norms = pixels.map_axis(Axis(1), |p| p.dot(&p));
    let mut labels = vec![0usize; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < KMEANS_MAX_ITERATIONS {
        iterations += 1;
        assign(&pixels, &pixel_norms, &centers, &mut labels);

        let mut sums = Array2::<f64>::zeros((k, bands));
        let mut counts = vec![0usize; k];
        for (row, &label) in pixels.outer_iter().zip(&labels) {
            counts[label] += 1;
            sums.row_mut(label)
                .zip_mut_with(&row, |sum, &v| *sum += f64::from(v));
        }

        let mut updated = Array2::<f32>::zeros((k, bands));
        for (j, &count) in counts.iter().enumerate() {
            if count == 0 {
                let pick = rng.random_range(0..n);
                log::debug!("k-means: cluster {} empty, reseeding from pixel {}", j, pick);
                updated.row_mut(j).assign(&pixels.row(pick));
            } else {
                let denominator = count as f64;
                updated
                    .row_mut(j)
                    .assign(&sums.row(j).mapv(|s| (s / denominator) as f32));
            }
        }

        let shift = (&updated - &centers)
            .iter()
            .fold(0.0f32, |max, d| max.max(d.abs()));
        centers = updated;

        if shift < KMEANS_TOLERANCE {
            converged = true;
            break;
        }
    }

    Clustering {
        labels,
        centers,
        iterations,
        converged,
    }
}

/// Render a label plane as an `H × W × 3` color image.
pub(crate) fn colorize(labels: &Array2<usize>, colors: &[Rgb]) -> Array3<u8> {
    let (height, width) = labels.dim();
    Array3::from_shape_fn((height, width, 3), |(r, c, ch)| {
        colors.get(labels[[r, c]]).map_or(0, |color| color[ch])
    })
}

/// Index of the first maximum.
pub(crate) fn peak_index(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, max), (i, &v)| {
            if v > max { (i, v) } else { (best, max) }
        })
        .0
}

/// Segment `cube` into `requested` clusters (clamped to `[2, 20]` and to
/// the pixel count).
pub fn kmeans(cube: &Cube, bands: &BandAxis, requested: usize) -> Result<KmeansResult> {
    let start = Instant::now();
    let (height, width, _) = cube.shape();
    let pixels = cube.pixels()?;
    let n = pixels.nrows();
    if n == 0 {
        return Err(HsiError::EmptySelection);
    }

    let k = requested
        .clamp(KMEANS_CLUSTERS_MIN, KMEANS_CLUSTERS_MAX)
        .min(n);
    let clustering = cluster(pixels, k);

    let labels = Array2::from_shape_vec((height, width), clustering.labels)?;
    let colors = palette(k);
    let map = encode_color(colorize(&labels, &colors).view())?;

    let mut counts = vec![0usize; k];
    for &label in &labels {
        counts[label] += 1;
    }

    let cluster_summaries = clustering
        .centers
        .outer_iter()
        .enumerate()
        .map(|(j, center)| {
            let spectrum: Vec<f64> = center.iter().map(|&v| f64::from(v)).collect();
            let mean = if spectrum.is_empty() {
                0.0
            } else {
                spectrum.iter().sum::<f64>() / spectrum.len() as f64
            };
            let peak = peak_index(&spectrum);
            ClusterSummary {
                cluster: j,
                color: format_hex_color(colors[j]),
                count: counts[j],
                percentage: counts[j] as f64 / n as f64 * 100.0,
                mean,
                peak_band_index: peak,
                peak_wavelength: bands.wavelength(peak),
                spectrum,
            }
        })
        .collect();

    log::info!(
        "k-means: {} cluster(s), {} iteration(s), converged={} in {:?}",
        k,
        clustering.iterations,
        clustering.converged,
        start.elapsed()
    );

    Ok(KmeansResult {
        method: "kmeans",
        map,
        clusters: k,
        iterations: clustering.iterations,
        converged: clustering.converged,
        cluster_summaries,
        labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperspectral::generate_test_cube;
    use ndarray::array;

    fn two_blobs() -> Cube {
        // Left half dark, right half bright
        Cube::new(Array3::from_shape_fn((4, 6, 3), |(_, c, b)| {
            if c < 3 {
                0.1 + 0.01 * b as f32
            } else {
                0.9 - 0.01 * b as f32
            }
        }))
    }

    #[test]
    fn test_separates_blobs() {
        let cube = two_blobs();
        let result = kmeans(&cube, &BandAxis::Indices(3), 2).unwrap();
        assert_eq!(result.clusters, 2);
        assert!(result.converged);

        let left = result.labels[[0, 0]];
        let right = result.labels[[0, 5]];
        assert_ne!(left, right);
        for ((_, c), &label) in result.labels.indexed_iter() {
            assert_eq!(label, if c < 3 { left } else { right });
        }

        let total: usize = result.cluster_summaries.iter().map(|s| s.count).sum();
        assert_eq!(total, 24);
        let percent: f64 = result.cluster_summaries.iter().map(|s| s.percentage).sum();
        assert!((percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic() {
        let (cube, bands) = generate_test_cube(20, 16, 6);
        let first = kmeans(&cube, &bands, 6).unwrap();
        let second = kmeans(&cube, &bands, 6).unwrap();
        assert_eq!(first.labels, second.labels);
        assert_eq!(first.iterations, second.iterations);
        assert_eq!(first.map, second.map);
    }

    #[test]
    fn test_cluster_count_clamped() {
        let (cube, bands) = generate_test_cube(8, 8, 3);
        assert_eq!(kmeans(&cube, &bands, 1).unwrap().clusters, 2);
        assert_eq!(kmeans(&cube, &bands, 99).unwrap().clusters, 20);

        let tiny = Cube::new(Array3::from_shape_fn((1, 3, 2), |(_, c, b)| (c + b) as f32));
        assert_eq!(kmeans(&tiny, &BandAxis::Indices(2), 10).unwrap().clusters, 3);
    }

    #[test]
    fn test_iteration_cap() {
        let (cube, bands) = generate_test_cube(16, 16, 8);
        let result = kmeans(&cube, &bands, 12).unwrap();
        assert!(result.iterations >= 1 && result.iterations <= KMEANS_MAX_ITERATIONS);
    }

    #[test]
    fn test_summary_peak_wavelength() {
        let cube = two_blobs();
        let bands = BandAxis::Wavelengths(vec![500.0, 600.0, 700.0]);
        let result = kmeans(&cube, &bands, 2).unwrap();
        let bright = &result.cluster_summaries[result.labels[[0, 5]]];
        assert_eq!(bright.peak_band_index, 0);
        assert_eq!(bright.peak_wavelength, Some(500.0));
        assert!(bright.color.starts_with('#'));

        let indexed = kmeans(&cube, &BandAxis::Indices(3), 2).unwrap();
        let dark = &indexed.cluster_summaries[indexed.labels[[0, 0]]];
        assert_eq!(dark.peak_band_index, 2);
        assert_eq!(dark.peak_wavelength, None);
    }

    #[test]
    fn test_identical_pixels_reseed_empty_clusters() {
        let pixels = Array2::from_elem((5, 2), 0.5f32);
        let clustering = cluster(pixels.view(), 3);
        assert_eq!(clustering.labels, vec![0; 5]);
        assert!(clustering.converged);
    }

    #[test]
    fn test_peak_index_first_max() {
        assert_eq!(peak_index(&[1.0, 3.0, 3.0, 2.0]), 1);
        assert_eq!(peak_index(&[]), 0);
    }

    #[test]
    fn test_colorize() {
        let labels = array![[0usize, 1], [1, 0]];
        let image = colorize(&labels, &[[1, 2, 3], [4, 5, 6]]);
        assert_eq!(image.dim(), (2, 2, 3));
        assert_eq!(image[[0, 1, 2]], 6);
        assert_eq!(image[[1, 1, 0]], 1);
    }
}
