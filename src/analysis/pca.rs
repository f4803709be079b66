//! Principal component analysis over the cube's pixel spectra.

use ndarray::{Array1, Array2, Axis};
use serde::Serialize;
use web_time::Instant;

use crate::codec::{EncodedImage, encode_grayscale};
use crate::constants::{PCA_COMPONENTS_MAX, PCA_COMPONENTS_MIN};
use crate::data::Cube;
use crate::error::{HsiError, Result};

/// Upper bound on Jacobi sweeps; symmetric matrices converge in far fewer.
const JACOBI_MAX_SWEEPS: usize = 100;

/// Stop once the off-diagonal energy falls below this fraction of the total.
const JACOBI_TOLERANCE: f64 = 1e-24;

/// One principal component.
#[derive(Debug, Clone, Serialize)]
pub struct PcaComponent {
    /// 0-based rank by explained variance
    pub index: usize,
    /// Explained-variance ratio in `[0, 1]`
    pub variance: f64,
    pub eigenvalue: f64,
    /// Projection onto the component, grayscale PNG
    pub image: EncodedImage,
}

#[derive(Debug, Clone, Serialize)]
pub struct PcaResult {
    pub method: &'static str,
    pub components: Vec<PcaComponent>,
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns the (unsorted) eigenvalues and the eigenvectors as columns.
pub(crate) fn jacobi_eigen(mut a: Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let total: f64 = a.iter().map(|x| x * x).sum();
        let diagonal: f64 = a.diag().iter().map(|x| x * x).sum();
        let off_diagonal = total - diagonal;
        if off_diagonal <= JACOBI_TOLERANCE * total {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }

                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                // signum(0.0) is 1.0, giving t = 1 for equal diagonals
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}

/// Compute the leading principal components of `cube`.
///
/// The component count is clamped to `[1, 10]` and to the band count.
pub fn pca(cube: &Cube, requested: usize) -> Result<PcaResult> {
    let start = Instant::now();
    let (height, width, bands) = cube.shape();
    let count = requested
        .clamp(PCA_COMPONENTS_MIN, PCA_COMPONENTS_MAX)
        .min(bands);

    let pixels = cube.pixels()?.mapv(f64::from);
    let n = pixels.nrows();
    let mean = pixels.mean_axis(Axis(0)).ok_or(HsiError::EmptySelection)?;
    let centered = &pixels - &mean;

    let covariance = centered.t().dot(&centered) / (n.saturating_sub(1).max(1) as f64);
    let (eigenvalues, eigenvectors) = jacobi_eigen(covariance);

    let mut order: Vec<usize> = (0..bands).collect();
    order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

    let clamped: Vec<f64> = order.iter().map(|&i| eigenvalues[i].max(0.0)).collect();
    let total: f64 = clamped.iter().sum();
    let denominator = if total > 0.0 { total } else { 1.0 };

    let mut components = Vec::with_capacity(count);
    for (rank, &column) in order.iter().take(count).enumerate() {
        let mut axis = eigenvectors.column(column).to_owned();
        // Fix the sign so the largest loading is positive
        let pivot = axis
            .iter()
            .copied()
            .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
        if pivot < 0.0 {
            axis.mapv_inplace(|x| -x);
        }

        let projection = centered
            .dot(&axis)
            .mapv(|x| x as f32)
            .into_shape_with_order((height, width))?;

        components.push(PcaComponent {
            index: rank,
            variance: clamped[rank] / denominator,
            eigenvalue: clamped[rank],
            image: encode_grayscale(projection.view())?,
        });
    }

    log::info!(
        "PCA: {} of {} component(s) over {} pixel(s) in {:?}",
        components.len(),
        bands,
        n,
        start.elapsed()
    );

    Ok(PcaResult {
        method: "pca",
        components,
    })
}
