//! Small numeric helpers shared by calibration, encoding and analysis.

use ndarray::ArrayView2;

/// Minimum and maximum over the finite values, or `None` when there are none.
pub fn finite_range(values: impl IntoIterator<Item = f32>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .map(f64::from)
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Per-column mean and, optionally, population standard deviation of a
/// (rows × columns) matrix. Accumulates in f64.
pub fn column_mean_std(
    matrix: ArrayView2<'_, f32>,
    with_std: bool,
) -> (Vec<f64>, Option<Vec<f64>>) {
    let (rows, cols) = matrix.dim();
    if rows == 0 {
        return (vec![0.0; cols], with_std.then(|| vec![0.0; cols]));
    }

    let mut sum = vec![0.0f64; cols];
    let mut sum_sq = vec![0.0f64; cols];
    for row in matrix.rows() {
        for (j, &v) in row.iter().enumerate() {
            let v = f64::from(v);
            sum[j] += v;
            sum_sq[j] += v * v;
        }
    }

    let n = rows as f64;
    let mean: Vec<f64> = sum.iter().map(|s| s / n).collect();
    let std = with_std.then(|| {
        sum_sq
            .iter()
            .zip(&mean)
            .map(|(sq, m)| (sq / n - m * m).max(0.0).sqrt())
            .collect()
    });

    (mean, std)
}
