//! Supervised classification with the spectral angle mapper.
//!
//! Each label's reference spectrum is the mean of all pixels in that label's
//! annotated regions. Every cube pixel is assigned to the label whose
//! reference makes the smallest angle with it.

use std::collections::HashMap;

use ndarray::{Array1, Array2, ArrayView2, Axis, concatenate};
use serde::Serialize;
use web_time::Instant;

use crate::analysis::kmeans::colorize;
use crate::codec::{EncodedImage, encode_color};
use crate::color_utils::{Rgb, format_hex_color, palette};
use crate::constants::MIN_CLASS_NORM;
use crate::data::{BandAxis, Cube};
use crate::error::{HsiError, Result};
use crate::model::Annotation;
use crate::selection::extract;
use crate::stats::column_mean_std;

/// Name of the only supported classification method.
pub const SAM_METHOD: &str = "sam";

/// Training pixels for one label.
#[derive(Debug, Clone)]
struct ClassSample {
    label: String,
    color: Option<Rgb>,
    pixels: Vec<Array2<f32>>,
    count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub pixels: usize,
    pub spectra: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stddev: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedSummary {
    pub pixels: usize,
    pub spectra: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stddev: Option<Vec<f64>>,
    /// Share of all pixels, in percent
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassSummary {
    pub label: String,
    pub color: String,
    pub training: TrainingSummary,
    pub classified: ClassifiedSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct SamResult {
    pub method: &'static str,
    /// Class map, color PNG
    pub map: EncodedImage,
    pub total_pixels: usize,
    pub bands: BandAxis,
    pub classes: Vec<ClassSummary>,
    /// Class index per pixel, (rows × columns)
    #[serde(skip)]
    pub labels: Array2<usize>,
    /// Angle to the assigned class in radians, (rows × columns)
    #[serde(skip)]
    pub angles: Array2<f64>,
}

/// Angle in radians from a dot product and the product of the two norms.
/// A zero norm counts as orthogonal.
fn spectral_angle(dot: f64, norms: f64) -> f64 {
    let cosine = if norms == 0.0 { 0.0 } else { dot / norms };
    cosine.clamp(-1.0, 1.0).acos()
}

/// Nearest class (by angle) and the angle for every row of `pixels`.
fn assign_classes(pixels: ArrayView2<'_, f32>, means: &Array2<f64>) -> (Vec<usize>, Vec<f64>) {
    let pixels = pixels.mapv(f64::from);
    let pixel_norms = pixels.map_axis(Axis(1), |p| p.dot(&p).sqrt());
    let mean_norms = means.map_axis(Axis(1), |m| m.dot(&m).sqrt());
    let dots = pixels.dot(&means.t());

    let mut labels = Vec::with_capacity(pixels.nrows());
    let mut angles = Vec::with_capacity(pixels.nrows());
    for (row, &pn) in dots.outer_iter().zip(&pixel_norms) {
        let mut best = 0;
        let mut best_angle = f64::INFINITY;
        for (j, (&dot, &mn)) in row.iter().zip(&mean_norms).enumerate() {
            let angle = spectral_angle(dot, pn * mn);
            if angle < best_angle {
                best_angle = angle;
                best = j;
            }
        }
        labels.push(best);
        angles.push(best_angle);
    }
    (labels, angles)
}

/// Group training pixels by label in order of first appearance.
fn collect_samples(cube: &Cube, annotations: &[Annotation]) -> Result<Vec<ClassSample>> {
    let mut samples: Vec<ClassSample> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for annotation in annotations {
        let label = annotation.label.trim();
        if label.is_empty() {
            return Err(HsiError::invalid_annotation("annotation is missing a label"));
        }

        let slot = *index.entry(label.to_string()).or_insert_with(|| {
            samples.push(ClassSample {
                label: label.to_string(),
                color: None,
                pixels: Vec::new(),
                count: 0,
            });
            samples.len() - 1
        });
        let sample = &mut samples[slot];
        if sample.color.is_none() {
            sample.color = annotation.color;
        }

        match extract(cube, &annotation.region) {
            Ok(selection) => {
                sample.count += selection.pixel_count();
                sample.pixels.push(selection.pixels);
            }
            Err(HsiError::EmptySelection) => {
                log::warn!(
                    "Skipping empty {} region for '{}'",
                    annotation.region.kind(),
                    label
                );
            }
            Err(e) => return Err(e),
        }
    }

    let (usable, empty): (Vec<_>, Vec<_>) = samples.into_iter().partition(|s| s.count > 0);
    for sample in &empty {
        log::warn!("Label '{}' has no training pixels; dropping it", sample.label);
    }
    Ok(usable)
}

/// Train on `annotations` and classify every pixel of `cube`.
///
/// `method` must be `"sam"` (case-insensitive).
pub fn classify(
    cube: &Cube,
    bands: &BandAxis,
    annotations: &[Annotation],
    method: &str,
    include_std: bool,
) -> Result<SamResult> {
    if !method.trim().eq_ignore_ascii_case(SAM_METHOD) {
        return Err(HsiError::unsupported_method(method));
    }
    if annotations.is_empty() {
        return Err(HsiError::invalid_annotation(
            "at least one annotation is required",
        ));
    }

    let start = Instant::now();
    let samples = collect_samples(cube, annotations)?;
    if samples.len() < 2 {
        return Err(HsiError::invalid_annotation(format!(
            "at least two labels with training pixels are required, got {}",
            samples.len()
        )));
    }

    let band_count = cube.num_bands();
    let mut means = Array2::<f64>::zeros((samples.len(), band_count));
    let mut training = Vec::with_capacity(samples.len());
    for (j, sample) in samples.iter().enumerate() {
        let views: Vec<ArrayView2<'_, f32>> = sample.pixels.iter().map(|p| p.view()).collect();
        let stacked = concatenate(Axis(0), &views)?;
        let (mean, stddev) = column_mean_std(stacked.view(), include_std);

        let mean = Array1::from(mean);
        let norm = mean.dot(&mean).sqrt();
        if !norm.is_finite() || norm <= MIN_CLASS_NORM {
            return Err(HsiError::DegenerateClass {
                label: sample.label.clone(),
            });
        }

        means.row_mut(j).assign(&mean);
        training.push(TrainingSummary {
            pixels: sample.count,
            spectra: mean.to_vec(),
            stddev,
        });
    }

    let (height, width, _) = cube.shape();
    let pixels = cube.pixels()?;
    let total_pixels = pixels.nrows();
    let (assigned, angles) = assign_classes(pixels, &means);

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); samples.len()];
    for (i, &class) in assigned.iter().enumerate() {
        members[class].push(i);
    }

    let fallback = palette(samples.len());
    let colors: Vec<Rgb> = samples
        .iter()
        .zip(&fallback)
        .map(|(s, &default)| s.color.unwrap_or(default))
        .collect();

    let classes = samples
        .iter()
        .zip(training)
        .zip(&members)
        .zip(&colors)
        .map(|(((sample, training), indices), &color)| {
            let selected = pixels.select(Axis(0), indices);
            let (spectra, stddev) = column_mean_std(selected.view(), include_std);
            ClassSummary {
                label: sample.label.clone(),
                color: format_hex_color(color),
                training,
                classified: ClassifiedSummary {
                    pixels: indices.len(),
                    spectra,
                    stddev,
                    percentage: if total_pixels == 0 {
                        0.0
                    } else {
                        indices.len() as f64 / total_pixels as f64 * 100.0
                    },
                },
            }
        })
        .collect();

    let labels = Array2::from_shape_vec((height, width), assigned)?;
    let angles = Array2::from_shape_vec((height, width), angles)?;
    let map = encode_color(colorize(&labels, &colors).view())?;

    log::info!(
        "SAM: {} class(es) over {} pixel(s) in {:?}",
        samples.len(),
        total_pixels,
        start.elapsed()
    );

    Ok(SamResult {
        method: SAM_METHOD,
        map,
        total_pixels,
        bands: bands.clone(),
        classes,
        labels,
        angles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Region;
    use ndarray::Array3;

    /// Left columns reflect in band 0, right columns in band 2.
    fn split_cube() -> Cube {
        Cube::new(Array3::from_shape_fn((4, 6, 3), |(_, c, b)| match (c < 3, b) {
            (true, 0) | (false, 2) => 0.8,
            _ => 0.1,
        }))
    }

    fn left_right() -> Vec<Annotation> {
        vec![
            Annotation::new("vegetation", Region::rectangle(0.0, 0.0, 2.0, 4.0)),
            Annotation::new("soil", Region::rectangle(4.0, 0.0, 6.0, 4.0)),
        ]
    }

    #[test]
    fn test_classifies_halves() {
        let cube = split_cube();
        let result = classify(&cube, &BandAxis::Indices(3), &left_right(), "sam", true).unwrap();

        assert_eq!(result.total_pixels, 24);
        assert_eq!(result.classes.len(), 2);
        assert_eq!(result.classes[0].label, "vegetation");
        for ((_, c), &label) in result.labels.indexed_iter() {
            assert_eq!(label, if c < 3 { 0 } else { 1 });
        }
        assert_eq!(result.classes[0].training.pixels, 8);
        assert_eq!(result.classes[0].classified.pixels, 12);
        assert!((result.classes[1].classified.percentage - 50.0).abs() < 1e-9);
        let stddev = result.classes[0].training.stddev.as_ref().unwrap();
        assert!(stddev.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_pixel_equal_to_mean_has_zero_angle() {
        let cube = split_cube();
        let result = classify(&cube, &BandAxis::Indices(3), &left_right(), "SAM", false).unwrap();
        // Training regions are uniform, so their pixels equal the class means
        assert!(result.angles[[0, 0]].abs() < 1e-6);
        assert!(result.angles[[3, 5]].abs() < 1e-6);
        assert!(result.classes[0].classified.stddev.is_none());
    }

    #[test]
    fn test_spectral_angle_guards_zero_norm() {
        assert!((spectral_angle(1.0, 0.0) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!(spectral_angle(3.0, 3.0).abs() < 1e-7);
        // Rounding past 1 is clamped
        assert_eq!(spectral_angle(1.0 + 1e-12, 1.0), 0.0);
    }

    #[test]
    fn test_colors_first_explicit_wins() {
        let cube = split_cube();
        let annotations = vec![
            Annotation::new("a", Region::rectangle(0.0, 0.0, 1.0, 1.0)),
            Annotation::new("a", Region::rectangle(0.0, 1.0, 1.0, 2.0)).with_color([1, 2, 3]),
            Annotation::new("a", Region::rectangle(0.0, 2.0, 1.0, 3.0)).with_color([9, 9, 9]),
            Annotation::new("b", Region::rectangle(5.0, 0.0, 6.0, 1.0)),
        ];
        let result = classify(&cube, &BandAxis::Indices(3), &annotations, "sam", false).unwrap();
        assert_eq!(result.classes[0].color, "#010203");
        assert_eq!(result.classes[0].training.pixels, 3);
        assert_eq!(result.classes[1].color, format_hex_color(palette(2)[1]));
    }

    #[test]
    fn test_unsupported_method() {
        let cube = split_cube();
        let result = classify(&cube, &BandAxis::Indices(3), &left_right(), "svm", false);
        assert!(matches!(result, Err(HsiError::UnsupportedMethod { .. })));
    }

    #[test]
    fn test_requires_two_labels_with_pixels() {
        let cube = split_cube();
        assert!(matches!(
            classify(&cube, &BandAxis::Indices(3), &[], "sam", false),
            Err(HsiError::InvalidAnnotation { .. })
        ));

        let one_label = vec![
            Annotation::new("a", Region::rectangle(0.0, 0.0, 2.0, 2.0)),
            Annotation::new("a", Region::rectangle(3.0, 0.0, 5.0, 2.0)),
        ];
        assert!(matches!(
            classify(&cube, &BandAxis::Indices(3), &one_label, "sam", false),
            Err(HsiError::InvalidAnnotation { .. })
        ));

        // Second label's only region lies outside the image
        let empty_second = vec![
            Annotation::new("a", Region::rectangle(0.0, 0.0, 2.0, 2.0)),
            Annotation::new("b", Region::rectangle(50.0, 50.0, 60.0, 60.0)),
        ];
        assert!(matches!(
            classify(&cube, &BandAxis::Indices(3), &empty_second, "sam", false),
            Err(HsiError::InvalidAnnotation { .. })
        ));
    }

    #[test]
    fn test_degenerate_class() {
        let mut data = Array3::from_elem((2, 4, 2), 0.5f32);
        data.slice_mut(ndarray::s![.., 0, ..]).fill(0.0);
        let cube = Cube::new(data);
        let annotations = vec![
            Annotation::new("dark", Region::rectangle(0.0, 0.0, 1.0, 2.0)),
            Annotation::new("bright", Region::rectangle(2.0, 0.0, 4.0, 2.0)),
        ];
        let result = classify(&cube, &BandAxis::Indices(2), &annotations, "sam", false);
        assert!(matches!(
            result,
            Err(HsiError::DegenerateClass { label }) if label == "dark"
        ));
    }

    #[test]
    fn test_invalid_region_propagates() {
        let cube = split_cube();
        let annotations = vec![
            Annotation::new("a", Region::rectangle(0.0, 0.0, 2.0, 2.0)),
            Annotation::new(
                "b",
                Region::Circle {
                    cx: 1.0,
                    cy: 1.0,
                    radius: -2.0,
                },
            ),
        ];
        assert!(matches!(
            classify(&cube, &BandAxis::Indices(3), &annotations, "sam", false),
            Err(HsiError::InvalidRegion { .. })
        ));
    }
}
