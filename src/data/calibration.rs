//! Dataset discovery and radiometric calibration.
//!
//! A dataset directory holds one data raster and, optionally, a dark and a
//! white reference raster. References are recognised by the substrings
//! `darkref` / `whiteref` in their file names (case-insensitive). With both
//! references present the cube is corrected to reflectance; otherwise the raw
//! cube is min/max rescaled and a warning is returned alongside it.

use std::fmt;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3, Axis};
use web_time::Instant;

use crate::constants::{CALIBRATION_EPSILON, MIN_DYNAMIC_RANGE};
use crate::data::hyperspectral::{BandAxis, Cube};
use crate::data::loader::{LoaderError, RawRaster, ReaderRegistry};
use crate::data::metadata::extract_wavelengths;
use crate::error::{HsiError, Result};
use crate::stats::finite_range;

/// Calibration reference category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Dark,
    White,
}

impl ReferenceKind {
    /// Lowercase file name substring identifying this reference.
    pub fn keyword(&self) -> &'static str {
        match self {
            ReferenceKind::Dark => "darkref",
            ReferenceKind::White => "whiteref",
        }
    }

    pub fn all() -> [ReferenceKind; 2] {
        [ReferenceKind::Dark, ReferenceKind::White]
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keyword().to_uppercase())
    }
}

/// Non-fatal degraded-mode signal produced by a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// One or both references are absent; data was min/max normalised instead
    MissingCalibration { missing: Vec<ReferenceKind> },
    /// Wavelength metadata absent or unusable; band indices are used
    MissingWavelengths,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::MissingCalibration { missing } => {
                let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "Calibration reference files missing ({}); \
                     returning normalized uncorrected data.",
                    names.join(", ")
                )
            }
            LoadWarning::MissingWavelengths => f.write_str(
                "Wavelength metadata missing or invalid; falling back to band indices.",
            ),
        }
    }
}

/// Files making up a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFiles {
    pub data: PathBuf,
    pub dark: Option<PathBuf>,
    pub white: Option<PathBuf>,
}

impl DatasetFiles {
    /// Reference categories without a file.
    pub fn missing_references(&self) -> Vec<ReferenceKind> {
        ReferenceKind::all()
            .into_iter()
            .filter(|kind| match kind {
                ReferenceKind::Dark => self.dark.is_none(),
                ReferenceKind::White => self.white.is_none(),
            })
            .collect()
    }
}

/// A freshly loaded, calibrated dataset.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub cube: Cube,
    pub bands: BandAxis,
    pub warnings: Vec<LoadWarning>,
}

impl LoadedDataset {
    pub fn warning_text(&self) -> Option<String> {
        warning_text(&self.warnings)
    }
}

/// Warnings joined for display, `None` when the load was clean.
pub fn warning_text(warnings: &[LoadWarning]) -> Option<String> {
    if warnings.is_empty() {
        return None;
    }
    let parts: Vec<String> = warnings.iter().map(ToString::to_string).collect();
    Some(parts.join("; "))
}

fn lowercase_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Locate the data raster and optional references for `path`.
///
/// `path` may be the dataset directory or any file inside it. Headers are
/// considered in file name order, so the data raster is the first header that
/// is not a reference.
pub fn discover_files(path: &Path, registry: &ReaderRegistry) -> Result<DatasetFiles> {
    let folder = if path.is_file() {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    } else {
        path
    };

    if !folder.is_dir() {
        return Err(HsiError::DatasetNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut headers: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && registry.is_header(p))
        .collect();
    headers.sort();

    log::debug!("Found {} header(s) in {:?}", headers.len(), folder);

    let find_reference = |kind: ReferenceKind| {
        headers
            .iter()
            .find(|p| lowercase_name(p).contains(kind.keyword()))
            .cloned()
    };
    let dark = find_reference(ReferenceKind::Dark);
    let white = find_reference(ReferenceKind::White);

    let data = headers
        .iter()
        .find(|p| {
            let name = lowercase_name(p);
            ReferenceKind::all()
                .iter()
                .all(|kind| !name.contains(kind.keyword()))
        })
        .cloned()
        .ok_or_else(|| HsiError::DatasetNotFound {
            path: folder.to_path_buf(),
        })?;

    Ok(DatasetFiles { data, dark, white })
}

/// Load and calibrate the dataset at `path` with the built-in readers.
pub fn load_dataset(path: &Path) -> Result<LoadedDataset> {
    load_dataset_with(path, &ReaderRegistry::new())
}

/// Load and calibrate the dataset at `path` using `registry`.
pub fn load_dataset_with(path: &Path, registry: &ReaderRegistry) -> Result<LoadedDataset> {
    let start = Instant::now();
    let files = discover_files(path, registry)?;

    let read = |p: &Path| -> Result<RawRaster> {
        registry.read(p).map_err(|source| HsiError::LoadFailure {
            path: p.to_path_buf(),
            source,
        })
    };

    let raw = read(&files.data)?;
    let wavelengths = extract_wavelengths(&raw.metadata);
    let mut warnings = Vec::new();

    let corrected = match (&files.dark, &files.white) {
        (Some(dark_path), Some(white_path)) => {
            let dark = read(dark_path)?;
            let white = read(white_path)?;
            calibrate(raw.data, &dark.data, &white.data).map_err(|source| {
                HsiError::LoadFailure {
                    path: files.data.clone(),
                    source,
                }
            })?
        }
        _ => {
            let warning = LoadWarning::MissingCalibration {
                missing: files.missing_references(),
            };
            log::warn!("{}", warning);
            warnings.push(warning);
            normalize_uncalibrated(raw.data)
        }
    };

    let band_count = corrected.dim().2;
    let bands = match wavelengths {
        Some(w) if w.len() == band_count => BandAxis::Wavelengths(w),
        _ => {
            let warning = LoadWarning::MissingWavelengths;
            log::warn!("{}", warning);
            warnings.push(warning);
            BandAxis::Indices(band_count)
        }
    };
    debug_assert_eq!(bands.len(), band_count);

    let cube = Cube::new(corrected);
    log::info!(
        "Loaded {:?}: {}x{} with {} bands in {:?}",
        files.data,
        cube.height(),
        cube.width(),
        cube.num_bands(),
        start.elapsed()
    );

    Ok(LoadedDataset {
        cube,
        bands,
        warnings,
    })
}

/// Mean over the repeated-frame axis of a reference raster.
fn reference_mean(reference: &Array3<f32>) -> Result<Array2<f32>, LoaderError> {
    reference
        .mean_axis(Axis(0))
        .ok_or_else(|| LoaderError::invalid_header("reference raster has no frames"))
}

/// Radiometric correction:
/// `clip((data - dark_mean) / (white_mean - dark_mean + 1e-8), 0, 1)`.
pub fn calibrate(
    data: Array3<f32>,
    dark: &Array3<f32>,
    white: &Array3<f32>,
) -> Result<Array3<f32>, LoaderError> {
    let dark_mean = reference_mean(dark)?;
    let white_mean = reference_mean(white)?;

    let expected = (data.dim().1, data.dim().2);
    for reference in [&dark_mean, &white_mean] {
        if reference.dim() != expected {
            return Err(LoaderError::ReferenceMismatch {
                reference: reference.dim(),
                data: expected,
            });
        }
    }

    let denominator = &white_mean - &dark_mean + CALIBRATION_EPSILON;

    let mut corrected = data;
    corrected -= &dark_mean;
    corrected /= &denominator;
    corrected.mapv_inplace(|v| v.clamp(0.0, 1.0));
    Ok(corrected)
}

/// Rescale an uncalibrated cube to `[0, 1]` with its finite min/max.
///
/// Yields all zeros when there are no finite values or the dynamic range is
/// below [`MIN_DYNAMIC_RANGE`].
pub fn normalize_uncalibrated(data: Array3<f32>) -> Array3<f32> {
    match finite_range(data.iter().copied()) {
        Some((min, max)) if max - min >= MIN_DYNAMIC_RANGE => {
            let range = max - min;
            data.mapv(|v| (((f64::from(v) - min) / range) as f32).clamp(0.0, 1.0))
        }
        _ => Array3::zeros(data.raw_dim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{scratch_dir, write_envi, write_npy};

    #[test]
    fn test_calibrated_path() {
        let dir = scratch_dir("calib-ok");
        let data = Array3::from_elem((2, 2, 2), 10.0f32);
        write_envi(dir.path(), "scene", &data, Some(&[10.0, 20.0][..]));
        write_envi(dir.path(), "scene_DARKREF", &Array3::zeros((2, 2, 2)), None);
        write_envi(dir.path(), "scene_WHITEREF", &Array3::from_elem((2, 2, 2), 20.0), None);

        let loaded = load_dataset(dir.path()).expect("dataset loads");
        assert!(loaded.cube.data().iter().all(|&v| v == 0.5));
        assert_eq!(loaded.bands, BandAxis::Wavelengths(vec![10.0, 20.0]));
        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.warning_text(), None);
    }

    #[test]
    fn test_missing_references_normalizes() {
        let dir = scratch_dir("calib-missing");
        let data = Array3::from_shape_fn((2, 2, 3), |(r, c, b)| {
            ((r * 6 + c * 3 + b) as f32 + 1.0) * 10.0
        });
        write_envi(dir.path(), "sample", &data, Some(&[1.0, 2.0, 3.0][..]));

        let loaded = load_dataset(dir.path()).expect("dataset loads");
        let (min, max) = finite_range(loaded.cube.data().iter().copied()).unwrap();
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);
        assert_eq!(loaded.bands, BandAxis::Wavelengths(vec![1.0, 2.0, 3.0]));
        assert_eq!(
            loaded.warnings,
            vec![LoadWarning::MissingCalibration {
                missing: vec![ReferenceKind::Dark, ReferenceKind::White]
            }]
        );
        assert!(
            loaded
                .warning_text()
                .unwrap()
                .contains("normalized uncorrected data")
        );
    }

    #[test]
    fn test_single_reference_names_missing_one() {
        let dir = scratch_dir("calib-dark-only");
        let data = Array3::from_shape_fn((1, 2, 2), |(_, c, b)| (c + b) as f32);
        write_envi(dir.path(), "scene", &data, Some(&[1.0, 2.0][..]));
        write_envi(dir.path(), "darkref", &Array3::zeros((1, 2, 2)), None);

        let loaded = load_dataset(dir.path()).expect("dataset loads");
        let text = loaded.warning_text().unwrap();
        assert!(text.contains("(WHITEREF)"));
        assert!(!text.contains("DARKREF"));
    }

    #[test]
    fn test_wavelength_fallback() {
        let dir = scratch_dir("calib-wl");
        let data = Array3::from_shape_fn((1, 2, 3), |(_, c, b)| (c * 3 + b) as f32);
        // Two wavelengths for three bands
        write_envi(dir.path(), "scene", &data, Some(&[1.0, 2.0][..]));

        let loaded = load_dataset(dir.path()).expect("dataset loads");
        assert_eq!(loaded.bands, BandAxis::Indices(3));
        assert!(loaded.warnings.contains(&LoadWarning::MissingWavelengths));
        assert_eq!(loaded.warnings.len(), 2);
        assert!(loaded.warning_text().unwrap().contains("; Wavelength metadata"));
    }

    #[test]
    fn test_dataset_not_found() {
        let dir = scratch_dir("calib-empty");
        write_envi(dir.path(), "darkref", &Array3::zeros((1, 1, 1)), None);

        let result = load_dataset(dir.path());
        assert!(matches!(result, Err(HsiError::DatasetNotFound { .. })));

        let missing = dir.path().join("does-not-exist");
        assert!(matches!(
            load_dataset(&missing),
            Err(HsiError::DatasetNotFound { .. })
        ));
    }

    #[test]
    fn test_corrupt_header_is_load_failure() {
        let dir = scratch_dir("calib-corrupt");
        std::fs::write(dir.path().join("scene.hdr"), "not a header").unwrap();
        let result = load_dataset(dir.path());
        assert!(matches!(result, Err(HsiError::LoadFailure { .. })));
    }

    #[test]
    fn test_file_path_discovers_folder() {
        let dir = scratch_dir("calib-file");
        let data = Array3::from_elem((1, 1, 1), 4.0f32);
        write_envi(dir.path(), "a_whiteref", &Array3::from_elem((1, 1, 1), 8.0), None);
        let header = write_envi(dir.path(), "b_scene", &data, None);
        write_envi(dir.path(), "c_darkref", &Array3::zeros((1, 1, 1)), None);

        let files = discover_files(&header, &ReaderRegistry::new()).unwrap();
        assert_eq!(files.data, header);
        assert!(files.dark.is_some());
        assert!(files.white.is_some());
        assert!(files.missing_references().is_empty());
    }

    #[test]
    fn test_npy_dataset() {
        let dir = scratch_dir("calib-npy");
        let data = Array3::from_shape_fn((2, 2, 2), |(r, c, b)| (r + c + b) as f32);
        write_npy(dir.path(), "cube", &data);

        let loaded = load_dataset(dir.path()).expect("dataset loads");
        assert_eq!(loaded.cube.shape(), (2, 2, 2));
        assert_eq!(loaded.bands, BandAxis::Indices(2));
        assert_eq!(loaded.warnings.len(), 2);
    }

    #[test]
    fn test_calibrate_exact_half() {
        let data = Array3::from_elem((2, 2, 2), 10.0f32);
        let dark = Array3::zeros((2, 2, 2));
        let white = Array3::from_elem((2, 2, 2), 20.0f32);
        let corrected = calibrate(data, &dark, &white).unwrap();
        assert!(corrected.iter().all(|&v| v == 0.5));
    }

    #[test]
    fn test_calibrate_clips_and_averages_frames() {
        let data = Array3::from_shape_vec((1, 1, 2), vec![-5.0f32, 100.0]).unwrap();
        // Two dark frames averaging to 1.0
        let dark = Array3::from_shape_vec((2, 1, 2), vec![0.0f32, 0.0, 2.0, 2.0]).unwrap();
        let white = Array3::from_elem((3, 1, 2), 11.0f32);
        let corrected = calibrate(data, &dark, &white).unwrap();
        assert_eq!(corrected[[0, 0, 0]], 0.0);
        assert_eq!(corrected[[0, 0, 1]], 1.0);
    }

    #[test]
    fn test_calibrate_shape_mismatch() {
        let data = Array3::zeros((2, 3, 2));
        let dark = Array3::zeros((1, 2, 2));
        let white = Array3::zeros((1, 3, 2));
        let result = calibrate(data, &dark, &white);
        assert!(matches!(
            result,
            Err(LoaderError::ReferenceMismatch {
                reference: (2, 2),
                data: (3, 2)
            })
        ));
    }

    #[test]
    fn test_normalize_flat_and_non_finite() {
        let flat = Array3::from_elem((2, 2, 1), 7.0f32);
        assert!(normalize_uncalibrated(flat).iter().all(|&v| v == 0.0));

        let all_nan = Array3::from_elem((1, 1, 2), f32::NAN);
        assert!(normalize_uncalibrated(all_nan).iter().all(|&v| v == 0.0));

        let mixed = Array3::from_shape_vec((1, 1, 3), vec![2.0f32, f32::INFINITY, 4.0]).unwrap();
        let normalized = normalize_uncalibrated(mixed);
        assert_eq!(normalized.as_slice().unwrap(), &[0.0, 1.0, 1.0]);
    }
}
