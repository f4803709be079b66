//! The active dataset and the operations that read it.
//!
//! A [`Workspace`] holds at most one [`Dataset`]. Loading builds a complete
//! new dataset before swapping it in, so readers holding the previous
//! `Arc<Dataset>` keep a consistent snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array3;
use parking_lot::RwLock;
use serde::Serialize;

use crate::analysis::{self, AnalysisRequest, AnalysisResult};
use crate::codec::{EncodedImage, encode_preview};
use crate::config::PreviewConfig;
use crate::data::{
    BandAxis, Cube, LoadWarning, LoadedDataset, ReaderRegistry, load_dataset_with, warning_text,
};
use crate::error::{HsiError, Result};
use crate::hyperspectral::BandSelection;
use crate::model::{Annotation, Region};
use crate::selection::{SpectrumStats, extract};
use crate::state::upload::{UploadedFile, materialize_upload};

/// A loaded cube with its band axis and load warnings.
#[derive(Debug, Clone)]
pub struct Dataset {
    cube: Cube,
    bands: BandAxis,
    warnings: Vec<LoadWarning>,
    source: PathBuf,
}

/// What a load reports back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub bands: BandAxis,
    /// (rows, columns, bands)
    pub shape: [usize; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Spectrum query result paired with the band axis.
#[derive(Debug, Clone, Serialize)]
pub struct SpectrumResponse {
    #[serde(flatten)]
    pub stats: SpectrumStats,
    pub bands: BandAxis,
}

impl Dataset {
    pub fn new(cube: Cube, bands: BandAxis, source: impl Into<PathBuf>) -> Self {
        Self {
            cube,
            bands,
            warnings: Vec::new(),
            source: source.into(),
        }
    }

    pub fn from_loaded(loaded: LoadedDataset, source: impl Into<PathBuf>) -> Self {
        Self {
            cube: loaded.cube,
            bands: loaded.bands,
            warnings: loaded.warnings,
            source: source.into(),
        }
    }

    pub fn cube(&self) -> &Cube {
        &self.cube
    }

    pub fn bands(&self) -> &BandAxis {
        &self.bands
    }

    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }

    /// Path the dataset was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn warning_text(&self) -> Option<String> {
        warning_text(&self.warnings)
    }

    pub fn summary(&self) -> DatasetSummary {
        let (rows, cols, bands) = self.cube.shape();
        DatasetSummary {
            bands: self.bands.clone(),
            shape: [rows, cols, bands],
            warning: self.warning_text(),
        }
    }

    /// Three-band composite. Out-of-range indices are clamped to the last
    /// band; values are clipped to `[0, 1]` before scaling to 8 bits.
    pub fn rgb_preview(
        &self,
        selection: BandSelection,
        preview: &PreviewConfig,
    ) -> Result<EncodedImage> {
        let (height, width, band_count) = self.cube.shape();
        if band_count == 0 {
            return Err(HsiError::encode("cube has no bands"));
        }

        let bands = selection.clamp(band_count).as_array();
        if selection.is_grayscale() {
            log::info!("All channels use band {}, preview will be grayscale", bands[0]);
        }

        let data = self.cube.data();
        let rgb = Array3::from_shape_fn((height, width, 3), |(r, c, ch)| {
            (data[[r, c, bands[ch]]].clamp(0.0, 1.0) * 255.0) as u8
        });

        encode_preview(rgb.view(), preview.format, preview.jpeg_quality)
    }

    /// Mean (and optionally standard deviation) spectrum of `region`.
    pub fn spectrum(&self, region: &Region, include_std: bool) -> Result<SpectrumResponse> {
        let stats = extract(&self.cube, region)?.stats(include_std);
        Ok(SpectrumResponse {
            stats,
            bands: self.bands.clone(),
        })
    }

    pub fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult> {
        analysis::run_analysis(&self.cube, &self.bands, request)
    }

    pub fn classify(
        &self,
        annotations: &[Annotation],
        method: &str,
        include_std: bool,
    ) -> Result<AnalysisResult> {
        analysis::classify(&self.cube, &self.bands, annotations, method, include_std)
            .map(AnalysisResult::Classification)
    }
}

/// Session holding the active dataset.
pub struct Workspace {
    active: RwLock<Option<Arc<Dataset>>>,
    registry: ReaderRegistry,
}

impl Workspace {
    pub fn new() -> Self {
        Self::with_registry(ReaderRegistry::new())
    }

    pub fn with_registry(registry: ReaderRegistry) -> Self {
        Self {
            active: RwLock::new(None),
            registry,
        }
    }

    /// Load the dataset at `path` and make it active.
    ///
    /// On failure the previously active dataset stays in place.
    pub fn load(&self, path: &Path) -> Result<Arc<Dataset>> {
        let loaded = load_dataset_with(path, &self.registry)?;
        Ok(self.replace(Dataset::from_loaded(loaded, path)))
    }

    /// Materialise uploaded files, load them and make the result active.
    /// The scratch copy is removed before returning.
    pub fn load_upload(&self, files: &[UploadedFile]) -> Result<Arc<Dataset>> {
        let scratch = materialize_upload(files)?;
        let loaded = load_dataset_with(scratch.path(), &self.registry)?;
        let source = files
            .first()
            .map(|f| PathBuf::from(&f.name))
            .unwrap_or_default();
        Ok(self.replace(Dataset::from_loaded(loaded, source)))
    }

    /// Swap in `dataset`, returning the shared handle.
    pub fn replace(&self, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        *self.active.write() = Some(Arc::clone(&dataset));
        log::debug!("Active dataset replaced by {:?}", dataset.source());
        dataset
    }

    /// The active dataset, or `NoDataset` before the first load.
    pub fn current(&self) -> Result<Arc<Dataset>> {
        self.active.read().clone().ok_or(HsiError::NoDataset)
    }

    pub fn is_loaded(&self) -> bool {
        self.active.read().is_some()
    }

    pub fn clear(&self) {
        *self.active.write() = None;
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}
