//! HSI Explorer - hyperspectral cube calibration and analysis core
//!
//! Loads ENVI or NumPy hyperspectral captures, applies dark/white reference
//! correction and answers the questions an interactive explorer asks of the
//! resulting reflectance cube: RGB previews, region spectra, PCA, k-means
//! segmentation and spectral angle mapper classification.
//!
//! The entry point for most callers is [`Workspace`], which owns the active
//! dataset and exposes every operation on it.

pub mod analysis;
pub mod codec;
pub mod color_utils;
pub mod config;
pub mod constants;
pub mod data;
pub mod error;
pub mod export;
pub mod hyperspectral;
pub mod model;
pub mod selection;
pub mod state;
pub mod stats;

#[cfg(test)]
mod fixtures;

pub use analysis::{AnalysisMethod, AnalysisRequest, AnalysisResult};
pub use config::AppConfig;
pub use data::{BandAxis, Cube, load_dataset};
pub use error::{HsiError, Result};
pub use hyperspectral::BandSelection;
pub use model::{Annotation, Region};
pub use state::{Dataset, Workspace};
