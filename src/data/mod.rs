//! Cube data structures, raster readers and the calibration loader.
//!
//! This module provides:
//! - `Cube` / `BandAxis`: the calibrated reflectance cube and its band labels
//! - `ReaderRegistry`: extensible system for reading raster formats
//! - Built-in readers for ENVI header/raw pairs and NumPy (.npy) files
//! - `load_dataset`: reference discovery and radiometric correction
//!
//! ## Adding New Formats
//!
//! To add support for a new format (e.g., HDF5):
//!
//! 1. Create a new reader in `loaders/` implementing `RasterReader`
//! 2. Register it in `ReaderRegistry::new()`
//!
//! ```rust,ignore
//! use hsi_explorer::data::{RasterReader, LoaderError, RawRaster};
//!
//! pub struct MyFormatReader;
//!
//! impl RasterReader for MyFormatReader {
//!     fn id(&self) -> &'static str { "myformat" }
//!     fn display_name(&self) -> &'static str { "My Format" }
//!     fn extensions(&self) -> &'static [&'static str] { &["myf"] }
//!     fn read(&self, header: &Path) -> Result<RawRaster, LoaderError> { /* ... */ }
//! }
//! ```

mod calibration;
mod hyperspectral;
mod loader;
pub mod loaders;
pub mod metadata;

pub use calibration::{
    DatasetFiles, LoadWarning, LoadedDataset, ReferenceKind, calibrate, discover_files,
    load_dataset, load_dataset_with, normalize_uncalibrated, warning_text,
};
pub use hyperspectral::{BandAxis, Cube};
pub use loader::{LoaderError, RasterReader, RawRaster, ReaderRegistry};
