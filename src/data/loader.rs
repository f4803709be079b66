//! Trait-based raster reading.
//!
//! Each on-disk format implements [`RasterReader`], turning a header path into
//! an uncalibrated (row, column, band) array plus its metadata. The
//! [`ReaderRegistry`] picks a reader by header extension.
//!
//! ## Supported Formats
//!
//! - **ENVI**: `.hdr` header plus a raw payload (`.raw`, `.img`, `.dat`, `.bin`)
//! - **NumPy Arrays**: `.npy` files with (rows, cols, bands) or (rows, cols) arrays
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hsi_explorer::data::ReaderRegistry;
//!
//! let registry = ReaderRegistry::new();
//! let raster = registry.read(Path::new("scene.hdr"))?;
//! ```

use std::path::{Path, PathBuf};

use ndarray::Array3;
use thiserror::Error;

use crate::data::metadata::Metadata;

/// Error type for reader operations.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// I/O error while reading a header or payload
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Header text is malformed or lacks a required key
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the problem
        message: String,
    },

    /// Header declares something the reader cannot decode
    #[error("Unsupported {what}: {value}")]
    Unsupported {
        /// Which property is unsupported
        what: &'static str,
        /// The offending value
        value: String,
    },

    /// No raw payload file sits next to the header
    #[error("No raw data file found for header {header:?}")]
    MissingPayload {
        /// The header whose payload is missing
        header: PathBuf,
    },

    /// Payload holds fewer bytes than the header promises
    #[error("Expected {expected} bytes of raster data, found {found}")]
    SizeMismatch {
        /// Bytes required by the header
        expected: usize,
        /// Bytes actually present
        found: usize,
    },

    /// Calibration reference does not line up with the data cube
    #[error("Reference shape {reference:?} does not match data shape {data:?}")]
    ReferenceMismatch {
        /// (columns, bands) of the reference mean
        reference: (usize, usize),
        /// (columns, bands) of the data cube
        data: (usize, usize),
    },

    /// NumPy array could not be read
    #[error("NumPy error: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    /// Decoded values do not fit the declared shape
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Sidecar metadata is not valid JSON
    #[error("Metadata error: {0}")]
    Json(#[from] serde_json::Error),

    /// Uploaded ZIP archive could not be read
    #[error("Failed to read ZIP archive: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl LoaderError {
    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create an unsupported-property error.
    pub fn unsupported(what: &'static str, value: impl ToString) -> Self {
        Self::Unsupported {
            what,
            value: value.to_string(),
        }
    }
}

/// Uncalibrated raster as read from disk.
#[derive(Debug, Clone)]
pub struct RawRaster {
    /// Samples with axes (row, column, band)
    pub data: Array3<f32>,
    /// Format-specific key/value metadata
    pub metadata: Metadata,
}

/// Trait for raster format readers.
pub trait RasterReader: Send + Sync {
    /// Unique identifier for this reader (e.g., "envi", "npy").
    fn id(&self) -> &'static str;

    /// Human-readable name.
    fn display_name(&self) -> &'static str;

    /// Header file extensions this reader handles (lowercase, without dots).
    fn extensions(&self) -> &'static [&'static str];

    /// Read the raster described by `header`.
    fn read(&self, header: &Path) -> Result<RawRaster, LoaderError>;

    /// Priority when several readers claim an extension (higher first).
    fn priority(&self) -> i32 {
        0
    }
}

/// Registry of available raster readers.
pub struct ReaderRegistry {
    readers: Vec<Box<dyn RasterReader>>,
}

impl ReaderRegistry {
    /// Create a new registry with all built-in readers.
    pub fn new() -> Self {
        let mut registry = Self {
            readers: Vec::new(),
        };

        registry.register(Box::new(super::loaders::EnviReader));
        registry.register(Box::new(super::loaders::NpyReader));

        registry
    }

    /// Register a new reader.
    pub fn register(&mut self, reader: Box<dyn RasterReader>) {
        self.readers.push(reader);
        self.readers.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// Get all supported header extensions.
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        let mut extensions: Vec<&'static str> = self
            .readers
            .iter()
            .flat_map(|r| r.extensions().iter().copied())
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }

    /// Find the reader responsible for a header path.
    pub fn reader_for(&self, path: &Path) -> Option<&dyn RasterReader> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.readers
            .iter()
            .find(|r| r.extensions().iter().any(|e| *e == ext))
            .map(|r| r.as_ref())
    }

    /// Check if a path names a header some reader understands.
    pub fn is_header(&self, path: &Path) -> bool {
        self.reader_for(path).is_some()
    }

    /// Read a raster, choosing the reader by extension.
    pub fn read(&self, path: &Path) -> Result<RawRaster, LoaderError> {
        let reader = self.reader_for(path).ok_or_else(|| {
            LoaderError::unsupported("file type", path.display())
        })?;

        log::debug!("Reading {:?} with {} reader", path, reader.id());
        reader.read(path)
    }

    /// Get all registered readers.
    pub fn readers(&self) -> &[Box<dyn RasterReader>] {
        &self.readers
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_readers() {
        let registry = ReaderRegistry::new();
        assert_eq!(registry.readers().len(), 2);
    }

    #[test]
    fn test_supported_extensions() {
        let registry = ReaderRegistry::new();
        assert_eq!(registry.supported_extensions(), vec!["hdr", "npy"]);
    }

    #[test]
    fn test_is_header() {
        let registry = ReaderRegistry::new();

        assert!(registry.is_header(Path::new("scene.hdr")));
        assert!(registry.is_header(Path::new("SCENE.HDR"))); // case insensitive
        assert!(registry.is_header(Path::new("cube.npy")));
        assert!(!registry.is_header(Path::new("scene.raw")));
        assert!(!registry.is_header(Path::new("README")));
    }

    #[test]
    fn test_read_unknown_extension() {
        let registry = ReaderRegistry::new();
        let result = registry.read(Path::new("notes.txt"));
        assert!(matches!(result, Err(LoaderError::Unsupported { .. })));
    }
}
