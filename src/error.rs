//! Error types surfaced at the request boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::data::LoaderError;

/// Errors returned by dataset loading and analysis operations.
///
/// Every variant is recoverable: the transport layer maps it to a status via
/// [`HsiError::status_code`] and shows the `Display` text to the user.
#[derive(Error, Debug)]
pub enum HsiError {
    /// No data header could be located in the target directory
    #[error("Missing data header file in {path:?}")]
    DatasetNotFound {
        /// Directory that was searched
        path: PathBuf,
    },

    /// A header or raw file could not be read or decoded
    #[error("Failed to load dataset from {path:?}: {source}")]
    LoadFailure {
        /// File that failed to load
        path: PathBuf,
        /// Underlying reader error
        #[source]
        source: LoaderError,
    },

    /// An operation needs a dataset but none has been loaded yet
    #[error("No cube loaded")]
    NoDataset,

    /// Malformed spatial selection
    #[error("Invalid region: {message}")]
    InvalidRegion {
        /// What is wrong with the region
        message: String,
    },

    /// The region covers no pixels of the cube
    #[error("Empty selection")]
    EmptySelection,

    /// Malformed supervised classification input
    #[error("Invalid annotation: {message}")]
    InvalidAnnotation {
        /// What is wrong with the annotations
        message: String,
    },

    /// A class mean spectrum has no usable signature
    #[error("Class '{label}' has a degenerate mean spectrum")]
    DegenerateClass {
        /// Label of the offending class
        label: String,
    },

    /// Image encoding failed
    #[error("Failed to encode image: {message}")]
    EncodeError {
        /// Encoder message
        message: String,
    },

    /// Unknown analysis or classification method name
    #[error("Unsupported method: {method}")]
    UnsupportedMethod {
        /// The requested method name
        method: String,
    },

    /// Array reshape failed
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Configuration could not be read or written
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error outside of dataset decoding
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Spectra export failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An exported spectrum does not have one value per band
    #[error("Series '{label}' has {found} values for {expected} bands")]
    SeriesLength {
        /// Label of the offending series
        label: String,
        /// Number of bands on the axis
        expected: usize,
        /// Number of values in the series
        found: usize,
    },
}

impl HsiError {
    /// Create an invalid region error with a message.
    pub fn invalid_region(message: impl Into<String>) -> Self {
        Self::InvalidRegion {
            message: message.into(),
        }
    }

    /// Create an invalid annotation error with a message.
    pub fn invalid_annotation(message: impl Into<String>) -> Self {
        Self::InvalidAnnotation {
            message: message.into(),
        }
    }

    /// Create an encode error from any displayable encoder failure.
    pub fn encode(message: impl std::fmt::Display) -> Self {
        Self::EncodeError {
            message: message.to_string(),
        }
    }

    /// Create an unsupported method error.
    pub fn unsupported_method(method: impl Into<String>) -> Self {
        Self::UnsupportedMethod {
            method: method.into(),
        }
    }

    /// HTTP-style status the transport layer should report for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            HsiError::DatasetNotFound { .. } | HsiError::NoDataset => 404,
            HsiError::InvalidRegion { .. }
            | HsiError::EmptySelection
            | HsiError::InvalidAnnotation { .. }
            | HsiError::DegenerateClass { .. }
            | HsiError::UnsupportedMethod { .. }
            | HsiError::Json(_) => 400,
            HsiError::LoadFailure { .. }
            | HsiError::EncodeError { .. }
            | HsiError::Shape(_)
            | HsiError::Config(_)
            | HsiError::Io(_)
            | HsiError::Csv(_)
            | HsiError::SeriesLength { .. } => 500,
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = HsiError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(HsiError::EmptySelection.status_code(), 400);
        assert_eq!(HsiError::NoDataset.status_code(), 404);
        assert_eq!(
            HsiError::DatasetNotFound {
                path: PathBuf::from("/tmp")
            }
            .status_code(),
            404
        );
        assert_eq!(HsiError::encode("boom").status_code(), 500);
    }

    #[test]
    fn test_messages() {
        assert_eq!(HsiError::EmptySelection.to_string(), "Empty selection");
        assert_eq!(
            HsiError::unsupported_method("ica").to_string(),
            "Unsupported method: ica"
        );
        assert_eq!(
            HsiError::invalid_region("radius must be positive").to_string(),
            "Invalid region: radius must be positive"
        );
    }
}
