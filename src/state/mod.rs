//! Session state: the active dataset and upload handling.

mod upload;
mod workspace;

pub use upload::{ScratchDir, UploadedFile, extract_zip, is_zip_name, materialize_upload};
pub use workspace::{Dataset, DatasetSummary, SpectrumResponse, Workspace};
