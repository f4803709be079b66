//! Materialising uploaded datasets on disk.
//!
//! Uploads arrive either as a set of files (relative path + bytes) or as a
//! single ZIP archive. Both are written into a [`ScratchDir`] that is removed
//! when dropped, whatever the outcome of the load.

use std::io::{Cursor, Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use zip::ZipArchive;

use crate::data::LoaderError;
use crate::error::{HsiError, Result};

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory deleted on drop.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create a fresh, uniquely named directory under the system temp dir.
    pub fn new(prefix: &str) -> std::io::Result<Self> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let sequence = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "hsi-explorer-{}-{}-{}-{}",
            prefix,
            std::process::id(),
            nanos,
            sequence
        );

        let path = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&path)?;
        log::debug!("Created scratch directory {:?}", path);
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => log::debug!("Removed scratch directory {:?}", self.path),
            Err(e) => log::warn!("Failed to remove scratch directory {:?}: {}", self.path, e),
        }
    }
}

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Path relative to the dataset root, `/` or `\` separated
    pub name: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Check if a file name has a ZIP extension.
pub fn is_zip_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

/// Safe relative location for an uploaded entry, or `None` for hidden files,
/// macOS metadata and anything escaping the root.
fn sanitize_entry(name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    let mut relative = PathBuf::new();

    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str()?;
                if part.starts_with('.') || part.eq_ignore_ascii_case("__MACOSX") {
                    return None;
                }
                relative.push(part);
            }
            Component::CurDir => {}
            // Absolute paths, drive prefixes and `..` are rejected
            _ => return None,
        }
    }

    (!relative.as_os_str().is_empty()).then_some(relative)
}

fn write_entry(root: &Path, relative: &Path, data: &[u8]) -> Result<()> {
    let target = root.join(relative);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, data)?;
    log::trace!("Wrote {:?} ({} bytes)", relative, data.len());
    Ok(())
}

/// Extract every acceptable file of a ZIP archive into `root`.
///
/// Returns the number of files written.
pub fn extract_zip<R: Read + Seek>(reader: R, archive_name: &str, root: &Path) -> Result<usize> {
    let archive_error = |source: LoaderError| HsiError::LoadFailure {
        path: PathBuf::from(archive_name),
        source,
    };

    let mut archive = ZipArchive::new(reader).map_err(|e| archive_error(e.into()))?;
    log::debug!("ZIP '{}' contains {} entries", archive_name, archive.len());

    let mut written = 0;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| archive_error(e.into()))?;
        if file.is_dir() {
            continue;
        }

        let name = file.name().to_string();
        let Some(relative) = sanitize_entry(&name) else {
            log::trace!("Skipping ZIP entry: {}", name);
            continue;
        };

        let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut data)
            .map_err(|e| archive_error(e.into()))?;
        write_entry(root, &relative, &data)?;
        written += 1;
    }

    log::info!("Extracted {} file(s) from ZIP '{}'", written, archive_name);
    Ok(written)
}

/// Write uploaded files into a new scratch directory.
///
/// A single `.zip` upload is extracted; otherwise every file is written at
/// its sanitised relative path. Fails with `DatasetNotFound` when nothing
/// usable was uploaded.
pub fn materialize_upload(files: &[UploadedFile]) -> Result<ScratchDir> {
    let scratch = ScratchDir::new("upload")?;

    let written = match files {
        [single] if is_zip_name(&single.name) => {
            extract_zip(Cursor::new(single.data.as_slice()), &single.name, scratch.path())?
        }
        _ => {
            let mut written = 0;
            for file in files {
                match sanitize_entry(&file.name) {
                    Some(relative) => {
                        write_entry(scratch.path(), &relative, &file.data)?;
                        written += 1;
                    }
                    None => log::warn!("Skipping uploaded file '{}'", file.name),
                }
            }
            written
        }
    };

    if written == 0 {
        return Err(HsiError::DatasetNotFound {
            path: scratch.path().to_path_buf(),
        });
    }
    Ok(scratch)
}
