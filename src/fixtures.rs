//! Test fixtures: scratch directories and raster writers.

use std::path::{Path, PathBuf};

use ndarray::Array3;
use ndarray_npy::WriteNpyExt;

use crate::state::ScratchDir;

/// Fresh scratch directory, removed when the guard drops.
pub fn scratch_dir(name: &str) -> ScratchDir {
    ScratchDir::new(name).expect("create scratch directory")
}

/// Write `cube` as a little-endian float32 BIP ENVI pair `<stem>.hdr` /
/// `<stem>.raw` and return the header path.
pub fn write_envi(
    dir: &Path,
    stem: &str,
    cube: &Array3<f32>,
    wavelengths: Option<&[f64]>,
) -> PathBuf {
    let (lines, samples, bands) = cube.dim();
    let mut header = format!(
        "ENVI\ndescription = {{test fixture}}\n\
         samples = {samples}\nlines = {lines}\nbands = {bands}\nheader offset = 0\n\
         file type = ENVI Standard\ndata type = 4\ninterleave = bip\nbyte order = 0\n"
    );
    if let Some(wavelengths) = wavelengths {
        let list: Vec<String> = wavelengths.iter().map(|w| w.to_string()).collect();
        header.push_str(&format!("wavelength = {{\n {}\n}}\n", list.join(",\n ")));
    }

    let header_path = dir.join(format!("{stem}.hdr"));
    std::fs::write(&header_path, header).expect("write header");

    let payload: Vec<u8> = cube.iter().flat_map(|v| v.to_le_bytes()).collect();
    std::fs::write(dir.join(format!("{stem}.raw")), payload).expect("write payload");

    header_path
}

/// Write `cube` as `<stem>.npy` and return its path.
pub fn write_npy(dir: &Path, stem: &str, cube: &Array3<f32>) -> PathBuf {
    let path = dir.join(format!("{stem}.npy"));
    let file = std::fs::File::create(&path).expect("create npy");
    cube.write_npy(file).expect("write npy");
    path
}
