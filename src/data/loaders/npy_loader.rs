//! Reader for NumPy `.npy` cubes.
//!
//! Arrays are read as raw sensor values; scaling to reflectance happens in
//! calibration. Wavelengths and other metadata may be supplied in a JSON
//! sidecar next to the array (`cube.npy` + `cube.json`).

use std::io::Cursor;
use std::path::Path;

use ndarray::{Array3, ArrayD, Ix2, Ix3};
use ndarray_npy::ReadNpyExt;

use crate::data::loader::{LoaderError, RasterReader, RawRaster};
use crate::data::metadata::Metadata;

/// Reader for NumPy `.npy` files.
///
/// **Expected array shapes** (row, column convention):
/// - 2D `(H, W)`: single band
/// - 3D `(H, W, B)`: channels last
///
/// Supported data types: `f32`, `f64`, `u8`, `u16`, `i16`, `i32`.
pub struct NpyReader;

impl NpyReader {
    /// NumPy magic bytes: \x93NUMPY
    const MAGIC: &'static [u8] = &[0x93, b'N', b'U', b'M', b'P', b'Y'];

    /// Check for the NumPy signature.
    pub fn has_magic(data: &[u8]) -> bool {
        data.len() >= Self::MAGIC.len() && data.starts_with(Self::MAGIC)
    }

    /// Convert any supported dimensionality to a (row, column, band) cube.
    fn array_to_cube<T: RawSample + Copy>(array: ArrayD<T>) -> Result<Array3<f32>, LoaderError> {
        let array = array.mapv(RawSample::to_f32);
        log::debug!("NpyReader: array shape = {:?}", array.shape());

        match array.ndim() {
            2 => {
                let plane = array.into_dimensionality::<Ix2>()?;
                Ok(plane.insert_axis(ndarray::Axis(2)))
            }
            3 => Ok(array.into_dimensionality::<Ix3>()?),
            n => Err(LoaderError::unsupported("array dimensions", n)),
        }
    }

    fn decode(data: &[u8]) -> Result<Array3<f32>, LoaderError> {
        let mut cursor = Cursor::new(data);

        // f32 is most common for scientific data
        if let Ok(array) = ArrayD::<f32>::read_npy(&mut cursor) {
            return Self::array_to_cube(array);
        }

        cursor.set_position(0);
        if let Ok(array) = ArrayD::<f64>::read_npy(&mut cursor) {
            return Self::array_to_cube(array);
        }

        cursor.set_position(0);
        if let Ok(array) = ArrayD::<u16>::read_npy(&mut cursor) {
            return Self::array_to_cube(array);
        }

        cursor.set_position(0);
        if let Ok(array) = ArrayD::<u8>::read_npy(&mut cursor) {
            return Self::array_to_cube(array);
        }

        cursor.set_position(0);
        if let Ok(array) = ArrayD::<i16>::read_npy(&mut cursor) {
            return Self::array_to_cube(array);
        }

        // Last attempt reports its own error
        cursor.set_position(0);
        let array = ArrayD::<i32>::read_npy(&mut cursor)?;
        Self::array_to_cube(array)
    }

    fn read_sidecar(path: &Path) -> Result<Metadata, LoaderError> {
        let sidecar = path.with_extension("json");
        if !sidecar.is_file() {
            return Ok(Metadata::new());
        }

        let text = std::fs::read_to_string(&sidecar)?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        log::debug!("NpyReader: metadata sidecar {:?}", sidecar);
        Ok(Metadata::from_json(&value))
    }
}

impl RasterReader for NpyReader {
    fn id(&self) -> &'static str {
        "npy"
    }

    fn display_name(&self) -> &'static str {
        "NumPy Array (.npy)"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["npy"]
    }

    fn read(&self, path: &Path) -> Result<RawRaster, LoaderError> {
        let bytes = std::fs::read(path)?;
        if !Self::has_magic(&bytes) {
            return Err(LoaderError::unsupported("file signature", path.display()));
        }

        let data = Self::decode(&bytes)?;
        let metadata = Self::read_sidecar(path)?;

        log::debug!(
            "NpyReader: loaded {}x{} with {} bands",
            data.dim().0,
            data.dim().1,
            data.dim().2
        );

        Ok(RawRaster { data, metadata })
    }
}

/// Conversion of stored sample types to f32 without rescaling.
trait RawSample {
    fn to_f32(self) -> f32;
}

impl RawSample for f32 {
    fn to_f32(self) -> f32 {
        self
    }
}

impl RawSample for f64 {
    fn to_f32(self) -> f32 {
        self as f32
    }
}

impl RawSample for u8 {
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl RawSample for u16 {
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl RawSample for i16 {
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl RawSample for i32 {
    fn to_f32(self) -> f32 {
        self as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::metadata::extract_wavelengths;
    use crate::fixtures::{scratch_dir, write_npy};
    use ndarray::Array2;

    #[test]
    fn test_reader_metadata() {
        let reader = NpyReader;
        assert_eq!(reader.id(), "npy");
        assert!(reader.extensions().contains(&"npy"));
        assert_eq!(reader.priority(), 0);
    }

    #[test]
    fn test_magic_detection() {
        let valid_magic = [0x93, b'N', b'U', b'M', b'P', b'Y', 0x01, 0x00];
        assert!(NpyReader::has_magic(&valid_magic));

        let invalid = [0x89, 0x50, 0x4E, 0x47]; // PNG magic
        assert!(!NpyReader::has_magic(&invalid));
    }

    #[test]
    fn test_read_cube_with_sidecar() {
        let dir = scratch_dir("npy-cube");
        let cube = Array3::from_shape_fn((3, 2, 4), |(r, c, b)| (r + c + b) as f32 * 10.0);
        let path = write_npy(dir.path(), "cube", &cube);
        std::fs::write(
            dir.path().join("cube.json"),
            r#"{"wavelength": [400, 450, 500, 550]}"#,
        )
        .unwrap();

        let raster = NpyReader.read(&path).expect("readable");
        assert_eq!(raster.data, cube);
        assert_eq!(
            extract_wavelengths(&raster.metadata),
            Some(vec![400.0, 450.0, 500.0, 550.0])
        );
    }

    #[test]
    fn test_read_single_band_u16() {
        use ndarray_npy::WriteNpyExt;

        let dir = scratch_dir("npy-u16");
        let plane = Array2::from_shape_fn((2, 3), |(r, c)| (r * 1000 + c) as u16);
        let path = dir.path().join("plane.npy");
        let mut file = std::fs::File::create(&path).unwrap();
        plane.write_npy(&mut file).unwrap();

        let raster = NpyReader.read(&path).expect("readable");
        assert_eq!(raster.data.dim(), (2, 3, 1));
        assert_eq!(raster.data[[1, 2, 0]], 1002.0);
        assert!(raster.metadata.is_empty());
    }

    #[test]
    fn test_rejects_non_npy_bytes() {
        let dir = scratch_dir("npy-bad");
        let path = dir.path().join("fake.npy");
        std::fs::write(&path, b"not a numpy file").unwrap();
        assert!(matches!(
            NpyReader.read(&path),
            Err(LoaderError::Unsupported { .. })
        ));
    }
}
