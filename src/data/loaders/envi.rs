//! Reader for ENVI header/raw pairs.
//!
//! The header is a text file starting with `ENVI` followed by `key = value`
//! lines. Values in braces may span several lines and are kept as lists,
//! except for free-text keys such as `description`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ndarray::Array3;

use crate::data::loader::{LoaderError, RasterReader, RawRaster};
use crate::data::metadata::{MetaValue, Metadata};

/// Payload extensions tried next to the header, in order.
const PAYLOAD_EXTENSIONS: &[&str] = &["raw", "RAW", "img", "IMG", "dat", "DAT", "bin", "BIN"];

/// Braced values that are free text rather than lists.
const TEXT_KEYS: &[&str] = &["description"];

/// Reader for ENVI `.hdr` files.
pub struct EnviReader;

impl RasterReader for EnviReader {
    fn id(&self) -> &'static str {
        "envi"
    }

    fn display_name(&self) -> &'static str {
        "ENVI Header + Raw"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["hdr"]
    }

    fn read(&self, header: &Path) -> Result<RawRaster, LoaderError> {
        let text = std::fs::read_to_string(header)?;
        let parsed = EnviHeader::parse(&text)?;
        let payload_path = find_payload(header)?;
        let payload = std::fs::read(&payload_path)?;

        log::debug!(
            "ENVI {:?}: {} lines x {} samples x {} bands, {:?}, {:?}",
            header,
            parsed.lines,
            parsed.samples,
            parsed.bands,
            parsed.data_type,
            parsed.interleave
        );

        let data = parsed.decode(&payload)?;
        Ok(RawRaster {
            data,
            metadata: parsed.metadata,
        })
    }

    fn priority(&self) -> i32 {
        10
    }
}

/// Locate the raw payload belonging to a header.
fn find_payload(header: &Path) -> Result<PathBuf, LoaderError> {
    PAYLOAD_EXTENSIONS
        .iter()
        .map(|ext| header.with_extension(ext))
        .chain(std::iter::once(header.with_extension("")))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| LoaderError::MissingPayload {
            header: header.to_path_buf(),
        })
}

/// Sample encoding declared by the `data type` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnviDataType {
    U8,
    I16,
    I32,
    F32,
    F64,
    U16,
    U32,
    I64,
    U64,
}

impl EnviDataType {
    fn from_code(code: u32) -> Result<Self, LoaderError> {
        Ok(match code {
            1 => Self::U8,
            2 => Self::I16,
            3 => Self::I32,
            4 => Self::F32,
            5 => Self::F64,
            12 => Self::U16,
            13 => Self::U32,
            14 => Self::I64,
            15 => Self::U64,
            other => return Err(LoaderError::unsupported("data type", other)),
        })
    }

    /// Bytes per sample.
    pub fn size(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 | Self::I64 | Self::U64 => 8,
        }
    }

    fn decode(&self, bytes: &[u8], big_endian: bool) -> f32 {
        macro_rules! read {
            ($t:ty, $n:expr) => {{
                let mut buf = [0u8; $n];
                buf.copy_from_slice(bytes);
                if big_endian {
                    <$t>::from_be_bytes(buf)
                } else {
                    <$t>::from_le_bytes(buf)
                }
            }};
        }

        match self {
            Self::U8 => f32::from(bytes[0]),
            Self::I16 => f32::from(read!(i16, 2)),
            Self::U16 => f32::from(read!(u16, 2)),
            Self::I32 => read!(i32, 4) as f32,
            Self::U32 => read!(u32, 4) as f32,
            Self::F32 => read!(f32, 4),
            Self::F64 => read!(f64, 8) as f32,
            Self::I64 => read!(i64, 8) as f32,
            Self::U64 => read!(u64, 8) as f32,
        }
    }
}

/// Storage order of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleave {
    /// Band sequential: (band, line, sample)
    Bsq,
    /// Band interleaved by line: (line, band, sample)
    Bil,
    /// Band interleaved by pixel: (line, sample, band)
    Bip,
}

impl Interleave {
    fn parse(value: &str) -> Result<Self, LoaderError> {
        match value.trim().to_lowercase().as_str() {
            "bsq" => Ok(Self::Bsq),
            "bil" => Ok(Self::Bil),
            "bip" => Ok(Self::Bip),
            other => Err(LoaderError::unsupported("interleave", other)),
        }
    }
}

/// Parsed ENVI header.
#[derive(Debug, Clone)]
pub struct EnviHeader {
    pub samples: usize,
    pub lines: usize,
    pub bands: usize,
    pub data_type: EnviDataType,
    pub interleave: Interleave,
    pub big_endian: bool,
    pub header_offset: usize,
    /// Every key/value pair, including the structural ones above
    pub metadata: Metadata,
}

impl EnviHeader {
    /// Parse header text.
    pub fn parse(text: &str) -> Result<Self, LoaderError> {
        let mut lines = text.lines();

        let magic = lines
            .by_ref()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default();
        if !magic.starts_with("ENVI") {
            return Err(LoaderError::invalid_header("missing ENVI signature"));
        }

        let mut metadata = Metadata::new();
        while let Some(line) = lines.next() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let mut value = value.trim().to_string();

            if value.starts_with('{') {
                while !value.contains('}') {
                    let Some(next) = lines.next() else {
                        return Err(LoaderError::invalid_header(format!(
                            "unterminated value for '{}'",
                            key
                        )));
                    };
                    value.push(' ');
                    value.push_str(next.trim());
                }
                metadata.insert(&key, braced_value(&key, &value));
            } else {
                metadata.insert(&key, MetaValue::Text(value));
            }
        }

        let samples = required_int(&metadata, "samples")?;
        let lines = required_int(&metadata, "lines")?;
        let bands = required_int(&metadata, "bands")?;
        let data_type = EnviDataType::from_code(required_int(&metadata, "data type")?)?;
        let interleave = match metadata.get_text("interleave") {
            Some(value) => Interleave::parse(value)?,
            None => Interleave::Bsq,
        };
        let big_endian = match optional_int::<u32>(&metadata, "byte order")? {
            None | Some(0) => false,
            Some(1) => true,
            Some(other) => return Err(LoaderError::unsupported("byte order", other)),
        };
        let header_offset = optional_int(&metadata, "header offset")?.unwrap_or(0);

        Ok(Self {
            samples,
            lines,
            bands,
            data_type,
            interleave,
            big_endian,
            header_offset,
            metadata,
        })
    }

    /// Decode a payload into a (line, sample, band) array.
    pub fn decode(&self, payload: &[u8]) -> Result<Array3<f32>, LoaderError> {
        let size = self.data_type.size();
        let expected = self
            .lines
            .checked_mul(self.samples)
            .and_then(|n| n.checked_mul(self.bands))
            .and_then(|n| n.checked_mul(size))
            .and_then(|n| n.checked_add(self.header_offset))
            .ok_or_else(|| LoaderError::invalid_header("raster size overflows"))?;
        if payload.len() < expected {
            return Err(LoaderError::SizeMismatch {
                expected,
                found: payload.len(),
            });
        }

        let values: Vec<f32> = payload[self.header_offset..expected]
            .chunks_exact(size)
            .map(|chunk| self.data_type.decode(chunk, self.big_endian))
            .collect();

        let (l, s, b) = (self.lines, self.samples, self.bands);
        let cube = match self.interleave {
            Interleave::Bsq => Array3::from_shape_vec((b, l, s), values)?.permuted_axes([1, 2, 0]),
            Interleave::Bil => Array3::from_shape_vec((l, b, s), values)?.permuted_axes([0, 2, 1]),
            Interleave::Bip => Array3::from_shape_vec((l, s, b), values)?,
        };

        Ok(cube.as_standard_layout().into_owned())
    }
}

fn braced_value(key: &str, value: &str) -> MetaValue {
    let inner = value
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim();

    if TEXT_KEYS.contains(&key) {
        return MetaValue::Text(inner.to_string());
    }

    MetaValue::List(
        inner
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| MetaValue::Text(item.to_string()))
            .collect(),
    )
}

fn optional_int<T: FromStr>(metadata: &Metadata, key: &str) -> Result<Option<T>, LoaderError> {
    match metadata.get_text(key) {
        None => Ok(None),
        Some(text) => text.trim().parse::<T>().map(Some).map_err(|_| {
            LoaderError::invalid_header(format!("'{}' is not an integer: {}", key, text))
        }),
    }
}

fn required_int<T: FromStr>(metadata: &Metadata, key: &str) -> Result<T, LoaderError> {
    optional_int(metadata, key)?
        .ok_or_else(|| LoaderError::invalid_header(format!("missing required key '{}'", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::metadata::extract_wavelengths;
    use crate::fixtures::{scratch_dir, write_envi};

    const HEADER: &str = "ENVI
description = {
  Test scene, line two}
samples = 3
lines = 2
bands = 2
header offset = 0
data type = 4
interleave = bsq
byte order = 0
wavelength = {
 450.0, 550.0
}
";

    #[test]
    fn test_parse_header() {
        let header = EnviHeader::parse(HEADER).expect("valid header");
        assert_eq!(header.samples, 3);
        assert_eq!(header.lines, 2);
        assert_eq!(header.bands, 2);
        assert_eq!(header.data_type, EnviDataType::F32);
        assert_eq!(header.interleave, Interleave::Bsq);
        assert!(!header.big_endian);
        assert_eq!(
            header.metadata.get_text("description"),
            Some("Test scene, line two")
        );
        assert_eq!(extract_wavelengths(&header.metadata), Some(vec![450.0, 550.0]));
    }

    #[test]
    fn test_missing_signature() {
        let result = EnviHeader::parse("samples = 3\n");
        assert!(matches!(result, Err(LoaderError::InvalidHeader { .. })));
    }

    #[test]
    fn test_missing_required_key() {
        let result = EnviHeader::parse("ENVI\nsamples = 3\nlines = 2\ndata type = 4\n");
        assert!(matches!(result, Err(LoaderError::InvalidHeader { .. })));
    }

    #[test]
    fn test_unsupported_data_type() {
        let text = "ENVI\nsamples = 1\nlines = 1\nbands = 1\ndata type = 6\n";
        let result = EnviHeader::parse(text);
        assert!(matches!(result, Err(LoaderError::Unsupported { what: "data type", .. })));
    }

    #[test]
    fn test_data_type_out_of_range() {
        let text = "ENVI\nsamples = 1\nlines = 1\nbands = 1\ndata type = 4294967297\n";
        let result = EnviHeader::parse(text);
        assert!(matches!(result, Err(LoaderError::InvalidHeader { .. })));
    }

    #[test]
    fn test_decode_oversized_raster() {
        let text = "ENVI\nsamples = 4294967296\nlines = 4294967296\nbands = 2\ndata type = 4\n";
        let header = EnviHeader::parse(text).unwrap();
        let result = header.decode(&[0u8; 16]);
        assert!(matches!(result, Err(LoaderError::InvalidHeader { .. })));
    }

    #[test]
    fn test_decode_interleaves_agree() {
        // Value encodes (line, sample, band) so every layout must decode identically
        let expected = Array3::from_shape_fn((2, 3, 2), |(l, s, b)| (l * 100 + s * 10 + b) as f32);
        let bytes = |order: [usize; 3]| -> Vec<u8> {
            let permuted = expected.view().permuted_axes(order);
            permuted
                .as_standard_layout()
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect()
        };

        for (interleave, order) in [
            (Interleave::Bsq, [2, 0, 1]),
            (Interleave::Bil, [0, 2, 1]),
            (Interleave::Bip, [0, 1, 2]),
        ] {
            let mut header = EnviHeader::parse(HEADER).unwrap();
            header.interleave = interleave;
            let decoded = header.decode(&bytes(order)).unwrap();
            assert_eq!(decoded, expected, "{:?}", interleave);
        }
    }

    #[test]
    fn test_decode_big_endian_u16_with_offset() {
        let text = "ENVI\nsamples = 2\nlines = 1\nbands = 1\ndata type = 12\n\
                    byte order = 1\nheader offset = 3\n";
        let header = EnviHeader::parse(text).unwrap();
        let payload = [0u8, 0, 0, 0x01, 0x00, 0x00, 0x02];
        let decoded = header.decode(&payload).unwrap();
        assert_eq!(decoded[[0, 0, 0]], 256.0);
        assert_eq!(decoded[[0, 1, 0]], 2.0);
    }

    #[test]
    fn test_decode_short_payload() {
        let header = EnviHeader::parse(HEADER).unwrap();
        let result = header.decode(&[0u8; 8]);
        assert!(matches!(
            result,
            Err(LoaderError::SizeMismatch {
                expected: 48,
                found: 8
            })
        ));
    }

    #[test]
    fn test_read_written_pair() {
        let dir = scratch_dir("envi-read");
        let cube = Array3::from_shape_fn((2, 2, 3), |(r, c, b)| (r * 6 + c * 3 + b) as f32);
        let header = write_envi(dir.path(), "scene", &cube, Some(&[400.0, 500.0, 600.0][..]));

        let raster = EnviReader.read(&header).expect("readable");
        assert_eq!(raster.data, cube);
        assert_eq!(
            extract_wavelengths(&raster.metadata),
            Some(vec![400.0, 500.0, 600.0])
        );
    }

    #[test]
    fn test_missing_payload() {
        let dir = scratch_dir("envi-nopayload");
        let header = dir.path().join("scene.hdr");
        std::fs::write(&header, HEADER).unwrap();
        let result = EnviReader.read(&header);
        assert!(matches!(result, Err(LoaderError::MissingPayload { .. })));
    }
}
