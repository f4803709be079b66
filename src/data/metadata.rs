//! Key/value metadata attached to raster files and wavelength extraction.

use std::collections::HashMap;

/// Keys searched, in order, for wavelength information.
pub const WAVELENGTH_KEYS: [&str; 4] = ["wavelength", "wavelengths", "band names", "bands"];

/// Characters stripped from both ends of a delimited wavelength string.
const LIST_DELIMITERS: &[char] = &['{', '}', '[', ']', '(', ')'];

/// A metadata value as produced by a format reader.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    /// Plain or delimited text
    Text(String),
    Number(f64),
    /// A native sequence
    List(Vec<MetaValue>),
}

impl MetaValue {
    /// Build a value from JSON (used for NumPy sidecar files).
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(MetaValue::Text(s.clone())),
            serde_json::Value::Number(n) => n.as_f64().map(MetaValue::Number),
            serde_json::Value::Array(items) => Some(MetaValue::List(
                items.iter().filter_map(MetaValue::from_json).collect(),
            )),
            serde_json::Value::Bool(b) => Some(MetaValue::Text(b.to_string())),
            serde_json::Value::Null | serde_json::Value::Object(_) => None,
        }
    }
}

/// Metadata dictionary with case-insensitive keys.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    entries: HashMap<String, MetaValue>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value; keys are trimmed and lowercased.
    pub fn insert(&mut self, key: &str, value: MetaValue) {
        self.entries.insert(key.trim().to_lowercase(), value);
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.get(&key.trim().to_lowercase())
    }

    /// Look up a value and interpret it as text.
    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            MetaValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Build metadata from a JSON object. Non-object input yields empty metadata.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut metadata = Self::new();
        if let serde_json::Value::Object(map) = value {
            for (key, value) in map {
                if let Some(value) = MetaValue::from_json(value) {
                    metadata.insert(key, value);
                }
            }
        }
        metadata
    }
}

/// Parse one metadata value into a list of wavelengths.
///
/// Text is stripped of surrounding brace/bracket characters and split on
/// commas; entries that fail numeric parsing are dropped. Returns `None` when
/// nothing numeric remains.
pub fn parse_wavelengths(value: &MetaValue) -> Option<Vec<f64>> {
    let wavelengths: Vec<f64> = match value {
        MetaValue::Text(text) => text
            .trim()
            .trim_matches(LIST_DELIMITERS)
            .split(',')
            .filter_map(|item| item.trim().parse::<f64>().ok())
            .collect(),
        MetaValue::Number(n) => vec![*n],
        MetaValue::List(items) => items
            .iter()
            .filter_map(|item| match item {
                MetaValue::Number(n) => Some(*n),
                MetaValue::Text(s) => s.trim().parse::<f64>().ok(),
                MetaValue::List(_) => None,
            })
            .collect(),
    };

    (!wavelengths.is_empty()).then_some(wavelengths)
}

/// Find wavelengths under the first key in [`WAVELENGTH_KEYS`] that parses.
pub fn extract_wavelengths(metadata: &Metadata) -> Option<Vec<f64>> {
    if metadata.is_empty() {
        return None;
    }

    WAVELENGTH_KEYS
        .iter()
        .filter_map(|key| metadata.get(key))
        .find_map(parse_wavelengths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delimited_string() {
        let value = MetaValue::Text(" { 400.5, 500 , 600 } ".to_string());
        assert_eq!(parse_wavelengths(&value), Some(vec![400.5, 500.0, 600.0]));

        let value = MetaValue::Text("[1, 2, 3]".to_string());
        assert_eq!(parse_wavelengths(&value), Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_parse_drops_non_numeric_entries() {
        let value = MetaValue::List(vec![
            MetaValue::Text("450".to_string()),
            MetaValue::Text("n/a".to_string()),
            MetaValue::Number(550.0),
        ]);
        assert_eq!(parse_wavelengths(&value), Some(vec![450.0, 550.0]));
    }

    #[test]
    fn test_parse_all_invalid_is_none() {
        let value = MetaValue::Text("{Band 1, Band 2}".to_string());
        assert_eq!(parse_wavelengths(&value), None);
    }

    #[test]
    fn test_extract_uses_key_order() {
        let mut metadata = Metadata::new();
        metadata.insert("bands", MetaValue::Text("3".to_string()));
        metadata.insert("Wavelength", MetaValue::Text("{1, 2, 3}".to_string()));
        assert_eq!(extract_wavelengths(&metadata), Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_extract_skips_unparseable_key() {
        let mut metadata = Metadata::new();
        metadata.insert("band names", MetaValue::Text("{red, green}".to_string()));
        metadata.insert("wavelengths", MetaValue::Text("{10, 20}".to_string()));
        assert_eq!(extract_wavelengths(&metadata), Some(vec![10.0, 20.0]));
    }

    #[test]
    fn test_extract_absent() {
        assert_eq!(extract_wavelengths(&Metadata::new()), None);

        let mut metadata = Metadata::new();
        metadata.insert("description", MetaValue::Text("scene".to_string()));
        assert_eq!(extract_wavelengths(&metadata), None);
    }

    #[test]
    fn test_metadata_from_json() {
        let json = serde_json::json!({"Wavelength": [400, "500", 600.5], "sensor": "vnir"});
        let metadata = Metadata::from_json(&json);
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata.get_text("SENSOR"), Some("vnir"));
        assert_eq!(extract_wavelengths(&metadata), Some(vec![400.0, 500.0, 600.5]));
    }
}
