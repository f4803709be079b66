//! Labeled regions used as classifier training input.

use serde_json::Value;

use crate::color_utils::{Rgb, parse_hex_color};
use crate::error::{HsiError, Result};
use crate::model::region::Region;

/// Keys under which an annotation may carry its region.
const REGION_KEYS: &[&str] = &["region", "rect", "shape"];

/// A user-labeled training region.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub label: String,
    pub region: Region,
    /// Explicit display color, if one was given
    pub color: Option<Rgb>,
}

impl Annotation {
    pub fn new(label: impl Into<String>, region: Region) -> Self {
        Self {
            label: label.into(),
            region,
            color: None,
        }
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }

    /// Parse `{"label", "rect" | "region" | "shape", "color"?}`.
    ///
    /// An unparseable color is ignored; the class then takes a palette color.
    pub fn from_json(value: &Value) -> Result<Self> {
        let label = value
            .get("label")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .ok_or_else(|| HsiError::invalid_annotation("annotation is missing a label"))?;

        let region_value = REGION_KEYS
            .iter()
            .find_map(|key| value.get(*key).filter(|v| !v.is_null()))
            .ok_or_else(|| {
                HsiError::invalid_annotation(format!("annotation '{label}' is missing a region"))
            })?;
        let region = Region::from_json(region_value)?;

        let color = match value.get("color").and_then(Value::as_str) {
            Some(text) => {
                let parsed = parse_hex_color(text);
                if parsed.is_none() {
                    log::warn!("Ignoring invalid color '{}' for '{}'", text, label);
                }
                parsed
            }
            None => None,
        };

        Ok(Self {
            label: label.to_string(),
            region,
            color,
        })
    }
}

/// Parse a list of annotations, given either as a bare array or as
/// `{"annotations": [...]}`.
pub fn parse_annotations(value: &Value) -> Result<Vec<Annotation>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("annotations")
            .and_then(Value::as_array)
            .ok_or_else(|| HsiError::invalid_annotation("expected an 'annotations' array"))?,
        _ => return Err(HsiError::invalid_annotation("expected an array of annotations")),
    };

    items.iter().map(Annotation::from_json).collect()
}
