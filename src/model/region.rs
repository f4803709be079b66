//! Spatial selections over the cube's image plane.
//!
//! Regions arrive as JSON objects tagged by `type` (default `rectangle`) and
//! are parsed into [`Region`], one variant per primitive.

use serde_json::{Map, Value};

use crate::error::{HsiError, Result};

/// Minimum number of vertices required for a valid polygon.
pub const MIN_POLYGON_VERTICES: usize = 3;

/// A geometric selection in pixel (or, for rectangles, normalized) units.
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// Axis-aligned box with `x0 <= x1`, `y0 <= y1`.
    Rectangle {
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        /// Coordinates are fractions of width/height
        normalized: bool,
    },
    /// Single pixel nearest to `(x, y)`.
    Point { x: f64, y: f64 },
    Circle { cx: f64, cy: f64, radius: f64 },
    Polygon { points: Vec<(f64, f64)> },
}

impl Region {
    /// Rectangle from two corners in any order, absolute pixel units.
    pub fn rectangle(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Region::Rectangle {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
            normalized: false,
        }
    }

    /// Rectangle in fractions of the image size.
    pub fn normalized_rectangle(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        match Self::rectangle(x0, y0, x1, y1) {
            Region::Rectangle { x0, y0, x1, y1, .. } => Region::Rectangle {
                x0,
                y0,
                x1,
                y1,
                normalized: true,
            },
            other => other,
        }
    }

    /// Name of the primitive, as used in the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Region::Rectangle { .. } => "rectangle",
            Region::Point { .. } => "point",
            Region::Circle { .. } => "circle",
            Region::Polygon { .. } => "polygon",
        }
    }

    /// Parse a region description.
    ///
    /// Accepted shapes:
    /// - `{"type": "rectangle", "x0", "y0", "x1", "y1", "normalized"?}` or
    ///   the older `{"x", "y", "width", "height"}` form
    /// - `{"type": "point", "x", "y"}`
    /// - `{"type": "circle", "cx", "cy", "radius"}`
    /// - `{"type": "polygon", "points": [{"x", "y"} | [x, y], ...]}`
    ///
    /// Numbers may be given as numeric strings. A rectangle without a
    /// `normalized` flag is read as fractions of the image when all of its
    /// corners lie in `[0, 1]`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| HsiError::invalid_region("region must be a JSON object"))?;

        let kind = match obj.get("type") {
            None | Some(Value::Null) => "rectangle".to_string(),
            Some(Value::String(s)) => s.trim().to_lowercase(),
            Some(other) => {
                return Err(HsiError::invalid_region(format!(
                    "region type must be a string, got {other}"
                )));
            }
        };

        match kind.as_str() {
            "rectangle" | "rect" => parse_rectangle(obj),
            "point" => Ok(Region::Point {
                x: required(obj, "x")?,
                y: required(obj, "y")?,
            }),
            "circle" => Ok(Region::Circle {
                cx: required(obj, "cx")?,
                cy: required(obj, "cy")?,
                radius: required(obj, "radius")?,
            }),
            "polygon" => parse_polygon(obj),
            other => Err(HsiError::invalid_region(format!(
                "unsupported region type '{other}'"
            ))),
        }
    }
}

/// Interpret a JSON value as a finite number.
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn optional(obj: &Map<String, Value>, key: &str) -> Result<Option<f64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_number(value)
            .map(Some)
            .ok_or_else(|| HsiError::invalid_region(format!("'{key}' must be numeric"))),
    }
}

fn required(obj: &Map<String, Value>, key: &str) -> Result<f64> {
    optional(obj, key)?.ok_or_else(|| HsiError::invalid_region(format!("missing '{key}'")))
}

fn parse_rectangle(obj: &Map<String, Value>) -> Result<Region> {
    let (x0, y0, x1, y1) = if obj.contains_key("x0") || obj.contains_key("x1") {
        (
            required(obj, "x0")?,
            required(obj, "y0")?,
            required(obj, "x1")?,
            required(obj, "y1")?,
        )
    } else if obj.contains_key("width") || obj.contains_key("height") {
        let x = required(obj, "x")?;
        let y = required(obj, "y")?;
        (x, y, x + required(obj, "width")?, y + required(obj, "height")?)
    } else {
        return Err(HsiError::invalid_region(
            "rectangle requires x0, y0, x1 and y1",
        ));
    };

    // Without an explicit flag, corners inside the unit square are fractions
    let normalized = match obj.get("normalized") {
        None | Some(Value::Null) => [x0, y0, x1, y1].iter().all(|v| (0.0..=1.0).contains(v)),
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return Err(HsiError::invalid_region("'normalized' must be a boolean")),
    };

    Ok(if normalized {
        Region::normalized_rectangle(x0, y0, x1, y1)
    } else {
        Region::rectangle(x0, y0, x1, y1)
    })
}

fn parse_point(value: &Value) -> Option<(f64, f64)> {
    match value {
        Value::Object(p) => Some((as_number(p.get("x")?)?, as_number(p.get("y")?)?)),
        Value::Array(pair) if pair.len() >= 2 => Some((as_number(&pair[0])?, as_number(&pair[1])?)),
        _ => None,
    }
}

fn parse_polygon(obj: &Map<String, Value>) -> Result<Region> {
    let raw = obj
        .get("points")
        .and_then(Value::as_array)
        .ok_or_else(|| HsiError::invalid_region("polygon requires a 'points' array"))?;

    let points: Vec<(f64, f64)> = raw.iter().filter_map(parse_point).collect();
    if points.len() < MIN_POLYGON_VERTICES {
        return Err(HsiError::invalid_region(format!(
            "polygon needs at least {MIN_POLYGON_VERTICES} valid points, got {}",
            points.len()
        )));
    }

    Ok(Region::Polygon { points })
}
