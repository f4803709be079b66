//! Region extraction: turn a [`Region`] into the pixel spectra it covers.
//!
//! Bounding boxes are half-open, `[x0, x1) × [y0, y1)`, and always clamped
//! to the image plane. Circle and polygon membership is evaluated at integer
//! pixel indices.

use ndarray::{Array2, s};
use serde::Serialize;

use crate::data::Cube;
use crate::error::{HsiError, Result};
use crate::model::{MIN_POLYGON_VERTICES, Region};
use crate::stats::column_mean_std;

/// Clamped pixel bounds used for an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x0: usize,
    pub y0: usize,
    /// Exclusive
    pub x1: usize,
    /// Exclusive
    pub y1: usize,
}

impl BoundingBox {
    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Floor the start and ceil the end of `[x0, x1] × [y0, y1]`, then clamp
    /// to a `width × height` plane.
    fn enclosing(x0: f64, y0: f64, x1: f64, y1: f64, width: usize, height: usize) -> Self {
        Self {
            x0: clamp_index(x0.floor(), width),
            y0: clamp_index(y0.floor(), height),
            x1: clamp_index(x1.ceil(), width),
            y1: clamp_index(y1.ceil(), height),
        }
    }
}

fn clamp_index(value: f64, max: usize) -> usize {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, max as f64) as usize
}

/// Pixel spectra covered by a region.
#[derive(Debug, Clone)]
pub struct Selection {
    /// (pixels × bands)
    pub pixels: Array2<f32>,
    pub bbox: BoundingBox,
}

impl Selection {
    pub fn pixel_count(&self) -> usize {
        self.pixels.nrows()
    }

    /// Mean spectrum and, if requested, population standard deviation.
    pub fn stats(&self, include_std: bool) -> SpectrumStats {
        let (mean, std) = column_mean_std(self.pixels.view(), include_std);
        SpectrumStats {
            mean,
            std,
            pixel_count: self.pixel_count(),
            bbox: self.bbox,
        }
    }
}

/// Aggregate spectrum of a selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumStats {
    #[serde(rename = "spectra")]
    pub mean: Vec<f64>,
    #[serde(rename = "stddev", skip_serializing_if = "Option::is_none")]
    pub std: Option<Vec<f64>>,
    pub pixel_count: usize,
    pub bbox: BoundingBox,
}

/// Extract the spectra of every pixel inside `region`.
///
/// Fails with `InvalidRegion` for a non-positive circle radius or a polygon
/// with too few vertices, and with `EmptySelection` whenever no pixel is
/// covered.
pub fn extract(cube: &Cube, region: &Region) -> Result<Selection> {
    let (height, width) = (cube.height(), cube.width());

    let selection = match region {
        Region::Rectangle {
            x0,
            y0,
            x1,
            y1,
            normalized,
        } => {
            let (sx, sy) = if *normalized {
                (width as f64, height as f64)
            } else {
                (1.0, 1.0)
            };
            let bbox = BoundingBox::enclosing(x0 * sx, y0 * sy, x1 * sx, y1 * sy, width, height);
            extract_box(cube, bbox)?
        }
        Region::Point { x, y } => {
            if width == 0 || height == 0 {
                return Err(HsiError::EmptySelection);
            }
            let px = clamp_index(x.round(), width - 1);
            let py = clamp_index(y.round(), height - 1);
            extract_box(
                cube,
                BoundingBox {
                    x0: px,
                    y0: py,
                    x1: px + 1,
                    y1: py + 1,
                },
            )?
        }
        Region::Circle { cx, cy, radius } => extract_circle(cube, *cx, *cy, *radius)?,
        Region::Polygon { points } => extract_polygon(cube, points)?,
    };

    log::debug!(
        "Extracted {} pixel(s) from {} in {:?}",
        selection.pixel_count(),
        region.kind(),
        selection.bbox
    );
    Ok(selection)
}

fn extract_box(cube: &Cube, bbox: BoundingBox) -> Result<Selection> {
    if bbox.is_empty() {
        return Err(HsiError::EmptySelection);
    }

    let bands = cube.num_bands();
    let pixels = cube
        .data()
        .slice(s![bbox.y0..bbox.y1, bbox.x0..bbox.x1, ..])
        .to_owned()
        .into_shape_with_order((bbox.area(), bands))?;

    Ok(Selection { pixels, bbox })
}

/// Gather pixels where `mask` (local to `bbox`) is set.
fn extract_masked(cube: &Cube, bbox: BoundingBox, mask: &Array2<bool>) -> Result<Selection> {
    let count = mask.iter().filter(|&&inside| inside).count();
    if count == 0 {
        return Err(HsiError::EmptySelection);
    }

    let data = cube.data();
    let mut pixels = Array2::<f32>::zeros((count, cube.num_bands()));
    let mut row = 0;
    for ((dy, dx), &inside) in mask.indexed_iter() {
        if inside {
            pixels
                .row_mut(row)
                .assign(&data.slice(s![bbox.y0 + dy, bbox.x0 + dx, ..]));
            row += 1;
        }
    }

    Ok(Selection { pixels, bbox })
}

fn extract_circle(cube: &Cube, cx: f64, cy: f64, radius: f64) -> Result<Selection> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(HsiError::invalid_region(format!(
            "circle radius must be positive, got {radius}"
        )));
    }

    // End bounds are floor + 1 so pixels exactly on the rim are kept
    let (width, height) = (cube.width(), cube.height());
    let bbox = BoundingBox {
        x0: clamp_index((cx - radius).floor(), width),
        y0: clamp_index((cy - radius).floor(), height),
        x1: clamp_index((cx + radius).floor() + 1.0, width),
        y1: clamp_index((cy + radius).floor() + 1.0, height),
    };
    if bbox.is_empty() {
        return Err(HsiError::EmptySelection);
    }

    let r2 = radius * radius;
    let mask = Array2::from_shape_fn((bbox.height(), bbox.width()), |(dy, dx)| {
        let x = (bbox.x0 + dx) as f64 - cx;
        let y = (bbox.y0 + dy) as f64 - cy;
        x * x + y * y <= r2
    });

    extract_masked(cube, bbox, &mask)
}

fn extract_polygon(cube: &Cube, points: &[(f64, f64)]) -> Result<Selection> {
    let points: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if points.len() < MIN_POLYGON_VERTICES {
        return Err(HsiError::invalid_region(format!(
            "polygon needs at least {MIN_POLYGON_VERTICES} points, got {}",
            points.len()
        )));
    }

    let (min_x, max_x, min_y, max_y) = points.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
        |(lx, hx, ly, hy), &(x, y)| (lx.min(x), hx.max(x), ly.min(y), hy.max(y)),
    );
    let bbox = BoundingBox::enclosing(min_x, min_y, max_x, max_y, cube.width(), cube.height());
    if bbox.is_empty() {
        return Err(HsiError::EmptySelection);
    }

    let mut mask = Array2::from_elem((bbox.height(), bbox.width()), false);
    let mut crossings = Vec::with_capacity(points.len());

    for dy in 0..bbox.height() {
        let y = (bbox.y0 + dy) as f64;

        crossings.clear();
        let mut previous = points[points.len() - 1];
        for &current in &points {
            let ((xi, yi), (xj, yj)) = (current, previous);
            if (yi <= y && y < yj) || (yj <= y && y < yi) {
                crossings.push(xi + (y - yi) * (xj - xi) / (yj - yi));
            }
            previous = current;
        }
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            let start = span[0].ceil().max(bbox.x0 as f64);
            let end = span[1].floor().min(bbox.x1 as f64 - 1.0);
            if start > end {
                continue;
            }
            for x in (start as usize)..=(end as usize) {
                mask[[dy, x - bbox.x0]] = true;
            }
        }
    }

    extract_masked(cube, bbox, &mask)
}
