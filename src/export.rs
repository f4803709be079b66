//! Spectra export to CSV.
//!
//! One row per band: the band label followed by a reflectance column (and an
//! optional standard deviation column) for every exported series.

use std::io::Write;
use std::path::Path;

use crate::analysis::ClassSummary;
use crate::data::BandAxis;
use crate::error::{HsiError, Result};
use crate::selection::SpectrumStats;

/// A named spectrum to export.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSeries {
    pub label: String,
    pub mean: Vec<f64>,
    pub std: Option<Vec<f64>>,
}

impl SpectrumSeries {
    pub fn new(label: impl Into<String>, mean: Vec<f64>, std: Option<Vec<f64>>) -> Self {
        Self {
            label: label.into(),
            mean,
            std,
        }
    }

    /// Series for a region spectrum query.
    pub fn from_stats(label: impl Into<String>, stats: &SpectrumStats) -> Self {
        Self::new(label, stats.mean.clone(), stats.std.clone())
    }

    /// Series for the classified pixels of one class.
    pub fn from_class(class: &ClassSummary) -> Self {
        Self::new(
            class.label.clone(),
            class.classified.spectra.clone(),
            class.classified.stddev.clone(),
        )
    }
}

fn header(bands: &BandAxis, series: &[SpectrumSeries]) -> Vec<String> {
    let axis = if bands.is_physical() { "wavelength_nm" } else { "band" };
    let mut columns = vec![axis.to_string()];
    for s in series {
        columns.push(format!("{} reflectance", s.label));
        if s.std.is_some() {
            columns.push(format!("{} stddev", s.label));
        }
    }
    columns
}

fn cell(values: &[f64], band: usize) -> String {
    values.get(band).map(|v| v.to_string()).unwrap_or_default()
}

/// Write `series` as CSV rows keyed by `bands`.
///
/// Every series must have one value per band.
pub fn write_spectra_csv<W: Write>(
    writer: W,
    bands: &BandAxis,
    series: &[SpectrumSeries],
) -> Result<()> {
    for s in series {
        let lengths = std::iter::once(s.mean.len()).chain(s.std.as_ref().map(Vec::len));
        for found in lengths {
            if found != bands.len() {
                return Err(HsiError::SeriesLength {
                    label: s.label.clone(),
                    expected: bands.len(),
                    found,
                });
            }
        }
    }

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(header(bands, series))?;

    for band in 0..bands.len() {
        let mut record = vec![bands.value(band).map(|v| v.to_string()).unwrap_or_default()];
        for s in series {
            record.push(cell(&s.mean, band));
            if let Some(std) = &s.std {
                record.push(cell(std, band));
            }
        }
        csv.write_record(&record)?;
    }

    csv.flush()?;
    log::debug!("Exported {} series over {} bands", series.len(), bands.len());
    Ok(())
}

/// Render `series` as a CSV string.
pub fn spectra_csv(bands: &BandAxis, series: &[SpectrumSeries]) -> Result<String> {
    let mut buffer = Vec::new();
    write_spectra_csv(&mut buffer, bands, series)?;
    String::from_utf8(buffer).map_err(HsiError::encode)
}

/// Write `series` to a CSV file at `path`.
pub fn save_spectra_csv(path: &Path, bands: &BandAxis, series: &[SpectrumSeries]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_spectra_csv(file, bands, series)?;
    log::info!("Saved spectra to {:?}", path);
    Ok(())
}
