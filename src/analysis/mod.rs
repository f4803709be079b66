//! Analysis algorithms over the loaded cube.
//!
//! - `pca`: principal components rendered as grayscale maps
//! - `kmeans`: unsupervised spectral segmentation
//! - `sam`: supervised spectral angle mapper classification
//!
//! Results serialize to the JSON shapes remote callers consume, with encoded
//! images as hex strings.

mod kmeans;
mod pca;
mod sam;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::data::{BandAxis, Cube};
use crate::error::{HsiError, Result};

pub use kmeans::{ClusterSummary, Clustering, KmeansResult, cluster, kmeans};
pub use pca::{PcaComponent, PcaResult, pca};
pub use sam::{ClassSummary, ClassifiedSummary, SAM_METHOD, SamResult, TrainingSummary, classify};

/// Unsupervised analysis methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMethod {
    Pca,
    Kmeans,
}

impl AnalysisMethod {
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisMethod::Pca => "pca",
            AnalysisMethod::Kmeans => "kmeans",
        }
    }

    pub fn all() -> &'static [AnalysisMethod] {
        &[AnalysisMethod::Pca, AnalysisMethod::Kmeans]
    }
}

impl fmt::Display for AnalysisMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AnalysisMethod {
    type Err = HsiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pca" => Ok(AnalysisMethod::Pca),
            "kmeans" | "k-means" => Ok(AnalysisMethod::Kmeans),
            _ => Err(HsiError::unsupported_method(s)),
        }
    }
}

/// A method together with its numeric parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisRequest {
    Pca { components: usize },
    Kmeans { clusters: usize },
}

impl AnalysisRequest {
    /// Build a request from a method name; a missing parameter takes the
    /// configured default.
    pub fn new(method: &str, parameter: Option<usize>, defaults: &AnalysisConfig) -> Result<Self> {
        Ok(match method.parse::<AnalysisMethod>()? {
            AnalysisMethod::Pca => AnalysisRequest::Pca {
                components: parameter.unwrap_or(defaults.pca_components),
            },
            AnalysisMethod::Kmeans => AnalysisRequest::Kmeans {
                clusters: parameter.unwrap_or(defaults.kmeans_clusters),
            },
        })
    }

    pub fn method(&self) -> AnalysisMethod {
        match self {
            AnalysisRequest::Pca { .. } => AnalysisMethod::Pca,
            AnalysisRequest::Kmeans { .. } => AnalysisMethod::Kmeans,
        }
    }
}

/// Output of any analysis or classification.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Pca(PcaResult),
    Kmeans(KmeansResult),
    Classification(SamResult),
}

/// Run an unsupervised analysis.
pub fn run_analysis(
    cube: &Cube,
    bands: &BandAxis,
    request: AnalysisRequest,
) -> Result<AnalysisResult> {
    log::debug!("Running {:?} on cube {:?}", request, cube.shape());
    match request {
        AnalysisRequest::Pca { components } => pca(cube, components).map(AnalysisResult::Pca),
        AnalysisRequest::Kmeans { clusters } => {
            kmeans(cube, bands, clusters).map(AnalysisResult::Kmeans)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperspectral::generate_test_cube;

    #[test]
    fn test_method_parsing() {
        assert_eq!("PCA".parse::<AnalysisMethod>().unwrap(), AnalysisMethod::Pca);
        assert_eq!(" k-means ".parse::<AnalysisMethod>().unwrap(), AnalysisMethod::Kmeans);
        assert!(matches!(
            "ica".parse::<AnalysisMethod>(),
            Err(HsiError::UnsupportedMethod { method }) if method == "ica"
        ));
        for method in AnalysisMethod::all() {
            assert_eq!(method.name().parse::<AnalysisMethod>().unwrap(), *method);
        }
    }

    #[test]
    fn test_request_defaults() {
        let defaults = AnalysisConfig::default();
        assert_eq!(
            AnalysisRequest::new("pca", None, &defaults).unwrap(),
            AnalysisRequest::Pca { components: 3 }
        );
        assert_eq!(
            AnalysisRequest::new("kmeans", Some(7), &defaults).unwrap(),
            AnalysisRequest::Kmeans { clusters: 7 }
        );
        assert!(AnalysisRequest::new("tsne", None, &defaults).is_err());
    }

    #[test]
    fn test_result_json_shapes() {
        let (cube, bands) = generate_test_cube(8, 8, 4);

        let pca = run_analysis(&cube, &bands, AnalysisRequest::Pca { components: 2 }).unwrap();
        let pca_json = serde_json::to_value(pca).unwrap();
        let component = &pca_json["components"][0];
        assert!(component["variance"].is_number());
        assert!(component["image"].as_str().unwrap().starts_with("89504e47"));

        let kmeans_json = serde_json::to_value(
            run_analysis(&cube, &bands, AnalysisRequest::Kmeans { clusters: 3 }).unwrap(),
        )
        .unwrap();
        assert_eq!(kmeans_json["clusters"], 3);
        assert!(kmeans_json["map"].is_string());
        assert!(kmeans_json.get("labels").is_none());
        let summary = &kmeans_json["cluster_summaries"][0];
        for key in [
            "cluster",
            "color",
            "count",
            "percentage",
            "mean",
            "spectrum",
            "peak_band_index",
            "peak_wavelength",
        ] {
            assert!(summary.get(key).is_some(), "missing {key}");
        }
    }
}
