//! Command line front end for HSI Explorer.
//!
//! Every subcommand loads a dataset directory, prints its JSON result to
//! stdout and writes any images into `--output` when given.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use ndarray::Array3;
use ndarray_npy::WriteNpyExt;
use serde_json::Value;

use hsi_explorer::analysis::AnalysisResult;
use hsi_explorer::codec::EncodedImage;
use hsi_explorer::config::{AppConfig, PreviewFormat};
use hsi_explorer::export::{SpectrumSeries, save_spectra_csv};
use hsi_explorer::hyperspectral::generate_test_cube;
use hsi_explorer::model::parse_annotations;
use hsi_explorer::{AnalysisRequest, BandSelection, Dataset, HsiError, Region, Workspace};

#[derive(Parser)]
#[command(name = "hsi-explorer", version, about = "Explore calibrated hyperspectral cubes")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct DatasetArgs {
    /// Dataset directory, or any file inside it
    path: PathBuf,

    /// Directory receiving images and CSV files
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Load a dataset and print its shape, band axis and warnings
    Info {
        #[command(flatten)]
        dataset: DatasetArgs,
    },
    /// Render a three-band preview
    Rgb {
        #[command(flatten)]
        dataset: DatasetArgs,
        /// Band indices as red,green,blue
        #[arg(long, value_parser = parse_bands)]
        bands: Option<BandSelection>,
        /// Override the configured preview format
        #[arg(long, value_parser = parse_format)]
        format: Option<PreviewFormat>,
    },
    /// Mean spectrum of a region
    Spectrum {
        #[command(flatten)]
        dataset: DatasetArgs,
        /// Region as JSON, or @file to read it from a file
        #[arg(long)]
        region: String,
        /// Omit the per-band standard deviation
        #[arg(long)]
        no_std: bool,
    },
    /// Principal component maps
    Pca {
        #[command(flatten)]
        dataset: DatasetArgs,
        #[arg(short = 'n', long)]
        components: Option<usize>,
    },
    /// K-means segmentation
    Kmeans {
        #[command(flatten)]
        dataset: DatasetArgs,
        #[arg(short = 'k', long)]
        clusters: Option<usize>,
    },
    /// Supervised classification from labelled regions
    Classify {
        #[command(flatten)]
        dataset: DatasetArgs,
        /// JSON file holding the annotation list
        #[arg(long)]
        annotations: PathBuf,
        #[arg(long, default_value = "sam")]
        method: String,
        #[arg(long)]
        no_std: bool,
    },
    /// Write a synthetic calibrated capture for trying the other commands
    Demo {
        /// Directory to create
        output: PathBuf,
        #[arg(long, default_value_t = 64)]
        width: usize,
        #[arg(long, default_value_t = 48)]
        height: usize,
        #[arg(long, default_value_t = 16)]
        bands: usize,
    },
}

fn parse_format(text: &str) -> Result<PreviewFormat, String> {
    match text.to_lowercase().as_str() {
        "png" => Ok(PreviewFormat::Png),
        "jpg" | "jpeg" => Ok(PreviewFormat::Jpeg),
        other => Err(format!("unknown image format '{}'", other)),
    }
}

fn parse_bands(text: &str) -> Result<BandSelection, String> {
    let indices = text
        .split(',')
        .map(|part| part.trim().parse::<usize>().map_err(|e| format!("'{}': {}", part, e)))
        .collect::<Result<Vec<_>, _>>()?;
    match indices.as_slice() {
        [r, g, b] => Ok(BandSelection::new(*r, *g, *b)),
        _ => Err(format!("expected three band indices, got {}", indices.len())),
    }
}

fn load_config(path: Option<&Path>) -> AppConfig {
    match path {
        Some(path) => AppConfig::load_from_path(path).unwrap_or_else(|e| {
            eprintln!("Ignoring config {:?}: {}", path, e);
            AppConfig::default()
        }),
        None => AppConfig::load_from_default_path().unwrap_or_default(),
    }
}

fn load(workspace: &Workspace, args: &DatasetArgs) -> hsi_explorer::Result<Arc<Dataset>> {
    let dataset = workspace.load(&args.path)?;
    if let Some(warning) = dataset.warning_text() {
        log::warn!("{}", warning);
    }
    Ok(dataset)
}

fn read_json_arg(arg: &str) -> hsi_explorer::Result<Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => arg.to_string(),
    };
    Ok(serde_json::from_str(&text)?)
}

/// Write `image` as `<output>/<stem>.<ext>` and return the file name.
fn save_image(output: &Path, stem: &str, image: &EncodedImage) -> hsi_explorer::Result<String> {
    std::fs::create_dir_all(output)?;
    let name = format!("{}.{}", stem, image.extension());
    std::fs::write(output.join(&name), &image.bytes)?;
    log::info!("Wrote {}x{} image {:?}", image.width, image.height, output.join(&name));
    Ok(name)
}

/// Serialize `result`, replacing hex image payloads by the saved file names.
fn analysis_json(result: &AnalysisResult, output: Option<&Path>) -> hsi_explorer::Result<Value> {
    let mut value = serde_json::to_value(result)?;
    let Some(output) = output else {
        return Ok(value);
    };

    match result {
        AnalysisResult::Pca(pca) => {
            if let Some(entries) = value["components"].as_array_mut() {
                for (component, entry) in pca.components.iter().zip(entries.iter_mut()) {
                    let stem = format!("pca_component_{}", component.index + 1);
                    entry["image"] = Value::String(save_image(output, &stem, &component.image)?);
                }
            }
        }
        AnalysisResult::Kmeans(kmeans) => {
            value["map"] = Value::String(save_image(output, "kmeans_map", &kmeans.map)?);
        }
        AnalysisResult::Classification(sam) => {
            value["map"] = Value::String(save_image(output, "classification_map", &sam.map)?);
            let series: Vec<SpectrumSeries> =
                sam.classes.iter().map(SpectrumSeries::from_class).collect();
            save_spectra_csv(&output.join("class_spectra.csv"), &sam.bands, &series)?;
        }
    }
    Ok(value)
}

/// Synthetic capture with all-zero dark and all-one white references, so
/// calibration reproduces the generated reflectance.
fn write_demo(
    output: &Path,
    width: usize,
    height: usize,
    bands: usize,
) -> hsi_explorer::Result<Value> {
    std::fs::create_dir_all(output)?;
    let (cube, axis) = generate_test_cube(width, height, bands);

    let write = |name: &str, array: &Array3<f32>| -> hsi_explorer::Result<()> {
        let file = std::fs::File::create(output.join(name))?;
        array
            .write_npy(file)
            .map_err(|e| HsiError::Io(std::io::Error::other(e.to_string())))
    };
    write("capture.npy", cube.data())?;
    write("capture_darkref.npy", &Array3::zeros((4, width, bands)))?;
    write("capture_whiteref.npy", &Array3::ones((4, width, bands)))?;

    let sidecar = serde_json::json!({ "wavelength": axis.to_vec() });
    std::fs::write(output.join("capture.json"), serde_json::to_string_pretty(&sidecar)?)?;

    log::info!("Wrote demo capture to {:?}", output);
    Ok(serde_json::json!({ "path": output, "shape": [height, width, bands] }))
}

fn run(cli: Cli, config: &AppConfig) -> hsi_explorer::Result<Value> {
    let workspace = Workspace::new();

    match cli.command {
        Command::Info { dataset } => {
            let dataset = load(&workspace, &dataset)?;
            Ok(serde_json::to_value(dataset.summary())?)
        }
        Command::Rgb {
            dataset: args,
            bands,
            format,
        } => {
            let dataset = load(&workspace, &args)?;
            let selection =
                bands.unwrap_or_else(|| BandSelection::from_array(config.preview.default_bands));
            let mut preview = config.preview.clone();
            if let Some(format) = format {
                preview.format = format;
            }

            let image = dataset.rgb_preview(selection, &preview)?;
            let mut value = serde_json::json!({
                "bands": selection.clamp(dataset.cube().num_bands()).as_array(),
                "width": image.width,
                "height": image.height,
            });
            value["image"] = match &args.output {
                Some(output) => Value::String(save_image(output, "rgb_preview", &image)?),
                None => serde_json::to_value(&image)?,
            };
            Ok(value)
        }
        Command::Spectrum {
            dataset: args,
            region,
            no_std,
        } => {
            let dataset = load(&workspace, &args)?;
            let region = Region::from_json(&read_json_arg(&region)?)?;
            let include_std = config.analysis.include_std && !no_std;
            let response = dataset.spectrum(&region, include_std)?;

            if let Some(output) = &args.output {
                std::fs::create_dir_all(output)?;
                let series = [SpectrumSeries::from_stats(region.kind(), &response.stats)];
                save_spectra_csv(&output.join("spectrum.csv"), &response.bands, &series)?;
            }
            Ok(serde_json::to_value(response)?)
        }
        Command::Pca {
            dataset: args,
            components,
        } => {
            let dataset = load(&workspace, &args)?;
            let request = AnalysisRequest::new("pca", components, &config.analysis)?;
            analysis_json(&dataset.analyze(request)?, args.output.as_deref())
        }
        Command::Kmeans {
            dataset: args,
            clusters,
        } => {
            let dataset = load(&workspace, &args)?;
            let request = AnalysisRequest::new("kmeans", clusters, &config.analysis)?;
            analysis_json(&dataset.analyze(request)?, args.output.as_deref())
        }
        Command::Classify {
            dataset: args,
            annotations,
            method,
            no_std,
        } => {
            let dataset = load(&workspace, &args)?;
            let text = std::fs::read_to_string(&annotations)?;
            let annotations = parse_annotations(&serde_json::from_str(&text)?)?;
            let include_std = config.analysis.include_std && !no_std;
            let result = dataset.classify(&annotations, &method, include_std)?;
            analysis_json(&result, args.output.as_deref())
        }
        Command::Demo {
            output,
            width,
            height,
            bands,
        } => write_demo(&output, width, height, bands),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    env_logger::Builder::new()
        .filter_level(config.log_level.raised(cli.verbose).to_level_filter())
        .parse_default_env()
        .init();

    match run(cli, &config).and_then(|value| Ok(serde_json::to_string_pretty(&value)?)) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            let body = serde_json::json!({ "error": e.to_string(), "status": e.status_code() });
            eprintln!("{}", body);
            ExitCode::FAILURE
        }
    }
}
