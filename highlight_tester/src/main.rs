use anyhow::{Context, Result};
use clap::Parser;
use highlight_detector::{
    BoundingBox, DetectionOutcome, DetectorConfig, DetectorPool, HighlightDetector,
    PaletteRegistry, image_helper, isolate,
};
use image::RgbImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const PROCESSED: &str = "Image processed successfully";
const NOT_FOUND: &str = "No highlighted regions found";

#[derive(Parser)]
#[command(name = "highlight_tester")]
#[command(about = "Runs the highlight detector over screenshot files")]
#[command(version)]
struct Cli {
    /// Screenshot files to scan
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory the cropped highlight bands are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Detector configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Palette registry replacing the built-in themes (JSON)
    #[arg(short, long)]
    palette: Option<PathBuf>,

    /// Directory the masked source images are written to
    #[arg(long)]
    mask_dir: Option<PathBuf>,

    /// Worker tasks; defaults to one per CPU
    #[arg(short, long)]
    workers: Option<usize>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// One line of output per input file.
#[derive(Debug, Serialize)]
struct DetectionReport {
    input: PathBuf,
    message: String,
    is_highlight_present: bool,
    cropped_image: Option<PathBuf>,
    theme: Option<String>,
    color: Option<String>,
    bounding_box: Option<BoundingBox>,
}

impl DetectionReport {
    fn invalid(input: &Path, error: impl std::fmt::Display) -> Self {
        Self {
            input: input.to_path_buf(),
            message: format!("Invalid image data: {error}"),
            is_highlight_present: false,
            cropped_image: None,
            theme: None,
            color: None,
            bounding_box: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Reports own stdout; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => DetectorConfig::from_json_file(path)
            .with_context(|| format!("loading detector config {}", path.display()))?,
        None => DetectorConfig::default(),
    };
    config.validate()?;

    let registry = match &cli.palette {
        Some(path) => Arc::new(
            PaletteRegistry::from_json_file(path)
                .with_context(|| format!("loading palette {}", path.display()))?,
        ),
        None => PaletteRegistry::builtin(),
    };

    for dir in [&cli.output_dir, &cli.mask_dir].into_iter().flatten() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let detector = HighlightDetector::with_registry(config, registry);
    let pool = match cli.workers {
        Some(workers) => DetectorPool::with_workers(detector.clone(), workers),
        None => DetectorPool::new(detector.clone()),
    };
    info!(
        inputs = cli.inputs.len(),
        workers = pool.worker_count(),
        themes = detector.registry().themes().count(),
        "starting highlight detection"
    );

    // --- 1. Load ---
    let mut reports: Vec<Option<DetectionReport>> = Vec::with_capacity(cli.inputs.len());
    let mut loaded: Vec<(usize, RgbImage)> = Vec::new();
    for (index, input) in cli.inputs.iter().enumerate() {
        match image_helper::load(input) {
            Ok(image) => {
                reports.push(None);
                loaded.push((index, image));
            }
            Err(err) => {
                warn!(input = %input.display(), %err, "failed to load image");
                reports.push(Some(DetectionReport::invalid(input, err)));
            }
        }
    }

    // --- 2. Detect ---
    let outcomes = pool
        .process_batch(loaded.iter().map(|(_, image)| image.clone()).collect())
        .await;

    // --- 3. Report ---
    for ((index, image), outcome) in loaded.iter().zip(outcomes) {
        let input = &cli.inputs[*index];
        let report = match outcome {
            Ok(outcome) => {
                let cropped_path = write_artifacts(&cli, &detector, input, image, &outcome);
                report_for(input, &outcome, cropped_path)
            }
            Err(err) => {
                warn!(input = %input.display(), %err, "detection failed");
                DetectionReport::invalid(input, err)
            }
        };
        reports[*index] = Some(report);
    }

    for report in reports.into_iter().flatten() {
        println!("{}", serde_json::to_string(&report)?);
    }

    pool.shutdown().await;
    Ok(())
}

/// Writes the crop and mask images requested on the command line.
///
/// Returns the crop path when one was written. A failed write is logged and
/// leaves the report without a crop; it never aborts the run.
fn write_artifacts(
    cli: &Cli,
    detector: &HighlightDetector,
    input: &Path,
    image: &RgbImage,
    outcome: &DetectionOutcome,
) -> Option<PathBuf> {
    let highlight = outcome.highlight.as_ref()?;
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    if let Some(dir) = &cli.mask_dir {
        let config = detector.config();
        let (mask, _) = isolate(image, highlight.entry.color(), config.tolerance, config.hue_mode);
        let path = dir.join(format!("{stem}_{}_{}_mask.png", highlight.theme, highlight.entry.name));
        if let Err(err) = image_helper::save_png(&path, &mask.apply(image)) {
            warn!(path = %path.display(), %err, "failed to write mask");
        }
    }

    let (dir, cropped) = (cli.output_dir.as_ref()?, outcome.cropped_image.as_ref()?);
    let path = dir.join(format!("{stem}_highlight.png"));
    match image_helper::save_png(&path, cropped) {
        Ok(()) => Some(path),
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to write crop");
            None
        }
    }
}

/// Report line for a completed detection.
fn report_for(input: &Path, outcome: &DetectionOutcome, cropped_image: Option<PathBuf>) -> DetectionReport {
    let Some(highlight) = &outcome.highlight else {
        return DetectionReport {
            input: input.to_path_buf(),
            message: NOT_FOUND.to_string(),
            is_highlight_present: false,
            cropped_image: None,
            theme: None,
            color: None,
            bounding_box: None,
        };
    };

    info!(
        input = %input.display(),
        theme = %highlight.theme,
        color = %highlight.entry.hex,
        "highlight found"
    );
    DetectionReport {
        input: input.to_path_buf(),
        message: PROCESSED.to_string(),
        is_highlight_present: outcome.highlight_present,
        cropped_image,
        theme: Some(highlight.theme.clone()),
        color: Some(highlight.entry.hex.clone()),
        bounding_box: Some(highlight.region.bounding_box),
    }
}
