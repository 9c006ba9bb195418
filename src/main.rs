//! lenslate - Real-time screen translation overlay engine
//!
//! Continuously captures a screen region, runs an external OCR backend,
//! clusters the raw detections into stable text blocks and hands settled
//! blocks to a translation provider together with a bounded context
//! history. Rendering surfaces consume block snapshots; platform capture
//! backends plug in behind the `FrameSource` trait.

mod app;
mod blocks;
mod capture;
mod config;
mod overlay;
mod region;
mod translate;
mod vision;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::app::App;
use crate::capture::{CaptureRegion, FrameSource, TestPatternSource};
use crate::config::AppConfig;
use crate::translate::{EchoTranslator, LlmTranslator, TranslationProvider};
use crate::vision::{HttpOcrProvider, OcrBackend, OcrProvider, RawDetection, ScriptedOcr};

/// lenslate - screen translation block engine
#[derive(Parser, Debug)]
#[command(name = "lenslate")]
#[command(about = "Real-time screen translation overlay - block detection and context assembly")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured target language
    #[arg(long)]
    target_lang: Option<String>,

    /// Capture region as "x,y,width,height"; repeat for multiple regions
    #[arg(long)]
    region: Vec<String>,

    /// Use scripted OCR and echo translation (no network)
    #[arg(long)]
    mock: bool,

    /// Stop after this many capture cycles per region
    #[arg(long)]
    cycles: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = load_or_create_config(args.config.as_deref())?;
    if let Some(lang) = args.target_lang {
        config.translation.target_language = lang;
    }
    if !args.region.is_empty() {
        config.capture.regions = args
            .region
            .iter()
            .map(|spec| parse_region(spec))
            .collect::<Result<Vec<_>>>()?;
    }
    // Invalid bounds are fatal here, never per-frame.
    config.validate()?;

    info!("lenslate starting...");
    info!(
        "Tracking {} region(s), target language '{}'",
        config.capture.regions.len(),
        config.translation.target_language
    );

    let ocr: Arc<dyn OcrProvider> = if args.mock {
        Arc::new(ScriptedOcr::repeating(demo_detections()))
    } else {
        match config.vision.backend {
            OcrBackend::HttpService => Arc::new(HttpOcrProvider::new(config.vision.endpoint.clone())),
            OcrBackend::Scripted => Arc::new(ScriptedOcr::repeating(demo_detections())),
        }
    };
    let translator: Arc<dyn TranslationProvider> = if args.mock {
        Arc::new(EchoTranslator)
    } else {
        Arc::new(LlmTranslator::new(&config.translation))
    };
    info!(ocr = ocr.name(), translator = translator.name(), "providers ready");

    let sources: Vec<Box<dyn FrameSource>> = config
        .capture
        .regions
        .iter()
        .map(|r| {
            Box::new(TestPatternSource::new(r.width, r.height, [16, 16, 16, 255]))
                as Box<dyn FrameSource>
        })
        .collect();

    let (app, snapshots) = App::new(config, ocr, translator);

    // Log translated blocks as they reach the overlay feed.
    std::thread::spawn(move || {
        for snapshot in snapshots.iter() {
            for block in snapshot.blocks.iter().filter(|b| b.translation.is_some()) {
                info!(
                    region = %snapshot.region_id,
                    block = %block.id,
                    text = %block.text,
                    translation = block.translation.as_deref().unwrap_or_default(),
                    "translated block"
                );
            }
        }
    });

    app.run(sources, args.cycles).await?;

    info!("lenslate shutdown complete");
    Ok(())
}

/// Load configuration from an explicit path, the default location, or fall
/// back to defaults
fn load_or_create_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        let config = config::load_config(path)
            .with_context(|| format!("failed to load configuration from {path:?}"))?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }
    if let Some(default_path) = config::default_config_path() {
        if default_path.exists() {
            if let Ok(config) = config::load_config(&default_path) {
                info!("Loaded configuration from {:?}", default_path);
                return Ok(config);
            }
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Parse "x,y,width,height" into a capture region
fn parse_region(raw: &str) -> Result<CaptureRegion> {
    let parts: Vec<&str> = raw.split(',').map(|s| s.trim()).collect();
    anyhow::ensure!(
        parts.len() == 4,
        "region must be \"x,y,width,height\", got {raw:?}"
    );
    let mut values = [0u32; 4];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .with_context(|| format!("invalid region component {part:?}"))?;
    }
    let [x, y, width, height] = values;
    anyhow::ensure!(width > 0 && height > 0, "region must have positive size");
    Ok(CaptureRegion {
        x,
        y,
        width,
        height,
    })
}

/// Detections replayed by the scripted OCR backend: one vertical phrase
/// and one UI label
fn demo_detections() -> Vec<RawDetection> {
    vec![
        RawDetection::new("物", 200.0, 40.0, 22.0, 22.0).with_confidence(0.98),
        RawDetection::new("語", 200.0, 64.0, 22.0, 22.0).with_confidence(0.97),
        RawDetection::new("の", 200.0, 88.0, 22.0, 22.0).with_confidence(0.99),
        RawDetection::new("始", 200.0, 112.0, 22.0, 22.0).with_confidence(0.96),
        RawDetection::new("ま", 200.0, 136.0, 22.0, 22.0).with_confidence(0.98),
        RawDetection::new("り", 200.0, 160.0, 22.0, 22.0).with_confidence(0.98),
        RawDetection::new("Inventory", 40.0, 300.0, 96.0, 20.0).with_confidence(0.92),
    ]
}
