mod camera;
mod detector;
mod filter;
mod orchestrator;
mod scheduler;
mod storage;

use detector::{DarknetProcess, Detector};
use edge_filter_common::config::Config;
use filter::SceneChangeStrategy;
use orchestrator::SampleOrchestrator;
use scheduler::PeriodicScheduler;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let (config_path, detect_image) = parse_args(std::env::args().skip(1));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    let darknet = DarknetProcess::new(&config.detector);

    if let Some(image) = detect_image {
        run_detect_once(&darknet, &image).await;
        return;
    }

    info!(
        camera_mode = config.camera.mode,
        darknet_dir = %config.detector.darknet_dir.display(),
        period_ms = config.sampling.period_ms,
        history_capacity = config.sampling.history_capacity,
        workers = config.sampling.workers,
        upload_mode = config.upload.mode,
        "starting edge scene filter"
    );

    let provider = match camera::provider_from_config(&config.camera) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to set up camera");
            std::process::exit(1);
        }
    };

    let uploader = match storage::uploader_from_config(&config.upload).await {
        Ok(u) => u,
        Err(e) => {
            error!(error = %e, "failed to set up uploader");
            std::process::exit(1);
        }
    };

    let orchestrator = Arc::new(SampleOrchestrator::<PathBuf>::new(
        provider,
        Box::new(SceneChangeStrategy::new(darknet)),
        uploader,
        config.sampling.history_capacity,
    ));

    let mut scheduler = PeriodicScheduler::new(config.sampling.workers);
    let cycle_orchestrator = Arc::clone(&orchestrator);
    let started = scheduler.start(Duration::from_millis(config.sampling.period_ms), move || {
        let orchestrator = Arc::clone(&cycle_orchestrator);
        async move {
            orchestrator.run_cycle().await;
        }
    });
    if let Err(e) = started {
        error!(error = %e, "failed to start sampling");
        std::process::exit(1);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown requested");

    let timeout = Duration::from_millis(config.sampling.shutdown_timeout_ms);
    if !scheduler.stop(true, timeout).await {
        warn!("exiting with sampling cycles still in flight");
    }
    info!(
        triggered = scheduler.triggered(),
        skipped = scheduler.skipped(),
        remembered = orchestrator.history().len(),
        "edge scene filter stopped"
    );
}

/// `[config.toml] [--detect <image>]`, in any order.
fn parse_args(mut args: impl Iterator<Item = String>) -> (PathBuf, Option<PathBuf>) {
    let mut config_path = None;
    let mut detect_image = None;
    while let Some(arg) = args.next() {
        if arg == "--detect" {
            detect_image = args.next().map(PathBuf::from);
        } else if config_path.is_none() {
            config_path = Some(PathBuf::from(arg));
        }
    }
    (
        config_path.unwrap_or_else(|| PathBuf::from("config.toml")),
        detect_image,
    )
}

async fn run_detect_once(darknet: &DarknetProcess, image: &Path) {
    match darknet.detect(image).await {
        Ok(scene) => {
            info!(image = %image.display(), objects = scene.len(), "detection finished");
            for object in &scene {
                info!(name = object.name, confidence = object.confidence, "{object}");
            }
        }
        Err(e) => {
            error!(error = %e, image = %image.display(), "detection failed");
            std::process::exit(1);
        }
    }
}
