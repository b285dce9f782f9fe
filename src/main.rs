use anyhow::{anyhow, Context, Result};
use eframe::egui;
use multirec::audio::MediaBackend;
use multirec::config::AppConfig;
use multirec::ui::{AppState, MultirecApp};
use multirec::upload::HttpTransport;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "audio-io")]
fn media_backend() -> Box<dyn MediaBackend> {
    Box::new(multirec::audio::CpalBackend::new())
}

#[cfg(not(feature = "audio-io"))]
fn media_backend() -> Box<dyn MediaBackend> {
    warn!("Built without audio-io, using a silent in-memory backend");
    Box::new(
        multirec::testing::InMemoryBackend::new()
            .with_input("virtual-1", "Virtual Microphone 1")
            .with_input("virtual-2", "Virtual Microphone 2"),
    )
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "multirec=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Multirec");

    let config = AppConfig::load()?;
    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;
    if config.auth_token.is_empty() {
        warn!("No upload token configured; set MULTIREC_UPLOAD_TOKEN or auth_token in the config file");
    }
    info!("Configuration: {:?}", config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("multirec-upload")
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let transport = HttpTransport::new(config.request_timeout())?;
    let state = AppState::new(
        &config,
        media_backend(),
        Arc::new(transport),
        runtime.handle().clone(),
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([720.0, 760.0])
            .with_min_inner_size([420.0, 480.0])
            .with_title("Multirec"),
        ..Default::default()
    };

    eframe::run_native(
        "Multirec",
        options,
        Box::new(move |cc| Ok(Box::new(MultirecApp::new(cc, state)))),
    )
    .map_err(|e| anyhow!("Window error: {}", e))?;

    info!("Multirec shut down");
    Ok(())
}
