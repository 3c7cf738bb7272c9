//! ALTO Engine Daemon - Main Entry Point

use alto_engine::{AltoEngine, EngineConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("ALTO engine v{}", env!("CARGO_PKG_VERSION"));

    // Load config
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "/etc/alto/altod.json".into());

    let config = EngineConfig::load(&config_path).unwrap_or_else(|e| {
        tracing::warn!("Config {} not usable ({}), using defaults", config_path, e);
        EngineConfig::default()
    });

    // Seed topology and load adjacency; bad adjacency data aborts startup
    let engine = AltoEngine::from_config(config).map_err(|e| {
        tracing::error!("Startup failed: {}", e);
        e
    })?;

    let snap = engine.graph().snapshot();
    tracing::info!(
        "Topology version {}: {} devices, {} links, {} PIDs",
        snap.version(),
        snap.device_count(),
        snap.link_count(),
        snap.pids().count()
    );
    for cost_type in engine.cost_types() {
        tracing::info!("Serving cost type {}/{}", cost_type.mode, cost_type.metric);
    }

    println!("{}", serde_json::to_string_pretty(&engine.network_map())?);
    Ok(())
}
