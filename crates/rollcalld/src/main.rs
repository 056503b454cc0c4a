use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = config::Config::from_env();
    tracing::info!(
        store = %config.store_path.display(),
        accept_threshold = config.accept_threshold,
        "rollcalld starting"
    );

    let store = Arc::new(
        rollcall_store::JsonStore::open(&config.store_path)
            .with_context(|| format!("opening store at {}", config.store_path.display()))?,
    );

    let handle = engine::spawn_engine(store.clone(), store, &config);
    let service = dbus_interface::RollcallService::new(handle, &config);

    let _conn = zbus::connection::Builder::session()
        .context("connecting to session bus")?
        .name("org.rollcall.Rollcall1")?
        .serve_at("/org/rollcall/Rollcall1", service)?
        .build()
        .await
        .context("registering D-Bus service")?;

    tracing::info!("rollcalld ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");

    Ok(())
}
