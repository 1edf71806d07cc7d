//! tablehub: browse derived table views over a DuckDB file
//!
//! Reads JSON requests from stdin, one per line, and writes one JSON
//! response per line to stdout.

use std::io::{BufRead, Write};

use anyhow::Context;
use tablehub_core::Hub;
use tracing::{info, warn};

mod catalog;
mod config;
mod logging;
mod protocol;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config_path =
        std::env::var("TABLEHUB_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = config::Config::load(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;
    config.apply_logging_env();
    logging::init();

    let hub = Hub::open(config.hub_config()).context("opening view hub")?;

    let datasets = match &config.catalog.datasets {
        Some(path) => catalog::load_datasets(path)?,
        None if config.database.path.is_some() => catalog::from_tables(&hub.durable_tables()?),
        None => Vec::new(),
    };
    let main_view = catalog::bootstrap(&hub, datasets)?;
    info!(main = main_view.id(), "Ready for requests");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("reading request")?;
        if line.trim().is_empty() {
            continue;
        }

        let response = protocol::handle_line(&hub, &line);
        if let protocol::Response::Error { error } = &response {
            warn!(code = error.code, message = %error.message, "Request failed");
        }
        serde_json::to_writer(&mut stdout, &response)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
    }

    Ok(())
}
