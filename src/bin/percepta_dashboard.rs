//! percepta_dashboard - dashboard-only service
//!
//! This service:
//! 1. Holds the latest narration record pushed by a remote perceptad
//! 2. Serves the dashboard API (status, latest, reset, language)
//! 3. Does NOT capture frames or speak
//!
//! `POST /language` and `POST /reset` only change this process's state. A
//! perceptad pushing here keeps its own language and cooldowns; point
//! operators at the daemon's embedded dashboard (`dashboard.addr`) to steer
//! narration.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::mpsc;
use std::sync::Arc;

use percepta::dashboard::{ApiConfig, ApiServer, DashboardState};
use percepta::narrate::Language;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Listen address.
    #[arg(long, env = "PERCEPTA_DASHBOARD_ADDR", default_value = "127.0.0.1:5000")]
    addr: String,
    /// Initial language code.
    #[arg(long, env = "PERCEPTA_LANGUAGE", default_value = "en")]
    language: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let state = Arc::new(DashboardState::new(Language::parse(&args.language)?));
    let api_handle = ApiServer::new(ApiConfig { addr: args.addr }, state).spawn()?;
    log::info!("percepta_dashboard running on http://{}", api_handle.addr);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("percepta_dashboard waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping dashboard server...");
    api_handle.stop()?;

    Ok(())
}
