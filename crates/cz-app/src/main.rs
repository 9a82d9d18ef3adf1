use std::path::PathBuf;
use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use cz_app::{AppConfig, Sequencer};
use cz_core::SongPlan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cz_app=debug")),
        )
        .with_target(true)
        .init();

    let plan_path: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: cadenza <plan.json>")?;

    let raw = tokio::fs::read_to_string(&plan_path)
        .await
        .with_context(|| format!("could not read plan {}", plan_path.display()))?;
    let plan: SongPlan = serde_json::from_str(&raw)
        .with_context(|| format!("invalid plan {}", plan_path.display()))?;

    let config = AppConfig::load()?;
    if config.twocaptcha_key.is_none() {
        warn!("CADENZA_TWOCAPTCHA_KEY not set, generation requests will carry no challenge token");
    }

    let cancel = CancellationToken::new();
    let sequencer = Sequencer::from_config(&config, cancel.clone())?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling sequence");
            cancel.cancel();
        }
    });

    info!(plan = %plan_path.display(), output = %config.output_dir.display(), "Starting");

    match sequencer.create_complete_song(&plan).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            error!(stage = %e.stage, tracks = ?e.ledger.track_ids(), "{e}");
            Err(e.into())
        }
    }
}
