use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use anyhow::{anyhow, Context};
use crate::generator::backend::config::{StudioConfig, DEFAULT_API_BASE_URL, DEFAULT_MAX_ATTEMPTS};
use crate::generator::poller::{PollConfig, DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL};
use crate::generator::retriever::DownloadPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub studio: StudioConfig,
    pub twocaptcha_key: Option<String>,
    pub poll: PollConfig,
    pub output_dir: PathBuf,
    pub download_policy: DownloadPolicy,
}

impl AppConfig {
    /// Read `.env` if present, then the `CADENZA_*` environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token0 = var("CADENZA_AUTH_TOKEN_0").ok_or_else(|| anyhow!("CADENZA_AUTH_TOKEN_0 must be set"))?;
        let token1 = var("CADENZA_AUTH_TOKEN_1").ok_or_else(|| anyhow!("CADENZA_AUTH_TOKEN_1 must be set"))?;

        let max_attempts: u32 = parse_or(&var, "CADENZA_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let retry_delay_ms: u64 = parse_or(&var, "CADENZA_RETRY_DELAY_MS", 2000)?;
        let timeout_secs: u64 = parse_or(&var, "CADENZA_REQUEST_TIMEOUT_SECS", 60)?;

        let mut studio = StudioConfig::new(token0, token1)
            .with_base_url(var("CADENZA_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()))
            .with_retry(max_attempts, Duration::from_millis(retry_delay_ms));
        studio.request_timeout = Duration::from_secs(timeout_secs);

        let interval_ms: u64 = parse_or(&var, "CADENZA_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL.as_millis() as u64)?;
        // Zero disables the deadline
        let max_wait_secs: u64 = parse_or(&var, "CADENZA_POLL_TIMEOUT_SECS", DEFAULT_MAX_WAIT.as_secs())?;
        let poll = PollConfig {
            interval: Duration::from_millis(interval_ms),
            max_wait: (max_wait_secs > 0).then(|| Duration::from_secs(max_wait_secs)),
        };

        let download_policy = match var("CADENZA_DOWNLOAD_POLICY") {
            Some(raw) => raw.parse().map_err(|e: String| anyhow!(e))?,
            None => DownloadPolicy::default(),
        };

        Ok(Self {
            studio,
            twocaptcha_key: var("CADENZA_TWOCAPTCHA_KEY"),
            poll,
            output_dir: var("CADENZA_OUTPUT_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            download_policy,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("{key} must be a number, got '{raw}'")),
        None => Ok(default),
    }
}
