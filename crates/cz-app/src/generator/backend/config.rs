use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://www.udio.com/api";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for the generation service
#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub base_url: String,
    pub auth_token0: String,
    pub auth_token1: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
}

impl StudioConfig {
    pub fn new(auth_token0: impl Into<String>, auth_token1: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_token0: auth_token0.into(),
            auth_token1: auth_token1.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        // A bound of zero would never send anything
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn generate_url(&self) -> String {
        format!("{}/generate-proxy", self.base_url)
    }

    pub fn status_url(&self, song_ids: &[String]) -> String {
        format!("{}/songs?songIds={}", self.base_url, song_ids.join(","))
    }

    pub fn cookie(&self) -> String {
        format!(
            "sb-ssr-production-auth-token.0={}; sb-ssr-production-auth-token.1={}",
            self.auth_token0, self.auth_token1
        )
    }
}
