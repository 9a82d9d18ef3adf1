use std::time::Duration;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};
use crate::error::ChallengeError;

/// hCaptcha site key guarding the generation endpoint
pub const SITE_KEY: &str = "2945592b-1928-43a9-8473-7e7fed3d752e";
/// Page the challenge is issued for
pub const CHALLENGE_URL: &str = "https://www.udio.com/api/generate-proxy";

/// Produces a verification token for a (site, page) pair
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    async fn solve(&self, site_key: &str, page_url: &str) -> Result<String, ChallengeError>;
}

/// Used when no solver credential is configured. Always fails, so write
/// requests go out without a token.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSolver;

#[async_trait]
impl ChallengeSolver for DisabledSolver {
    async fn solve(&self, _site_key: &str, _page_url: &str) -> Result<String, ChallengeError> {
        Err(ChallengeError::Disabled)
    }
}

pub const TWOCAPTCHA_BASE_URL: &str = "https://2captcha.com";

#[derive(Debug, Deserialize)]
struct TwoCaptchaReply {
    status: u8,
    request: String,
}

/// Client for the 2Captcha task API: submit to `in.php`, then poll `res.php`
pub struct TwoCaptchaSolver {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl TwoCaptchaSolver {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: TWOCAPTCHA_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(180),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timing(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.timeout = timeout;
        self
    }

    async fn submit(&self, site_key: &str, page_url: &str) -> Result<String, ChallengeError> {
        let reply: TwoCaptchaReply = self
            .client
            .post(format!("{}/in.php", self.base_url))
            .form(&[
                ("key", self.api_key.as_str()),
                ("method", "hcaptcha"),
                ("sitekey", site_key),
                ("pageurl", page_url),
                ("json", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if reply.status != 1 {
            return Err(ChallengeError::Rejected(reply.request));
        }
        Ok(reply.request)
    }

    async fn fetch_answer(&self, task_id: &str) -> Result<Option<String>, ChallengeError> {
        let reply: TwoCaptchaReply = self
            .client
            .get(format!("{}/res.php", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("action", "get"),
                ("id", task_id),
                ("json", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match (reply.status, reply.request.as_str()) {
            (1, _) => Ok(Some(reply.request)),
            (_, "CAPCHA_NOT_READY") => Ok(None),
            _ => Err(ChallengeError::Rejected(reply.request)),
        }
    }
}

#[async_trait]
impl ChallengeSolver for TwoCaptchaSolver {
    async fn solve(&self, site_key: &str, page_url: &str) -> Result<String, ChallengeError> {
        let started = Instant::now();
        let task_id = self.submit(site_key, page_url).await?;
        debug!(task_id = %task_id, "Challenge task submitted");

        loop {
            sleep(self.poll_interval).await;

            if let Some(token) = self.fetch_answer(&task_id).await? {
                info!(task_id = %task_id, elapsed_ms = started.elapsed().as_millis() as u64, "Challenge solved");
                return Ok(token);
            }

            if started.elapsed() >= self.timeout {
                return Err(ChallengeError::TimedOut(self.timeout));
            }
        }
    }
}
