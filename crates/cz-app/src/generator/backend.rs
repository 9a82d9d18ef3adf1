pub mod config;
pub mod schemas;

use std::sync::Arc;
use anyhow::Context;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, ORIGIN, REFERER, USER_AGENT,
};
use reqwest::Method;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use cz_core::GenerationRequest;
use crate::error::RequestError;
use crate::generator::backend::config::StudioConfig;
use crate::generator::backend::schemas::{GenerateResponse, SongStatusResponse};
use crate::generator::captcha::{ChallengeSolver, CHALLENGE_URL, SITE_KEY};

/// Header the verification token travels in
pub const CHALLENGE_HEADER: &str = "h-captcha-token";

const BROWSER_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

/// Request executor for the generation service. Every call carries the
/// session cookie; write calls also carry a fresh challenge token.
pub struct StudioClient {
    config: StudioConfig,
    client: reqwest::Client,
    cookie: HeaderValue,
    solver: Arc<dyn ChallengeSolver>,
}

impl StudioClient {
    pub fn new(config: StudioConfig, solver: Arc<dyn ChallengeSolver>) -> anyhow::Result<Self> {
        let cookie = HeaderValue::from_str(&config.cookie())
            .context("auth tokens contain characters not allowed in a cookie")?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            client,
            cookie,
            solver,
        })
    }

    fn default_headers(&self, mutating: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let accept = if mutating { "application/json" } else { "application/json, text/plain, */*" };
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(COOKIE, self.cookie.clone());
        headers.insert(ORIGIN, HeaderValue::from_static("https://www.udio.com"));
        headers.insert(REFERER, HeaderValue::from_static("https://www.udio.com/my-creations"));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
        headers.insert(HeaderName::from_static("sec-fetch-site"), HeaderValue::from_static("same-origin"));
        headers.insert(HeaderName::from_static("sec-fetch-mode"), HeaderValue::from_static("cors"));
        headers.insert(HeaderName::from_static("sec-fetch-dest"), HeaderValue::from_static("empty"));

        if mutating {
            headers.insert(
                HeaderName::from_static("sec-ch-ua"),
                HeaderValue::from_static(r#""Google Chrome";v="123", "Not:A-Brand";v="8", "Chromium";v="123""#),
            );
            headers.insert(HeaderName::from_static("sec-ch-ua-mobile"), HeaderValue::from_static("?0"));
            headers.insert(HeaderName::from_static("sec-ch-ua-platform"), HeaderValue::from_static(r#""macOS""#));
        }

        headers
    }

    /// Send a request and decode its JSON body.
    ///
    /// Only 5xx responses are retried, up to `max_attempts` in total with
    /// `retry_delay` between attempts. Any other failed status and any
    /// transport error end the call on the spot.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        extra_headers: Option<&HeaderMap>,
    ) -> Result<Value, RequestError> {
        let mutating = !method.is_safe();
        let mut headers = self.default_headers(mutating);
        if let Some(extra) = extra_headers {
            for (name, value) in extra {
                headers.insert(name.clone(), value.clone());
            }
        }

        let max_attempts = self.config.max_attempts;
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(%method, url, attempt, max_attempts, "Sending request");

            let mut request = self.client.request(method.clone(), url).headers(headers.clone());

            if mutating {
                match self.solver.solve(SITE_KEY, CHALLENGE_URL).await {
                    Ok(token) => request = request.header(CHALLENGE_HEADER, token),
                    Err(e) => warn!(error = %e, "Challenge not solved, sending without token"),
                }
            }

            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    error!(%method, url, error = %e, "Request failed");
                    return Err(RequestError::Transport(e));
                }
            };

            let status = response.status();

            if status.is_server_error() {
                let text = response.text().await.unwrap_or_default();
                if attempt >= max_attempts {
                    error!(%method, url, status = status.as_u16(), attempts = attempt, "Giving up after server errors");
                    return Err(RequestError::RetriesExhausted {
                        status: status.as_u16(),
                        attempts: attempt,
                        body: text,
                    });
                }

                warn!(status = status.as_u16(), attempt, max_attempts, "Server error, retrying");
                sleep(self.config.retry_delay).await;
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                error!(%method, url, status = status.as_u16(), "Request rejected");
                return Err(RequestError::Status {
                    status: status.as_u16(),
                    body: text,
                });
            }

            let bytes = response.bytes().await?;
            return serde_json::from_slice(&bytes).map_err(|e| RequestError::Decode(e.to_string()));
        }
    }

    /// Submit one generation request. Returns the ids of the renders it fanned out into.
    pub async fn submit_generation(&self, request: &GenerationRequest) -> Result<GenerateResponse, RequestError> {
        let body = serde_json::to_value(request).map_err(|e| RequestError::Decode(e.to_string()))?;
        let url = self.config.generate_url();

        let value = self.execute(Method::POST, &url, Some(&body), None).await?;
        let response: GenerateResponse =
            serde_json::from_value(value).map_err(|e| RequestError::Decode(e.to_string()))?;

        info!(tracks = ?response.track_ids, "Generation accepted");
        Ok(response)
    }

    /// Query the status of several renders in one call
    pub async fn song_status(&self, song_ids: &[String]) -> Result<SongStatusResponse, RequestError> {
        let url = self.config.status_url(song_ids);
        let value = self.execute(Method::GET, &url, None, None).await?;

        serde_json::from_value(value).map_err(|e| RequestError::Decode(e.to_string()))
    }
}
