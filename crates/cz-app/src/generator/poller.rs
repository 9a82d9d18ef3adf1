use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use cz_core::{Job, SongKind};
use crate::error::PollError;
use crate::generator::backend::StudioClient;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(20 * 60);

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    /// Give up once this much time has passed. `None` waits forever.
    pub max_wait: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: Some(DEFAULT_MAX_WAIT),
        }
    }
}

/// Waits for a batch of renders to finish
pub struct JobPoller {
    client: Arc<StudioClient>,
    config: PollConfig,
    cancel: CancellationToken,
}

impl JobPoller {
    pub fn new(client: Arc<StudioClient>, config: PollConfig, cancel: CancellationToken) -> Self {
        Self {
            client,
            config,
            cancel,
        }
    }

    /// Poll until every id in `song_ids` reports finished, then return the
    /// jobs in the order they were requested. Ids missing from a status
    /// response count as unfinished.
    pub async fn await_completion(&self, kind: SongKind, song_ids: &[String]) -> Result<Vec<Job>, PollError> {
        let mut ids: Vec<String> = Vec::with_capacity(song_ids.len());
        for id in song_ids {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        if ids.is_empty() {
            return Err(PollError::EmptyBatch);
        }

        let started = Instant::now();
        let mut cycle = 0u32;

        loop {
            cycle += 1;

            let status = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PollError::Cancelled),
                status = self.client.song_status(&ids) => status?,
            };

            let mut records: HashMap<String, _> = status
                .songs
                .into_iter()
                .map(|song| (song.id.clone(), song))
                .collect();

            let pending: Vec<String> = ids
                .iter()
                .filter(|id| !records.get(*id).is_some_and(|song| song.finished))
                .cloned()
                .collect();

            if pending.is_empty() {
                let jobs: Vec<Job> = ids
                    .iter()
                    .filter_map(|id| records.remove(id))
                    .map(|song| song.into_job(kind))
                    .collect();

                if let Some(job) = jobs.iter().find(|job| job.song_path.is_none()) {
                    return Err(PollError::Incomplete(job.id.clone()));
                }

                info!(%kind, cycles = cycle, jobs = jobs.len(), "All jobs finished");
                return Ok(jobs);
            }

            let elapsed = started.elapsed();
            let mut wait = self.config.interval;
            if let Some(max_wait) = self.config.max_wait {
                if elapsed >= max_wait {
                    return Err(PollError::TimedOut { elapsed, pending });
                }
                wait = wait.min(max_wait - elapsed);
            }

            debug!(%kind, cycle, pending = ?pending, "Jobs still rendering");

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PollError::Cancelled),
                _ = sleep(wait) => {}
            }
        }
    }
}
