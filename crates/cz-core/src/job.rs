use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::model_types::{SongKind, Stage};
use crate::request::AudioConditioning;

/// One server-side render, as last reported by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub finished: bool,
    pub song_path: Option<String>,
    pub title: String,
    pub kind: SongKind,
}

impl Job {
    /// Reference a later request can use to continue from this job's audio.
    /// `None` until the job has finished and exposes a storage path.
    pub fn conditioning(&self) -> Option<AudioConditioning> {
        if !self.finished {
            return None;
        }
        self.song_path
            .as_ref()
            .filter(|p| !p.is_empty())
            .map(|path| AudioConditioning {
                path: path.clone(),
                song_id: self.id.clone(),
            })
    }
}

/// All jobs produced by one generation request, fully finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongBatch {
    pub stage: Stage,
    pub bucket: String,
    pub jobs: Vec<Job>,
    /// Local file per job, in job order. `None` where a lenient download failed.
    pub files: Vec<Option<PathBuf>>,
}

impl SongBatch {
    pub fn new(stage: Stage, jobs: Vec<Job>, files: Vec<Option<PathBuf>>) -> Self {
        Self {
            stage,
            bucket: stage.bucket().to_string(),
            jobs,
            files,
        }
    }

    /// The job the next stage is conditioned on
    pub fn lead(&self) -> Option<&Job> {
        self.jobs.first()
    }

    pub fn is_complete(&self) -> bool {
        !self.jobs.is_empty() && self.jobs.iter().all(|j| j.finished)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub stage: Stage,
    pub track_id: String,
    pub accepted_at: DateTime<Utc>,
}

/// Append-only record of every track id the service accepted during a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackLedger {
    entries: Vec<LedgerEntry>,
}

impl TrackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<I, S>(&mut self, stage: Stage, track_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Utc::now();
        self.entries.extend(track_ids.into_iter().map(|id| LedgerEntry {
            stage,
            track_id: id.into(),
            accepted_at: now,
        }));
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn track_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.track_id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of a full run. Only ever built once every stage has succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceResult {
    pub run_id: String,
    pub initial: SongBatch,
    pub extensions: Vec<SongBatch>,
    pub outro: SongBatch,
    pub ledger: TrackLedger,
}

impl SequenceResult {
    /// Batches in playback order
    pub fn batches(&self) -> impl Iterator<Item = &SongBatch> {
        std::iter::once(&self.initial)
            .chain(self.extensions.iter())
            .chain(std::iter::once(&self.outro))
    }
}
