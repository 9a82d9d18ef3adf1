use std::time::Duration;
use cz_core::{Stage, TrackLedger};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("server error {status} persisted after {attempts} attempts: {body}")]
    RetriesExhausted { status: u16, attempts: u32, body: String },
    #[error("request rejected with HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl RequestError {
    /// The call kept failing on server errors and was retried up to the bound
    pub fn was_retried(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RetriesExhausted { status, .. } | Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ChallengeError {
    #[error("no challenge solver configured")]
    Disabled,
    #[error("solver rejected the task: {0}")]
    Rejected(String),
    #[error("solver unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("solver gave no answer within {0:?}")]
    TimedOut(Duration),
}

#[derive(Error, Debug)]
pub enum PollError {
    #[error("status query failed: {0}")]
    Request(#[from] RequestError),
    #[error("no job ids to poll")]
    EmptyBatch,
    #[error("jobs still pending after {elapsed:?}: {pending:?}")]
    TimedOut { elapsed: Duration, pending: Vec<String> },
    #[error("polling cancelled")]
    Cancelled,
    #[error("job {0} finished without a storage path")]
    Incomplete(String),
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("job {0} has no storage path")]
    MissingPath(String),
    #[error("download failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("download returned HTTP {0}")]
    Status(u16),
    #[error("could not write audio file: {0}")]
    Io(#[from] std::io::Error),
}

/// What went wrong inside a single stage
#[derive(Error, Debug)]
pub enum StageFailure {
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("generation request failed: {0}")]
    Submit(#[source] RequestError),
    #[error("service accepted the request but returned no track ids")]
    NoTracks,
    #[error("run cancelled before the stage started")]
    Cancelled,
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error(transparent)]
    Download(#[from] DownloadError),
}

/// A run aborted at `stage`. Carries the ids accepted before the failure.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {kind}")]
pub struct SequenceError {
    pub stage: Stage,
    #[source]
    pub kind: StageFailure,
    pub ledger: TrackLedger,
}

impl SequenceError {
    pub fn new(stage: Stage, kind: impl Into<StageFailure>, ledger: TrackLedger) -> Self {
        Self {
            stage,
            kind: kind.into(),
            ledger,
        }
    }
}
