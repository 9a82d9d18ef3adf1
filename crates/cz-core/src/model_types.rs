use std::fmt;
use serde::{Deserialize, Serialize};

/// The three kinds of segment a complete song is assembled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongKind {
    Initial,
    Extension,
    Outro,
}

impl SongKind {
    /// Directory name the rendered audio is downloaded into
    pub fn bucket(&self) -> &'static str {
        match self {
            Self::Initial => "short_songs",
            Self::Extension => "extend_songs",
            Self::Outro => "outro_songs",
        }
    }

    /// Human-readable name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Extension => "extension",
            Self::Outro => "outro",
        }
    }

    /// Whether a request of this kind continues from a previous segment
    pub fn is_conditioned(&self) -> bool {
        matches!(self, Self::Extension | Self::Outro)
    }

    pub fn all() -> [SongKind; 3] {
        [Self::Initial, Self::Extension, Self::Outro]
    }
}

impl fmt::Display for SongKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One phase of a sequence. Extensions carry their zero-based position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "stage", content = "index", rename_all = "snake_case")]
pub enum Stage {
    Initial,
    Extension(usize),
    Outro,
}

impl Stage {
    pub fn kind(&self) -> SongKind {
        match self {
            Self::Initial => SongKind::Initial,
            Self::Extension(_) => SongKind::Extension,
            Self::Outro => SongKind::Outro,
        }
    }

    pub fn bucket(&self) -> &'static str {
        self.kind().bucket()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extension(i) => write!(f, "extension {}", i + 1),
            other => f.write_str(other.kind().name()),
        }
    }
}

/// Sequence state machine. `Failed` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceState {
    Idle,
    GeneratingInitial,
    GeneratingExtension(usize),
    GeneratingOutro,
    Complete,
    Failed,
}

impl SequenceState {
    /// State entered when work on `stage` begins
    pub fn generating(stage: Stage) -> Self {
        match stage {
            Stage::Initial => Self::GeneratingInitial,
            Stage::Extension(i) => Self::GeneratingExtension(i),
            Stage::Outro => Self::GeneratingOutro,
        }
    }

    pub fn is_generating(&self) -> bool {
        matches!(
            self,
            Self::GeneratingInitial | Self::GeneratingExtension(_) | Self::GeneratingOutro
        )
    }

    /// Whether the machine may move from `self` to `next`.
    pub fn can_transition_to(&self, next: SequenceState) -> bool {
        use SequenceState::*;

        match (*self, next) {
            (Idle, GeneratingInitial) => true,
            (GeneratingInitial, GeneratingExtension(0)) => true,
            (GeneratingInitial, GeneratingOutro) => true,
            (GeneratingExtension(i), GeneratingExtension(j)) => j == i + 1,
            (GeneratingExtension(_), GeneratingOutro) => true,
            (GeneratingOutro, Complete) => true,
            (from, Failed) => from.is_generating(),
            _ => false,
        }
    }
}
