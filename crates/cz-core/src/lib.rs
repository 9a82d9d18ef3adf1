pub mod job;
pub mod plan;
pub mod request;
mod model_types;

pub use job::{Job, LedgerEntry, SequenceResult, SongBatch, TrackLedger};
pub use model_types::{SequenceState, SongKind, Stage};
pub use plan::{select_for_stage, SongPlan};
pub use request::{AudioConditioning, GenerationRequest, SamplerOptions, OUTRO_CROP_START, RANDOM_SEED};
