pub mod config;
pub mod error;
pub mod generator;

pub use config::AppConfig;
pub use error::{ChallengeError, DownloadError, PollError, RequestError, SequenceError, StageFailure};
pub use generator::Sequencer;
