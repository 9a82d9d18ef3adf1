use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use crate::model_types::SongKind;

/// Seed value the service reads as "pick one at random"
pub const RANDOM_SEED: i64 = -1;

/// Fraction of the conditioning track where an outro's crop begins
pub const OUTRO_CROP_START: f64 = 0.9;

const CONDITIONING_TYPE: &str = "continuation";

/// Pointer to a finished job's audio that a new request continues from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConditioning {
    pub path: String,
    pub song_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerOptions {
    pub seed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_conditioning_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_conditioning_song_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_start_time: Option<f64>,
    #[serde(flatten)]
    pub tuning: BTreeMap<String, Value>,
}

/// Body of a single generation call. Built once per stage and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(rename = "samplerOptions")]
    pub sampler_options: SamplerOptions,
    #[serde(rename = "lyricInput", skip_serializing_if = "Option::is_none")]
    pub lyric_input: Option<String>,
}

impl GenerationRequest {
    /// Fresh segment with no audio to continue from
    pub fn initial(prompt: impl Into<String>, seed: Option<i64>, lyrics: Option<&str>) -> Self {
        Self::build(SongKind::Initial, prompt.into(), seed, None, lyrics)
    }

    pub fn extension(
        prompt: impl Into<String>,
        seed: Option<i64>,
        conditioning: AudioConditioning,
        lyrics: Option<&str>,
    ) -> Self {
        Self::build(SongKind::Extension, prompt.into(), seed, Some(conditioning), lyrics)
    }

    pub fn outro(
        prompt: impl Into<String>,
        seed: Option<i64>,
        conditioning: AudioConditioning,
        lyrics: Option<&str>,
    ) -> Self {
        Self::build(SongKind::Outro, prompt.into(), seed, Some(conditioning), lyrics)
    }

    fn build(
        kind: SongKind,
        prompt: String,
        seed: Option<i64>,
        conditioning: Option<AudioConditioning>,
        lyrics: Option<&str>,
    ) -> Self {
        let (path, song_id) = match conditioning {
            Some(c) => (Some(c.path), Some(c.song_id)),
            None => (None, None),
        };

        Self {
            prompt,
            sampler_options: SamplerOptions {
                seed: seed.unwrap_or(RANDOM_SEED),
                audio_conditioning_path: path,
                audio_conditioning_song_id: song_id,
                crop_start_time: (kind == SongKind::Outro).then_some(OUTRO_CROP_START),
                tuning: tuning_preset(kind),
            },
            // Blank lyrics mean "let the service write them"
            lyric_input: lyrics
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string),
        }
    }

    pub fn conditioning(&self) -> Option<AudioConditioning> {
        let opts = &self.sampler_options;
        match (&opts.audio_conditioning_path, &opts.audio_conditioning_song_id) {
            (Some(path), Some(song_id)) => Some(AudioConditioning {
                path: path.clone(),
                song_id: song_id.clone(),
            }),
            _ => None,
        }
    }
}

/// Tuning parameters sent alongside the seed for each kind of request
pub fn tuning_preset(kind: SongKind) -> BTreeMap<String, Value> {
    let mut tuning = BTreeMap::new();
    tuning.insert("audio_conditioning_type".to_string(), json!(CONDITIONING_TYPE));

    if kind == SongKind::Initial {
        tuning.insert("bypass_prompt_optimization".to_string(), json!(false));
        tuning.insert("prompt_strength".to_string(), json!(0.5));
        tuning.insert("clarity_strength".to_string(), json!(0.25));
        tuning.insert("lyrics_strength".to_string(), json!(0.5));
        tuning.insert("generation_quality".to_string(), json!(0.75));
        tuning.insert("audio_conditioning_length_seconds".to_string(), json!(130));
        tuning.insert("use_2min_model".to_string(), json!(false));
    }

    tuning
}
