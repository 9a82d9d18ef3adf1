use serde::{Deserialize, Serialize};

/// Pick the entry for stage `index`: the `index`-th item when the list is long
/// enough, otherwise the last one. `None` only for an empty list.
pub fn select_for_stage<T>(items: &[T], index: usize) -> Option<&T> {
    items.get(index).or_else(|| items.last())
}

fn default_extension_count() -> usize {
    1
}

/// Everything needed to generate intro, extensions and outro in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongPlan {
    pub initial_prompt: String,
    #[serde(default)]
    pub extension_prompts: Vec<String>,
    pub outro_prompt: String,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default)]
    pub initial_lyrics: Option<String>,
    #[serde(default)]
    pub extension_lyrics: Option<Vec<String>>,
    #[serde(default)]
    pub outro_lyrics: Option<String>,
    #[serde(default = "default_extension_count")]
    pub extension_count: usize,
}

impl SongPlan {
    pub fn new(
        initial_prompt: impl Into<String>,
        extension_prompts: Vec<String>,
        outro_prompt: impl Into<String>,
    ) -> Self {
        Self {
            initial_prompt: initial_prompt.into(),
            extension_prompts,
            outro_prompt: outro_prompt.into(),
            seed: None,
            initial_lyrics: None,
            extension_lyrics: None,
            outro_lyrics: None,
            extension_count: default_extension_count(),
        }
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_extension_count(mut self, count: usize) -> Self {
        self.extension_count = count;
        self
    }

    pub fn with_extension_lyrics(mut self, lyrics: Vec<String>) -> Self {
        self.extension_lyrics = Some(lyrics);
        self
    }

    /// Reasons this plan cannot run, checked before any request goes out
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_prompt.trim().is_empty() {
            return Err("initial prompt is empty".into());
        }
        if self.outro_prompt.trim().is_empty() {
            return Err("outro prompt is empty".into());
        }
        if self.extension_count > 0 && self.extension_prompts.is_empty() {
            return Err(format!(
                "{} extensions requested but no extension prompts given",
                self.extension_count
            ));
        }
        Ok(())
    }

    pub fn extension_prompt(&self, index: usize) -> Option<&str> {
        select_for_stage(&self.extension_prompts, index).map(String::as_str)
    }

    /// Lyrics for extension `index`, only when a lyrics list was supplied
    pub fn extension_lyrics(&self, index: usize) -> Option<&str> {
        self.extension_lyrics
            .as_deref()
            .and_then(|lyrics| select_for_stage(lyrics, index))
            .map(String::as_str)
    }
}
