use serde::{Deserialize, Serialize};
use cz_core::{Job, SongKind};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateResponse {
    #[serde(default)]
    pub track_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SongRecord {
    pub id: String,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub song_path: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl SongRecord {
    pub fn into_job(self, kind: SongKind) -> Job {
        // Untitled renders are named after their id so the file still lands somewhere
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.id.clone());

        Job {
            id: self.id,
            finished: self.finished,
            song_path: self.song_path.filter(|p| !p.is_empty()),
            title,
            kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SongStatusResponse {
    #[serde(default)]
    pub songs: Vec<SongRecord>,
}
