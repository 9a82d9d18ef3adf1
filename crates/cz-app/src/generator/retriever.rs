use std::path::PathBuf;
use std::str::FromStr;
use futures::future::join_all;
use tracing::{info, warn};
use cz_core::Job;
use crate::error::DownloadError;

/// What a failed download does to its batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadPolicy {
    /// Abort the stage
    #[default]
    Fatal,
    /// Log it and keep the job in the batch without a local file
    Lenient,
}

impl FromStr for DownloadPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fatal" => Ok(Self::Fatal),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!("unknown download policy '{other}' (expected fatal or lenient)")),
        }
    }
}

/// Downloads finished renders into `<root>/<bucket>/<title>.mp3`
pub struct AssetRetriever {
    client: reqwest::Client,
    root: PathBuf,
    policy: DownloadPolicy,
}

impl AssetRetriever {
    pub fn new(root: impl Into<PathBuf>, policy: DownloadPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            root: root.into(),
            policy,
        }
    }

    /// Local path a job's audio is written to
    pub fn destination(&self, job: &Job, bucket: &str) -> PathBuf {
        self.root.join(bucket).join(format!("{}.mp3", file_stem(&job.title)))
    }

    /// Download one job's audio, replacing any file already at the destination
    pub async fn fetch(&self, job: &Job, bucket: &str) -> Result<PathBuf, DownloadError> {
        self.ensure_bucket(bucket).await?;
        let bytes = self.download(job).await?;
        self.store(job, bucket, &bytes).await
    }

    /// Download every job of a batch concurrently. Files are written in job
    /// order afterwards, so jobs sharing a title resolve to the last one.
    /// Under the lenient policy a failed job yields `None`.
    pub async fn fetch_batch(&self, jobs: &[Job], bucket: &str) -> Result<Vec<Option<PathBuf>>, DownloadError> {
        self.ensure_bucket(bucket).await?;
        let downloads = join_all(jobs.iter().map(|job| self.download(job))).await;

        let mut files = Vec::with_capacity(jobs.len());
        for (job, download) in jobs.iter().zip(downloads) {
            let stored = match download {
                Ok(bytes) => self.store(job, bucket, &bytes).await,
                Err(e) => Err(e),
            };

            match (stored, self.policy) {
                (Ok(path), _) => files.push(Some(path)),
                (Err(e), DownloadPolicy::Fatal) => return Err(e),
                (Err(e), DownloadPolicy::Lenient) => {
                    warn!(job = %job.id, error = %e, "Download failed, keeping job without a local file");
                    files.push(None);
                }
            }
        }

        Ok(files)
    }

    async fn download(&self, job: &Job) -> Result<Vec<u8>, DownloadError> {
        let url = job
            .song_path
            .as_deref()
            .ok_or_else(|| DownloadError::MissingPath(job.id.clone()))?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status().as_u16()));
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Created before any download, whether or not one succeeds
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), DownloadError> {
        tokio::fs::create_dir_all(self.root.join(bucket)).await?;
        Ok(())
    }

    async fn store(&self, job: &Job, bucket: &str, bytes: &[u8]) -> Result<PathBuf, DownloadError> {
        let path = self.destination(job, bucket);
        tokio::fs::write(&path, bytes).await?;

        info!(job = %job.id, path = %path.display(), bytes = bytes.len(), "Downloaded audio");
        Ok(path)
    }
}

/// Titles come from the service, so keep them from escaping the bucket
fn file_stem(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match stem.as_str() {
        "" | "." | ".." => "untitled".to_string(),
        _ => stem,
    }
}
