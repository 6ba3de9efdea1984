use crate::config;
use crate::error::LaunchError;
use crate::events::EventSink;
use crate::net::hash;
use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;

/// Retry policy for one logical fetch. `attempts` counts the initial try;
/// backoff grows linearly (`backoff * attempt`) between tries.
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug)]
pub enum FetchOutcome {
    Completed(PathBuf),
    /// The server said 404; nothing was written. Callers that probe a
    /// chain of maven roots use this to move on to the next one.
    SkippedNotFound,
}

impl FetchOutcome {
    pub fn completed(&self) -> Option<&Path> {
        match self {
            FetchOutcome::Completed(path) => Some(path),
            FetchOutcome::SkippedNotFound => None,
        }
    }
}

/// HTTP fetcher shared by every phase. One `reqwest::Client`, one global
/// semaphore: the concurrency cap spans libraries, natives and assets no
/// matter how wide the per-phase fan-out is.
pub struct Fetcher {
    client: Client,
    permits: Arc<Semaphore>,
    sink: Arc<dyn EventSink>,
    retry: Retry,
}

impl Fetcher {
    pub fn new(sink: Arc<dyn EventSink>, max_sockets: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config::REQUEST_TIMEOUT_SECS))
            .build()
            .context("build http client")?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(max_sockets.max(1))),
            sink,
            retry: Retry::default(),
        })
    }

    pub fn with_retry(mut self, retry: Retry) -> Self {
        self.retry = retry;
        self
    }

    /// Download `url` to `dest_dir/filename`, creating `dest_dir` as
    /// needed. Emits `download-status` while bytes accrue and `download`
    /// on completion. 404 is a skip, not an error.
    pub async fn fetch(
        &self,
        url: &str,
        dest_dir: &Path,
        filename: &str,
        kind: &str,
    ) -> Result<FetchOutcome> {
        let _permit = self.permits.acquire().await.context("fetch pool closed")?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(url, dest_dir, filename, kind).await {
                Ok(outcome) => {
                    if outcome.completed().is_some() {
                        self.sink.download(filename);
                    }
                    return Ok(outcome);
                }
                Err(err) if attempt < self.retry.attempts => {
                    log::warn!(
                        "download failed (attempt {}/{}) for {}: {:#}",
                        attempt,
                        self.retry.attempts,
                        url,
                        err
                    );
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                }
                Err(err) => {
                    return Err(err.context(LaunchError::FetchFailed {
                        url: url.to_string(),
                    }))
                }
            }
        }
    }

    /// [`Fetcher::fetch`] plus SHA-1 verification: a completed file whose
    /// digest mismatches is deleted and fetched once more; a second
    /// mismatch surfaces as [`LaunchError::HashMismatch`].
    pub async fn fetch_checked(
        &self,
        url: &str,
        dest_dir: &Path,
        filename: &str,
        kind: &str,
        expected_sha1: Option<&str>,
    ) -> Result<FetchOutcome> {
        let outcome = self.fetch(url, dest_dir, filename, kind).await?;

        if let (Some(path), Some(expected)) = (outcome.completed(), expected_sha1) {
            if hash::sha1_matches(path, expected).await {
                return Ok(outcome);
            }

            log::warn!(
                "sha1 mismatch for {:?}, re-downloading once from {}",
                path,
                url
            );
            let _ = fs::remove_file(path).await;

            let retried = self.fetch(url, dest_dir, filename, kind).await?;
            if let Some(path) = retried.completed() {
                if !hash::sha1_matches(path, expected).await {
                    let actual = hash::sha1_file(path).await.unwrap_or_default();
                    let _ = fs::remove_file(path).await;
                    return Err(LaunchError::HashMismatch {
                        path: path.to_path_buf(),
                        expected: expected.to_string(),
                        actual,
                    }
                    .into());
                }
            }
            return Ok(retried);
        }

        Ok(outcome)
    }

    /// GET a JSON document and deserialize it, under the same socket cap.
    pub async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let _permit = self.permits.acquire().await.context("fetch pool closed")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error {} for {}", response.status(), url);
        }

        response
            .json()
            .await
            .with_context(|| format!("parse JSON from {}", url))
    }

    async fn attempt(
        &self,
        url: &str,
        dest_dir: &Path,
        filename: &str,
        kind: &str,
    ) -> Result<FetchOutcome> {
        fs::create_dir_all(dest_dir)
            .await
            .with_context(|| format!("create {:?}", dest_dir))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            log::debug!("404 for {}, skipping", url);
            return Ok(FetchOutcome::SkippedNotFound);
        }
        if !response.status().is_success() {
            anyhow::bail!("HTTP error {} for {}", response.status(), url);
        }

        let total = response.content_length().unwrap_or(0);
        let dest = dest_dir.join(filename);
        // Stream into a sidecar file and rename on success so a failed
        // transfer never leaves a partial file at the destination.
        let tmp = dest_dir.join(format!("{}.part", filename));

        let write = async {
            let mut file = File::create(&tmp).await?;
            let mut current: u64 = 0;
            let mut stream = response.bytes_stream();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                current += chunk.len() as u64;
                self.sink.download_status(filename, kind, current, total);
            }

            file.flush().await?;
            file.sync_all().await?;
            Ok::<(), anyhow::Error>(())
        };

        match write.await {
            Ok(()) => {
                fs::rename(&tmp, &dest).await?;
                Ok(FetchOutcome::Completed(dest))
            }
            Err(err) => {
                let _ = fs::remove_file(&tmp).await;
                Err(err.context(format!("stream {} to {:?}", url, dest)))
            }
        }
    }
}
