//! Source video download.
//!
//! Streams the source into a fresh working directory and computes a SHA-256 digest
//! over the same byte stream, so the file is never read twice.

use super::{remove_working_dir, VideoSource, WorkingVideo};
use crate::config::{FetchSettings, Settings};
use crate::error::{LecternError, Result};
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, instrument};
use uuid::Uuid;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Downloads source videos into per-run working directories.
pub struct MediaFetcher {
    client: reqwest::Client,
    work_root: PathBuf,
    allow_file_urls: bool,
    max_bytes: Option<u64>,
}

impl MediaFetcher {
    /// Create a fetcher from application settings.
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(settings.fetch.connect_timeout_secs))
            .build()
            .map_err(|e| LecternError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, settings.work_dir(), &settings.fetch))
    }

    /// Create a fetcher with a custom HTTP client and working root.
    pub fn with_client(client: reqwest::Client, work_root: PathBuf, fetch: &FetchSettings) -> Self {
        Self {
            client,
            work_root,
            allow_file_urls: fetch.allow_file_urls,
            max_bytes: fetch.max_bytes,
        }
    }

    /// Validate a raw source reference against this fetcher's policy.
    pub fn parse_source(&self, input: &str) -> Result<VideoSource> {
        VideoSource::parse(input, self.allow_file_urls)
    }

    /// Working directory reserved for run `run_id`.
    pub fn working_dir_for(&self, run_id: Uuid) -> PathBuf {
        self.work_root.join(run_id.to_string())
    }

    /// Download `source` into a newly created working directory.
    pub async fn fetch(&self, source: &VideoSource) -> Result<WorkingVideo> {
        self.fetch_into(source, self.working_dir_for(Uuid::new_v4()))
            .await
    }

    /// Download `source` into `working_dir`, creating it.
    ///
    /// On failure the working directory is removed before returning.
    #[instrument(skip(self, working_dir), fields(source = %source))]
    pub async fn fetch_into(&self, source: &VideoSource, working_dir: PathBuf) -> Result<WorkingVideo> {
        if source.is_local() && !self.allow_file_urls {
            return Err(LecternError::InvalidSource(format!(
                "local sources are disabled: {}",
                source
            )));
        }

        tokio::fs::create_dir_all(&working_dir).await.map_err(|e| {
            LecternError::Fetch(format!("cannot create working directory {:?}: {}", working_dir, e))
        })?;

        let extension = source.extension().unwrap_or_else(|| "mp4".to_string());
        let path = working_dir.join(format!("source.{}", extension));

        match self.download(source, &path).await {
            Ok((content_hash, size_bytes)) => {
                info!("Fetched {} bytes (sha256 {})", size_bytes, content_hash);
                Ok(WorkingVideo {
                    path,
                    content_hash,
                    working_dir,
                    size_bytes,
                })
            }
            Err(e) => {
                remove_working_dir(&working_dir).await;
                Err(e)
            }
        }
    }

    async fn download(&self, source: &VideoSource, dest: &Path) -> Result<(String, u64)> {
        let mut out = HashingFile::create(dest, self.max_bytes).await?;

        if source.is_local() {
            let local_path = source
                .url()
                .to_file_path()
                .map_err(|_| LecternError::InvalidSource(source.to_string()))?;
            let mut input = File::open(&local_path)
                .await
                .map_err(|e| LecternError::Fetch(format!("cannot open {:?}: {}", local_path, e)))?;

            let mut buffer = vec![0u8; READ_BUFFER_SIZE];
            loop {
                let read = input
                    .read(&mut buffer)
                    .await
                    .map_err(|e| LecternError::Fetch(format!("read failed: {}", e)))?;
                if read == 0 {
                    break;
                }
                out.write_chunk(&buffer[..read]).await?;
            }
        } else {
            let response = self
                .client
                .get(source.url().clone())
                .send()
                .await
                .map_err(|e| LecternError::Fetch(format!("request failed: {}", e)))?
                .error_for_status()
                .map_err(|e| LecternError::Fetch(format!("server rejected download: {}", e)))?;

            if let (Some(limit), Some(length)) = (self.max_bytes, response.content_length()) {
                if length > limit {
                    return Err(LecternError::Fetch(format!(
                        "source is {} bytes, limit is {}",
                        length, limit
                    )));
                }
            }

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let data = chunk.map_err(|e| LecternError::Fetch(format!("transfer interrupted: {}", e)))?;
                out.write_chunk(&data).await?;
            }
        }

        out.finish().await
    }
}

/// Output file that hashes everything written through it.
struct HashingFile {
    file: File,
    hasher: Sha256,
    written: u64,
    limit: Option<u64>,
}

impl HashingFile {
    async fn create(path: &Path, limit: Option<u64>) -> Result<Self> {
        let file = File::create(path)
            .await
            .map_err(|e| LecternError::Fetch(format!("cannot create {:?}: {}", path, e)))?;
        Ok(Self {
            file,
            hasher: Sha256::new(),
            written: 0,
            limit,
        })
    }

    async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        self.written += data.len() as u64;
        if let Some(limit) = self.limit {
            if self.written > limit {
                return Err(LecternError::Fetch(format!("download exceeded {} bytes", limit)));
            }
        }

        self.hasher.update(data);
        self.file
            .write_all(data)
            .await
            .map_err(|e| LecternError::Fetch(format!("write failed: {}", e)))
    }

    async fn finish(mut self) -> Result<(String, u64)> {
        self.file
            .flush()
            .await
            .map_err(|e| LecternError::Fetch(format!("flush failed: {}", e)))?;
        debug!("Wrote {} bytes", self.written);
        Ok((format!("{:x}", self.hasher.finalize()), self.written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(work_root: &Path, max_bytes: Option<u64>) -> MediaFetcher {
        let fetch = FetchSettings {
            allow_file_urls: true,
            max_bytes,
            ..FetchSettings::default()
        };
        MediaFetcher::with_client(reqwest::Client::new(), work_root.to_path_buf(), &fetch)
    }

    fn file_url(path: &Path) -> String {
        url::Url::from_file_path(path).unwrap().to_string()
    }

    #[tokio::test]
    async fn test_fetch_local_file_hashes_content() {
        let src_dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("lecture.mp4");
        std::fs::write(&src, b"abc").unwrap();

        let fetcher = fetcher(work.path(), None);
        let source = fetcher.parse_source(&file_url(&src)).unwrap();
        let video = fetcher.fetch(&source).await.unwrap();

        // SHA-256 of "abc"
        assert_eq!(
            video.content_hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(video.size_bytes, 3);
        assert_eq!(std::fs::read(&video.path).unwrap(), b"abc");
        assert!(video.path.ends_with("source.mp4"));
        assert!(video.working_dir.starts_with(work.path()));

        video.cleanup().await;
        assert!(!video.working_dir.exists());
    }

    #[tokio::test]
    async fn test_fetch_missing_file_cleans_up() {
        let work = tempfile::tempdir().unwrap();
        let fetcher = fetcher(work.path(), None);
        let source = fetcher.parse_source("file:///definitely/not/here.mp4").unwrap();

        let err = fetcher.fetch(&source).await.unwrap_err();
        assert!(matches!(err, LecternError::Fetch(_)));
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_enforces_size_limit() {
        let src_dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("big.mp4");
        std::fs::write(&src, vec![7u8; 1024]).unwrap();

        let fetcher = fetcher(work.path(), Some(100));
        let source = fetcher.parse_source(&file_url(&src)).unwrap();

        let err = fetcher.fetch(&source).await.unwrap_err();
        assert!(err.to_string().contains("exceeded 100 bytes"));
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_local_source_rejected_when_disabled() {
        let work = tempfile::tempdir().unwrap();
        let fetcher = MediaFetcher::with_client(
            reqwest::Client::new(),
            work.path().to_path_buf(),
            &FetchSettings::default(),
        );
        // Built with file URLs allowed, fetched by a fetcher that forbids them.
        let source = VideoSource::parse("file:///tmp/lecture.mp4", true).unwrap();

        let err = fetcher.fetch(&source).await.unwrap_err();
        assert!(matches!(err, LecternError::InvalidSource(_)));
    }

    async fn spawn_origin() -> String {
        use axum::{body::Body, body::Bytes, routing::get, Router};

        async fn broken() -> Body {
            Body::from_stream(futures::stream::iter(vec![
                Ok(Bytes::from_static(b"first half")),
                Err(std::io::Error::other("origin went away")),
            ]))
        }

        let app = Router::new()
            .route("/lecture.mp4", get(|| async { "abc" }))
            .route("/stream.php", get(|| async { "abc" }))
            .route("/big.mp4", get(|| async { vec![7u8; 1024] }))
            .route("/broken.mp4", get(broken));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_http_streams_and_hashes() {
        let origin = spawn_origin().await;
        let work = tempfile::tempdir().unwrap();
        let fetcher = fetcher(work.path(), None);

        let source = fetcher.parse_source(&format!("{}/lecture.mp4", origin)).unwrap();
        let video = fetcher.fetch(&source).await.unwrap();
        assert_eq!(
            video.content_hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(video.size_bytes, 3);
        assert_eq!(std::fs::read(&video.path).unwrap(), b"abc");
        video.cleanup().await;

        // Non-container names fall back to mp4 for the working copy.
        let source = fetcher.parse_source(&format!("{}/stream.php?id=7", origin)).unwrap();
        let video = fetcher.fetch(&source).await.unwrap();
        assert!(video.path.ends_with("source.mp4"));
        video.cleanup().await;

        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_http_error_status_cleans_up() {
        let origin = spawn_origin().await;
        let work = tempfile::tempdir().unwrap();
        let fetcher = fetcher(work.path(), None);

        let source = fetcher.parse_source(&format!("{}/missing.mp4", origin)).unwrap();
        let err = fetcher.fetch(&source).await.unwrap_err();
        assert!(matches!(err, LecternError::Fetch(_)));
        assert!(err.to_string().contains("404"));
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_http_rejects_declared_length_over_limit() {
        let origin = spawn_origin().await;
        let work = tempfile::tempdir().unwrap();
        let fetcher = fetcher(work.path(), Some(100));

        let source = fetcher.parse_source(&format!("{}/big.mp4", origin)).unwrap();
        let err = fetcher.fetch(&source).await.unwrap_err();
        assert!(err.to_string().contains("source is 1024 bytes, limit is 100"));
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_http_interrupted_transfer_cleans_up() {
        let origin = spawn_origin().await;
        let work = tempfile::tempdir().unwrap();
        let fetcher = fetcher(work.path(), None);

        let source = fetcher.parse_source(&format!("{}/broken.mp4", origin)).unwrap();
        let err = fetcher.fetch(&source).await.unwrap_err();
        assert!(matches!(err, LecternError::Fetch(_)));
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }
}
