use crate::config::EngineConfig;
use crate::error::FetchError;
use crate::models::DictionarySource;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect, Client};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const PDF_MAGIC: &[u8] = b"%PDF-";
const ACCEPTED_CONTENT_TYPES: [&str; 3] =
    ["application/pdf", "application/x-pdf", "application/octet-stream"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    AlreadyPresent(PathBuf),
    Downloaded { path: PathBuf, bytes: u64 },
}

impl FetchOutcome {
    pub fn path(&self) -> &Path {
        match self {
            FetchOutcome::AlreadyPresent(path) => path,
            FetchOutcome::Downloaded { path, .. } => path,
        }
    }
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &DictionarySource) -> Result<FetchOutcome, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
    min_pdf_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &EngineConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.fetch_timeout)
            .redirect(redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            min_pdf_bytes: config.min_pdf_bytes,
        })
    }

    async fn download(&self, source: &DictionarySource, partial: &Path) -> Result<u64, FetchError> {
        let http_error = |error| FetchError::Http {
            source_id: source.id.clone(),
            error,
        };
        let io_error = |error| FetchError::Io {
            source_id: source.id.clone(),
            error,
        };

        let mut response = self
            .client
            .get(&source.url)
            .send()
            .await
            .map_err(http_error)?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                source_id: source.id.clone(),
                status: response.status().as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        check_content_type(&source.id, content_type.as_deref())?;

        let mut file = tokio::fs::File::create(partial).await.map_err(io_error)?;
        let mut head = Vec::with_capacity(PDF_MAGIC.len());
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(http_error)? {
            if head.len() < PDF_MAGIC.len() {
                let take = (PDF_MAGIC.len() - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(io_error)?;
        file.sync_all().await.map_err(io_error)?;
        drop(file);

        check_payload(&source.id, &head, written, self.min_pdf_bytes)?;
        Ok(written)
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, source: &DictionarySource) -> Result<FetchOutcome, FetchError> {
        let path = source.local_path.clone();
        if is_present(&path).await {
            debug!(source = %source.id, path = %path.display(), "dictionary already downloaded");
            return Ok(FetchOutcome::AlreadyPresent(path));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| FetchError::Io {
                    source_id: source.id.clone(),
                    error,
                })?;
        }

        let partial = partial_path(&path);
        info!(source = %source.id, url = %source.url, "downloading dictionary");

        let bytes = match self.download(source, &partial).await {
            Ok(bytes) => bytes,
            Err(error) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(error);
            }
        };

        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|error| FetchError::Io {
                source_id: source.id.clone(),
                error,
            })?;

        info!(source = %source.id, bytes, "dictionary downloaded");
        Ok(FetchOutcome::Downloaded { path, bytes })
    }
}

/// Downloads every source that is not already on disk, at most `workers` at a time.
/// Results come back in the order of `sources`.
pub async fn ensure_downloaded(
    fetcher: Arc<dyn SourceFetcher>,
    sources: &[DictionarySource],
    workers: usize,
) -> Vec<(String, Result<FetchOutcome, FetchError>)> {
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    for (position, source) in sources.iter().cloned().enumerate() {
        let fetcher = Arc::clone(&fetcher);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let outcome = fetcher.fetch(&source).await;
            (position, source.id, outcome)
        });
    }

    let mut slots: Vec<Option<(String, Result<FetchOutcome, FetchError>)>> =
        sources.iter().map(|_| None).collect();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((position, id, outcome)) => {
                if let Err(error) = &outcome {
                    warn!(source = %id, %error, "dictionary download failed");
                }
                slots[position] = Some((id, outcome));
            }
            Err(error) => warn!(%error, "download task aborted"),
        }
    }

    slots
        .into_iter()
        .zip(sources)
        .map(|(slot, source)| {
            slot.unwrap_or_else(|| {
                (
                    source.id.clone(),
                    Err(FetchError::Io {
                        source_id: source.id.clone(),
                        error: std::io::Error::new(
                            std::io::ErrorKind::Interrupted,
                            "download task did not complete",
                        ),
                    }),
                )
            })
        })
        .collect()
}

async fn is_present(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

pub fn check_content_type(source_id: &str, content_type: Option<&str>) -> Result<(), FetchError> {
    let Some(raw) = content_type else {
        return Ok(());
    };

    let mime = raw
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if ACCEPTED_CONTENT_TYPES.contains(&mime.as_str()) {
        Ok(())
    } else {
        Err(FetchError::ContentType {
            source_id: source_id.to_string(),
            content_type: raw.to_string(),
        })
    }
}

pub fn check_payload(source_id: &str, head: &[u8], size: u64, min_bytes: u64) -> Result<(), FetchError> {
    if size < min_bytes.max(1) {
        return Err(FetchError::TooSmall {
            source_id: source_id.to_string(),
            size,
        });
    }

    if !head.starts_with(PDF_MAGIC) {
        return Err(FetchError::NotPdf {
            source_id: source_id.to_string(),
        });
    }

    Ok(())
}
