use crate::config::{EngineConfig, FetchPolicy};
use crate::error::{BuildError, FetchError, IndexLoadError};
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::fetcher::{ensure_downloaded, HttpFetcher, SourceFetcher};
use crate::index::{
    build_index, check_staleness, load_index, save_index, IndexHandle, PersistedIndex,
    UnavailableSource,
};
use crate::models::{BuildState, BuildStatus, DictionarySource, SourceReadiness};
use crate::state::{BuildTicket, BuildTracker};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Re-extract every document even when its file is unchanged.
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub indexed: Vec<String>,
    pub reused: Vec<String>,
    pub unavailable: BTreeMap<String, String>,
    pub words: usize,
}

/// What startup found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexAvailability {
    Ready { words: usize },
    Stale { reasons: Vec<String> },
    Missing,
    Corrupt(String),
}

/// Runs the download, extract, index, persist pipeline and owns the served index.
pub struct BuildCoordinator {
    config: EngineConfig,
    sources: Arc<Vec<DictionarySource>>,
    fetcher: Arc<dyn SourceFetcher>,
    extractor: Arc<dyn PdfExtractor>,
    tracker: Arc<BuildTracker>,
    index: IndexHandle,
}

impl BuildCoordinator {
    pub fn new(
        config: EngineConfig,
        fetcher: Arc<dyn SourceFetcher>,
        extractor: Arc<dyn PdfExtractor>,
    ) -> Self {
        let sources = config.sources();
        Self {
            tracker: Arc::new(BuildTracker::new(&sources)),
            sources: Arc::new(sources),
            config,
            fetcher,
            extractor,
            index: IndexHandle::new(),
        }
    }

    /// Coordinator backed by HTTP downloads and lopdf extraction.
    pub fn from_config(config: EngineConfig) -> Result<Self, reqwest::Error> {
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        Ok(Self::new(config, fetcher, Arc::new(LopdfExtractor)))
    }

    pub fn index(&self) -> IndexHandle {
        self.index.clone()
    }

    pub fn sources(&self) -> Arc<Vec<DictionarySource>> {
        Arc::clone(&self.sources)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn status(&self) -> BuildStatus {
        self.tracker.status()
    }

    /// Loads the persisted index if it is intact and still matches the files on disk.
    /// A stale or corrupt index is never served.
    pub async fn load_persisted(&self) -> IndexAvailability {
        let path = self.config.index_path();
        let sources = Arc::clone(&self.sources);

        let loaded = tokio::task::spawn_blocking(move || {
            load_index(&path).map(|index| {
                let staleness = check_staleness(&index.manifest, &sources);
                (index, staleness)
            })
        })
        .await
        .unwrap_or_else(|error| Err(IndexLoadError::Corrupt(error.to_string())));

        match loaded {
            Ok((index, staleness)) => {
                let indexed: Vec<String> = index.manifest.sources.keys().cloned().collect();
                let words = index.entries.len();

                if staleness.is_stale() {
                    for reason in &staleness.reasons {
                        warn!(%reason, "persisted index is stale");
                    }
                    self.index.clear();
                    self.tracker.restore(
                        &indexed,
                        &index.manifest.unavailable,
                        words,
                        staleness.reasons.clone(),
                    );
                    return IndexAvailability::Stale {
                        reasons: staleness.reasons,
                    };
                }

                self.tracker
                    .restore(&indexed, &index.manifest.unavailable, words, Vec::new());
                self.index.replace(Arc::new(index));
                info!(words, "persisted index loaded");
                IndexAvailability::Ready { words }
            }
            Err(IndexLoadError::Missing(path)) => {
                info!(%path, "no persisted index yet");
                self.index.clear();
                self.tracker.mark_missing(format!("no index at {path}"));
                IndexAvailability::Missing
            }
            Err(error) => {
                warn!(%error, "persisted index discarded");
                self.index.clear();
                self.tracker.mark_missing(error.to_string());
                IndexAvailability::Corrupt(error.to_string())
            }
        }
    }

    /// Runs a full build. Rejected with [`BuildError::AlreadyInProgress`] while another
    /// build holds the slot.
    pub async fn build(&self, options: BuildOptions) -> Result<BuildSummary, BuildError> {
        let ticket = self.tracker.try_begin_build(self.sources.len() * 2)?;
        let result = self.run_build(&ticket, options).await;

        match &result {
            Ok(summary) => self.tracker.end_build(ticket, Ok(summary.words)),
            Err(error) => self.tracker.end_build(ticket, Err(error)),
        }
        result
    }

    async fn run_build(
        &self,
        ticket: &BuildTicket,
        options: BuildOptions,
    ) -> Result<BuildSummary, BuildError> {
        let downloads = ensure_downloaded(
            Arc::clone(&self.fetcher),
            &self.sources,
            self.config.build_workers,
        )
        .await;

        let mut ready = Vec::new();
        let mut unavailable = BTreeMap::new();
        let mut first_failure: Option<FetchError> = None;

        for ((id, outcome), source) in downloads.into_iter().zip(self.sources.iter()) {
            ticket.step_done();
            match outcome {
                Ok(fetched) => {
                    ticket.set_source(&id, SourceReadiness::Downloaded);
                    ready.push((source.clone(), fetched.path().to_path_buf()));
                }
                Err(error) => {
                    ticket.set_source(&id, SourceReadiness::Unavailable(error.to_string()));
                    unavailable.insert(id, UnavailableSource::not_downloaded(error.to_string()));
                    if first_failure.is_none() {
                        first_failure = Some(error);
                    }
                }
            }
        }

        if let Some(error) = first_failure {
            if self.config.fetch_policy == FetchPolicy::Abort {
                return Err(BuildError::Fetch(error));
            }
            warn!(
                unavailable = unavailable.len(),
                "continuing build with available dictionaries"
            );
        }
        if ready.is_empty() {
            return Err(BuildError::NoSourcesIndexed);
        }

        ticket.advance(BuildState::Extracting)?;
        let previous = if options.force {
            None
        } else {
            self.previous_index().await
        };

        let built = build_index(
            &ready,
            Arc::clone(&self.extractor),
            previous,
            self.config.build_workers,
            unavailable,
            &|_: &str| ticket.step_done(),
        )
        .await?;

        ticket.advance(BuildState::Indexing)?;
        let mut indexed = Vec::new();
        let mut reused = Vec::new();
        for report in &built.reports {
            match &report.outcome {
                Ok(found) => {
                    ticket.set_source(&report.source_id, SourceReadiness::Indexed);
                    if found.reused {
                        reused.push(report.source_id.clone());
                    }
                    indexed.push(report.source_id.clone());
                }
                Err(error) => {
                    ticket.set_source(
                        &report.source_id,
                        SourceReadiness::Unavailable(error.to_string()),
                    );
                }
            }
        }
        if indexed.is_empty() {
            return Err(BuildError::NoSourcesIndexed);
        }

        let index = Arc::new(built.index);
        self.persist(Arc::clone(&index)).await?;

        let summary = BuildSummary {
            indexed,
            reused,
            unavailable: index
                .manifest
                .unavailable
                .iter()
                .map(|(id, source)| (id.clone(), source.reason.clone()))
                .collect(),
            words: index.entries.len(),
        };
        self.index.replace(index);
        Ok(summary)
    }

    /// Served index, or whatever is on disk, for fingerprint reuse.
    async fn previous_index(&self) -> Option<Arc<PersistedIndex>> {
        if let Some(current) = self.index.current() {
            return Some(current);
        }
        let path = self.config.index_path();
        tokio::task::spawn_blocking(move || load_index(&path).ok())
            .await
            .ok()
            .flatten()
            .map(Arc::new)
    }

    /// Writes the index and reads it back before it may be served.
    async fn persist(&self, index: Arc<PersistedIndex>) -> Result<(), BuildError> {
        let path: PathBuf = self.config.index_path();

        tokio::task::spawn_blocking(move || {
            save_index(&path, &index)?;
            let reloaded =
                load_index(&path).map_err(|error| BuildError::Validation(error.to_string()))?;
            if reloaded != *index {
                return Err(BuildError::Validation(
                    "index read back differs from index written".to_string(),
                ));
            }
            info!(path = %path.display(), entries = index.entries.len(), "index persisted");
            Ok(())
        })
        .await
        .map_err(|error| BuildError::Task(error.to_string()))?
    }
}
