use crate::error::{BuildError, ExtractionError, IndexLoadError, IndexPersistError};
use crate::extractor::PdfExtractor;
use crate::models::DictionarySource;
use crate::normalize::Tokenizer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tempfile::NamedTempFile;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub const INDEX_FORMAT_VERSION: u32 = 2;

/// Sparse word -> {source id -> first page} mapping. Words present in no source are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresenceIndex {
    entries: BTreeMap<String, BTreeMap<String, u32>>,
}

impl PresenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, word: impl Into<String>, source_id: &str, page: u32) {
        let pages = self.entries.entry(word.into()).or_default();
        pages
            .entry(source_id.to_string())
            .and_modify(|first| *first = (*first).min(page))
            .or_insert(page);
    }

    pub fn insert_source_words(&mut self, source_id: &str, words: BTreeMap<String, u32>) {
        for (word, page) in words {
            self.insert(word, source_id, page);
        }
    }

    /// Sources containing an already normalized word, with the first page reference.
    pub fn lookup(&self, normalized: &str) -> Option<&BTreeMap<String, u32>> {
        self.entries.get(normalized)
    }

    pub fn contains(&self, normalized: &str, source_id: &str) -> bool {
        self.lookup(normalized)
            .is_some_and(|sources| sources.contains_key(source_id))
    }

    pub fn words_for_source(&self, source_id: &str) -> BTreeMap<String, u32> {
        self.entries
            .iter()
            .filter_map(|(word, sources)| sources.get(source_id).map(|page| (word.clone(), *page)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFingerprint {
    pub checksum: String,
    pub size_bytes: u64,
}

/// A configured source left out of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableSource {
    pub reason: String,
    /// The file that failed extraction. `None` when nothing usable was on disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<SourceFingerprint>,
}

impl UnavailableSource {
    pub fn not_downloaded(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            fingerprint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub built_at: DateTime<Utc>,
    pub sources: BTreeMap<String, SourceFingerprint>,
    pub unavailable: BTreeMap<String, UnavailableSource>,
    pub entry_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedIndex {
    pub manifest: Manifest,
    pub entries: PresenceIndex,
}

impl PersistedIndex {
    pub fn is_available(&self, source_id: &str) -> bool {
        self.manifest.sources.contains_key(source_id)
    }
}

/// SHA-256 and size of a file, hashed in a streaming pass.
pub fn digest_file(path: &Path) -> Result<SourceFingerprint, std::io::Error> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let size_bytes = std::io::copy(&mut file, &mut hasher)?;
    Ok(SourceFingerprint {
        checksum: format!("{:x}", hasher.finalize()),
        size_bytes,
    })
}

pub fn save_index(path: &Path, index: &PersistedIndex) -> Result<(), IndexPersistError> {
    let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent_dir)?;

    let temp_file = NamedTempFile::new_in(parent_dir)?;
    let mut writer = BufWriter::new(&temp_file);
    serde_json::to_writer(&mut writer, index)?;
    writer.flush()?;
    drop(writer);
    temp_file.as_file().sync_all()?;

    temp_file.persist(path)?;
    Ok(())
}

/// Loads a persisted index. Truncated or inconsistent files are `Corrupt`, never an empty index.
pub fn load_index(path: &Path) -> Result<PersistedIndex, IndexLoadError> {
    if !path.exists() {
        return Err(IndexLoadError::Missing(path.display().to_string()));
    }

    let bytes = fs::read(path)?;
    let index: PersistedIndex = serde_json::from_slice(&bytes)
        .map_err(|error| IndexLoadError::Corrupt(error.to_string()))?;

    if index.manifest.format_version != INDEX_FORMAT_VERSION {
        return Err(IndexLoadError::Corrupt(format!(
            "unsupported format version {}",
            index.manifest.format_version
        )));
    }

    if index.manifest.entry_count != index.entries.len() {
        return Err(IndexLoadError::Corrupt(format!(
            "manifest lists {} entries but file holds {}",
            index.manifest.entry_count,
            index.entries.len()
        )));
    }

    Ok(index)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Staleness {
    pub reasons: Vec<String>,
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        !self.reasons.is_empty()
    }
}

/// Compares a manifest against the configured sources and the files currently on disk.
pub fn check_staleness(manifest: &Manifest, sources: &[DictionarySource]) -> Staleness {
    let mut reasons = Vec::new();

    for source in sources {
        match manifest.sources.get(&source.id) {
            Some(recorded) => match current_fingerprint(&source.local_path, recorded.size_bytes) {
                Ok(Some(current)) if &current == recorded => {}
                Ok(Some(_)) => reasons.push(format!("{}: checksum changed", source.id)),
                Ok(None) => reasons.push(format!("{}: size changed", source.id)),
                Err(error) => reasons.push(format!("{}: file unreadable ({error})", source.id)),
            },
            None => match manifest.unavailable.get(&source.id) {
                Some(UnavailableSource {
                    fingerprint: Some(recorded),
                    ..
                }) => match current_fingerprint(&source.local_path, recorded.size_bytes) {
                    Ok(Some(current)) if &current == recorded => {}
                    Ok(_) => reasons.push(format!(
                        "{}: file changed since failed extraction",
                        source.id
                    )),
                    Err(error) => {
                        reasons.push(format!("{}: file unreadable ({error})", source.id))
                    }
                },
                Some(UnavailableSource {
                    fingerprint: None, ..
                }) => {
                    if file_is_nonempty(&source.local_path) {
                        reasons.push(format!("{}: file appeared since last build", source.id));
                    }
                }
                None => reasons.push(format!("{}: source added", source.id)),
            },
        }
    }

    for id in manifest.sources.keys().chain(manifest.unavailable.keys()) {
        if !sources.iter().any(|source| &source.id == id) {
            reasons.push(format!("{id}: source removed"));
        }
    }

    Staleness { reasons }
}

/// `Ok(None)` when the size already differs, so large files are only hashed when needed.
fn current_fingerprint(path: &Path, expected_size: u64) -> Result<Option<SourceFingerprint>, std::io::Error> {
    let size = fs::metadata(path)?.len();
    if size != expected_size {
        return Ok(None);
    }
    digest_file(path).map(Some)
}

fn file_is_nonempty(path: &Path) -> bool {
    fs::metadata(path).map(|meta| meta.len() > 0).unwrap_or(false)
}

#[derive(Debug)]
pub struct SourceIndexReport {
    pub source_id: String,
    pub outcome: Result<SourceIndexed, ExtractionError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIndexed {
    pub words: usize,
    pub reused: bool,
}

pub struct IndexBuild {
    pub index: PersistedIndex,
    pub reports: Vec<SourceIndexReport>,
}

impl IndexBuild {
    pub fn indexed_sources(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| report.outcome.is_ok())
            .count()
    }
}

type SourceOutcome = (
    String,
    Option<SourceFingerprint>,
    Result<SourceWords, ExtractionError>,
);

struct SourceWords {
    fingerprint: SourceFingerprint,
    words: BTreeMap<String, u32>,
    reused: bool,
}

/// Extracts and tokenizes every `(source, local file)` pair, at most `workers` documents at a time.
///
/// Sources whose file fingerprint matches `previous` reuse their word set instead of
/// being re-extracted. Extraction failures are recorded as unavailable sources, not
/// returned as errors. `on_source_done` fires once per source as it finishes.
pub async fn build_index(
    sources: &[(DictionarySource, PathBuf)],
    extractor: Arc<dyn PdfExtractor>,
    previous: Option<Arc<PersistedIndex>>,
    workers: usize,
    unavailable: BTreeMap<String, UnavailableSource>,
    on_source_done: &(dyn Fn(&str) + Send + Sync),
) -> Result<IndexBuild, BuildError> {
    let tokenizer = Arc::new(Tokenizer::new()?);
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    for (position, (source, path)) in sources.iter().cloned().enumerate() {
        let extractor = Arc::clone(&extractor);
        let tokenizer = Arc::clone(&tokenizer);
        let permits = Arc::clone(&permits);
        let previous = previous.clone();

        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let id = source.id.clone();
            let (fingerprint, outcome) = tokio::task::spawn_blocking(move || {
                match digest_file(&path) {
                    Ok(fingerprint) => {
                        let outcome = index_source(
                            &source,
                            &path,
                            fingerprint.clone(),
                            extractor.as_ref(),
                            &tokenizer,
                            previous.as_deref(),
                        );
                        (Some(fingerprint), outcome)
                    }
                    Err(error) => (None, Err(ExtractionError::Io(error))),
                }
            })
            .await
            .unwrap_or_else(|error| (None, Err(ExtractionError::Task(error.to_string()))));
            (position, id, fingerprint, outcome)
        });
    }

    let mut collected: Vec<Option<SourceOutcome>> = sources.iter().map(|_| None).collect();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((position, id, fingerprint, outcome)) => {
                on_source_done(&id);
                collected[position] = Some((id, fingerprint, outcome));
            }
            Err(error) => warn!(%error, "index task aborted"),
        }
    }

    let mut entries = PresenceIndex::new();
    let mut fingerprints = BTreeMap::new();
    let mut unavailable = unavailable;
    let mut reports = Vec::with_capacity(sources.len());

    for (slot, (source, _)) in collected.into_iter().zip(sources) {
        let (id, fingerprint, outcome) = slot.unwrap_or_else(|| {
            (
                source.id.clone(),
                None,
                Err(ExtractionError::Task("index task did not complete".to_string())),
            )
        });

        match outcome {
            Ok(found) => {
                let words = found.words.len();
                info!(source = %id, words, reused = found.reused, "dictionary indexed");
                entries.insert_source_words(&id, found.words);
                fingerprints.insert(id.clone(), found.fingerprint);
                reports.push(SourceIndexReport {
                    source_id: id,
                    outcome: Ok(SourceIndexed {
                        words,
                        reused: found.reused,
                    }),
                });
            }
            Err(error) => {
                warn!(source = %id, %error, "dictionary could not be indexed");
                unavailable.insert(
                    id.clone(),
                    UnavailableSource {
                        reason: error.to_string(),
                        fingerprint,
                    },
                );
                reports.push(SourceIndexReport {
                    source_id: id,
                    outcome: Err(error),
                });
            }
        }
    }

    let manifest = Manifest {
        format_version: INDEX_FORMAT_VERSION,
        built_at: Utc::now(),
        sources: fingerprints,
        unavailable,
        entry_count: entries.len(),
    };

    Ok(IndexBuild {
        index: PersistedIndex { manifest, entries },
        reports,
    })
}

fn index_source(
    source: &DictionarySource,
    path: &Path,
    fingerprint: SourceFingerprint,
    extractor: &dyn PdfExtractor,
    tokenizer: &Tokenizer,
    previous: Option<&PersistedIndex>,
) -> Result<SourceWords, ExtractionError> {
    if let Some(previous) = previous {
        if previous.manifest.sources.get(&source.id) == Some(&fingerprint) {
            debug!(source = %source.id, "file unchanged since last build, reusing word set");
            return Ok(SourceWords {
                fingerprint,
                words: previous.entries.words_for_source(&source.id),
                reused: true,
            });
        }
    }

    let pages = extractor.extract_pages(path)?;
    let mut words = BTreeMap::new();
    for page in &pages {
        tokenizer.page_words(&page.text, page.number, &mut words);
    }

    debug!(source = %source.id, pages = pages.len(), words = words.len(), "dictionary extracted");
    Ok(SourceWords {
        fingerprint,
        words,
        reused: false,
    })
}

/// Shared reference to the index currently being served. Rebuilds swap it whole.
#[derive(Debug, Clone, Default)]
pub struct IndexHandle {
    active: Arc<RwLock<Option<Arc<PersistedIndex>>>>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<PersistedIndex>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, index: Arc<PersistedIndex>) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(index);
    }

    pub fn clear(&self) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
