pub mod classifier;
pub mod config;
pub mod documents;
pub mod equivalents;
pub mod error;
pub mod etymology;
pub mod extractor;
pub mod fetcher;
pub mod index;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod state;

#[cfg(test)]
mod testing;

pub use classifier::{decide, Classifier, Presence};
pub use config::{EngineConfig, FetchPolicy, DEFAULT_ETYMOLOGY_ENDPOINT, DEFAULT_USER_AGENT};
pub use documents::{pdf_words, HtmlWordExtractor, PageFetcher, MAX_DOCUMENT_BYTES};
pub use equivalents::suggest_replacement;
pub use error::{
    BuildError, DocumentError, EtymologyLookupError, ExtractionError, FetchError, IndexLoadError,
    IndexPersistError,
};
pub use etymology::{
    EtymologyClient, EtymologyFinding, EtymologyHeuristic, EtymologyLookup, EtymologySignal,
    WiktionaryClient,
};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use fetcher::{ensure_downloaded, FetchOutcome, HttpFetcher, SourceFetcher};
pub use index::{
    build_index, check_staleness, digest_file, load_index, save_index, IndexHandle, Manifest,
    PersistedIndex, PresenceIndex, SourceFingerprint, Staleness, UnavailableSource,
};
pub use models::{
    default_sources, BuildProgress, BuildState, BuildStatus, ClassificationVerdict, Confidence,
    DictionaryKind, DictionarySource, Evidence, SignalSource, SourceReadiness, SourceStatus,
    Verdict,
};
pub use normalize::{lookup_title, normalize_word, strip_stress_marks, Tokenizer};
pub use orchestrator::{BuildCoordinator, BuildOptions, BuildSummary, IndexAvailability};
pub use state::{BuildTicket, BuildTracker};
