use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{source_id}: io error: {error}")]
    Io {
        source_id: String,
        #[source]
        error: std::io::Error,
    },

    #[error("{source_id}: http error: {error}")]
    Http {
        source_id: String,
        #[source]
        error: reqwest::Error,
    },

    #[error("{source_id}: remote returned {status}")]
    Status { source_id: String, status: u16 },

    #[error("{source_id}: unexpected content type {content_type}")]
    ContentType {
        source_id: String,
        content_type: String,
    },

    #[error("{source_id}: payload too small ({size} bytes)")]
    TooSmall { source_id: String, size: u64 },

    #[error("{source_id}: payload is not a pdf document")]
    NotPdf { source_id: String },
}

impl FetchError {
    pub fn source_id(&self) -> &str {
        match self {
            FetchError::Io { source_id, .. }
            | FetchError::Http { source_id, .. }
            | FetchError::Status { source_id, .. }
            | FetchError::ContentType { source_id, .. }
            | FetchError::TooSmall { source_id, .. }
            | FetchError::NotPdf { source_id } => source_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("pdf had no readable page text: {0}")]
    Empty(String),

    #[error("extraction task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum IndexPersistError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("could not replace index file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

#[derive(Debug, Error)]
pub enum IndexLoadError {
    #[error("no index file at {0}")]
    Missing(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index file is corrupt: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum EtymologyLookupError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("etymology request timed out after {0} ms")]
    Timeout(u128),

    #[error("etymology backend returned {0}")]
    Status(u16),

    #[error("malformed etymology response: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build already in progress")]
    AlreadyInProgress,

    #[error("download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("no dictionary source could be indexed")]
    NoSourcesIndexed,

    #[error("could not persist index: {0}")]
    Persist(#[from] IndexPersistError),

    #[error("persisted index failed validation: {0}")]
    Validation(String),

    #[error("build task failed: {0}")]
    Task(String),

    #[error("invalid build state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("not a pdf file: {0}")]
    NotPdf(String),

    #[error("{0}")]
    Extraction(#[from] ExtractionError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("page returned {0}")]
    Status(u16),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;
