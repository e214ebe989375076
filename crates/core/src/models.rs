use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum DictionaryKind {
    Orthographic,
    Orthoepic,
    ForeignWords,
    ExplanatoryPart1,
    ExplanatoryPart2,
}

impl DictionaryKind {
    /// Normative sources establish that a word is part of standard Russian.
    pub fn is_normative(self) -> bool {
        match self {
            DictionaryKind::Orthographic
            | DictionaryKind::Orthoepic
            | DictionaryKind::ExplanatoryPart1
            | DictionaryKind::ExplanatoryPart2 => true,
            DictionaryKind::ForeignWords => false,
        }
    }

    pub fn is_explanatory(self) -> bool {
        match self {
            DictionaryKind::ExplanatoryPart1 | DictionaryKind::ExplanatoryPart2 => true,
            DictionaryKind::Orthographic
            | DictionaryKind::Orthoepic
            | DictionaryKind::ForeignWords => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DictionarySource {
    pub id: String,
    pub display_name: String,
    pub url: String,
    pub local_path: PathBuf,
    pub kind: DictionaryKind,
}

const RUSLANG_BASE: &str = "https://ruslang.ru/sites/default/files/doc/normativnyje_slovari";

const DEFAULT_SOURCES: [(&str, &str, &str, DictionaryKind); 5] = [
    (
        "orfograficheskij",
        "Орфографический словарь (ИРЯ РАН)",
        "orfograficheskij_slovar.pdf",
        DictionaryKind::Orthographic,
    ),
    (
        "orfoepicheskij",
        "Орфоэпический словарь (ИРЯ РАН)",
        "orfoepicheskij_slovar.pdf",
        DictionaryKind::Orthoepic,
    ),
    (
        "inostr_slov",
        "Словарь иностранных слов (ИЛИ РАН)",
        "slovar_inostr_slov.pdf",
        DictionaryKind::ForeignWords,
    ),
    (
        "tolkovyj_1",
        "Толковый словарь гос. языка РФ, ч. 1 А–Н (СПбГУ)",
        "tolkovyj_slovar_chast1_A-N.pdf",
        DictionaryKind::ExplanatoryPart1,
    ),
    (
        "tolkovyj_2",
        "Толковый словарь гос. языка РФ, ч. 2 О–Я (СПбГУ)",
        "tolkovyj_slovar_chast2_O-Ja.pdf",
        DictionaryKind::ExplanatoryPart2,
    ),
];

/// The five official dictionaries, stored as `<pdf_dir>/<id>.pdf`.
pub fn default_sources(pdf_dir: &Path) -> Vec<DictionarySource> {
    DEFAULT_SOURCES
        .iter()
        .map(|(id, name, file, kind)| DictionarySource {
            id: (*id).to_string(),
            display_name: (*name).to_string(),
            url: format!("{RUSLANG_BASE}/{file}"),
            local_path: pdf_dir.join(format!("{id}.pdf")),
            kind: *kind,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum BuildState {
    NotStarted,
    Downloading,
    Extracting,
    Indexing,
    Ready,
    Error(String),
}

impl BuildState {
    fn rank(&self) -> u8 {
        match self {
            BuildState::NotStarted => 0,
            BuildState::Downloading => 1,
            BuildState::Extracting => 2,
            BuildState::Indexing => 3,
            BuildState::Ready => 4,
            BuildState::Error(_) => 5,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            BuildState::Downloading | BuildState::Extracting | BuildState::Indexing
        )
    }

    /// Transitions only move forward; `Error` can be entered from any in-flight state.
    pub fn can_advance_to(&self, next: &BuildState) -> bool {
        match next {
            BuildState::Error(_) => self.is_in_progress(),
            _ => next.rank() > self.rank() && !matches!(self, BuildState::Error(_)),
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildState::NotStarted => write!(f, "not_started"),
            BuildState::Downloading => write!(f, "downloading"),
            BuildState::Extracting => write!(f, "extracting"),
            BuildState::Indexing => write!(f, "indexing"),
            BuildState::Ready => write!(f, "ready"),
            BuildState::Error(detail) => write!(f, "error({detail})"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SourceReadiness {
    Pending,
    Downloaded,
    Indexed,
    Unavailable(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceStatus {
    pub id: String,
    pub name: String,
    pub kind: DictionaryKind,
    pub readiness: SourceReadiness,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BuildProgress {
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildStatus {
    pub state: BuildState,
    pub sources: Vec<SourceStatus>,
    pub stale: bool,
    pub stale_reasons: Vec<String>,
    pub progress: Option<BuildProgress>,
    pub index_ready: bool,
    pub indexed_words: usize,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Confidence::None => "none",
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Native,
    Anglicism,
    BorrowedContested,
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Native => "native",
            Verdict::Anglicism => "anglicism",
            Verdict::BorrowedContested => "borrowed-contested",
            Verdict::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SignalSource {
    Input,
    PresenceIndex,
    Dictionary(String),
    Etymology,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Evidence {
    pub signal: SignalSource,
    pub finding: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationVerdict {
    pub word: String,
    pub normalized: String,
    pub verdict: Verdict,
    pub is_anglicism: Option<bool>,
    pub confidence: Confidence,
    pub evidence: Vec<Evidence>,
    pub suggested_replacement: Option<String>,
}
