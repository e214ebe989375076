use crate::equivalents::suggest_replacement;
use crate::etymology::{EtymologyClient, EtymologyFinding, EtymologyLookup, EtymologySignal};
use crate::index::{IndexHandle, PersistedIndex};
use crate::models::{
    ClassificationVerdict, Confidence, DictionarySource, Evidence, SignalSource, Verdict,
};
use crate::normalize::{lookup_title, normalize_word};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::debug;

/// Dictionary presence of one normalized word across the configured sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presence {
    pub index_ready: bool,
    pub normative: Vec<String>,
    pub foreign: bool,
    pub explanatory: bool,
}

/// Decision procedure; the first conclusive rule wins.
pub fn decide(presence: &Presence, etymology: Option<&EtymologyFinding>) -> (Verdict, Confidence) {
    if !presence.normative.is_empty() {
        return (Verdict::Native, Confidence::High);
    }

    if let Some(finding) = etymology.filter(|finding| finding.signal == EtymologySignal::Positive) {
        return (Verdict::Anglicism, finding.confidence.max(Confidence::Low));
    }

    if presence.foreign && !presence.explanatory {
        return (Verdict::BorrowedContested, Confidence::Low);
    }

    (Verdict::Unknown, Confidence::None)
}

#[derive(Clone)]
pub struct Classifier {
    index: IndexHandle,
    sources: Arc<Vec<DictionarySource>>,
    etymology: Arc<dyn EtymologyClient>,
    concurrency: usize,
}

impl Classifier {
    pub fn new(
        index: IndexHandle,
        sources: Arc<Vec<DictionarySource>>,
        etymology: Arc<dyn EtymologyClient>,
        concurrency: usize,
    ) -> Self {
        Self {
            index,
            sources,
            etymology,
            concurrency: concurrency.max(1),
        }
    }

    /// Always yields a verdict; lookup failures only weaken the evidence.
    pub async fn classify(&self, word: &str) -> ClassificationVerdict {
        self.classify_with(word, None).await
    }

    /// Classifies `words` concurrently. The result order matches the input order.
    ///
    /// Once `cancel` flips to `true`, no further etymology calls are issued; the
    /// remaining words are classified from dictionary presence alone.
    pub async fn classify_batch(
        &self,
        words: &[String],
        cancel: watch::Receiver<bool>,
    ) -> Vec<ClassificationVerdict> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (position, word) in words.iter().cloned().enumerate() {
            let classifier = self.clone();
            let permits = Arc::clone(&permits);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let verdict = classifier.classify_with(&word, Some(&cancel)).await;
                (position, verdict)
            });
        }

        let mut slots: Vec<Option<ClassificationVerdict>> = words.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, verdict)) => slots[position] = Some(verdict),
                Err(error) => debug!(%error, "classification task aborted"),
            }
        }

        slots
            .into_iter()
            .zip(words)
            .map(|(slot, word)| {
                slot.unwrap_or_else(|| {
                    unknown_verdict(
                        word,
                        String::new(),
                        Evidence {
                            signal: SignalSource::Input,
                            finding: "classification did not complete".to_string(),
                        },
                    )
                })
            })
            .collect()
    }

    async fn classify_with(
        &self,
        word: &str,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> ClassificationVerdict {
        let Some(normalized) = normalize_word(word) else {
            return unknown_verdict(
                word,
                String::new(),
                Evidence {
                    signal: SignalSource::Input,
                    finding: "not a single word of at least two letters".to_string(),
                },
            );
        };

        let mut evidence = Vec::new();
        let presence = match self.index.current() {
            Some(index) => self.presence(&index, &normalized, &mut evidence),
            None => {
                evidence.push(Evidence {
                    signal: SignalSource::PresenceIndex,
                    finding: "dictionary index is not ready; presence unknown".to_string(),
                });
                Presence::default()
            }
        };

        let cancelled = cancel.is_some_and(|cancel| *cancel.borrow());
        let etymology = if cancelled {
            evidence.push(Evidence {
                signal: SignalSource::Etymology,
                finding: "skipped: batch cancelled".to_string(),
            });
            None
        } else {
            let title = lookup_title(word).unwrap_or_else(|| normalized.clone());
            self.etymology_signal(&title, &mut evidence).await
        };

        let (verdict, confidence) = decide(&presence, etymology.as_ref());

        ClassificationVerdict {
            word: word.to_string(),
            suggested_replacement: suggest_replacement(&normalized).map(str::to_string),
            normalized,
            verdict,
            is_anglicism: is_anglicism(verdict),
            confidence,
            evidence,
        }
    }

    fn presence(
        &self,
        index: &PersistedIndex,
        normalized: &str,
        evidence: &mut Vec<Evidence>,
    ) -> Presence {
        let mut presence = Presence {
            index_ready: true,
            ..Presence::default()
        };
        let found = index.entries.lookup(normalized);

        for source in self.sources.iter() {
            let signal = SignalSource::Dictionary(source.id.clone());

            if !index.is_available(&source.id) {
                let reason = index
                    .manifest
                    .unavailable
                    .get(&source.id)
                    .map(|missing| missing.reason.as_str())
                    .unwrap_or("not indexed");
                evidence.push(Evidence {
                    signal,
                    finding: format!("unavailable: {reason}"),
                });
                continue;
            }

            match found.and_then(|pages| pages.get(&source.id)) {
                Some(page) => {
                    if source.kind.is_normative() {
                        presence.normative.push(source.id.clone());
                    } else {
                        presence.foreign = true;
                    }
                    if source.kind.is_explanatory() {
                        presence.explanatory = true;
                    }
                    evidence.push(Evidence {
                        signal,
                        finding: format!("present in {} (page {page})", source.display_name),
                    });
                }
                None => evidence.push(Evidence {
                    signal,
                    finding: format!("absent from {}", source.display_name),
                }),
            }
        }

        presence
    }

    async fn etymology_signal(
        &self,
        title: &str,
        evidence: &mut Vec<Evidence>,
    ) -> Option<EtymologyFinding> {
        let finding = match self.etymology.lookup_etymology(title).await {
            Ok(EtymologyLookup::Found(finding)) => finding,
            Ok(EtymologyLookup::NotFound) => {
                evidence.push(Evidence {
                    signal: SignalSource::Etymology,
                    finding: "no entry in the etymology dictionary".to_string(),
                });
                return None;
            }
            Err(error) => {
                debug!(word = %title, %error, "etymology lookup failed");
                evidence.push(Evidence {
                    signal: SignalSource::Etymology,
                    finding: format!("inconclusive: lookup failed ({error})"),
                });
                return None;
            }
        };

        evidence.push(Evidence {
            signal: SignalSource::Etymology,
            finding: describe_finding(&finding),
        });
        Some(finding)
    }
}

fn describe_finding(finding: &EtymologyFinding) -> String {
    let marker = finding.marker.as_deref().unwrap_or("no marker");
    let mut described = match finding.signal {
        EtymologySignal::Positive => format!("english origin ({marker})"),
        EtymologySignal::Negative => format!("non-english origin ({marker})"),
        EtymologySignal::Inconclusive => format!("inconclusive: {marker}"),
    };
    if let Some(word) = &finding.source_word {
        described.push_str(&format!(", source word \"{word}\""));
    }
    if let Some(snippet) = &finding.snippet {
        described.push_str(&format!(": {snippet}"));
    }
    described
}

fn is_anglicism(verdict: Verdict) -> Option<bool> {
    match verdict {
        Verdict::Native => Some(false),
        Verdict::Anglicism | Verdict::BorrowedContested => Some(true),
        Verdict::Unknown => None,
    }
}

fn unknown_verdict(word: &str, normalized: String, reason: Evidence) -> ClassificationVerdict {
    ClassificationVerdict {
        word: word.to_string(),
        normalized,
        verdict: Verdict::Unknown,
        is_anglicism: None,
        confidence: Confidence::None,
        evidence: vec![reason],
        suggested_replacement: None,
    }
}
