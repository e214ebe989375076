use crate::error::BuildError;
use crate::index::UnavailableSource;
use crate::models::{
    BuildProgress, BuildState, BuildStatus, DictionarySource, SourceReadiness, SourceStatus,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

#[derive(Debug)]
struct TrackerState {
    state: BuildState,
    sources: Vec<SourceStatus>,
    stale_reasons: Vec<String>,
    progress: Option<BuildProgress>,
    index_ready: bool,
    indexed_words: usize,
    last_error: Option<String>,
}

/// Process-wide build state. At most one build holds a [`BuildTicket`] at a time.
#[derive(Debug)]
pub struct BuildTracker {
    inner: Mutex<TrackerState>,
}

impl BuildTracker {
    pub fn new(sources: &[DictionarySource]) -> Self {
        Self {
            inner: Mutex::new(TrackerState {
                state: BuildState::NotStarted,
                sources: sources
                    .iter()
                    .map(|source| SourceStatus {
                        id: source.id.clone(),
                        name: source.display_name.clone(),
                        kind: source.kind,
                        readiness: SourceReadiness::Pending,
                    })
                    .collect(),
                stale_reasons: Vec::new(),
                progress: None,
                index_ready: false,
                indexed_words: 0,
                last_error: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a build, or rejects it when one is already running.
    pub fn try_begin_build(self: &Arc<Self>, total_steps: usize) -> Result<BuildTicket, BuildError> {
        let mut inner = self.lock();
        if inner.state.is_in_progress() {
            return Err(BuildError::AlreadyInProgress);
        }

        inner.state = BuildState::Downloading;
        inner.progress = Some(BuildProgress {
            completed: 0,
            total: total_steps,
        });
        inner.last_error = None;
        for source in &mut inner.sources {
            source.readiness = SourceReadiness::Pending;
        }
        info!("dictionary build started");

        Ok(BuildTicket {
            tracker: Arc::clone(self),
            finished: false,
        })
    }

    /// Ends the build held by `ticket`. Success serves `indexed_words`; failure is terminal
    /// until the next [`try_begin_build`](Self::try_begin_build).
    pub fn end_build(&self, mut ticket: BuildTicket, result: Result<usize, &BuildError>) {
        ticket.finished = true;
        let mut inner = self.lock();
        inner.progress = None;

        match result {
            Ok(indexed_words) => {
                inner.state = BuildState::Ready;
                inner.index_ready = true;
                inner.indexed_words = indexed_words;
                inner.stale_reasons.clear();
                info!(indexed_words, "dictionary build finished");
            }
            Err(error) => {
                let detail = error.to_string();
                warn!(error = %detail, "dictionary build failed");
                inner.state = BuildState::Error(detail.clone());
                inner.last_error = Some(detail);
            }
        }
    }

    pub fn status(&self) -> BuildStatus {
        let inner = self.lock();
        BuildStatus {
            state: inner.state.clone(),
            sources: inner.sources.clone(),
            stale: !inner.stale_reasons.is_empty(),
            stale_reasons: inner.stale_reasons.clone(),
            progress: inner.progress,
            index_ready: inner.index_ready,
            indexed_words: inner.indexed_words,
            last_error: inner.last_error.clone(),
        }
    }

    pub fn state(&self) -> BuildState {
        self.lock().state.clone()
    }

    /// Records an index loaded from disk. Ignored while a build is running.
    pub fn restore(
        &self,
        indexed: &[String],
        unavailable: &BTreeMap<String, UnavailableSource>,
        indexed_words: usize,
        stale_reasons: Vec<String>,
    ) {
        let mut inner = self.lock();
        if inner.state.is_in_progress() {
            return;
        }

        for source in &mut inner.sources {
            source.readiness = if indexed.contains(&source.id) {
                SourceReadiness::Indexed
            } else if let Some(reason) = unavailable.get(&source.id) {
                SourceReadiness::Unavailable(reason.reason.clone())
            } else {
                SourceReadiness::Pending
            };
        }

        let stale = !stale_reasons.is_empty();
        inner.stale_reasons = stale_reasons;
        inner.index_ready = !stale;
        inner.indexed_words = if stale { 0 } else { indexed_words };
        if !stale {
            inner.state = BuildState::Ready;
        }
    }

    /// Records that no usable index exists on disk.
    pub fn mark_missing(&self, reason: String) {
        let mut inner = self.lock();
        if inner.state.is_in_progress() {
            return;
        }
        inner.index_ready = false;
        inner.indexed_words = 0;
        inner.last_error = Some(reason);
    }
}

/// Proof of holding the build slot. Dropping it without [`BuildTracker::end_build`]
/// moves the tracker to `error` so the slot is never leaked.
#[derive(Debug)]
pub struct BuildTicket {
    tracker: Arc<BuildTracker>,
    finished: bool,
}

impl BuildTicket {
    pub fn advance(&self, next: BuildState) -> Result<(), BuildError> {
        let mut inner = self.tracker.lock();
        if !inner.state.can_advance_to(&next) {
            return Err(BuildError::InvalidTransition {
                from: inner.state.to_string(),
                to: next.to_string(),
            });
        }
        info!(from = %inner.state, to = %next, "build state changed");
        inner.state = next;
        Ok(())
    }

    pub fn set_source(&self, source_id: &str, readiness: SourceReadiness) {
        let mut inner = self.tracker.lock();
        if let Some(source) = inner.sources.iter_mut().find(|source| source.id == source_id) {
            source.readiness = readiness;
        }
    }

    pub fn step_done(&self) {
        let mut inner = self.tracker.lock();
        if let Some(progress) = inner.progress.as_mut() {
            progress.completed = (progress.completed + 1).min(progress.total);
        }
    }
}

impl Drop for BuildTicket {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut inner = self.tracker.lock();
        if inner.state.is_in_progress() {
            let detail = "build abandoned before completion".to_string();
            inner.state = BuildState::Error(detail.clone());
            inner.last_error = Some(detail);
            inner.progress = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::default_sources;
    use std::path::Path;

    fn tracker() -> Arc<BuildTracker> {
        Arc::new(BuildTracker::new(&default_sources(Path::new("/data/pdf"))))
    }

    #[test]
    fn second_build_is_rejected_while_first_runs() -> Result<(), BuildError> {
        let tracker = tracker();
        let ticket = tracker.try_begin_build(11)?;

        assert!(matches!(
            tracker.try_begin_build(11),
            Err(BuildError::AlreadyInProgress)
        ));

        tracker.end_build(ticket, Ok(42));
        assert_eq!(tracker.state(), BuildState::Ready);
        let again = tracker.try_begin_build(11)?;
        tracker.end_build(again, Ok(42));
        Ok(())
    }

    #[test]
    fn transitions_only_move_forward() -> Result<(), BuildError> {
        let tracker = tracker();
        let ticket = tracker.try_begin_build(3)?;

        ticket.advance(BuildState::Extracting)?;
        ticket.advance(BuildState::Indexing)?;
        assert!(matches!(
            ticket.advance(BuildState::Downloading),
            Err(BuildError::InvalidTransition { .. })
        ));

        ticket.step_done();
        ticket.step_done();
        ticket.step_done();
        ticket.step_done();
        assert_eq!(
            tracker.status().progress,
            Some(BuildProgress {
                completed: 3,
                total: 3
            })
        );

        tracker.end_build(ticket, Err(&BuildError::NoSourcesIndexed));
        let status = tracker.status();
        assert!(matches!(status.state, BuildState::Error(_)));
        assert_eq!(status.progress, None);
        assert!(!status.index_ready);
        Ok(())
    }

    #[test]
    fn dropped_ticket_releases_the_slot_as_error() -> Result<(), BuildError> {
        let tracker = tracker();
        drop(tracker.try_begin_build(1)?);

        assert!(matches!(tracker.state(), BuildState::Error(_)));
        let ticket = tracker.try_begin_build(1)?;
        tracker.end_build(ticket, Ok(0));
        Ok(())
    }

    #[test]
    fn restore_reports_staleness_without_serving() {
        let tracker = tracker();
        tracker.restore(
            &["tolkovyj_1".to_string()],
            &BTreeMap::from([(
                "inostr_slov".to_string(),
                UnavailableSource::not_downloaded("timeout"),
            )]),
            1_000,
            vec!["tolkovyj_1: checksum changed".to_string()],
        );

        let status = tracker.status();
        assert!(status.stale);
        assert!(!status.index_ready);
        assert_eq!(status.state, BuildState::NotStarted);
        let foreign = status
            .sources
            .iter()
            .find(|source| source.id == "inostr_slov")
            .expect("source tracked");
        assert_eq!(
            foreign.readiness,
            SourceReadiness::Unavailable("timeout".to_string())
        );
    }
}
