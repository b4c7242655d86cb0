// src/scanner/session.rs
use crate::domain::models::{ResultSet, ScanRun};
use crate::domain::settings::Settings;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

struct SessionInner {
    settings: Arc<Settings>,
    live: ResultSet,
    history: VecDeque<ScanRun>,
}

/// Single source of truth for settings, the live set and scan history.
///
/// All three live behind one lock so that archiving the previous live set and
/// publishing the new one are observed together. History is a ring buffer:
/// once `history_capacity` runs are stored the oldest is dropped.
pub struct SessionState {
    inner: RwLock<SessionInner>,
    history_capacity: usize,
}

impl SessionState {
    pub fn new(settings: Settings, history_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(SessionInner {
                settings: Arc::new(settings),
                live: ResultSet::new(),
                history: VecDeque::new(),
            }),
            history_capacity,
        }
    }

    // Writers only ever replace whole values, so a poisoned lock still holds
    // a consistent state.
    fn read(&self) -> RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the active settings.
    pub fn settings(&self) -> Arc<Settings> {
        self.read().settings.clone()
    }

    pub fn replace_settings(&self, settings: Settings) {
        self.write().settings = Arc::new(settings);
    }

    pub fn live_results(&self) -> ResultSet {
        self.read().live.clone()
    }

    pub fn live_count(&self) -> usize {
        self.read().live.len()
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    pub fn history_len(&self) -> usize {
        self.read().history.len()
    }

    /// Up to `limit` most recent runs, oldest first.
    pub fn history(&self, limit: usize) -> Vec<ScanRun> {
        let inner = self.read();
        let skip = inner.history.len().saturating_sub(limit);
        inner.history.iter().skip(skip).cloned().collect()
    }

    pub fn append_run(&self, run: ScanRun) {
        let mut inner = self.write();
        self.push_bounded(&mut inner.history, run);
    }

    pub fn replace_live(&self, results: ResultSet) {
        self.write().live = results;
    }

    /// Archive the current live set (if non-empty) under `parameters` and
    /// install `results` as the new live set, in one critical section.
    /// Returns whether a run was archived.
    pub fn commit_scan(&self, parameters: &str, results: ResultSet) -> bool {
        let mut inner = self.write();
        let previous = std::mem::replace(&mut inner.live, results);

        if previous.is_empty() {
            return false;
        }

        self.push_bounded(&mut inner.history, ScanRun::new(parameters, previous));
        true
    }

    fn push_bounded(&self, history: &mut VecDeque<ScanRun>, run: ScanRun) {
        if self.history_capacity == 0 {
            return;
        }
        while history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(run);
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Settings::default(), DEFAULT_HISTORY_CAPACITY)
    }
}
