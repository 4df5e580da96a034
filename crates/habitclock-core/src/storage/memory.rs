//! In-memory state store for tests and embedding.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

use super::{StateStore, StoreChange, CHANGE_CHANNEL_CAPACITY};
use crate::error::StoreError;
use crate::model::{Settings, TargetId, TargetRecord};

#[derive(Debug, Default)]
struct Inner {
    settings: Settings,
    targets: BTreeMap<TargetId, TargetRecord>,
}

/// Volatile store with the same semantics as [`super::SqliteStore`].
///
/// [`MemoryStore::set_unavailable`] makes every subsequent call fail with
/// [`StoreError::Unavailable`]; [`MemoryStore::set_writes_failing`] does the
/// same for writes only. Tests use them to exercise the engine's
/// persistence failure paths.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
    writes_failing: AtomicBool,
    changes: broadcast::Sender<StoreChange>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            unavailable: AtomicBool::new(false),
            writes_failing: AtomicBool::new(false),
            changes,
        }
    }

    /// Store pre-seeded with settings.
    pub fn with_settings(settings: Settings) -> Self {
        let store = Self::new();
        store.lock().settings = settings;
        store
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_writes_failing(&self, failing: bool) {
        self.writes_failing.store(failing, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        self.check()?;
        if self.writes_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store rejects writes".into()));
        }
        Ok(())
    }

    fn notify(&self, change: StoreChange) {
        let _ = self.changes.send(change);
    }
}

impl StateStore for MemoryStore {
    fn load_settings(&self) -> Result<Settings, StoreError> {
        self.check()?;
        Ok(self.lock().settings.clone())
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.check_write()?;
        let tracked_changed = {
            let mut inner = self.lock();
            let changed = inner.settings.tracked != settings.tracked;
            inner.settings = settings
                .clone()
                .with_lead_minutes(settings.lead_minutes);
            changed
        };
        self.notify(StoreChange::Settings);
        if tracked_changed {
            self.notify(StoreChange::Tracked);
        }
        Ok(())
    }

    fn load_target(&self, id: &TargetId) -> Result<TargetRecord, StoreError> {
        self.check()?;
        Ok(self.lock().targets.get(id).cloned().unwrap_or_default())
    }

    fn save_target(&self, id: &TargetId, record: &TargetRecord) -> Result<(), StoreError> {
        self.check_write()?;
        self.lock().targets.insert(id.clone(), record.clone());
        self.notify(StoreChange::Target(id.clone()));
        Ok(())
    }

    fn update_target(
        &self,
        id: &TargetId,
        apply: &mut dyn FnMut(&mut TargetRecord),
    ) -> Result<TargetRecord, StoreError> {
        self.check_write()?;
        let record = {
            let mut inner = self.lock();
            let record = inner.targets.entry(id.clone()).or_default();
            apply(record);
            record.clone()
        };
        self.notify(StoreChange::Target(id.clone()));
        Ok(record)
    }

    fn remove_target(&self, id: &TargetId) -> Result<(), StoreError> {
        self.check_write()?;
        self.lock().targets.remove(id);
        self.notify(StoreChange::Target(id.clone()));
        Ok(())
    }

    fn load_all_targets(&self) -> Result<BTreeMap<TargetId, TargetRecord>, StoreError> {
        self.check()?;
        Ok(self.lock().targets.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
