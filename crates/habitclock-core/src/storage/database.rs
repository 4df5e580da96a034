//! SQLite-backed state store.
//!
//! Provides persistent storage for:
//! - Global settings (alerts flag, lead minutes) in a key-value table
//! - The tracked target set
//! - Per-target records (reset time, last completed/notified cycle)
//!
//! Record updates run inside `IMMEDIATE` transactions so a CLI process and
//! the daemon writing the same file serialize their read-modify-writes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tokio::sync::broadcast;

use super::{data_dir, migrations, StateStore, StoreChange, CHANGE_CHANNEL_CAPACITY};
use crate::cycle::{CycleId, ResetTime};
use crate::error::StoreError;
use crate::model::{Settings, TargetId, TargetRecord, DEFAULT_LEAD_MINUTES};

const KEY_ALERTS_ENABLED: &str = "alerts_enabled";
const KEY_LEAD_MINUTES: &str = "lead_minutes";

/// How long a writer waits on another process's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database holding all engine state.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    changes: broadcast::Sender<StoreChange>,
    /// Last observed `PRAGMA data_version`.
    data_version: Mutex<i64>,
}

impl SqliteStore {
    /// Open the store at `<data_dir>/habitclock.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::open_at(dir.join("habitclock.db"))
    }

    /// Open the store at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        Self::init(conn, Some(path))
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::migrate(&conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        let version = read_data_version(&conn)?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            changes,
            data_version: Mutex::new(version),
        })
    }

    /// Path of the backing file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, change: StoreChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }

    /// Get a value from the kv table.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn();
        kv_get(&conn, key)
    }

    /// Set a value in the kv table.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn();
        kv_set(&conn, key, value)
    }

    /// Detect commits made through other connections (another process).
    ///
    /// Emits [`StoreChange::External`] and returns `true` when the database
    /// changed since the previous call.
    pub fn poll_external_changes(&self) -> Result<bool, StoreError> {
        let current = {
            let conn = self.conn();
            read_data_version(&conn)?
        };
        let mut seen = self.data_version.lock().unwrap_or_else(|e| e.into_inner());
        if *seen == current {
            return Ok(false);
        }
        *seen = current;
        drop(seen);
        tracing::debug!(data_version = current, "external store change detected");
        self.notify(StoreChange::External);
        Ok(true)
    }
}

impl StateStore for SqliteStore {
    fn load_settings(&self) -> Result<Settings, StoreError> {
        let conn = self.conn();

        let alerts_enabled = match kv_get(&conn, KEY_ALERTS_ENABLED)? {
            Some(raw) => raw.parse::<bool>().map_err(|e| StoreError::Corrupt {
                key: KEY_ALERTS_ENABLED.into(),
                message: e.to_string(),
            })?,
            None => false,
        };
        let lead_minutes = match kv_get(&conn, KEY_LEAD_MINUTES)? {
            Some(raw) => raw.parse::<u32>().map_err(|e| StoreError::Corrupt {
                key: KEY_LEAD_MINUTES.into(),
                message: e.to_string(),
            })?,
            None => DEFAULT_LEAD_MINUTES,
        };

        let mut stmt = conn.prepare("SELECT id FROM tracked_targets ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut tracked = BTreeSet::new();
        for row in rows {
            let raw = row?;
            match TargetId::new(raw.clone()) {
                Ok(id) => {
                    tracked.insert(id);
                }
                Err(_) => tracing::warn!(id = %raw, "skipping invalid tracked target id"),
            }
        }

        Ok(Settings {
            alerts_enabled,
            lead_minutes: Settings::clamp_lead_minutes(lead_minutes),
            tracked,
        })
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        let tracked_changed = {
            let mut conn = self.conn();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            kv_set(&tx, KEY_ALERTS_ENABLED, &settings.alerts_enabled.to_string())?;
            kv_set(
                &tx,
                KEY_LEAD_MINUTES,
                &Settings::clamp_lead_minutes(settings.lead_minutes).to_string(),
            )?;

            let existing: BTreeSet<String> = {
                let mut stmt = tx.prepare("SELECT id FROM tracked_targets")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                rows.collect::<Result<_, _>>()?
            };
            let wanted: BTreeSet<String> =
                settings.tracked.iter().map(|t| t.as_str().to_string()).collect();

            let now = Utc::now().to_rfc3339();
            for removed in existing.difference(&wanted) {
                tx.execute("DELETE FROM tracked_targets WHERE id = ?1", params![removed])?;
            }
            for added in wanted.difference(&existing) {
                tx.execute(
                    "INSERT INTO tracked_targets (id, added_at) VALUES (?1, ?2)",
                    params![added, now],
                )?;
            }
            tx.commit()?;
            existing != wanted
        };

        self.notify(StoreChange::Settings);
        if tracked_changed {
            self.notify(StoreChange::Tracked);
        }
        Ok(())
    }

    fn load_target(&self, id: &TargetId) -> Result<TargetRecord, StoreError> {
        let conn = self.conn();
        Ok(read_target(&conn, id)?.unwrap_or_default())
    }

    fn save_target(&self, id: &TargetId, record: &TargetRecord) -> Result<(), StoreError> {
        {
            let conn = self.conn();
            write_target(&conn, id, record)?;
        }
        self.notify(StoreChange::Target(id.clone()));
        Ok(())
    }

    fn update_target(
        &self,
        id: &TargetId,
        apply: &mut dyn FnMut(&mut TargetRecord),
    ) -> Result<TargetRecord, StoreError> {
        let record = {
            let mut conn = self.conn();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut record = read_target(&tx, id)?.unwrap_or_default();
            apply(&mut record);
            write_target(&tx, id, &record)?;
            tx.commit()?;
            record
        };
        self.notify(StoreChange::Target(id.clone()));
        Ok(record)
    }

    fn remove_target(&self, id: &TargetId) -> Result<(), StoreError> {
        {
            let conn = self.conn();
            conn.execute("DELETE FROM targets WHERE id = ?1", params![id.as_str()])?;
        }
        self.notify(StoreChange::Target(id.clone()));
        Ok(())
    }

    fn load_all_targets(&self) -> Result<BTreeMap<TargetId, TargetRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, reset_time, last_completed_cycle, last_notified_cycle
             FROM targets ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, Option<i64>>(3)?,
            ))
        })?;

        let mut out = BTreeMap::new();
        for row in rows {
            let (raw_id, reset, completed, notified) = row?;
            let Ok(id) = TargetId::new(raw_id.clone()) else {
                tracing::warn!(id = %raw_id, "skipping record with invalid target id");
                continue;
            };
            out.insert(id, decode_record(&raw_id, &reset, completed, notified)?);
        }
        Ok(out)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

// === Helper Functions ===

fn kv_get(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    let value = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get::<_, String>(0)
        })
        .optional()?;
    Ok(value)
}

fn kv_set(conn: &Connection, key: &str, value: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

fn read_data_version(conn: &Connection) -> Result<i64, StoreError> {
    Ok(conn.query_row("PRAGMA data_version", [], |row| row.get::<_, i64>(0))?)
}

fn read_target(conn: &Connection, id: &TargetId) -> Result<Option<TargetRecord>, StoreError> {
    let row = conn
        .query_row(
            "SELECT reset_time, last_completed_cycle, last_notified_cycle
             FROM targets WHERE id = ?1",
            params![id.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            },
        )
        .optional()?;

    row.map(|(reset, completed, notified)| decode_record(id.as_str(), &reset, completed, notified))
        .transpose()
}

fn write_target(conn: &Connection, id: &TargetId, record: &TargetRecord) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO targets (id, reset_time, last_completed_cycle, last_notified_cycle, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            reset_time = excluded.reset_time,
            last_completed_cycle = excluded.last_completed_cycle,
            last_notified_cycle = excluded.last_notified_cycle,
            updated_at = excluded.updated_at",
        params![
            id.as_str(),
            record.reset_time.to_string(),
            record.last_completed_cycle.map(CycleId::value),
            record.last_notified_cycle.map(CycleId::value),
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn decode_record(
    id: &str,
    reset: &str,
    completed: Option<i64>,
    notified: Option<i64>,
) -> Result<TargetRecord, StoreError> {
    let reset_time = reset.parse::<ResetTime>().map_err(|e| StoreError::Corrupt {
        key: format!("targets.{id}.reset_time"),
        message: e.to_string(),
    })?;
    Ok(TargetRecord {
        reset_time,
        last_completed_cycle: completed.map(CycleId),
        last_notified_cycle: notified.map(CycleId),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TargetId {
        TargetId::new(s).unwrap()
    }

    #[test]
    fn empty_store_yields_defaults() {
        let store = SqliteStore::open_memory().unwrap();
        assert_eq!(store.load_settings().unwrap(), Settings::default());
        assert_eq!(store.load_target(&id("com.a")).unwrap(), TargetRecord::default());
        assert!(store.load_all_targets().unwrap().is_empty());
    }

    #[test]
    fn settings_persist_with_tracked_set() {
        let store = SqliteStore::open_memory().unwrap();
        let settings = Settings::default()
            .with_alerts(true)
            .with_lead_minutes(120)
            .with_tracked([id("com.a"), id("com.b")]);
        store.save_settings(&settings).unwrap();
        assert_eq!(store.load_settings().unwrap(), settings);

        let shrunk = settings.clone().with_tracked([id("com.b")]);
        store.save_settings(&shrunk).unwrap();
        assert_eq!(store.load_settings().unwrap().tracked.len(), 1);
    }

    #[test]
    fn update_target_is_read_modify_write() {
        let store = SqliteStore::open_memory().unwrap();
        let target = id("com.a");
        store
            .save_target(&target, &TargetRecord::with_reset_time(ResetTime::new(6, 30).unwrap()))
            .unwrap();

        let updated = store
            .update_target(&target, &mut |r| r.last_notified_cycle = Some(CycleId(42)))
            .unwrap();

        assert_eq!(updated.reset_time, ResetTime::new(6, 30).unwrap());
        assert_eq!(updated.last_notified_cycle, Some(CycleId(42)));
        assert_eq!(store.load_target(&target).unwrap(), updated);
    }

    #[test]
    fn remove_target_drops_record() {
        let store = SqliteStore::open_memory().unwrap();
        let target = id("com.a");
        store
            .update_target(&target, &mut |r| r.last_completed_cycle = Some(CycleId(1)))
            .unwrap();
        store.remove_target(&target).unwrap();
        assert_eq!(store.load_target(&target).unwrap(), TargetRecord::default());
    }

    #[test]
    fn writes_are_published_on_change_stream() {
        let store = SqliteStore::open_memory().unwrap();
        let mut rx = store.subscribe();
        store
            .save_settings(&Settings::default().with_tracked([id("com.a")]))
            .unwrap();
        store.update_target(&id("com.a"), &mut |_| {}).unwrap();

        assert_eq!(rx.try_recv().unwrap(), StoreChange::Settings);
        assert_eq!(rx.try_recv().unwrap(), StoreChange::Tracked);
        assert_eq!(rx.try_recv().unwrap(), StoreChange::Target(id("com.a")));
    }

    #[test]
    fn corrupt_setting_is_reported() {
        let store = SqliteStore::open_memory().unwrap();
        store.kv_set(KEY_LEAD_MINUTES, "soon").unwrap();
        assert!(matches!(
            store.load_settings(),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn external_commits_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("habitclock.db");
        let daemon = SqliteStore::open_at(&path).unwrap();
        let cli = SqliteStore::open_at(&path).unwrap();
        let mut rx = daemon.subscribe();

        assert!(!daemon.poll_external_changes().unwrap());
        cli.save_settings(&Settings::default().with_alerts(true)).unwrap();
        assert!(daemon.poll_external_changes().unwrap());
        assert_eq!(rx.try_recv().unwrap(), StoreChange::External);
        assert!(!daemon.poll_external_changes().unwrap());

        // Own writes are not external.
        daemon.save_settings(&Settings::default()).unwrap();
        assert!(!daemon.poll_external_changes().unwrap());
    }
}
