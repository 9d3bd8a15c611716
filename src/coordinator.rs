//! The unit of atomicity for every write operation.
//!
//! One `execute` call runs `load snapshot -> mutate -> audit -> validate ->
//! persist -> reload`. The snapshot is always loaded fresh from disk, never
//! reused, so the mutation sees the latest on-disk state. On any error the
//! workbook file is left byte-for-byte unchanged.
//!
//! Only one transaction is ever in flight (single interactive user); the
//! shared workbook is protected against external editors by the advisory
//! staleness check in [`crate::guard`], surfaced as a distinct `Conflict`
//! error the caller must explicitly override.

use crate::error::{Result, StoreError};
use crate::guard::{self, Fingerprint};
use crate::store::RecordStore;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// A committed transaction: the reloaded post-commit snapshot plus the
/// audit detail line, ready for user-facing display.
#[derive(Debug)]
pub struct Commit {
    pub store: RecordStore,
    pub detail: String,
}

/// Orchestrates transactional mutations of one workbook file.
pub struct Coordinator {
    path: PathBuf,
    actor: String,
    last_seen: Option<Fingerprint>,
}

impl Coordinator {
    pub fn new(path: impl Into<PathBuf>, actor: impl Into<String>) -> Self {
        Coordinator {
            path: path.into(),
            actor: actor.into(),
            last_seen: None,
        }
    }

    /// Coordinator with the actor taken from the login environment.
    pub fn from_env(path: impl Into<PathBuf>) -> Self {
        let actor = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self::new(path, actor)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Read-only load that also refreshes the staleness fingerprint.
    ///
    /// A missing workbook comes back as an empty store.
    pub fn snapshot(&mut self) -> Result<RecordStore> {
        self.last_seen = guard::fingerprint(&self.path)?;
        RecordStore::load_or_default(&self.path)
    }

    /// Runs one transaction.
    ///
    /// `mutation` may read and write any of the five tables freely but must
    /// not perform I/O itself; it returns the audit detail line on success.
    /// The coordinator appends exactly one audit log entry per commit,
    /// validates every line item's amount invariants, persists and reloads.
    ///
    /// Fails with `Conflict` if the workbook changed on disk since this
    /// coordinator last saw it; use [`Coordinator::execute_overriding_conflict`]
    /// to proceed anyway after the user confirmed.
    pub fn execute<F>(&mut self, action: &str, mutation: F) -> Result<Commit>
    where
        F: FnOnce(&mut RecordStore) -> Result<String>,
    {
        self.run(action, mutation, false)
    }

    /// Like [`Coordinator::execute`] but proceeds over a stale fingerprint
    /// (last writer wins, by explicit caller choice).
    pub fn execute_overriding_conflict<F>(&mut self, action: &str, mutation: F) -> Result<Commit>
    where
        F: FnOnce(&mut RecordStore) -> Result<String>,
    {
        self.run(action, mutation, true)
    }

    fn run<F>(&mut self, action: &str, mutation: F, override_conflict: bool) -> Result<Commit>
    where
        F: FnOnce(&mut RecordStore) -> Result<String>,
    {
        let current = guard::fingerprint(&self.path)?;
        if !override_conflict {
            match (self.last_seen, current) {
                (Some(seen), Some(now)) if seen.is_stale(now) => {
                    debug!("{}: stale fingerprint, rejecting '{}'", self.path.display(), action);
                    return Err(StoreError::Conflict);
                }
                // A workbook this coordinator committed to has vanished:
                // proceeding would silently re-create it over the deletion.
                (Some(_), None) => {
                    debug!("{}: workbook gone since last commit, rejecting '{}'", self.path.display(), action);
                    return Err(StoreError::Conflict);
                }
                _ => {}
            }
        }

        let mut store = RecordStore::load_or_default(&self.path)?;
        let detail = mutation(&mut store)?;
        store.append_log(&self.actor, action, &detail);
        store.validate()?;
        store.save(&self.path)?;
        self.last_seen = guard::fingerprint(&self.path)?;

        // Reload so the caller's view matches what a subsequent read sees,
        // guarding against format round-tripping drift.
        let store = RecordStore::load(&self.path)?;
        info!("committed '{}': {}", action, detail);
        Ok(Commit { store, detail })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Decimal4;
    use crate::records::{ItemKind, LineItem};
    use std::str::FromStr;
    use std::time::Duration;
    use tempfile::TempDir;

    fn dec(s: &str) -> Decimal4 {
        Decimal4::from_str(s).unwrap()
    }

    fn add_item(store: &mut RecordStore) {
        store.items.push(LineItem::new(
            "Q-1",
            ItemKind::Domestic,
            "Acme",
            "widget",
            "W-1",
            dec("2"),
            dec("10"),
            dec("0.1"),
            "KRW",
        ));
    }

    #[test]
    fn test_commit_persists_and_audits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.wb");
        let mut coord = Coordinator::new(&path, "tester");

        let commit = coord
            .execute("order entry", |store| {
                add_item(store);
                Ok("created Q-1".to_string())
            })
            .unwrap();

        assert_eq!(commit.store.items.len(), 1);
        assert_eq!(commit.store.audit_log.len(), 1);
        assert_eq!(commit.store.audit_log[0].actor, "tester");
        assert_eq!(commit.store.audit_log[0].detail, "created Q-1");
        assert_eq!(commit.detail, "created Q-1");

        // One audit entry per commit
        let commit = coord
            .execute("order entry", |store| {
                add_item(store);
                Ok("created another".to_string())
            })
            .unwrap();
        assert_eq!(commit.store.audit_log.len(), 2);
    }

    #[test]
    fn test_failed_mutation_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.wb");
        let mut coord = Coordinator::new(&path, "tester");

        coord
            .execute("order entry", |store| {
                add_item(store);
                Ok("seed".to_string())
            })
            .unwrap();
        let before = std::fs::read(&path).unwrap();

        // Mutation mutates in-memory tables, then fails.
        let err = coord
            .execute("broken", |store| {
                store.items.clear();
                Err(StoreError::Validation("nope".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let after = std::fs::read(&path).unwrap();
        assert_eq!(before, after);

        let reloaded = RecordStore::load(&path).unwrap();
        assert_eq!(reloaded.items.len(), 1);
    }

    #[test]
    fn test_invariant_violation_aborts_before_persist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.wb");
        let mut coord = Coordinator::new(&path, "tester");

        coord
            .execute("order entry", |store| {
                add_item(store);
                Ok("seed".to_string())
            })
            .unwrap();
        let before = std::fs::read(&path).unwrap();

        let err = coord
            .execute("corrupt", |store| {
                store.items[0].total_amount = dec("9999");
                Ok("silently broke an amount".to_string())
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(before, std::fs::read(&path).unwrap());
    }

    #[test]
    fn test_external_edit_raises_conflict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.wb");
        let mut coord = Coordinator::new(&path, "tester");

        coord
            .execute("order entry", |store| {
                add_item(store);
                Ok("seed".to_string())
            })
            .unwrap();

        // Simulate an external editor touching the file.
        std::thread::sleep(Duration::from_millis(50));
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content).unwrap();

        let err = coord.execute("noop", |_| Ok("x".to_string())).unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        // Explicit override proceeds.
        coord
            .execute_overriding_conflict("noop", |_| Ok("forced".to_string()))
            .unwrap();
    }

    #[test]
    fn test_external_deletion_raises_conflict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.wb");
        let mut coord = Coordinator::new(&path, "tester");

        coord
            .execute("order entry", |store| {
                add_item(store);
                Ok("seed".to_string())
            })
            .unwrap();

        // The workbook vanishes underneath the coordinator.
        std::fs::remove_file(&path).unwrap();

        let err = coord.execute("noop", |_| Ok("x".to_string())).unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
        assert!(!path.exists());

        // Explicit override re-creates it from an empty store.
        let commit = coord
            .execute_overriding_conflict("noop", |store| {
                add_item(store);
                Ok("rebuilt".to_string())
            })
            .unwrap();
        assert_eq!(commit.store.items.len(), 1);
    }

    #[test]
    fn test_snapshot_refreshes_fingerprint() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.wb");
        let mut coord = Coordinator::new(&path, "tester");

        coord
            .execute("order entry", |store| {
                add_item(store);
                Ok("seed".to_string())
            })
            .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content).unwrap();

        // Reading the fresh state clears the staleness.
        let snapshot = coord.snapshot().unwrap();
        assert_eq!(snapshot.items.len(), 1);
        coord.execute("noop", |_| Ok("ok".to_string())).unwrap();
    }

    #[test]
    fn test_own_commits_do_not_conflict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.wb");
        let mut coord = Coordinator::new(&path, "tester");

        for i in 0..3 {
            coord
                .execute("order entry", move |store| {
                    add_item(store);
                    Ok(format!("commit {}", i))
                })
                .unwrap();
        }
        let store = coord.snapshot().unwrap();
        assert_eq!(store.items.len(), 3);
        assert_eq!(store.audit_log.len(), 3);
    }
}
