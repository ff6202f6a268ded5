use crate::store::LocalStateStore;
use crate::RepoError;
use scriptsync_core::path_utils::{IgnorePatterns, ScriptPath};
use scriptsync_core::status::apply_statuses;
use scriptsync_core::timestamp::{format_timestamp, parse_timestamp};
use scriptsync_core::{RepoEntry, Repository, SyncStatus};
use tracing::{debug, warn};

/// Merges the cached central manifest, the local filesystem scan and the
/// download bookkeeping into one repository view, then derives every
/// entry's status.
pub struct StatusReconciler<'a> {
    store: &'a LocalStateStore,
    ignore: &'a IgnorePatterns,
}

impl<'a> StatusReconciler<'a> {
    pub fn new(store: &'a LocalStateStore, ignore: &'a IgnorePatterns) -> Self {
        Self { store, ignore }
    }

    /// The full three-pass reconciliation. Central-manifest corruption is
    /// fatal; bookkeeping corruption degrades to an empty bookkeeping with
    /// a warning.
    pub fn build(&self) -> Result<Repository, RepoError> {
        let mut repo = Repository::new();
        self.central_pass(&mut repo)?;
        self.local_pass(&mut repo);
        match self.bookkeeping_pass(&mut repo) {
            Ok(()) => {}
            Err(e @ RepoError::CorruptedDatabase { .. }) => {
                warn!("listing continues without download bookkeeping: {e}");
            }
            // Only parse failure is tolerated; an unreadable or unwritable
            // bookkeeping document must not report a clean listing.
            Err(e) => return Err(e),
        }

        repo.retain(|_, entry| entry.local || entry.remote);
        apply_statuses(&mut repo);
        debug!("reconciled {} entries", repo.len());
        Ok(repo)
    }

    /// Pass 1: the cached central manifest defines the remote side.
    fn central_pass(&self, repo: &mut Repository) -> Result<(), RepoError> {
        let manifest = self.store.read_manifest()?;
        for (path, meta) in manifest {
            let path = ScriptPath::normalize(&path);
            if ScriptPath::is_reserved(&path) || self.ignore.matches(&path) {
                continue;
            }
            let entry = repo.entry(path.clone()).or_insert_with(|| RepoEntry {
                path: path.clone(),
                ..Default::default()
            });
            entry.remote = true;
            entry.directory = meta.directory;
            entry.pub_date = parse_timestamp(&meta.pub_date);
            entry.author = meta.author;
            entry.description = meta.description;
            entry.status = SyncStatus::BothUnchanged;
        }
        Ok(())
    }

    /// Pass 2: the filesystem scan defines the local side.
    fn local_pass(&self, repo: &mut Repository) {
        for scanned in self.store.scan(self.ignore) {
            let entry = repo
                .entry(scanned.rel_path.clone())
                .or_insert_with(|| RepoEntry {
                    path: scanned.rel_path.clone(),
                    ..Default::default()
                });
            entry.local = true;
            entry.directory = scanned.directory;
            entry.current_date = scanned.mtime;
        }
    }

    /// Pass 3: bookkeeping rows attach sync checkpoints to entries that
    /// exist on both sides; stale rows are pruned and the pruned document
    /// persisted immediately. Pruning a row clears `auto_update` on any
    /// ancestor folder that had it set.
    pub fn bookkeeping_pass(&self, repo: &mut Repository) -> Result<(), RepoError> {
        let mut bookkeeping = self.store.read_bookkeeping()?;

        let mut stale: Vec<String> = Vec::new();
        for (path, row) in &bookkeeping {
            match repo.get_mut(path) {
                Some(entry) if entry.local && entry.remote => {
                    entry.downloaded_date = parse_timestamp(&row.downloaded_date);
                    entry.downloaded_pubdate = parse_timestamp(&row.downloaded_pubdate);
                    entry.auto_update = row.auto_update_flag();
                }
                _ => stale.push(path.clone()),
            }
        }

        if stale.is_empty() {
            return Ok(());
        }

        for path in &stale {
            bookkeeping.remove(path);
            // A deleted child invalidates auto-update on its folders.
            let mut ancestor = path.as_str();
            while let Some((parent, _)) = ancestor.rsplit_once('/') {
                if let Some(row) = bookkeeping.get_mut(parent) {
                    if row.auto_update_flag() {
                        row.set_auto_update_flag(false);
                        if let Some(entry) = repo.get_mut(parent) {
                            entry.auto_update = false;
                        }
                    }
                }
                ancestor = parent;
            }
        }

        debug!("pruned {} stale bookkeeping rows", stale.len());
        self.store.write_bookkeeping(&bookkeeping)?;
        Ok(())
    }
}

/// Refresh one entry's bookkeeping row after a successful download or
/// publish, preserving the persisted auto-update choice.
pub fn persist_entry(store: &LocalStateStore, entry: &RepoEntry) -> Result<(), RepoError> {
    let mut bookkeeping = store.read_bookkeeping_tolerant();
    let row = bookkeeping.entry(entry.path.clone()).or_default();
    row.downloaded_date = entry.downloaded_date.map(format_timestamp).unwrap_or_default();
    row.downloaded_pubdate = entry
        .downloaded_pubdate
        .map(format_timestamp)
        .unwrap_or_default();
    row.set_auto_update_flag(entry.auto_update);
    store.write_bookkeeping(&bookkeeping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use scriptsync_core::{BookkeepingEntry, Bookkeeping, Manifest, ManifestEntry};
    use tempfile::tempdir;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: LocalStateStore,
        ignore: IgnorePatterns,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let store =
                LocalStateStore::new(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap());
            Self {
                _dir: dir,
                store,
                ignore: IgnorePatterns::default(),
            }
        }

        fn write_manifest(&self, entries: &[(&str, bool, &str)]) {
            let mut manifest = Manifest::new();
            for (path, directory, pub_date) in entries {
                manifest.insert(
                    path.to_string(),
                    ManifestEntry {
                        directory: *directory,
                        pub_date: pub_date.to_string(),
                        description: "a script".into(),
                        author: "someone".into(),
                    },
                );
            }
            self.store.write_manifest(&manifest).unwrap();
        }

        fn reconcile(&self) -> Repository {
            StatusReconciler::new(&self.store, &self.ignore)
                .build()
                .unwrap()
        }
    }

    #[test]
    fn remote_only_entry_from_manifest() {
        let fx = Fixture::new();
        fx.write_manifest(&[("a.py", false, "2024-Jan-01 00:00:00")]);

        let repo = fx.reconcile();
        assert_eq!(repo["a.py"].status, SyncStatus::RemoteOnly);
        assert!(repo["a.py"].remote);
        assert!(!repo["a.py"].local);
    }

    #[test]
    fn local_only_entry_from_filesystem() {
        let fx = Fixture::new();
        fx.write_manifest(&[]);
        std::fs::write(fx.store.root().join("mine.py"), "x").unwrap();

        let repo = fx.reconcile();
        assert_eq!(repo["mine.py"].status, SyncStatus::LocalOnly);
    }

    #[test]
    fn reserved_and_ignored_manifest_rows_are_filtered() {
        let mut fx = Fixture::new();
        fx.ignore = IgnorePatterns::compile("*.pyc");
        fx.write_manifest(&[
            (".repository.json", false, ""),
            (".local.json", false, ""),
            ("system/internal.py", false, ""),
            ("junk.pyc", false, ""),
            ("keep.py", false, "2024-Jan-01 00:00:00"),
        ]);

        let repo = fx.reconcile();
        assert_eq!(repo.len(), 1);
        assert!(repo.contains_key("keep.py"));
    }

    #[test]
    fn bookkeeping_attaches_only_to_entries_on_both_sides() {
        let fx = Fixture::new();
        fx.write_manifest(&[("a.py", false, "2024-Jan-01 00:00:00")]);
        std::fs::write(fx.store.root().join("a.py"), "x").unwrap();

        let mut bk = Bookkeeping::new();
        bk.insert(
            "a.py".into(),
            BookkeepingEntry {
                downloaded_date: "2024-Jan-02 00:00:00".into(),
                downloaded_pubdate: "2024-Jan-01 00:00:00".into(),
                auto_update: "true".into(),
            },
        );
        fx.store.write_bookkeeping(&bk).unwrap();

        let repo = fx.reconcile();
        let entry = &repo["a.py"];
        assert!(entry.auto_update);
        assert_eq!(
            entry.downloaded_pubdate,
            parse_timestamp("2024-Jan-01 00:00:00")
        );
        // Local mtime differs from the recorded download mtime.
        assert_eq!(entry.status, SyncStatus::LocalChanged);
    }

    #[test]
    fn stale_bookkeeping_is_pruned_and_folder_auto_update_cleared() {
        let fx = Fixture::new();
        fx.write_manifest(&[("muon", true, "")]);
        std::fs::create_dir_all(fx.store.root().join("muon")).unwrap();

        let mut bk = Bookkeeping::new();
        let mut folder_row = BookkeepingEntry::default();
        folder_row.set_auto_update_flag(true);
        bk.insert("muon".into(), folder_row);
        // Gone from both sides: must be pruned and cascade to the folder.
        bk.insert(
            "muon/deleted.py".into(),
            BookkeepingEntry {
                downloaded_date: "2024-Jan-02 00:00:00".into(),
                downloaded_pubdate: "2024-Jan-01 00:00:00".into(),
                auto_update: "true".into(),
            },
        );
        fx.store.write_bookkeeping(&bk).unwrap();

        let repo = fx.reconcile();
        assert!(!repo.contains_key("muon/deleted.py"));
        assert!(!repo["muon"].auto_update);

        let persisted = fx.store.read_bookkeeping().unwrap();
        assert!(!persisted.contains_key("muon/deleted.py"));
        assert!(!persisted["muon"].auto_update_flag());
    }

    #[test]
    fn listing_survives_corrupt_bookkeeping_but_not_corrupt_manifest() {
        let fx = Fixture::new();
        fx.write_manifest(&[("a.py", false, "2024-Jan-01 00:00:00")]);
        std::fs::write(fx.store.bookkeeping_path(), "not json").unwrap();

        let repo = fx.reconcile();
        assert!(repo.contains_key("a.py"));

        std::fs::write(fx.store.manifest_path(), "not json").unwrap();
        let err = StatusReconciler::new(&fx.store, &fx.ignore)
            .build()
            .unwrap_err();
        assert!(matches!(err, RepoError::CorruptedDatabase { .. }));
    }

    #[test]
    fn failed_prune_persistence_surfaces_the_error() {
        let fx = Fixture::new();
        fx.write_manifest(&[("a.py", false, "2024-Jan-01 00:00:00")]);

        let mut bk = Bookkeeping::new();
        bk.insert(
            "gone.py".into(),
            BookkeepingEntry {
                downloaded_date: "2024-Jan-02 00:00:00".into(),
                downloaded_pubdate: "2024-Jan-01 00:00:00".into(),
                auto_update: "false".into(),
            },
        );
        fx.store.write_bookkeeping(&bk).unwrap();

        // A directory squatting on the temp path makes the pruned
        // bookkeeping impossible to write back.
        std::fs::create_dir(fx.store.bookkeeping_path().with_extension("tmp")).unwrap();

        let err = StatusReconciler::new(&fx.store, &fx.ignore)
            .build()
            .unwrap_err();
        assert!(matches!(err, RepoError::Io(_)));
        // The stale row is still on disk, and the caller knows it.
        assert!(fx.store.read_bookkeeping().unwrap().contains_key("gone.py"));
    }

    #[test]
    fn listing_is_idempotent() {
        let fx = Fixture::new();
        fx.write_manifest(&[
            ("muon", true, ""),
            ("muon/a.py", false, "2024-Jan-01 00:00:00"),
        ]);
        std::fs::create_dir_all(fx.store.root().join("muon")).unwrap();
        std::fs::write(fx.store.root().join("muon/a.py"), "x").unwrap();

        let first = fx.reconcile();
        let second = fx.reconcile();
        assert_eq!(first, second);
    }
}
