use crate::{RepoEntry, Repository};

/// Six-way synchronization state of a tracked path.
///
/// The lattice carries two independent divergence sides: local (the file on
/// disk moved away from the last sync point) and remote (the central
/// repository published a newer version). `BothChanged` means both sides
/// diverged, possibly via different descendants of a directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncStatus {
    #[default]
    BothUnchanged,
    LocalOnly,
    RemoteOnly,
    LocalChanged,
    RemoteChanged,
    BothChanged,
}

impl SyncStatus {
    /// True when the remote side has content the local copy lacks.
    /// This is the bit auto-update keys off.
    pub fn remote_changed_bit(self) -> bool {
        matches!(self, SyncStatus::RemoteChanged | SyncStatus::BothChanged)
    }

    fn local_side(self) -> bool {
        matches!(
            self,
            SyncStatus::LocalOnly | SyncStatus::LocalChanged | SyncStatus::BothChanged
        )
    }

    fn remote_side(self) -> bool {
        matches!(
            self,
            SyncStatus::RemoteOnly | SyncStatus::RemoteChanged | SyncStatus::BothChanged
        )
    }

    /// Accumulator rule for folding child statuses into a directory status.
    ///
    /// Identical statuses pass through; `BothUnchanged` is the identity;
    /// only/changed on the same side collapse to changed; mixing local-side
    /// and remote-side divergence collapses to `BothChanged`.
    pub fn combine(self, other: SyncStatus) -> SyncStatus {
        use SyncStatus::*;
        if self == other {
            return self;
        }
        match (self, other) {
            (BothUnchanged, s) | (s, BothUnchanged) => s,
            (LocalOnly, LocalChanged) | (LocalChanged, LocalOnly) => LocalChanged,
            (RemoteOnly, RemoteChanged) | (RemoteChanged, RemoteOnly) => RemoteChanged,
            (a, b) => {
                debug_assert!(
                    (a.local_side() || b.local_side()) && (a.remote_side() || b.remote_side())
                );
                BothChanged
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SyncStatus::BothUnchanged => "unchanged",
            SyncStatus::LocalOnly => "local-only",
            SyncStatus::RemoteOnly => "remote-only",
            SyncStatus::LocalChanged => "local-changed",
            SyncStatus::RemoteChanged => "remote-changed",
            SyncStatus::BothChanged => "both-changed",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Derive the status of a single file entry from its recorded dates.
pub fn file_status(entry: &RepoEntry) -> SyncStatus {
    match (entry.local, entry.remote) {
        (true, false) => SyncStatus::LocalOnly,
        (false, true) => SyncStatus::RemoteOnly,
        // Entries with neither side are pruned before status derivation.
        (false, false) => SyncStatus::BothUnchanged,
        (true, true) => {
            let local_changed = entry.current_date != entry.downloaded_date;
            let remote_changed = match (entry.pub_date, entry.downloaded_pubdate) {
                (Some(published), Some(synced)) => published > synced,
                // Never synced but published remotely: remote is ahead.
                (Some(_), None) => true,
                (None, _) => false,
            };
            match (local_changed, remote_changed) {
                (false, false) => SyncStatus::BothUnchanged,
                (true, false) => SyncStatus::LocalChanged,
                (false, true) => SyncStatus::RemoteChanged,
                (true, true) => SyncStatus::BothChanged,
            }
        }
    }
}

/// Recompute every entry's status: files from their own dates, directories
/// by folding their descendants with an explicit post-order walk.
///
/// Directories are attached to their nearest ancestor present in the map, so
/// a manifest listing `a/b/c.py` without an explicit `a/b` row still
/// aggregates into `a`. A directory that is not listed remotely is forced
/// `LocalOnly` regardless of its children.
pub fn apply_statuses(repo: &mut Repository) {
    for entry in repo.values_mut() {
        if !entry.directory {
            entry.status = file_status(entry);
        }
    }

    let keys: Vec<String> = repo.keys().cloned().collect();
    let mut children: std::collections::BTreeMap<String, Vec<String>> = Default::default();
    let mut roots: Vec<String> = Vec::new();

    for key in &keys {
        match nearest_ancestor(repo, key) {
            Some(parent) => children.entry(parent).or_default().push(key.clone()),
            None => roots.push(key.clone()),
        }
    }

    for root in &roots {
        fold_subtree(repo, &children, root);
    }
}

fn nearest_ancestor(repo: &Repository, key: &str) -> Option<String> {
    let mut current = key;
    while let Some((parent, _)) = current.rsplit_once('/') {
        if repo.contains_key(parent) {
            return Some(parent.to_string());
        }
        current = parent;
    }
    None
}

fn fold_subtree(
    repo: &mut Repository,
    children: &std::collections::BTreeMap<String, Vec<String>>,
    key: &str,
) -> SyncStatus {
    let is_dir = repo.get(key).map(|e| e.directory).unwrap_or(false);
    if !is_dir {
        return repo.get(key).map(|e| e.status).unwrap_or_default();
    }

    let mut acc = SyncStatus::BothUnchanged;
    if let Some(kids) = children.get(key) {
        for kid in kids.clone() {
            acc = acc.combine(fold_subtree(repo, children, &kid));
        }
    }

    if let Some(entry) = repo.get_mut(key) {
        if !entry.remote {
            acc = SyncStatus::LocalOnly;
        }
        entry.status = acc;
    }
    acc
}
