use crate::RepoError;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use scriptsync_config::{BOOKKEEPING_FILE, MANIFEST_FILE};
use scriptsync_core::path_utils::{IgnorePatterns, ScriptPath};
use scriptsync_core::timestamp;
use scriptsync_core::{Bookkeeping, Manifest};
use tracing::warn;
use walkdir::WalkDir;

/// One row of the local filesystem scan.
#[derive(Debug, Clone)]
pub struct ScannedEntry {
    pub rel_path: String,
    pub directory: bool,
    pub mtime: Option<NaiveDateTime>,
}

/// Owns the two persisted JSON documents and the directory tree scan.
pub struct LocalStateStore {
    root: Utf8PathBuf,
}

impl LocalStateStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn bookkeeping_path(&self) -> Utf8PathBuf {
        self.root.join(BOOKKEEPING_FILE)
    }

    /// Cached central manifest. A parse failure here is fatal for the
    /// caller: the central cache is the source of truth for the remote side.
    pub fn read_manifest(&self) -> Result<Manifest, RepoError> {
        let path = self.manifest_path();
        let data = std::fs::read_to_string(&path)?;
        serde_json::from_str(&data).map_err(|source| RepoError::CorruptedDatabase { path, source })
    }

    pub fn write_manifest(&self, manifest: &Manifest) -> Result<(), RepoError> {
        write_json(&self.manifest_path(), manifest)
    }

    /// Surgical key delete from the cached manifest: a local approximation
    /// of the server-side state after a successful central removal.
    pub fn remove_manifest_key(&self, rel_path: &str) -> Result<(), RepoError> {
        let mut manifest = self.read_manifest()?;
        manifest.remove(rel_path);
        self.write_manifest(&manifest)
    }

    pub fn upsert_manifest_key(
        &self,
        rel_path: &str,
        entry: scriptsync_core::ManifestEntry,
    ) -> Result<(), RepoError> {
        let mut manifest = self.read_manifest()?;
        manifest.insert(rel_path.to_string(), entry);
        self.write_manifest(&manifest)
    }

    /// Download bookkeeping. A missing file starts empty; unparsable content
    /// is reported so the caller can choose between failing and degrading.
    pub fn read_bookkeeping(&self) -> Result<Bookkeeping, RepoError> {
        let path = self.bookkeeping_path();
        if !path.exists() {
            return Ok(Bookkeeping::new());
        }
        let data = std::fs::read_to_string(&path)?;
        serde_json::from_str(&data).map_err(|source| RepoError::CorruptedDatabase { path, source })
    }

    /// Bookkeeping, degrading to empty on corruption (logged).
    pub fn read_bookkeeping_tolerant(&self) -> Bookkeeping {
        match self.read_bookkeeping() {
            Ok(bk) => bk,
            Err(e) => {
                warn!("ignoring corrupted bookkeeping: {e}");
                Bookkeeping::new()
            }
        }
    }

    pub fn write_bookkeeping(&self, bookkeeping: &Bookkeeping) -> Result<(), RepoError> {
        write_json(&self.bookkeeping_path(), bookkeeping)
    }

    /// Recursive walk of the repository root. Per-entry failures are logged
    /// and skipped; the scan is best-effort.
    pub fn scan(&self, ignore: &IgnorePatterns) -> Vec<ScannedEntry> {
        let mut entries = Vec::new();
        for item in WalkDir::new(self.root.as_std_path()).min_depth(1) {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    warn!("skipping unreadable entry under {}: {e}", self.root);
                    continue;
                }
            };
            let Some(path_str) = item.path().to_str() else {
                warn!("skipping non-utf8 path under {}", self.root);
                continue;
            };
            let rel = match Utf8Path::new(path_str).strip_prefix(&self.root) {
                Ok(rel) => ScriptPath::normalize(rel.as_str()),
                Err(_) => continue,
            };
            if ScriptPath::is_reserved(&rel) || ignore.matches(&rel) {
                continue;
            }
            let mtime = item
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(timestamp::from_system_time);
            entries.push(ScannedEntry {
                rel_path: rel,
                directory: item.file_type().is_dir(),
                mtime,
            });
        }
        entries
    }
}

fn write_json<T: serde::Serialize>(path: &Utf8Path, value: &T) -> Result<(), RepoError> {
    let data = serde_json::to_string_pretty(value)
        .map_err(|e| RepoError::Config(format!("serialize {path}: {e}")))?;
    let tmp = path.with_extension("tmp");
    std::fs::write(tmp.as_std_path(), data)?;
    std::fs::rename(tmp.as_std_path(), path.as_std_path())?;
    Ok(())
}
