use crate::config::ConfigStore;
use crate::reconcile::{persist_entry, StatusReconciler};
use crate::store::LocalStateStore;
use crate::RepoError;
use camino::Utf8PathBuf;
use scriptsync_config as cfg;
use scriptsync_core::path_utils::{IgnorePatterns, ScriptPath};
use scriptsync_core::status::apply_statuses;
use scriptsync_core::timestamp::{format_timestamp, from_system_time, parse_timestamp};
use scriptsync_core::{EntryInfo, ManifestEntry, RepoEntry, Repository, ServerReply, SyncStatus};
use scriptsync_infra::Transport;
use tracing::{debug, info, warn};

/// Public entry point for the script repository: wires the reconciler, the
/// local state store and the remote transport together, and guards every
/// operation behind the installed/valid invariant.
///
/// One instance drives one logical sync session; mutating operations must
/// not run concurrently against the same local directory.
pub struct ScriptRepository {
    valid: bool,
    local_repository: Utf8PathBuf,
    remote_url: String,
    remote_upload: String,
    ignore: IgnorePatterns,
    transport: Box<dyn Transport>,
    config: Box<dyn ConfigStore>,
    repository: Repository,
}

fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

fn normalize_root(raw: &str) -> Utf8PathBuf {
    let raw = raw.trim();
    if raw.is_empty() {
        return Utf8PathBuf::new();
    }
    let path = Utf8PathBuf::from(ScriptPath::normalize(raw));
    if path.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            if let Ok(cwd) = Utf8PathBuf::from_path_buf(cwd) {
                return cwd.join(path);
            }
        }
    }
    path
}

impl ScriptRepository {
    /// Explicit paths win; unset ones fall back to the configuration keys.
    /// An empty effective remote URL is a configuration error.
    pub fn new(
        local: Option<&str>,
        remote: Option<&str>,
        upload: Option<&str>,
        transport: Box<dyn Transport>,
        config: Box<dyn ConfigStore>,
    ) -> Result<Self, RepoError> {
        let remote_url = remote
            .map(str::to_string)
            .or_else(|| config.get(cfg::KEY_REPOSITORY_URL))
            .unwrap_or_default();
        if remote_url.trim().is_empty() {
            return Err(RepoError::Config(
                "remote repository URL is not configured".into(),
            ));
        }
        let remote_upload = upload
            .map(str::to_string)
            .or_else(|| config.get(cfg::KEY_UPLOADER_URL))
            .unwrap_or_default();
        let local = local
            .map(str::to_string)
            .or_else(|| config.get(cfg::KEY_LOCAL_REPOSITORY))
            .unwrap_or_default();
        let globs = config
            .get(cfg::KEY_IGNORE_GLOBS)
            .unwrap_or_else(|| cfg::DEFAULT_IGNORE_GLOBS.to_string());

        let mut repo = Self {
            valid: false,
            local_repository: normalize_root(&local),
            remote_url: ensure_trailing_slash(remote_url.trim()),
            remote_upload,
            ignore: IgnorePatterns::compile(&globs),
            transport,
            config,
            repository: Repository::new(),
        };
        repo.refresh_validity();
        Ok(repo)
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn local_repository(&self) -> &Utf8PathBuf {
        &self.local_repository
    }

    /// The last reconciled view. Empty until `list_files` has run.
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// URL of the central manifest; also the default connectivity-probe
    /// target.
    pub fn remote_manifest_url(&self) -> String {
        format!("{}{}", self.remote_url, cfg::REMOTE_MANIFEST_NAME)
    }

    fn store(&self) -> LocalStateStore {
        LocalStateStore::new(self.local_repository.clone())
    }

    fn refresh_validity(&mut self) {
        let store = self.store();
        self.valid = !self.local_repository.as_str().is_empty()
            && self.local_repository.is_dir()
            && store.manifest_path().is_file();
        if self.valid && !store.bookkeeping_path().is_file() {
            warn!(
                "{} is missing; download bookkeeping starts empty",
                store.bookkeeping_path()
            );
        }
    }

    fn assert_valid(&self) -> Result<(), RepoError> {
        if self.valid {
            Ok(())
        } else {
            Err(RepoError::NotInstalled)
        }
    }

    /// Create the local directory if needed, fetch the central manifest into
    /// it and seed empty bookkeeping. Persists the chosen path into the
    /// configuration when it changed.
    pub async fn install(&mut self, path: &str) -> Result<(), RepoError> {
        let root = normalize_root(path);
        std::fs::create_dir_all(root.as_std_path())?;
        let store = LocalStateStore::new(root.clone());

        let manifest_url = self.remote_manifest_url();
        self.transport
            .fetch(&manifest_url, Some(&store.manifest_path()))
            .await?;

        if !store.bookkeeping_path().exists() {
            store.write_bookkeeping(&Default::default())?;
        }
        scriptsync_infra::platform::mark_hidden(&store.manifest_path());
        scriptsync_infra::platform::mark_hidden(&store.bookkeeping_path());

        if self.config.get(cfg::KEY_LOCAL_REPOSITORY).as_deref() != Some(root.as_str()) {
            self.config.set(cfg::KEY_LOCAL_REPOSITORY, root.as_str())?;
        }

        info!("installed script repository at {root}");
        self.local_repository = root;
        self.refresh_validity();
        Ok(())
    }

    /// Rebuild the repository view and return every known relative path in
    /// lexicographic order.
    pub fn list_files(&mut self) -> Result<Vec<String>, RepoError> {
        self.assert_valid()?;
        let store = self.store();
        self.repository = StatusReconciler::new(&store, &self.ignore).build()?;
        Ok(self.repository.keys().cloned().collect())
    }

    fn entry(&self, path: &str) -> Result<&RepoEntry, RepoError> {
        self.assert_valid()?;
        let key = self.convert_path(path);
        self.repository
            .get(&key)
            .ok_or_else(|| RepoError::NotFound(path.to_string()))
    }

    pub fn info(&self, path: &str) -> Result<EntryInfo, RepoError> {
        let entry = self.entry(path)?;
        Ok(EntryInfo {
            author: entry.author.clone(),
            pub_date: entry.pub_date,
            auto_update: entry.auto_update,
            directory: entry.directory,
        })
    }

    pub fn description(&self, path: &str) -> Result<String, RepoError> {
        Ok(self.entry(path)?.description.clone())
    }

    pub fn file_status(&self, path: &str) -> Result<SyncStatus, RepoError> {
        Ok(self.entry(path)?.status)
    }

    /// Connectivity probe against an arbitrary URL.
    pub async fn connect(&self, url: &str) -> Result<(), RepoError> {
        self.transport.fetch(url, None).await.map_err(RepoError::from)
    }

    /// Map an absolute or relative input onto a repository-relative key.
    /// Paths outside the repository root pass through verbatim.
    pub fn convert_path(&self, raw: &str) -> String {
        let normalized = ScriptPath::normalize(raw);
        if self.repository.contains_key(&normalized) {
            return normalized;
        }

        let candidate = Utf8PathBuf::from(&normalized);
        let absolute = if candidate.is_absolute() {
            candidate
        } else {
            let from_cwd = std::env::current_dir()
                .ok()
                .and_then(|cwd| Utf8PathBuf::from_path_buf(cwd).ok())
                .map(|cwd| cwd.join(&candidate));
            match from_cwd {
                Some(p) if p.strip_prefix(&self.local_repository).is_ok() => p,
                _ => self.local_repository.join(&candidate),
            }
        };

        match absolute.strip_prefix(&self.local_repository) {
            Ok(rel) => ScriptPath::normalize(rel.as_str()),
            Err(_) => raw.to_string(),
        }
    }

    /// Download a file or a whole directory subtree.
    pub async fn download(&mut self, path: &str) -> Result<(), RepoError> {
        self.assert_valid()?;
        let key = self.convert_path(path);
        let entry = self
            .repository
            .get(&key)
            .ok_or_else(|| RepoError::NotFound(path.to_string()))?;

        if entry.directory {
            self.download_directory(&key).await?;
        } else {
            self.download_file(&key).await?;
        }
        apply_statuses(&mut self.repository);
        Ok(())
    }

    async fn download_directory(&mut self, dir_key: &str) -> Result<(), RepoError> {
        std::fs::create_dir_all(self.local_repository.join(dir_key).as_std_path())?;
        if let Some(entry) = self.repository.get_mut(dir_key) {
            entry.local = true;
        }

        let descendants: Vec<(String, bool, bool, bool, SyncStatus)> = self
            .repository
            .iter()
            .filter(|(key, _)| {
                key.as_str() != dir_key && ScriptPath::is_self_or_descendant(dir_key, key)
            })
            .map(|(key, e)| (key.clone(), e.directory, e.remote, e.local, e.status))
            .collect();

        for (key, directory, remote, local, status) in descendants {
            if directory {
                if remote && !local {
                    std::fs::create_dir_all(self.local_repository.join(&key).as_std_path())?;
                    if let Some(entry) = self.repository.get_mut(&key) {
                        entry.local = true;
                    }
                }
            } else if !matches!(status, SyncStatus::LocalOnly | SyncStatus::LocalChanged) {
                self.download_file(&key).await?;
            }
        }
        Ok(())
    }

    async fn download_file(&mut self, key: &str) -> Result<(), RepoError> {
        let entry = self
            .repository
            .get(key)
            .ok_or_else(|| RepoError::NotFound(key.to_string()))?;
        match entry.status {
            SyncStatus::LocalOnly | SyncStatus::LocalChanged => {
                return Err(RepoError::DownloadNotAllowed(key.to_string()));
            }
            SyncStatus::BothUnchanged => return Ok(()),
            _ => {}
        }

        let dest = self.local_repository.join(key);
        if entry.status == SyncStatus::BothChanged {
            // Best-effort backup of the conflicting local copy; a failure is
            // logged and the download still proceeds.
            let backup = Utf8PathBuf::from(format!("{dest}{}", cfg::BACKUP_SUFFIX));
            match std::fs::copy(dest.as_std_path(), backup.as_std_path()) {
                Ok(_) => debug!("backed up conflicting copy to {backup}"),
                Err(e) => warn!("could not back up {dest} before overwrite: {e}"),
            }
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }

        let url = format!("{}{}", self.remote_url, key);
        self.transport.fetch(&url, Some(&dest)).await?;

        let mtime = std::fs::metadata(dest.as_std_path())?
            .modified()
            .map(from_system_time)
            .ok();

        let store = self.store();
        if let Some(entry) = self.repository.get_mut(key) {
            entry.local = true;
            entry.current_date = mtime;
            entry.downloaded_date = mtime;
            entry.downloaded_pubdate = entry.pub_date;
            entry.status = SyncStatus::BothUnchanged;
            persist_entry(&store, entry)?;
        }

        if let Some(folder) = dest.parent() {
            self.config.append_script_dir(folder.as_str())?;
        }
        Ok(())
    }

    /// Publish a local file to the central repository.
    pub async fn upload(
        &mut self,
        path: &str,
        comment: &str,
        author: &str,
        email: &str,
    ) -> Result<(), RepoError> {
        self.assert_valid()?;
        let key = self.convert_path(path);
        let entry = self
            .repository
            .get(&key)
            .ok_or_else(|| RepoError::NotFound(path.to_string()))?;
        if entry.directory {
            return Err(RepoError::UploadRejected {
                message: "directories cannot be published".into(),
                detail: key,
            });
        }
        if self.remote_upload.trim().is_empty() {
            return Err(RepoError::Config("upload endpoint is not configured".into()));
        }

        let folder = key.rsplit_once('/').map(|(f, _)| f.to_string()).unwrap_or_default();
        let fields = vec![
            ("author".to_string(), author.to_string()),
            ("mail".to_string(), email.to_string()),
            ("comment".to_string(), comment.to_string()),
            ("path".to_string(), folder),
        ];
        let abs = self.local_repository.join(&key);

        let body = self
            .transport
            .post_form(&self.remote_upload, fields, Some(("file".to_string(), abs.clone())))
            .await
            .map_err(|e| RepoError::UploadFailed(e.to_string()))?;
        let reply: ServerReply = serde_json::from_str(&body)
            .map_err(|e| RepoError::UploadFailed(format!("unparsable server reply: {e}")))?;
        if reply.message != "success" {
            return Err(RepoError::UploadRejected {
                message: reply.message,
                detail: reply.detail,
            });
        }
        if !reply.shell.is_empty() {
            debug!("server shell output for {key}: {}", reply.shell);
        }

        let mtime = std::fs::metadata(abs.as_std_path())?
            .modified()
            .map(from_system_time)
            .ok();
        let server_pub = parse_timestamp(&reply.pub_date);

        let store = self.store();
        if let Some(entry) = self.repository.get_mut(&key) {
            entry.remote = true;
            if server_pub.is_some() {
                entry.pub_date = server_pub;
            }
            entry.downloaded_pubdate = entry.pub_date;
            entry.current_date = mtime;
            entry.downloaded_date = mtime;
            entry.status = SyncStatus::BothUnchanged;
            persist_entry(&store, entry)?;
            // Mirror the publish into the cached manifest so the next
            // listing still sees the file on the remote side.
            store.upsert_manifest_key(
                &key,
                ManifestEntry {
                    directory: false,
                    pub_date: entry.pub_date.map(format_timestamp).unwrap_or_default(),
                    description: entry.description.clone(),
                    author: author.to_string(),
                },
            )?;
        }
        apply_statuses(&mut self.repository);
        info!("published {key}");
        Ok(())
    }

    /// Ask the central repository to delete a file this client owns.
    pub async fn remove(
        &mut self,
        path: &str,
        comment: &str,
        author: &str,
        email: &str,
    ) -> Result<(), RepoError> {
        self.assert_valid()?;
        let key = self.convert_path(path);
        let entry = self
            .repository
            .get(&key)
            .ok_or_else(|| RepoError::NotFound(path.to_string()))?;
        if entry.directory {
            return Err(RepoError::RemoveRejected(
                "folders cannot be removed from the central repository".into(),
            ));
        }
        if self.remote_upload.trim().is_empty() {
            return Err(RepoError::Config("upload endpoint is not configured".into()));
        }
        match entry.status {
            SyncStatus::LocalOnly => {
                return Err(RepoError::RemoveRejected(format!(
                    "'{key}' only exists locally; delete it with your file manager"
                )));
            }
            SyncStatus::RemoteOnly | SyncStatus::RemoteChanged | SyncStatus::BothChanged => {
                return Err(RepoError::RemoveRejected(format!(
                    "the local copy of '{key}' is out of date; download it first"
                )));
            }
            SyncStatus::BothUnchanged | SyncStatus::LocalChanged => {}
        }

        let url = self.remote_upload.replace("publish", "remove");
        let fields = vec![
            ("author".to_string(), author.to_string()),
            ("mail".to_string(), email.to_string()),
            ("comment".to_string(), comment.to_string()),
            ("file_n".to_string(), key.clone()),
        ];
        let body = self
            .transport
            .post_form(&url, fields, None)
            .await
            .map_err(|e| RepoError::UploadFailed(e.to_string()))?;
        let reply: ServerReply = serde_json::from_str(&body)
            .map_err(|e| RepoError::UploadFailed(format!("unparsable server reply: {e}")))?;
        if reply.message != "success" {
            return Err(RepoError::RemoveRejected(format!(
                "{}: {}",
                reply.message, reply.detail
            )));
        }

        let store = self.store();
        store.remove_manifest_key(&key)?;
        let mut bookkeeping = store.read_bookkeeping_tolerant();
        if bookkeeping.remove(&key).is_some() {
            store.write_bookkeeping(&bookkeeping)?;
        }
        if let Some(entry) = self.repository.get_mut(&key) {
            entry.remote = false;
            entry.pub_date = None;
            entry.downloaded_date = None;
            entry.downloaded_pubdate = None;
            entry.auto_update = false;
            entry.status = SyncStatus::LocalOnly;
        }
        apply_statuses(&mut self.repository);
        info!("removed {key} from the central repository");
        Ok(())
    }

    /// Refresh the central manifest (with rollback on failure), re-list and
    /// auto-download every opted-in entry the remote side moved past.
    /// Returns the auto-downloaded paths.
    pub async fn check_for_updates(&mut self) -> Result<Vec<String>, RepoError> {
        self.assert_valid()?;
        let store = self.store();
        let manifest_path = store.manifest_path();
        let backup = std::fs::read(manifest_path.as_std_path())?;

        let url = self.remote_manifest_url();
        if let Err(e) = self.transport.fetch(&url, Some(&manifest_path)).await {
            // Full rollback of the manifest refresh step.
            std::fs::write(manifest_path.as_std_path(), &backup)?;
            warn!("manifest refresh failed, previous manifest restored: {e}");
            return Err(e.into());
        }

        self.list_files()?;

        let candidates: Vec<String> = self
            .repository
            .iter()
            .filter(|(_, e)| e.auto_update && e.status.remote_changed_bit())
            .map(|(key, _)| key.clone())
            .collect();

        let mut downloaded = Vec::new();
        for key in candidates {
            self.download(&key).await?;
            downloaded.push(key);
        }
        Ok(downloaded)
    }

    /// Opt a path (and its descendants) in or out of auto-update. Entries
    /// never synced (`LocalOnly`/`RemoteOnly`) are ineligible. Returns the
    /// number of entries touched.
    pub fn set_auto_update(&mut self, path: &str, enabled: bool) -> Result<usize, RepoError> {
        self.assert_valid()?;
        let key = self.convert_path(path);
        if !self.repository.contains_key(&key) {
            return Err(RepoError::NotFound(path.to_string()));
        }

        let store = self.store();
        let mut bookkeeping = store.read_bookkeeping_tolerant();
        let mut touched = 0;

        let keys: Vec<String> = self.repository.keys().cloned().collect();
        for candidate in keys {
            if !ScriptPath::is_self_or_descendant(&key, &candidate) {
                continue;
            }
            let Some(entry) = self.repository.get_mut(&candidate) else {
                continue;
            };
            if matches!(entry.status, SyncStatus::RemoteOnly | SyncStatus::LocalOnly) {
                continue;
            }
            entry.auto_update = enabled;
            let row = bookkeeping.entry(candidate.clone()).or_default();
            row.downloaded_date = entry.downloaded_date.map(format_timestamp).unwrap_or_default();
            row.downloaded_pubdate = entry
                .downloaded_pubdate
                .map(format_timestamp)
                .unwrap_or_default();
            row.set_auto_update_flag(enabled);
            touched += 1;
        }

        store.write_bookkeeping(&bookkeeping)?;
        Ok(touched)
    }
}
