use crate::RepoError;
use directories::ProjectDirs;
use scriptsync_config::KEY_SCRIPT_DIRS;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Narrow key/value settings seam. The facade persists the installed
/// repository path, the script search directories and reads the
/// user-configured URLs and ignore globs through this.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), RepoError>;

    /// Register `dir` in the `;`-separated script-directories list if it is
    /// not already present.
    fn append_script_dir(&self, dir: &str) -> Result<(), RepoError> {
        let current = self.get(KEY_SCRIPT_DIRS).unwrap_or_default();
        if current.split(';').any(|d| d == dir) {
            return Ok(());
        }
        let updated = if current.is_empty() {
            dir.to_string()
        } else {
            format!("{current};{dir}")
        };
        self.set(KEY_SCRIPT_DIRS, &updated)
    }
}

/// Settings persisted as one JSON document under the user config directory.
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Result<Self, RepoError> {
        const QUALIFIER: &str = "org";
        const ORG: &str = "scriptsync";
        const APP: &str = "scriptsync";

        let proj_dirs = ProjectDirs::from(QUALIFIER, ORG, APP)
            .ok_or_else(|| RepoError::Config("cannot determine config dir".into()))?;
        Ok(Self {
            path: proj_dirs.config_dir().join("settings.json"),
        })
    }

    /// Explicit document path, used by tests and unusual deployments.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> BTreeMap<String, String> {
        let Ok(data) = std::fs::read_to_string(&self.path) else {
            return BTreeMap::new();
        };
        serde_json::from_str(&data).unwrap_or_default()
    }
}

impl ConfigStore for FileConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.load().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), RepoError> {
        let mut settings = self.load();
        settings.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        let data = serde_json::to_string_pretty(&settings)
            .map_err(|e| RepoError::Config(format!("serialize settings: {e}")))?;
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory settings for tests.
#[derive(Default)]
pub struct MemoryConfigStore {
    inner: Mutex<BTreeMap<String, String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(pairs: &[(&str, &str)]) -> Self {
        let store = Self::new();
        let mut inner = store.inner.lock().unwrap();
        for (k, v) in pairs {
            inner.insert(k.to_string(), v.to_string());
        }
        drop(inner);
        store
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), RepoError> {
        self.inner
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
