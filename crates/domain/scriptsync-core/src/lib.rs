use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod path_utils;
pub mod status;
pub mod timestamp;

pub use status::SyncStatus;

/// One tracked path in the reconciled repository view. Rebuilt from scratch
/// on every listing; `status` is always derived, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoEntry {
    pub path: String,
    pub directory: bool,
    pub local: bool,
    pub remote: bool,
    pub author: String,
    pub description: String,
    /// Latest version known to the central repository.
    pub pub_date: Option<NaiveDateTime>,
    /// Local mtime as of the last successful download or publish.
    pub downloaded_date: Option<NaiveDateTime>,
    /// The `pub_date` that was current at the last successful download.
    pub downloaded_pubdate: Option<NaiveDateTime>,
    /// Local mtime as of the last filesystem scan.
    pub current_date: Option<NaiveDateTime>,
    pub auto_update: bool,
    pub status: SyncStatus,
}

/// The in-memory repository view. Lexicographic key order is part of the
/// listing contract.
pub type Repository = BTreeMap<String, RepoEntry>;

/// Central manifest row. `.repository.json` and the `repository.json` GET
/// reply share this shape, keyed by relative path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntry {
    #[serde(default)]
    pub directory: bool,
    #[serde(default)]
    pub pub_date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
}

pub type Manifest = BTreeMap<String, ManifestEntry>;

/// Bookkeeping row persisted in `.local.json`. `auto_update` is kept as the
/// literal strings `"true"`/`"false"` for wire compatibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookkeepingEntry {
    #[serde(default)]
    pub downloaded_date: String,
    #[serde(default)]
    pub downloaded_pubdate: String,
    #[serde(default)]
    pub auto_update: String,
}

impl BookkeepingEntry {
    pub fn auto_update_flag(&self) -> bool {
        self.auto_update == "true"
    }

    pub fn set_auto_update_flag(&mut self, enabled: bool) {
        self.auto_update = if enabled { "true" } else { "false" }.to_string();
    }
}

pub type Bookkeeping = BTreeMap<String, BookkeepingEntry>;

/// JSON reply shape shared by the publish and remove endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerReply {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub pub_date: String,
    #[serde(default)]
    pub shell: String,
}

/// Per-path metadata surfaced by the facade's `info` operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryInfo {
    pub author: String,
    pub pub_date: Option<NaiveDateTime>,
    pub auto_update: bool,
    pub directory: bool,
}
