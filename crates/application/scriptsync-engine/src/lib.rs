use camino::Utf8PathBuf;
use scriptsync_infra::TransportError;

pub mod config;
pub mod facade;
pub mod reconcile;
pub mod store;

pub use config::{ConfigStore, FileConfigStore, MemoryConfigStore};
pub use facade::ScriptRepository;
pub use scriptsync_core::SyncStatus;

/// High-level error type for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("the script repository is not installed; run install first")]
    NotInstalled,
    #[error("'{0}' is not tracked by the repository")]
    NotFound(String),
    #[error("corrupted repository database {path}: {source}")]
    CorruptedDatabase {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("network failure: {0}")]
    Network(#[from] TransportError),
    #[error("cannot download '{0}': it only has local changes; publish them first")]
    DownloadNotAllowed(String),
    #[error("upload rejected by the server: {message}: {detail}")]
    UploadRejected { message: String, detail: String },
    #[error("removal rejected: {0}")]
    RemoveRejected(String),
    #[error("upload transport failure: {0}")]
    UploadFailed(String),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}
