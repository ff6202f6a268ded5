//! Central configuration constants: wire names, config keys and defaults.

/// Remote name of the whole-repository manifest, fetched relative to the
/// repository base URL.
pub const REMOTE_MANIFEST_NAME: &str = "repository.json";

// The on-disk document names live next to the path rules that reserve them.
pub use scriptsync_core::path_utils::{BOOKKEEPING_FILE, MANIFEST_FILE};

/// Suffix appended when backing up a locally modified file before a
/// conflicting download overwrites it.
pub const BACKUP_SUFFIX: &str = "_bck";

/// Fixed per-request HTTP timeout, in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 3;

/// Ignore globs applied when no user override is configured.
pub const DEFAULT_IGNORE_GLOBS: &str = "*pyc;~*;*.bck";

/// Config key: absolute path of the installed local repository.
pub const KEY_LOCAL_REPOSITORY: &str = "ScriptLocalRepository";

/// Config key: base URL of the central repository.
pub const KEY_REPOSITORY_URL: &str = "ScriptRepository";

/// Config key: URL of the publish endpoint.
pub const KEY_UPLOADER_URL: &str = "UploaderWebServer";

/// Config key: user-defined `;`-separated ignore globs.
pub const KEY_IGNORE_GLOBS: &str = "ScriptRepositoryIgnore";

/// Config key: `;`-separated list of directories searched for scripts.
/// Appended to when a download materializes a new script folder.
pub const KEY_SCRIPT_DIRS: &str = "pythonscripts.directories";
