use regex::Regex;

/// File names and prefixes the reconciler never exposes as entries.
pub const MANIFEST_FILE: &str = ".repository.json";
pub const BOOKKEEPING_FILE: &str = ".local.json";
const SYSTEM_PREFIX: &str = "system";

pub struct ScriptPath;

impl ScriptPath {
    /// Standardize directory separators to forward slashes. Relative
    /// forward-slash paths are the key format for the repository map and
    /// both persisted documents.
    pub fn normalize(path: &str) -> String {
        path.replace('\\', "/")
    }

    /// The two bookkeeping documents and the server-side `system/` area are
    /// never tracked as repository entries.
    pub fn is_reserved(path: &str) -> bool {
        path == MANIFEST_FILE
            || path == BOOKKEEPING_FILE
            || path == SYSTEM_PREFIX
            || path.starts_with("system/")
    }

    /// True when `candidate` is `base` itself or a path below it. Guards
    /// against sibling-name collisions like `folder` vs `folder2`.
    pub fn is_self_or_descendant(base: &str, candidate: &str) -> bool {
        candidate == base || candidate.starts_with(&format!("{base}/"))
    }
}

/// User-configured ignore list: a `;`-separated sequence of globs compiled
/// into a single anchored alternation (`*` -> `.*`, `.` escaped, `/` kept
/// literal).
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    re: Option<Regex>,
}

impl IgnorePatterns {
    pub fn compile(globs: &str) -> Self {
        let mut alternatives = Vec::new();
        for glob in globs.split(';') {
            let glob = glob.trim();
            if glob.is_empty() {
                continue;
            }
            let mut pattern = String::new();
            for c in glob.chars() {
                match c {
                    '*' => pattern.push_str(".*"),
                    '.' => pattern.push_str("\\."),
                    '/' => pattern.push_str("\\/"),
                    c if "+?^$()[]{}|\\".contains(c) => {
                        pattern.push('\\');
                        pattern.push(c);
                    }
                    c => pattern.push(c),
                }
            }
            alternatives.push(pattern);
        }

        if alternatives.is_empty() {
            return Self { re: None };
        }
        let joined = format!("^(?:{})$", alternatives.join("|"));
        Self {
            // An invalid user pattern disables filtering rather than
            // breaking every listing.
            re: Regex::new(&joined).ok(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.re.as_ref().is_some_and(|re| re.is_match(path))
    }
}
