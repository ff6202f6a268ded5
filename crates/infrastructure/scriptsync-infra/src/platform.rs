use camino::Utf8Path;
use tracing::warn;

/// Mark a file as hidden. On POSIX the dotfile naming convention already
/// does this, so the call is a no-op. On Windows the hidden attribute must
/// be set explicitly. Failures are logged and never fatal.
#[cfg(target_os = "windows")]
pub fn mark_hidden(path: &Utf8Path) {
    let result = std::process::Command::new("attrib")
        .arg("+h")
        .arg(path.as_str())
        .status();
    match result {
        Ok(status) if status.success() => {}
        Ok(status) => warn!("attrib +h {path} exited with {status}"),
        Err(e) => warn!("could not hide {path}: {e}"),
    }
}

#[cfg(not(target_os = "windows"))]
pub fn mark_hidden(path: &Utf8Path) {
    if !path
        .file_name()
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
    {
        warn!("{path} is not a dotfile; it will be visible on this platform");
    }
}
