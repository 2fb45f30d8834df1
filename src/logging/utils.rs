//! Log file location, ANSI stripping and time formatting.
use std::path::{Path, PathBuf};

/// Log directory used when running as root.
pub const SYSTEM_LOG_DIR: &str = "/var/log/rhc";

/// Name of the log file inside the log directory.
pub const LOG_FILE_NAME: &str = "rhc.log";

/// Strip ANSI escape sequences from a string.
///
/// Handles SGR sequences (ending in `m`) and other CSI sequences (ending
/// in any letter in the `@`..`~` range). Two-byte escapes drop the byte
/// after `ESC`.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if let Some(next) = chars.next()
                && next == '['
            {
                for inner in chars.by_ref() {
                    if ('@'..='~').contains(&inner) {
                        break;
                    }
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Directory the log file goes to.
///
/// An explicit `configured` directory wins. Otherwise root logs to
/// [`SYSTEM_LOG_DIR`] and other users to `$XDG_STATE_HOME/rhc`
/// (default `~/.local/state/rhc`).
#[must_use]
pub fn log_dir(configured: Option<&Path>, root: bool) -> PathBuf {
    log_dir_from(configured, root, |key| std::env::var_os(key).map(PathBuf::from))
}

fn log_dir_from(
    configured: Option<&Path>,
    root: bool,
    env: impl Fn(&str) -> Option<PathBuf>,
) -> PathBuf {
    if let Some(dir) = configured {
        return dir.to_path_buf();
    }
    if root {
        return PathBuf::from(SYSTEM_LOG_DIR);
    }
    let state_home = env("XDG_STATE_HOME")
        .filter(|p| p.is_absolute())
        .unwrap_or_else(|| {
            env("HOME")
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("state")
        });
    state_home.join("rhc")
}

/// Format the current UTC time as `YYYY-MM-DD HH:MM:SS`.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format the current UTC time as `HH:MM:SS.mmm`.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S%.3f").to_string()
}
