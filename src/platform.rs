//! Facts about the host and the invoking process.
use std::io::IsTerminal;

use crate::report::HostInfo;

/// Host name from the kernel.
///
/// # Errors
///
/// Returns an error if the host name cannot be read or is not UTF-8.
#[allow(unsafe_code)]
pub fn hostname() -> std::io::Result<String> {
    let mut buf = [0u8; 256];
    // SAFETY: `buf` is valid for writes of `buf.len()` bytes and outlives the call.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = buf.get(..end).unwrap_or_default();
    String::from_utf8(name.to_vec())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Effective user id of this process.
#[must_use]
#[allow(unsafe_code)]
pub fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}

/// `true` when running as root.
#[must_use]
pub fn is_root() -> bool {
    effective_uid() == 0
}

/// Host name and uid as reported in connect, disconnect and status output.
#[must_use]
pub fn host_info() -> HostInfo {
    let (hostname, hostname_error) = match hostname() {
        Ok(name) => (name, None),
        Err(e) => {
            tracing::error!("error retrieving system hostname: {e}");
            (String::new(), Some(e.to_string()))
        }
    };
    HostInfo {
        hostname,
        hostname_error,
        uid: effective_uid(),
    }
}

/// `true` when both stdin and stdout are terminals, so prompts can be shown.
#[must_use]
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

/// `true` when stdout is a terminal.
#[must_use]
pub fn stdout_is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// `true` when colored output was turned off through `NO_COLOR`.
#[must_use]
pub fn no_color_env() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty())
}

/// Locale passed to subscription management calls, e.g. `en_US.UTF-8`.
///
/// Follows the usual precedence `LC_ALL`, `LC_MESSAGES`, `LANG` and falls
/// back to `C.UTF-8`.
#[must_use]
pub fn locale() -> String {
    locale_from(|key| std::env::var(key).ok())
}

fn locale_from(get: impl Fn(&str) -> Option<String>) -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .into_iter()
        .filter_map(get)
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| "C.UTF-8".to_string())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn locale_prefers_lc_all() {
        let get = env(&[("LANG", "de_DE.UTF-8"), ("LC_ALL", "fr_FR.UTF-8")]);
        assert_eq!(locale_from(get), "fr_FR.UTF-8");
    }

    #[test]
    fn locale_skips_empty_values() {
        let get = env(&[("LC_ALL", ""), ("LANG", "ja_JP.UTF-8")]);
        assert_eq!(locale_from(get), "ja_JP.UTF-8");
    }

    #[test]
    fn locale_defaults_to_c() {
        assert_eq!(locale_from(env(&[])), "C.UTF-8");
    }

    #[test]
    fn hostname_is_readable() {
        assert!(!hostname().unwrap().is_empty());
    }

    #[test]
    fn host_info_carries_uid() {
        assert_eq!(host_info().uid, effective_uid());
    }
}
