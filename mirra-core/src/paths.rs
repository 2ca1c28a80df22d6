//! Target path resolution.
//!
//! # API pattern
//!
//! Functions that depend on the user's home directory come in two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Component, Path, PathBuf};

use crate::error::ConfigError;
use crate::types::{Entry, Platform};

/// The current user's home directory.
pub fn home_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

/// Absolute target of `entry` on `platform`, or `None` when the entry has no
/// target for that platform.
pub fn resolve_at(home: &Path, entry: &Entry, platform: &Platform) -> Option<PathBuf> {
    let raw = entry.targets.get(platform.key())?;
    Some(expand_path_at(home, raw))
}

/// `resolve_at` convenience wrapper.
pub fn resolve(entry: &Entry, platform: &Platform) -> Option<PathBuf> {
    let raw = entry.targets.get(platform.key())?;
    Some(expand_path(raw))
}

/// Expand a leading `~` and environment placeholders, then normalize to an
/// absolute path.
pub fn expand_path_at(home: &Path, raw: &str) -> PathBuf {
    let expanded = expand_vars(raw, |name| std::env::var(name).ok());
    let path = match expanded.strip_prefix('~') {
        Some("") => home.to_path_buf(),
        Some(rest) if rest.starts_with('/') || rest.starts_with('\\') => {
            home.join(rest.trim_start_matches(['/', '\\']))
        }
        _ => PathBuf::from(expanded),
    };
    normalize(&path)
}

/// `expand_path_at` convenience wrapper. Without a home directory `~` is
/// left untouched.
pub fn expand_path(raw: &str) -> PathBuf {
    match dirs::home_dir() {
        Some(home) => expand_path_at(&home, raw),
        None => normalize(Path::new(&expand_vars(raw, |name| std::env::var(name).ok()))),
    }
}

/// Collapse an absolute path under `home` back to `~/…` form.
pub fn tilde_path_at(home: &Path, abs: &Path) -> String {
    match abs.strip_prefix(home) {
        Ok(rel) if rel.as_os_str().is_empty() => "~".to_string(),
        Ok(rel) => format!("~/{}", rel.to_string_lossy().replace('\\', "/")),
        Err(_) => abs.display().to_string(),
    }
}

/// `tilde_path_at` convenience wrapper.
pub fn tilde_path(abs: &Path) -> String {
    match dirs::home_dir() {
        Some(home) => tilde_path_at(&home, abs),
        None => abs.display().to_string(),
    }
}

/// Lexically normalize `path` to absolute form: relative paths are joined
/// onto the current directory, `.` is dropped and `..` pops a component.
/// Symlinks are not followed.
pub fn normalize(path: &Path) -> PathBuf {
    let joined;
    let path = if path.is_absolute() {
        path
    } else {
        joined = std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf());
        &joined
    };

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Replace `$VAR`, `${VAR}` and `%VAR%` with values from `lookup`.
/// Unknown variables are kept verbatim.
pub fn expand_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find(['$', '%']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        let (name, consumed) = if let Some(braced) = tail.strip_prefix("${") {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 3),
                None => ("", 0),
            }
        } else if let Some(body) = tail.strip_prefix('$') {
            let end = body
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(body.len());
            (&body[..end], end + 1)
        } else {
            let body = &tail[1..];
            match body.find('%') {
                Some(end) if is_var_name(&body[..end]) => (&body[..end], end + 2),
                _ => ("", 0),
            }
        };

        match (consumed, lookup(name)) {
            (0, _) => {
                out.push_str(&tail[..1]);
                rest = &tail[1..];
            }
            (_, Some(value)) if !name.is_empty() => {
                out.push_str(&value);
                rest = &tail[consumed..];
            }
            _ => {
                let keep = consumed.max(1);
                out.push_str(&tail[..keep]);
                rest = &tail[keep..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn is_var_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
