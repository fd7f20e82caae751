//! URLs and filesystem paths opened alongside a preset.
//!
//! Input typed by a user is normalized once, when the item is created:
//!
//! | Input                         | Stored as                      |
//! |-------------------------------|--------------------------------|
//! | `https://x.io`                | `https://x.io` (has a scheme)  |
//! | `www.rust-lang.org`           | `https://www.rust-lang.org`    |
//! | `github.com`                  | `https://github.com`           |
//! | `/home/me/example.com/file`   | unchanged (path root wins)     |
//! | `~/notes`                     | unchanged (filesystem path)    |
//!
//! Normalization is idempotent: anything it produces already carries a
//! scheme, and anything it leaves alone is left alone again.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Top-level-domain fragments that make a bare string look like a URL.
const KNOWN_TLDS: &[&str] = &[
    ".com", ".org", ".net", ".io", ".dev", ".app", ".ai", ".edu", ".gov", ".xyz",
];

/// Schemes that are written without `//` but still count as URLs.
const OPAQUE_SCHEMES: &[&str] = &["mailto:", "tel:", "sms:", "facetime:"];

/// What kind of thing a launch item opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchItemKind {
    Url,
    Folder,
    File,
}

/// A URL or path to open when a preset is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchItem {
    id: Uuid,
    path: String,
}

impl LaunchItem {
    /// Create an item from raw user input, normalizing it.
    pub fn new(raw: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: normalize_path(raw),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The normalized URL or path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_url(&self) -> bool {
        has_url_scheme(&self.path)
    }

    pub fn kind(&self) -> LaunchItemKind {
        if self.is_url() {
            LaunchItemKind::Url
        } else if self.path.ends_with('/') || expand_tilde(&self.path).is_dir() {
            LaunchItemKind::Folder
        } else {
            LaunchItemKind::File
        }
    }

    /// Human-readable label: the host for URLs, the base name for paths.
    pub fn display_name(&self) -> String {
        if self.is_url() {
            return url_host(&self.path)
                .map(str::to_string)
                .unwrap_or_else(|| self.path.clone());
        }
        let trimmed = self.path.trim_end_matches('/');
        Path::new(trimmed)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.clone())
    }
}

/// Normalize user input into a URL or a filesystem path.
pub fn normalize_path(raw: &str) -> String {
    let s = raw.trim();
    if has_url_scheme(s) {
        s.to_string()
    } else if looks_like_url(s) {
        format!("https://{}", s)
    } else {
        s.to_string()
    }
}

/// Whether `s` starts with a URL scheme (`scheme://…` or a known opaque
/// scheme such as `mailto:`).
pub fn has_url_scheme(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    if OPAQUE_SCHEMES.iter().any(|p| lower.starts_with(p)) {
        return true;
    }
    match s.find("://") {
        Some(0) | None => false,
        Some(end) => {
            let scheme = &s[..end];
            let mut chars = scheme.chars();
            chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
    }
}

/// Heuristic for scheme-less input: `www.` prefix, or a known TLD fragment
/// in something that is not rooted like a path.
pub fn looks_like_url(s: &str) -> bool {
    if s.is_empty() || s.starts_with('/') || s.starts_with('~') {
        return false;
    }
    let lower = s.to_ascii_lowercase();
    lower.starts_with("www.") || KNOWN_TLDS.iter().any(|tld| lower.contains(tld))
}

/// Host component of a `scheme://host/...` URL, without userinfo or port.
pub fn url_host(url: &str) -> Option<&str> {
    let rest = &url[url.find("://")? + 3..];
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    let host = match host_port.rfind(':') {
        // Leave bracketed IPv6 literals alone.
        Some(i) if !host_port.ends_with(']') => &host_port[..i],
        _ => host_port,
    };
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
