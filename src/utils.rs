//! URL and path helpers shared by the CSS rewriter and the resolver.
//!
//! - Known-protocol detection for absolute URLs
//! - Directory extraction from a resource URL
//! - Relative-path concatenation with `.`/`..` cleanup

use regex::Regex;

/// Check whether a URL carries a known protocol prefix (`https://...`,
/// `data:` URIs and the like). Such URLs pass through CSS rewriting
/// untouched and resolve to remote handles.
pub fn has_known_protocol(url: &str) -> bool {
    let re = Regex::new(r"(?i)^(https?|ftp|file|data|mailto):").unwrap();
    re.is_match(url)
}

/// Return everything up to and including the last `/` of a URL — the
/// directory a relative `url(...)` reference is resolved against.
pub fn url_directory(url: &str) -> &str {
    match url.rfind('/') {
        Some(idx) => &url[..=idx],
        None => "",
    }
}

/// Concatenate a base URL path and a relative reference, then resolve `.`
/// and `..` segments. An already-absolute reference (leading `/`) ignores
/// the base and is only cleaned.
pub fn clean_concatenated_url_path(base: &str, rel: &str) -> String {
    if rel.starts_with('/') {
        return clean_path(rel);
    }
    if base.is_empty() {
        return clean_path(rel);
    }
    clean_path(&format!("{}/{}", base.trim_end_matches('/'), rel))
}

/// Resolve `.` and `..` segments and collapse duplicate slashes. A `..`
/// that would climb above the root is dropped.
fn clean_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    if absolute {
        format!("/{}", segments.join("/"))
    } else {
        segments.join("/")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
