//! The URI-to-resource seam.
//!
//! The engine never decides where a logical server path lives on disk or
//! how it becomes an externally reachable URL — an injected [`PathResolver`]
//! does. [`FileSystemResolver`] is the stock implementation mapping a
//! server-relative path into a document root.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::utils;

/// Maps logical server paths to physical resources and external URLs.
pub trait PathResolver: Send + Sync {
    /// Resolve a logical path to a backing resource handle.
    fn resolve(&self, path: &str) -> ResourceHandle;

    /// The externally reachable URL of a path, without any request context.
    /// Used to compute the base directory for CSS `url(...)` rewriting.
    fn url_without_context(&self, path: &str) -> String;

    /// The externally reachable URL of a path for the given request context.
    fn url_for(&self, ctx: &RequestContext, path: &str) -> String;
}

/// A resolved backing store: a local file or a remote URL.
///
/// Remote handles are never hashed and cannot be read locally — a remote
/// resource inside a bundle degrades to "no content" at serialization time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceHandle {
    File(PathBuf),
    Remote(String),
}

impl ResourceHandle {
    pub fn exists(&self) -> bool {
        match self {
            ResourceHandle::File(path) => path.is_file(),
            ResourceHandle::Remote(_) => true,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ResourceHandle::Remote(_))
    }

    /// Read the full byte stream of the backing store.
    pub fn read(&self) -> io::Result<Vec<u8>> {
        match self {
            ResourceHandle::File(path) => fs::read(path),
            ResourceHandle::Remote(url) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("remote resource '{url}' cannot be read locally"),
            )),
        }
    }

    /// A displayable location snapshot (absolute file path or remote URL).
    pub fn location(&self) -> String {
        match self {
            ResourceHandle::File(path) => path.display().to_string(),
            ResourceHandle::Remote(url) => url.clone(),
        }
    }
}

/// Per-request state needed to build context-relative URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    context_path: String,
}

impl RequestContext {
    pub fn new(context_path: impl Into<String>) -> Self {
        Self {
            context_path: context_path.into(),
        }
    }

    /// Prefix a server-relative path with the context path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.context_path.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Stock resolver: logical paths live under a document root on disk and are
/// served under a fixed URL prefix. Paths carrying a known protocol resolve
/// to remote handles and pass through URL building untouched.
#[derive(Debug, Clone)]
pub struct FileSystemResolver {
    root: PathBuf,
    url_prefix: String,
}

impl FileSystemResolver {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }
}

impl PathResolver for FileSystemResolver {
    fn resolve(&self, path: &str) -> ResourceHandle {
        if utils::has_known_protocol(path) {
            return ResourceHandle::Remote(path.to_string());
        }
        ResourceHandle::File(self.root.join(path.trim_start_matches('/')))
    }

    fn url_without_context(&self, path: &str) -> String {
        if utils::has_known_protocol(path) {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.url_prefix.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn url_for(&self, ctx: &RequestContext, path: &str) -> String {
        if utils::has_known_protocol(path) {
            return path.to_string();
        }
        ctx.url(&self.url_without_context(path))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
