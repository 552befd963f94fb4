//! A single web-site resource: one physical JS or CSS asset.
//!
//! An [`Asset`] is immutable after construction. Its SHA-512 content hash is
//! computed exactly once, from the backing store's byte stream; a hashing
//! failure degrades to an empty hash and the asset stays usable. Identity
//! (equality, cache key) is (kind, path, charset) — never the content hash,
//! which only serves staleness detection and cache busting.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use tracing::error;

use crate::css;
use crate::media::MediaList;
use crate::node::RenderNode;
use crate::resolver::{PathResolver, RequestContext, ResourceHandle};
use crate::utils;

// ---------------------------------------------------------------------------
// AssetKind
// ---------------------------------------------------------------------------

/// The kind of a web-site resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Js,
    Css,
}

impl AssetKind {
    /// Stable ID, used in cache keys and the catalog `resourcetype` attribute.
    pub fn id(&self) -> &'static str {
        match self {
            AssetKind::Js => "js",
            AssetKind::Css => "css",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "js" => Some(AssetKind::Js),
            "css" => Some(AssetKind::Css),
            _ => None,
        }
    }

    /// Extension appended to bundle URLs (the stored file carries none).
    pub fn file_extension(&self) -> &'static str {
        match self {
            AssetKind::Js => ".js",
            AssetKind::Css => ".css",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AssetKind::Js => "application/javascript",
            AssetKind::Css => "text/css",
        }
    }

    /// Build the kind-appropriate reference node for a URL. The media list
    /// only applies to stylesheets.
    pub fn render_node(&self, url: String, media: Option<MediaList>) -> RenderNode {
        match self {
            AssetKind::Js => RenderNode::Script { url },
            AssetKind::Css => RenderNode::Stylesheet { url, media },
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ---------------------------------------------------------------------------
// Charset
// ---------------------------------------------------------------------------

/// Character encoding a resource is decoded with. Part of asset identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Charset {
    #[default]
    Utf8,
    Latin1,
}

impl Charset {
    /// Canonical name as stored in the catalog `charset` attribute.
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("UTF-8") || name.eq_ignore_ascii_case("UTF8") {
            Some(Charset::Utf8)
        } else if name.eq_ignore_ascii_case("ISO-8859-1") || name.eq_ignore_ascii_case("latin1") {
            Some(Charset::Latin1)
        } else {
            None
        }
    }

    /// Decode a byte stream to text. UTF-8 decoding replaces invalid
    /// sequences rather than failing.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// Number of hex characters of the content hash used as the cache-busting
/// `version` URL parameter.
const VERSION_HASH_CHARS: usize = 16;

/// A single web-site resource. Only used through [`crate::AssetCache`] and
/// the bundle catalog.
pub struct Asset {
    kind: AssetKind,
    path: String,
    charset: Charset,
    resolver: Arc<dyn PathResolver>,
    // Status vars
    handle: ResourceHandle,
    exists: bool,
    content_hash: Vec<u8>,
    content_hash_hex: String,
}

impl Asset {
    /// Resolve `path` and compute the one-time content hash.
    ///
    /// Remote and missing resources get an empty hash. An I/O failure while
    /// hashing is logged and likewise degrades to an empty hash — the asset
    /// itself stays valid.
    pub fn new(
        kind: AssetKind,
        path: impl Into<String>,
        charset: Charset,
        resolver: Arc<dyn PathResolver>,
    ) -> Self {
        let path = path.into();
        let handle = resolver.resolve(&path);
        let exists = handle.exists();

        let (content_hash, content_hash_hex) = if exists && !handle.is_remote() {
            match handle.read() {
                Ok(bytes) => {
                    let digest = Sha512::digest(&bytes);
                    (digest.to_vec(), hex::encode(digest))
                }
                Err(err) => {
                    error!("Failed to create content hash of '{path}': {err}");
                    (Vec::new(), String::new())
                }
            }
        } else {
            // No hash for remote or missing resources
            (Vec::new(), String::new())
        };

        Self {
            kind,
            path,
            charset,
            resolver,
            handle,
            exists,
            content_hash,
            content_hash_hex,
        }
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    /// The raw digest bytes; empty if hashing was skipped or failed.
    pub fn content_hash_bytes(&self) -> &[u8] {
        &self.content_hash
    }

    /// The hex-encoded digest; empty if hashing was skipped or failed.
    pub fn content_hash_hex(&self) -> &str {
        &self.content_hash_hex
    }

    /// Location snapshot of the backing store (file path or remote URL),
    /// persisted in the catalog for auditability.
    pub fn location(&self) -> String {
        self.handle.location()
    }

    /// Render the resource content for bundling.
    ///
    /// Returns `None` if the resource does not exist or cannot be read.
    /// JS content is returned verbatim — deliberately not wrapped in an
    /// IIFE, since that would hide global declarations. CSS content has
    /// every relative `url(...)` rewritten against the resource's own URL
    /// directory and is minified when `regular` is false; a stylesheet that
    /// fails to parse is passed through as-is.
    pub fn content(&self, regular: bool) -> Option<String> {
        if !self.exists {
            return None;
        }
        let bytes = match self.handle.read() {
            Ok(bytes) => bytes,
            Err(err) => {
                error!("Failed to read resource '{}': {err}", self.path);
                return None;
            }
        };
        let text = self.charset.decode(&bytes);
        match self.kind {
            AssetKind::Js => Some(text),
            AssetKind::Css => {
                // Rewrite relative to the resource's own URL directory; a
                // request context is irrelevant here, nothing gets linked.
                let url = self.resolver.url_without_context(&self.path);
                let base_path = utils::url_directory(&url);
                match css::rewrite_urls(&text, base_path, !regular) {
                    Ok(rewritten) => Some(rewritten),
                    Err(err) => {
                        error!("Failed to parse CSS '{}'. Returning 'as-is': {err}", self.path);
                        Some(text)
                    }
                }
            }
        }
    }

    /// The externally servable URL of this resource, with a `version`
    /// parameter derived from the content hash to work around caching.
    /// The parameter is omitted when no hash is available.
    pub fn render_url(&self, ctx: &RequestContext) -> String {
        let url = self.resolver.url_for(ctx, &self.path);
        if self.content_hash_hex.len() >= VERSION_HASH_CHARS {
            format!("{url}?version={}", &self.content_hash_hex[..VERSION_HASH_CHARS])
        } else {
            url
        }
    }
}

impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.path == other.path && self.charset == other.charset
    }
}

impl Eq for Asset {}

impl Hash for Asset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.path.hash(state);
        self.charset.hash(state);
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("charset", &self.charset)
            .field("exists", &self.exists)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::FileSystemResolver;
    use std::fs;
    use std::sync::Arc;

    fn fixture(files: &[(&str, &str)]) -> (tempfile::TempDir, Arc<dyn PathResolver>) {
        let dir = tempfile::tempdir().expect("tempdir");
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("mkdir");
            }
            fs::write(path, content).expect("write fixture");
        }
        let resolver: Arc<dyn PathResolver> =
            Arc::new(FileSystemResolver::new(dir.path(), "/assets"));
        (dir, resolver)
    }

    #[test]
    fn hash_is_stable_per_content() {
        let (_dir, resolver) = fixture(&[("a.js", "var a = 1;"), ("b.js", "var a = 1;"), ("c.js", "var c = 3;")]);
        let a = Asset::new(AssetKind::Js, "/a.js", Charset::Utf8, resolver.clone());
        let b = Asset::new(AssetKind::Js, "/b.js", Charset::Utf8, resolver.clone());
        let c = Asset::new(AssetKind::Js, "/c.js", Charset::Utf8, resolver);

        assert_eq!(a.content_hash_hex(), b.content_hash_hex());
        assert_ne!(a.content_hash_hex(), c.content_hash_hex());
        // SHA-512 → 64 bytes → 128 hex chars
        assert_eq!(a.content_hash_hex().len(), 128);
        assert_eq!(a.content_hash_bytes().len(), 64);
    }

    #[test]
    fn missing_resource_has_empty_hash_and_no_content() {
        let (_dir, resolver) = fixture(&[]);
        let asset = Asset::new(AssetKind::Js, "/missing.js", Charset::Utf8, resolver);
        assert!(!asset.exists());
        assert_eq!(asset.content_hash_hex(), "");
        assert!(asset.content_hash_bytes().is_empty());
        assert_eq!(asset.content(true), None);
    }

    #[test]
    fn remote_resource_is_not_hashed() {
        let (_dir, resolver) = fixture(&[]);
        let asset = Asset::new(
            AssetKind::Css,
            "https://fonts.googleapis.com/css",
            Charset::Utf8,
            resolver,
        );
        assert!(asset.exists());
        assert_eq!(asset.content_hash_hex(), "");
    }

    #[test]
    fn js_content_is_verbatim() {
        let src = "function hello() { return 'world'; }\n";
        let (_dir, resolver) = fixture(&[("app.js", src)]);
        let asset = Asset::new(AssetKind::Js, "/app.js", Charset::Utf8, resolver);
        assert_eq!(asset.content(true).as_deref(), Some(src));
        // The regular flag has no effect on JS
        assert_eq!(asset.content(false).as_deref(), Some(src));
    }

    #[test]
    fn css_urls_are_rewritten_relative_to_the_resource() {
        let src = ".logo { background: url(../img/logo.png); }";
        let (_dir, resolver) = fixture(&[("css/main.css", src)]);
        let asset = Asset::new(AssetKind::Css, "/css/main.css", Charset::Utf8, resolver);
        let out = asset.content(true).expect("content");
        assert!(out.contains("/assets/img/logo.png"), "got: {out}");
        assert!(!out.contains("../img"));
    }

    #[test]
    fn absolute_css_urls_pass_through() {
        let src = "@font-face { src: url(https://fonts.example.com/a.woff2); }";
        let (_dir, resolver) = fixture(&[("css/fonts.css", src)]);
        let asset = Asset::new(AssetKind::Css, "/css/fonts.css", Charset::Utf8, resolver);
        let out = asset.content(true).expect("content");
        assert!(out.contains("https://fonts.example.com/a.woff2"));
    }

    #[test]
    fn broken_css_degrades_to_pass_through() {
        let src = "} broken {";
        let (_dir, resolver) = fixture(&[("css/broken.css", src)]);
        let asset = Asset::new(AssetKind::Css, "/css/broken.css", Charset::Utf8, resolver);
        assert_eq!(asset.content(true).as_deref(), Some(src));
    }

    #[test]
    fn minified_rendering_is_smaller() {
        let src = ".a {\n  color: red;\n}\n\n.b {\n  color: blue;\n}\n";
        let (_dir, resolver) = fixture(&[("css/two.css", src)]);
        let asset = Asset::new(AssetKind::Css, "/css/two.css", Charset::Utf8, resolver);
        let regular = asset.content(true).expect("regular");
        let minified = asset.content(false).expect("minified");
        assert!(minified.len() < regular.len());
    }

    #[test]
    fn render_url_appends_version_from_hash() {
        let (_dir, resolver) = fixture(&[("a.js", "var a = 1;")]);
        let asset = Asset::new(AssetKind::Js, "/a.js", Charset::Utf8, resolver.clone());
        let ctx = RequestContext::new("/app");
        let url = asset.render_url(&ctx);
        assert!(url.starts_with("/app/assets/a.js?version="), "got: {url}");
        let version = url.rsplit('=').next().expect("version param");
        assert_eq!(version.len(), 16);
        assert_eq!(version, &asset.content_hash_hex()[..16]);

        let missing = Asset::new(AssetKind::Js, "/missing.js", Charset::Utf8, resolver);
        assert_eq!(missing.render_url(&ctx), "/app/assets/missing.js");
    }

    #[test]
    fn identity_ignores_content() {
        let (_dir, resolver) = fixture(&[("a.js", "var a = 1;"), ("sub/a.js", "var other = 2;")]);
        let a1 = Asset::new(AssetKind::Js, "/a.js", Charset::Utf8, resolver.clone());
        let a2 = Asset::new(AssetKind::Js, "/a.js", Charset::Utf8, resolver.clone());
        let other = Asset::new(AssetKind::Js, "/sub/a.js", Charset::Utf8, resolver.clone());
        let latin = Asset::new(AssetKind::Js, "/a.js", Charset::Latin1, resolver);

        assert_eq!(a1, a2);
        assert_ne!(a1, other);
        assert_ne!(a1, latin);
    }

    #[test]
    fn charset_names_round_trip() {
        assert_eq!(Charset::from_name("UTF-8"), Some(Charset::Utf8));
        assert_eq!(Charset::from_name("utf-8"), Some(Charset::Utf8));
        assert_eq!(Charset::from_name("ISO-8859-1"), Some(Charset::Latin1));
        assert_eq!(Charset::from_name("EBCDIC"), None);
        assert_eq!(Charset::default(), Charset::Utf8);
    }

    #[test]
    fn latin1_decoding() {
        assert_eq!(Charset::Latin1.decode(&[0x63, 0x61, 0x66, 0xE9]), "café");
    }
}
