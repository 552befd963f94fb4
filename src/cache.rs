//! Process-wide memoization of [`Asset`]s by (kind, path).
//!
//! The cache is an explicit service object — construct it once at
//! application start and clone the handle wherever assets are created.
//! Lookups and inserts go through the concurrent map's atomic entry API,
//! so two threads racing to create the same asset produce exactly one
//! instance.
//!
//! Cached assets may be stale: identity is (kind, path, charset), never
//! content. Disable the cache in development to see live file edits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::asset::{Asset, AssetKind, Charset};
use crate::config::BuildMode;
use crate::resolver::PathResolver;
use crate::BundleError;

/// Thread-safe asset cache keyed by `<kind>-<path>`.
#[derive(Clone)]
pub struct AssetCache {
    resolver: Arc<dyn PathResolver>,
    assets: Arc<DashMap<String, Arc<Asset>>>,
    enabled: Arc<AtomicBool>,
}

impl AssetCache {
    /// Create a cache. Caching starts enabled except in [`BuildMode::Dev`],
    /// where developers expect file edits to show up without a restart.
    pub fn new(mode: BuildMode, resolver: Arc<dyn PathResolver>) -> Self {
        Self {
            resolver,
            assets: Arc::new(DashMap::new()),
            enabled: Arc::new(AtomicBool::new(mode != BuildMode::Dev)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Toggle caching. Returns whether the flag changed.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::AcqRel) != enabled
    }

    fn cache_key(kind: AssetKind, path: &str) -> String {
        format!("{}-{}", kind.id(), path)
    }

    /// Look up or construct the asset for (kind, path, charset).
    ///
    /// With caching enabled, identical identities return the same `Arc`
    /// (one winner under contention). With caching disabled, every call
    /// constructs a fresh asset — and requesting a non-existing resource
    /// is a caller error.
    pub fn get_or_create(
        &self,
        kind: AssetKind,
        path: &str,
        charset: Charset,
    ) -> Result<Arc<Asset>, BundleError> {
        if !self.is_enabled() {
            let asset = Arc::new(Asset::new(kind, path, charset, self.resolver.clone()));
            if !asset.exists() {
                return Err(BundleError::AssetNotFound { path: path.into() });
            }
            return Ok(asset);
        }

        let key = Self::cache_key(kind, path);
        // Fast path: lock-free read
        if let Some(existing) = self.assets.get(&key) {
            return Ok(Arc::clone(existing.value()));
        }
        // Slow path: the entry API re-checks under the shard lock, so only
        // one thread constructs the asset.
        let entry = self
            .assets
            .entry(key)
            .or_insert_with(|| Arc::new(Asset::new(kind, path, charset, self.resolver.clone())));
        Ok(Arc::clone(entry.value()))
    }

    /// Remove one asset. Returns whether it was present.
    pub fn remove(&self, kind: AssetKind, path: &str) -> bool {
        self.assets.remove(&Self::cache_key(kind, path)).is_some()
    }

    /// Drop all cached assets. Returns whether anything was removed.
    pub fn clear(&self) -> bool {
        if self.assets.is_empty() {
            return false;
        }
        self.assets.clear();
        true
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
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

    fn cache_with(mode: BuildMode, files: &[(&str, &str)]) -> (tempfile::TempDir, AssetCache) {
        let dir = tempfile::tempdir().expect("tempdir");
        for (name, content) in files {
            fs::write(dir.path().join(name), content).expect("write fixture");
        }
        let resolver: Arc<dyn PathResolver> =
            Arc::new(FileSystemResolver::new(dir.path(), "/assets"));
        (dir, AssetCache::new(mode, resolver))
    }

    #[test]
    fn enabled_cache_returns_the_same_instance() {
        let (_dir, cache) = cache_with(BuildMode::Prod, &[("a.js", "var a = 1;")]);
        let first = cache.get_or_create(AssetKind::Js, "/a.js", Charset::Utf8).unwrap();
        let second = cache.get_or_create(AssetKind::Js, "/a.js", Charset::Utf8).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn disabled_cache_returns_distinct_instances() {
        let (_dir, cache) = cache_with(BuildMode::Dev, &[("a.js", "var a = 1;")]);
        assert!(!cache.is_enabled());
        let first = cache.get_or_create(AssetKind::Js, "/a.js", Charset::Utf8).unwrap();
        let second = cache.get_or_create(AssetKind::Js, "/a.js", Charset::Utf8).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.content_hash_hex(), second.content_hash_hex());
        assert!(cache.is_empty());
    }

    #[test]
    fn disabled_cache_rejects_missing_resources() {
        let (_dir, cache) = cache_with(BuildMode::Dev, &[]);
        let err = cache
            .get_or_create(AssetKind::Js, "/missing.js", Charset::Utf8)
            .unwrap_err();
        assert!(matches!(err, BundleError::AssetNotFound { .. }));
    }

    #[test]
    fn enabled_cache_keeps_missing_resources() {
        // With caching enabled a missing resource is cached like any other;
        // it simply has no hash and no content.
        let (_dir, cache) = cache_with(BuildMode::Prod, &[]);
        let asset = cache
            .get_or_create(AssetKind::Js, "/missing.js", Charset::Utf8)
            .unwrap();
        assert!(!asset.exists());
    }

    #[test]
    fn remove_and_clear_report_change() {
        let (_dir, cache) = cache_with(BuildMode::Prod, &[("a.js", "1"), ("b.js", "2")]);
        cache.get_or_create(AssetKind::Js, "/a.js", Charset::Utf8).unwrap();
        cache.get_or_create(AssetKind::Js, "/b.js", Charset::Utf8).unwrap();

        assert!(cache.remove(AssetKind::Js, "/a.js"));
        assert!(!cache.remove(AssetKind::Js, "/a.js"));
        assert!(cache.clear());
        assert!(!cache.clear());
    }

    #[test]
    fn toggling_reports_change() {
        let (_dir, cache) = cache_with(BuildMode::Prod, &[]);
        assert!(cache.is_enabled());
        assert!(cache.set_enabled(false));
        assert!(!cache.set_enabled(false));
        assert!(cache.set_enabled(true));
    }

    #[test]
    fn kinds_do_not_collide() {
        let (_dir, cache) = cache_with(BuildMode::Prod, &[("a.js", "x"), ("a.css", "y")]);
        cache.get_or_create(AssetKind::Js, "/a.js", Charset::Utf8).unwrap();
        cache.get_or_create(AssetKind::Css, "/a.css", Charset::Utf8).unwrap();
        assert_eq!(cache.len(), 2);
    }
}
