//! An asset reference plus the attributes that decide bundling.
//!
//! A [`ConditionalAsset`] pairs a cached [`Asset`] with an optional IE
//! conditional comment, a bundlable flag, and (for CSS) a media list.
//! These attributes define the bundling-compatibility predicate.

use std::sync::Arc;

use tracing::debug;

use crate::asset::{Asset, AssetKind, Charset};
use crate::cache::AssetCache;
use crate::media::MediaList;
use crate::BundleError;

/// A web-site resource together with its bundling attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalAsset {
    asset: Arc<Asset>,
    conditional_comment: Option<String>,
    bundlable: bool,
    media: Option<MediaList>,
}

impl ConditionalAsset {
    /// Reference a JavaScript resource (UTF-8).
    pub fn for_js(
        cache: &AssetCache,
        path: &str,
        conditional_comment: Option<&str>,
        bundlable: bool,
    ) -> Result<Self, BundleError> {
        let asset = cache.get_or_create(AssetKind::Js, path, Charset::Utf8)?;
        Ok(Self::from_parts(
            asset,
            conditional_comment.map(str::to_owned),
            bundlable,
            None,
        ))
    }

    /// Reference a CSS resource (UTF-8) with an optional media list.
    pub fn for_css(
        cache: &AssetCache,
        path: &str,
        conditional_comment: Option<&str>,
        bundlable: bool,
        media: Option<MediaList>,
    ) -> Result<Self, BundleError> {
        let asset = cache.get_or_create(AssetKind::Css, path, Charset::Utf8)?;
        Ok(Self::from_parts(
            asset,
            conditional_comment.map(str::to_owned),
            bundlable,
            media,
        ))
    }

    /// Assemble from already-resolved parts (catalog reload path).
    /// An empty media list normalizes to "no media list".
    pub(crate) fn from_parts(
        asset: Arc<Asset>,
        conditional_comment: Option<String>,
        bundlable: bool,
        media: Option<MediaList>,
    ) -> Self {
        Self {
            asset,
            conditional_comment: conditional_comment.filter(|c| !c.is_empty()),
            bundlable,
            media: media.filter(|m| !m.is_empty()),
        }
    }

    pub fn asset(&self) -> &Arc<Asset> {
        &self.asset
    }

    pub fn kind(&self) -> AssetKind {
        self.asset.kind()
    }

    pub fn has_conditional_comment(&self) -> bool {
        self.conditional_comment.is_some()
    }

    pub fn conditional_comment(&self) -> Option<&str> {
        self.conditional_comment.as_deref()
    }

    pub fn is_bundlable(&self) -> bool {
        self.bundlable
    }

    pub fn media(&self) -> Option<&MediaList> {
        self.media.as_ref()
    }

    /// Check whether this resource may share a bundle with `other`: both
    /// must be bundlable and agree on kind, conditional comment and media
    /// list (absent counts as equal to absent).
    pub fn can_be_bundled_with(&self, other: &ConditionalAsset) -> bool {
        if !self.bundlable || !other.bundlable {
            return false;
        }
        if self.kind() != other.kind() {
            return false;
        }
        if self.conditional_comment != other.conditional_comment {
            return false;
        }
        if self.media != other.media {
            return false;
        }
        debug!("'{}' can be bundled with '{}'", self.asset.path(), other.asset.path());
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
