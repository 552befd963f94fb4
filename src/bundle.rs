//! An immutable ordered group of assets sharing the same bundling
//! attributes.
//!
//! Bundles are the unit of serialization and of catalog identity: the
//! catalog deduplicates by [`BundleKey`], a content-addressed key over the
//! bundle's defining fields.

use std::sync::Arc;

use crate::asset::{Asset, AssetKind, Charset};
use crate::conditional::ConditionalAsset;
use crate::media::MediaList;
use crate::node::RenderNode;
use crate::BundleError;

/// An ordered, non-empty group of same-kind assets with shared bundling
/// attributes. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBundle {
    assets: Vec<Arc<Asset>>,
    conditional_comment: Option<String>,
    bundlable: bool,
    media: Option<MediaList>,
}

impl AssetBundle {
    /// Build a bundle from an ordered group of compatible references.
    ///
    /// Order is preserved and duplicates are allowed. An empty group or a
    /// group mixing resource kinds is a construction error — such a bundle
    /// must never exist.
    pub fn new(
        refs: &[ConditionalAsset],
        conditional_comment: Option<String>,
        bundlable: bool,
        media: Option<MediaList>,
    ) -> Result<Self, BundleError> {
        let Some(first) = refs.first() else {
            return Err(BundleError::EmptyResourceList);
        };
        let kind = first.kind();
        for r in refs {
            if r.kind() != kind {
                return Err(BundleError::MixedResourceKinds {
                    expected: kind,
                    got: r.kind(),
                });
            }
        }
        Ok(Self {
            assets: refs.iter().map(|r| Arc::clone(r.asset())).collect(),
            conditional_comment: conditional_comment.filter(|c| !c.is_empty()),
            bundlable,
            media: media.filter(|m| !m.is_empty()),
        })
    }

    /// The common kind, derived from the first member.
    pub fn kind(&self) -> AssetKind {
        self.assets[0].kind()
    }

    pub fn assets(&self) -> &[Arc<Asset>] {
        &self.assets
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn asset_at(&self, index: usize) -> Option<&Arc<Asset>> {
        self.assets.get(index)
    }

    /// Member paths in order, for log messages.
    pub fn asset_paths(&self) -> Vec<&str> {
        self.assets.iter().map(|a| a.path()).collect()
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

    pub fn mime_type(&self) -> &'static str {
        self.kind().mime_type()
    }

    /// The catalog lookup key for this bundle.
    pub fn key(&self) -> BundleKey {
        BundleKey {
            assets: self
                .assets
                .iter()
                .map(|a| (a.kind(), a.path().to_owned(), a.charset()))
                .collect(),
            conditional_comment: self.conditional_comment.clone(),
            bundlable: self.bundlable,
            media: self.media.clone(),
        }
    }

    /// Wrap a node in this bundle's conditional comment, if any.
    pub fn wrap(&self, node: RenderNode) -> RenderNode {
        match &self.conditional_comment {
            Some(comment) => RenderNode::Conditional {
                comment: comment.clone(),
                inner: Box::new(node),
            },
            None => node,
        }
    }
}

// ---------------------------------------------------------------------------
// BundleKey
// ---------------------------------------------------------------------------

/// Content-addressed bundle identity: the per-member identity triples plus
/// the shared bundling attributes. Two bundles with equal keys are the same
/// bundle as far as the catalog is concerned — member *content* is checked
/// separately, at catalog load time, via the stored hash snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleKey {
    assets: Vec<(AssetKind, String, Charset)>,
    conditional_comment: Option<String>,
    bundlable: bool,
    media: Option<MediaList>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
