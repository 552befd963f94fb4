//! # sitepack
//!
//! Server-side JS/CSS resource bundling and caching engine.
//!
//! Callers hand the [`BundleCatalog`] an ordered list of [`ConditionalAsset`]
//! references describing the assets a page needs. The catalog groups adjacent
//! compatible references into bundles, materializes each novel bundle exactly
//! once as a concatenated file under `resource-bundles/`, and returns the
//! ordered list of [`SerializedBundle`]s. The HTML layer turns each bundle
//! into a [`RenderNode`] pointing at the bundle-delivery endpoint.
//!
//! The catalog is durable: its state is persisted as one XML document and
//! reconciled against the live filesystem on startup. Bundles whose member
//! resources changed or disappeared are dropped; orphaned bundle files are
//! swept.

pub mod asset;
pub mod bundle;
pub mod cache;
pub mod catalog;
pub mod conditional;
pub mod config;
mod css;
pub mod delivery;
pub mod media;
pub mod node;
pub mod resolver;
pub mod serialized;
pub mod utils;

use thiserror::Error;

pub use asset::{Asset, AssetKind, Charset};
pub use bundle::{AssetBundle, BundleKey};
pub use cache::AssetCache;
pub use catalog::{BundleCatalog, CATALOG_FILENAME, RESOURCE_BUNDLE_PATH};
pub use conditional::ConditionalAsset;
pub use config::{BuildMode, BundlerConfig};
pub use delivery::DeliveredBundle;
pub use media::{CssMedium, MediaList};
pub use node::RenderNode;
pub use resolver::{FileSystemResolver, PathResolver, RequestContext, ResourceHandle};
pub use serialized::SerializedBundle;

// ---------------------------------------------------------------------------
// BundleError
// ---------------------------------------------------------------------------

/// Errors surfaced by the bundling engine.
///
/// Construction-time validation failures (empty bundles, mixed kinds) and
/// catalog corruption are hard errors; per-resource staleness never is — the
/// catalog reconciles stale entries away at load time instead.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Resource list must not be empty")]
    EmptyResourceList,

    #[error("Mixed resource kinds in one bundle: expected {expected}, got {got}")]
    MixedResourceKinds { expected: AssetKind, got: AssetKind },

    #[error("Resource does not exist: {path}")]
    AssetNotFound { path: String },

    #[error("Failed to resolve CSS medium '{0}'")]
    UnknownCssMedium(String),

    #[error("Error serializing bundle '{id}': {source}")]
    SerializeBundle {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog format error: {0}")]
    CatalogFormat(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
