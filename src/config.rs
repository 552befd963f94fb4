//! Engine configuration.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::BundleError;

/// Default max-age for delivered bundles: 30 days.
pub const DEFAULT_DELIVERY_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

/// The build mode determines caching defaults.
///
/// In `Dev` the resource cache starts disabled so edits to asset files are
/// picked up without a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Dev,
    Prod,
}

/// Configuration for the bundling engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BundlerConfig {
    /// Directory holding the catalog XML and the `resource-bundles/` dir.
    pub data_dir: PathBuf,
    /// Name of the bundle-delivery endpoint used in generated URLs.
    pub bundle_endpoint: String,
    /// URL prefix under which raw assets are served (for the stock resolver).
    pub url_prefix: String,
    /// Build mode.
    pub mode: BuildMode,
    /// Cache-control max-age for delivered bundles, in seconds.
    pub delivery_max_age_secs: u64,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            bundle_endpoint: "resbundle".into(),
            url_prefix: String::new(),
            mode: BuildMode::Prod,
            delivery_max_age_secs: DEFAULT_DELIVERY_MAX_AGE_SECS,
        }
    }
}

impl BundlerConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BundleError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        serde_json::from_reader(file)
            .map_err(|err| BundleError::Config(format!("{}: {err}", path.display())))
    }
}
