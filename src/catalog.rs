//! The durable bundle catalog.
//!
//! The catalog owns two maps under one read/write lock: bundle identity
//! ([`BundleKey`]) → bundle ID, and bundle ID → [`SerializedBundle`]. It is
//! persisted as one XML document and reconciled against the live filesystem
//! on startup: bundles whose members changed, disappeared, or whose merged
//! file is missing are dropped (never partially repaired), and orphaned
//! bundle files are swept.
//!
//! Legacy document quirks are honored on read: a missing `canbebundled`
//! attribute defaults to true, a missing `charset` attribute to UTF-8.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use quick_xml::se::Serializer;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::asset::{Asset, AssetKind, Charset};
use crate::bundle::{AssetBundle, BundleKey};
use crate::conditional::ConditionalAsset;
use crate::config::BundlerConfig;
use crate::media::{CssMedium, MediaList};
use crate::resolver::PathResolver;
use crate::serialized::SerializedBundle;
use crate::BundleError;

/// Directory under the data dir holding one merged-content file per bundle
/// ID (stored without extension).
pub const RESOURCE_BUNDLE_PATH: &str = "resource-bundles";

/// Filename of the durable catalog document under the data dir.
pub const CATALOG_FILENAME: &str = "resource-bundles.xml";

const ELEMENT_ROOT: &str = "resource-bundles";
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

// ---------------------------------------------------------------------------
// Durable document
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogDoc {
    #[serde(rename = "resource-bundle", default)]
    bundles: Vec<BundleEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BundleEntry {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@creationdt")]
    creation_dt: String,
    #[serde(rename = "@conditionalcomment", default, skip_serializing_if = "Option::is_none")]
    conditional_comment: Option<String>,
    // Legacy name, and historically absent — defaults to true
    #[serde(rename = "@canbebundled", default = "default_true")]
    bundlable: bool,
    #[serde(rename = "medium", default, skip_serializing_if = "Vec::is_empty")]
    media: Vec<String>,
    #[serde(rename = "resource", default)]
    resources: Vec<ResourceEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResourceEntry {
    #[serde(rename = "@resourcetype")]
    resource_type: String,
    #[serde(rename = "@path")]
    path: String,
    #[serde(rename = "@url", default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(rename = "@contenthash")]
    content_hash: String,
    // Historically absent — defaults to UTF-8
    #[serde(rename = "@charset", default, skip_serializing_if = "Option::is_none")]
    charset: Option<String>,
}

// ---------------------------------------------------------------------------
// BundleCatalog
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CatalogState {
    by_key: HashMap<BundleKey, String>,
    by_id: HashMap<String, Arc<SerializedBundle>>,
    next_id: u64,
}

/// The top-level orchestrator: durable registry of serialized bundles plus
/// the greedy bundling algorithm.
pub struct BundleCatalog {
    catalog_file: PathBuf,
    bundle_dir: PathBuf,
    bundle_endpoint: String,
    delivery_max_age: Duration,
    resolver: Arc<dyn PathResolver>,
    state: RwLock<CatalogState>,
}

impl fmt::Debug for BundleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleCatalog")
            .field("catalog_file", &self.catalog_file)
            .field("bundle_dir", &self.bundle_dir)
            .field("bundle_endpoint", &self.bundle_endpoint)
            .finish()
    }
}

impl BundleCatalog {
    /// Open (or initialize) the catalog under `config.data_dir` and
    /// reconcile it against the live filesystem.
    pub fn new(
        config: &BundlerConfig,
        resolver: Arc<dyn PathResolver>,
    ) -> Result<Self, BundleError> {
        let catalog_file = config.data_dir.join(CATALOG_FILENAME);
        let bundle_dir = config.data_dir.join(RESOURCE_BUNDLE_PATH);
        fs::create_dir_all(&bundle_dir)?;

        let catalog = Self {
            catalog_file,
            bundle_dir,
            bundle_endpoint: config.bundle_endpoint.clone(),
            delivery_max_age: Duration::from_secs(config.delivery_max_age_secs),
            resolver,
            state: RwLock::new(CatalogState {
                by_key: HashMap::new(),
                by_id: HashMap::new(),
                next_id: 1,
            }),
        };
        catalog.load()?;
        Ok(catalog)
    }

    /// The endpoint name bundle URLs are built against.
    pub fn bundle_endpoint(&self) -> &str {
        &self.bundle_endpoint
    }

    /// Cache-control lifetime for delivered bundles.
    pub fn delivery_max_age(&self) -> Duration {
        self.delivery_max_age
    }

    // -----------------------------------------------------------------------
    // Load / save
    // -----------------------------------------------------------------------

    /// Read the durable document and restore every bundle that is still in
    /// sync with the filesystem.
    ///
    /// Per-resource staleness (missing file, changed hash, unknown type)
    /// drops the whole owning bundle and marks the catalog dirty; an
    /// unknown CSS medium name aborts the load — corrupt enum data signals
    /// a more severe integrity problem than a moved file.
    fn load(&self) -> Result<(), BundleError> {
        let text = match fs::read_to_string(&self.catalog_file) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("No resource bundle catalog at {} yet", self.catalog_file.display());
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let doc: CatalogDoc = quick_xml::de::from_str(&text)
            .map_err(|err| BundleError::CatalogFormat(err.to_string()))?;

        let mut dirty = false;
        let mut max_seen_id = 0u64;
        {
            let mut state = self.state.write().expect("catalog state poisoned");
            for entry in doc.bundles {
                // Never re-issue an ID from the document, surviving or not
                if let Ok(numeric) = entry.id.parse::<u64>() {
                    max_seen_id = max_seen_id.max(numeric);
                }

                let mut media = MediaList::new();
                for name in &entry.media {
                    let name = name.trim();
                    let medium = CssMedium::from_name(name)
                        .ok_or_else(|| BundleError::UnknownCssMedium(name.to_owned()))?;
                    media.push(medium);
                }
                let media = Some(media).filter(|m| !m.is_empty());

                let mut out_of_sync = false;
                let mut refs = Vec::with_capacity(entry.resources.len());
                for resource in &entry.resources {
                    let Some(kind) = AssetKind::from_id(&resource.resource_type) else {
                        warn!("No such resource type: {}", resource.resource_type);
                        out_of_sync = true;
                        continue;
                    };
                    let charset = match &resource.charset {
                        // Soft migration: the charset attribute was added later
                        None => Charset::default(),
                        Some(name) => match Charset::from_name(name) {
                            Some(charset) => charset,
                            None => {
                                warn!("Unknown charset '{name}' for resource '{}'", resource.path);
                                out_of_sync = true;
                                continue;
                            }
                        },
                    };

                    let asset =
                        Arc::new(Asset::new(kind, &resource.path, charset, self.resolver.clone()));
                    if !asset.exists() {
                        info!(
                            "Skipping resource bundle '{}' because resource '{}' does not exist",
                            entry.id, resource.path,
                        );
                        out_of_sync = true;
                        continue;
                    }
                    if asset.content_hash_hex() != resource.content_hash {
                        info!(
                            "Skipping resource bundle '{}' because resource '{}' changed (hash mismatch)",
                            entry.id, resource.path,
                        );
                        out_of_sync = true;
                        continue;
                    }
                    refs.push(ConditionalAsset::from_parts(
                        asset,
                        entry.conditional_comment.clone(),
                        entry.bundlable,
                        media.clone(),
                    ));
                }

                if out_of_sync {
                    dirty = true;
                    continue;
                }

                let bundle = match AssetBundle::new(
                    &refs,
                    entry.conditional_comment.clone(),
                    entry.bundlable,
                    media,
                ) {
                    Ok(bundle) => bundle,
                    Err(err) => {
                        warn!("Dropping invalid resource bundle '{}': {err}", entry.id);
                        dirty = true;
                        continue;
                    }
                };

                if !self.bundle_dir.join(&entry.id).is_file() {
                    info!(
                        "Skipping resource bundle '{}' because its serialized file is missing",
                        entry.id,
                    );
                    dirty = true;
                    continue;
                }

                let created_at = match OffsetDateTime::parse(&entry.creation_dt, &Rfc3339) {
                    Ok(dt) => dt,
                    Err(err) => {
                        warn!(
                            "Invalid creation datetime '{}' for bundle '{}': {err}",
                            entry.creation_dt, entry.id,
                        );
                        OffsetDateTime::now_utc()
                    }
                };

                let serialized = Arc::new(SerializedBundle::restore(
                    entry.id.clone(),
                    bundle,
                    created_at,
                    &self.bundle_dir,
                ));
                state.by_key.insert(serialized.bundle().key(), entry.id.clone());
                state.by_id.insert(entry.id, serialized);
            }
            state.next_id = max_seen_id + 1;
            info!("Successfully read {} resource bundles", state.by_id.len());
        }

        self.sweep_orphaned_files();
        if dirty {
            self.save()?;
        }
        Ok(())
    }

    /// Delete bundle files that no surviving catalog entry refers to.
    fn sweep_orphaned_files(&self) {
        let state = self.state.read().expect("catalog state poisoned");
        let entries = match fs::read_dir(&self.bundle_dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Failed to list {}: {err}", self.bundle_dir.display());
                return;
            }
        };
        for entry in entries.flatten() {
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !state.by_id.contains_key(&name) {
                warn!("Deleting orphaned resource bundle file '{name}'");
                if let Err(err) = fs::remove_file(entry.path()) {
                    warn!("Failed to delete orphaned resource bundle file '{name}': {err}");
                }
            }
        }
    }

    /// Persist the catalog, sorted by bundle ID, via temp file and rename.
    pub fn save(&self) -> Result<(), BundleError> {
        let doc = {
            let state = self.state.read().expect("catalog state poisoned");
            let mut bundles: Vec<BundleEntry> =
                state.by_id.values().map(|sb| Self::to_entry(sb)).collect();
            bundles.sort_by(|a, b| a.id.cmp(&b.id));
            CatalogDoc { bundles }
        };

        let mut body = String::new();
        let mut serializer = Serializer::with_root(&mut body, Some(ELEMENT_ROOT))
            .map_err(|err| BundleError::CatalogFormat(err.to_string()))?;
        serializer.indent(' ', 2);
        doc.serialize(serializer)
            .map_err(|err| BundleError::CatalogFormat(err.to_string()))?;

        let parent = self
            .catalog_file
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(XML_DECLARATION.as_bytes())?;
        tmp.write_all(body.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.catalog_file)
            .map_err(|err| BundleError::Io(err.error))?;
        Ok(())
    }

    fn to_entry(sb: &SerializedBundle) -> BundleEntry {
        let bundle = sb.bundle();
        BundleEntry {
            id: sb.id().to_owned(),
            creation_dt: sb
                .created_at()
                .format(&Rfc3339)
                .unwrap_or_default(),
            conditional_comment: bundle.conditional_comment().map(str::to_owned),
            bundlable: bundle.is_bundlable(),
            media: bundle
                .media()
                .map(|m| m.names().iter().map(|s| s.to_string()).collect())
                .unwrap_or_default(),
            resources: bundle
                .assets()
                .iter()
                .map(|asset| ResourceEntry {
                    resource_type: asset.kind().id().to_owned(),
                    path: asset.path().to_owned(),
                    url: Some(asset.location()),
                    content_hash: asset.content_hash_hex().to_owned(),
                    charset: Some(asset.charset().name().to_owned()),
                })
                .collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Bundling
    // -----------------------------------------------------------------------

    /// Group an ordered list of references into bundles and resolve each
    /// group to its serialized bundle, creating and materializing novel
    /// bundles on the way.
    ///
    /// Grouping is greedy and order-preserving: references are pulled from
    /// the front while they are compatible with the *first* member of the
    /// current group. Input order is load-bearing (CSS cascade, JS
    /// dependency order) and survives into the result.
    ///
    /// If any new bundle was created, the catalog is persisted once at the
    /// end of the call.
    pub fn get_resource_bundles(
        &self,
        refs: &[ConditionalAsset],
        regular: bool,
    ) -> Result<Vec<Arc<SerializedBundle>>, BundleError> {
        if refs.is_empty() {
            return Err(BundleError::EmptyResourceList);
        }

        let mut result = Vec::new();
        let mut created_any_bundle = false;

        let mut queue: Vec<ConditionalAsset> = refs.to_vec();
        while !queue.is_empty() {
            let first = queue.remove(0);
            let mut group = vec![first];
            loop {
                let Some(candidate) = queue.first() else { break };
                if !group[0].can_be_bundled_with(candidate) {
                    // Cannot be bundled — starts the next group
                    break;
                }
                let candidate = queue.remove(0);
                group.push(candidate);
            }

            let first = &group[0];
            let bundlable = group.len() != 1 || first.is_bundlable();
            let bundle = AssetBundle::new(
                &group,
                first.conditional_comment().map(str::to_owned),
                bundlable,
                first.media().cloned(),
            )?;
            let key = bundle.key();

            // Fast path: known bundle
            let existing = {
                let state = self.state.read().expect("catalog state poisoned");
                state
                    .by_key
                    .get(&key)
                    .and_then(|id| state.by_id.get(id))
                    .cloned()
            };

            let serialized = match existing {
                Some(serialized) => serialized,
                None => {
                    let mut state = self.state.write().expect("catalog state poisoned");
                    // Re-check under the write lock — another thread may
                    // have created it meanwhile
                    match state
                        .by_key
                        .get(&key)
                        .and_then(|id| state.by_id.get(id))
                        .cloned()
                    {
                        Some(serialized) => serialized,
                        None => {
                            let id = state.next_id.to_string();
                            state.next_id += 1;
                            // Serialization happens inside the write lock:
                            // exactly one writer per bundle identity per
                            // process lifetime
                            let serialized = Arc::new(SerializedBundle::create(
                                id.clone(),
                                bundle,
                                regular,
                                &self.bundle_dir,
                            )?);
                            state.by_key.insert(key, id.clone());
                            state.by_id.insert(id, Arc::clone(&serialized));
                            created_any_bundle = true;
                            serialized
                        }
                    }
                }
            };
            result.push(serialized);
        }

        // Write once at the end
        if created_any_bundle {
            self.save()?;
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// The serialized bundle with the given ID, if any.
    pub fn get_resource_bundle_of_id(&self, id: &str) -> Option<Arc<SerializedBundle>> {
        if id.is_empty() {
            return None;
        }
        let state = self.state.read().expect("catalog state poisoned");
        state.by_id.get(id).cloned()
    }

    pub fn contains_resource_bundle_of_id(&self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }
        let state = self.state.read().expect("catalog state poisoned");
        state.by_id.contains_key(id)
    }

    /// Snapshot of every known bundle, sorted by ID.
    pub fn get_all_resource_bundles(&self) -> Vec<Arc<SerializedBundle>> {
        let state = self.state.read().expect("catalog state poisoned");
        let mut all: Vec<Arc<SerializedBundle>> = state.by_id.values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    pub fn bundle_count(&self) -> usize {
        let state = self.state.read().expect("catalog state poisoned");
        state.by_id.len()
    }
}
