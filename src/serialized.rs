//! A bundle with a persistent ID and an on-disk merged-content file.
//!
//! Materialization is lazy and at-most-once: once a bundle's file exists it
//! is never rewritten, even across restarts. Within one process the catalog's
//! write lock guarantees a single writer per bundle ID; across restarts the
//! existence check is the only guard.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{error, info};

use crate::bundle::AssetBundle;
use crate::node::RenderNode;
use crate::resolver::RequestContext;
use crate::BundleError;

/// The serialized form of an [`AssetBundle`]: bundle data plus a persistent
/// ID, a creation timestamp, and the target file of the merged content.
#[derive(Debug)]
pub struct SerializedBundle {
    id: String,
    bundle: AssetBundle,
    created_at: OffsetDateTime,
    file: PathBuf,
}

impl SerializedBundle {
    /// Create a fresh bundle and synchronously materialize its content.
    ///
    /// A failure to *open* the target file is logged and tolerated (the
    /// bundle is dangling and will be dropped on the next catalog load); a
    /// failure *while writing* is fatal — the bundle must not exist
    /// half-written.
    pub(crate) fn create(
        id: String,
        bundle: AssetBundle,
        regular: bool,
        bundle_dir: &Path,
    ) -> Result<Self, BundleError> {
        let this = Self {
            file: bundle_dir.join(&id),
            id,
            bundle,
            created_at: OffsetDateTime::now_utc(),
        };
        this.ensure_serialized(regular)?;
        Ok(this)
    }

    /// Reconstruct from the persisted catalog. Performs no I/O — the caller
    /// has already verified the backing file exists.
    pub(crate) fn restore(
        id: String,
        bundle: AssetBundle,
        created_at: OffsetDateTime,
        bundle_dir: &Path,
    ) -> Self {
        Self {
            file: bundle_dir.join(&id),
            id,
            bundle,
            created_at,
        }
    }

    /// Materialize the merged bundle content unless the target file already
    /// exists. Re-serialization is never attempted once a file is present,
    /// even if the content would differ.
    fn ensure_serialized(&self, regular: bool) -> Result<(), BundleError> {
        if self.file.exists() {
            return Ok(());
        }

        let file = match File::create(&self.file) {
            Ok(file) => file,
            Err(err) => {
                // May happen if write access is denied for the file
                error!(
                    "Failed to serialize {} bundle '{}' with {:?}{} to {}: {err}",
                    self.bundle.kind(),
                    self.id,
                    self.bundle.asset_paths(),
                    self.conditional_comment_suffix(),
                    self.file.display(),
                );
                return Ok(());
            }
        };

        let mut writer = BufWriter::new(file);
        if let Err(err) = self.write_merged_content(&mut writer, regular) {
            error!(
                "Error serializing bundle '{}' with {:?}: {err}",
                self.id,
                self.bundle.asset_paths(),
            );
            return Err(BundleError::SerializeBundle {
                id: self.id.clone(),
                source: err,
            });
        }

        info!(
            "Serialized {} bundle '{}' with {:?}{}",
            self.bundle.kind(),
            self.id,
            self.bundle.asset_paths(),
            self.conditional_comment_suffix(),
        );
        Ok(())
    }

    fn conditional_comment_suffix(&self) -> String {
        match self.bundle.conditional_comment() {
            Some(comment) => format!(" and conditional comment '{comment}'"),
            None => String::new(),
        }
    }

    fn write_merged_content(&self, writer: &mut impl Write, regular: bool) -> io::Result<()> {
        // One audit line per member first; this comment form works for both
        // CSS and JS.
        for asset in self.bundle.assets() {
            writeln!(
                writer,
                "/* {} - {} - {} */",
                asset.path(),
                asset.location(),
                asset.content_hash_hex(),
            )?;
        }

        // Then the members themselves, in order
        for asset in self.bundle.assets() {
            match asset.content(regular) {
                Some(content) => {
                    writer.write_all(content.as_bytes())?;
                    if !content.ends_with('\n') {
                        // If the last line of this member is a "//" comment
                        // and the next member starts with a multi-line
                        // comment, the concatenation would be a syntax
                        // error. A trailing newline keeps them apart.
                        writer.write_all(b"\n")?;
                    }
                }
                None => {
                    error!(
                        "Web site resource '{}' at '{}' has no content/does not exist!",
                        asset.path(),
                        asset.location(),
                    );
                }
            }
        }
        writer.flush()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bundle(&self) -> &AssetBundle {
        &self.bundle
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// The on-disk location of the merged content (no extension — the
    /// extension only appears in served URLs).
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn mime_type(&self) -> &'static str {
        self.bundle.mime_type()
    }

    /// Read the stored merged content (delivery endpoint support).
    pub fn read_content(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.file)
    }

    /// Build the renderable reference node for this bundle.
    ///
    /// A single-member non-bundlable bundle renders with the member's own
    /// direct URL — third-party libraries that refuse relocation keep their
    /// original path. Everything else points at the bundle-delivery
    /// endpoint, with the kind's extension appended to the bundle ID.
    pub fn render_node(&self, ctx: &RequestContext, endpoint: &str) -> RenderNode {
        let url = match self.bundle.asset_at(0) {
            Some(single) if self.bundle.asset_count() == 1 && !self.bundle.is_bundlable() => {
                single.render_url(ctx)
            }
            _ => ctx.url(&format!(
                "{endpoint}/{}{}",
                self.id,
                self.bundle.kind().file_extension(),
            )),
        };
        let node = self.bundle.kind().render_node(url, self.bundle.media().cloned());
        self.bundle.wrap(node)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::AssetCache;
    use crate::conditional::ConditionalAsset;
    use crate::config::BuildMode;
    use crate::resolver::{FileSystemResolver, PathResolver};
    use std::fs;
    use std::sync::Arc;

    struct Fixture {
        _assets: tempfile::TempDir,
        bundles: tempfile::TempDir,
        cache: AssetCache,
    }

    fn fixture(files: &[(&str, &str)]) -> Fixture {
        let assets = tempfile::tempdir().expect("tempdir");
        for (name, content) in files {
            fs::write(assets.path().join(name), content).expect("write fixture");
        }
        let resolver: Arc<dyn PathResolver> =
            Arc::new(FileSystemResolver::new(assets.path(), "/assets"));
        Fixture {
            cache: AssetCache::new(BuildMode::Prod, resolver),
            _assets: assets,
            bundles: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn js_bundle(fx: &Fixture, paths: &[&str], bundlable: bool) -> AssetBundle {
        let refs: Vec<ConditionalAsset> = paths
            .iter()
            .map(|p| ConditionalAsset::for_js(&fx.cache, p, None, bundlable).unwrap())
            .collect();
        AssetBundle::new(&refs, None, bundlable, None).unwrap()
    }

    #[test]
    fn merged_file_has_audit_lines_then_contents() {
        let fx = fixture(&[("a.js", "var a = 1;"), ("b.js", "var b = 2;\n")]);
        let bundle = js_bundle(&fx, &["/a.js", "/b.js"], true);
        let sb =
            SerializedBundle::create("1".into(), bundle, true, fx.bundles.path()).unwrap();

        let content = fs::read_to_string(sb.file()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].starts_with("/* /a.js - "));
        assert!(lines[1].starts_with("/* /b.js - "));
        assert_eq!(lines[2], "var a = 1;");
        assert_eq!(lines[3], "var b = 2;");
        // Every member is newline-terminated exactly once
        assert!(content.ends_with("var b = 2;\n"));
        assert!(!content.ends_with("\n\n"));
    }

    #[test]
    fn existing_file_is_never_rewritten() {
        let fx = fixture(&[("a.js", "var a = 1;")]);
        let target = fx.bundles.path().join("7");
        fs::write(&target, "pre-existing").unwrap();

        let bundle = js_bundle(&fx, &["/a.js"], true);
        let sb = SerializedBundle::create("7".into(), bundle, true, fx.bundles.path()).unwrap();
        assert_eq!(fs::read_to_string(sb.file()).unwrap(), "pre-existing");
    }

    #[test]
    fn missing_member_is_skipped_not_fatal() {
        let fx = fixture(&[("a.js", "var a = 1;")]);
        // Cache keeps missing resources when enabled; the bundle serializes
        // around the hole.
        let refs = vec![
            ConditionalAsset::for_js(&fx.cache, "/a.js", None, true).unwrap(),
            ConditionalAsset::for_js(&fx.cache, "/gone.js", None, true).unwrap(),
        ];
        let bundle = AssetBundle::new(&refs, None, true, None).unwrap();
        let sb = SerializedBundle::create("9".into(), bundle, true, fx.bundles.path()).unwrap();

        let content = fs::read_to_string(sb.file()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        // Audit lines cover every member, even the missing one
        assert!(lines[0].starts_with("/* /a.js - "));
        assert!(lines[1].starts_with("/* /gone.js - "));
        // Only the existing member contributes content
        assert_eq!(lines[2], "var a = 1;");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn unwritable_target_leaves_a_dangling_bundle() {
        let fx = fixture(&[("a.js", "var a = 1;")]);
        let bundle = js_bundle(&fx, &["/a.js"], true);
        let missing_dir = fx.bundles.path().join("nope");
        let sb = SerializedBundle::create("3".into(), bundle, true, &missing_dir).unwrap();
        assert!(!sb.file().exists());
    }

    #[test]
    fn render_node_uses_endpoint_url() {
        let fx = fixture(&[("a.js", "var a = 1;"), ("b.js", "var b = 2;")]);
        let bundle = js_bundle(&fx, &["/a.js", "/b.js"], true);
        let sb = SerializedBundle::create("4".into(), bundle, true, fx.bundles.path()).unwrap();

        let ctx = RequestContext::new("/app");
        let node = sb.render_node(&ctx, "resbundle");
        assert_eq!(node.url(), "/app/resbundle/4.js");
    }

    #[test]
    fn non_bundlable_singleton_uses_direct_url() {
        let fx = fixture(&[("vendor.js", "window.vendor = {};")]);
        let bundle = js_bundle(&fx, &["/vendor.js"], false);
        let sb = SerializedBundle::create("5".into(), bundle, true, fx.bundles.path()).unwrap();

        let ctx = RequestContext::new("/app");
        let node = sb.render_node(&ctx, "resbundle");
        assert!(node.url().starts_with("/app/assets/vendor.js"), "got: {}", node.url());
        assert!(node.url().contains("?version="));
    }

    #[test]
    fn restore_performs_no_io() {
        let fx = fixture(&[("a.js", "var a = 1;")]);
        let bundle = js_bundle(&fx, &["/a.js"], true);
        let sb = SerializedBundle::restore(
            "11".into(),
            bundle,
            OffsetDateTime::UNIX_EPOCH,
            fx.bundles.path(),
        );
        assert!(!sb.file().exists());
        assert_eq!(sb.created_at(), OffsetDateTime::UNIX_EPOCH);
    }
}
