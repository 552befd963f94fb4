//! Delivery endpoint support.
//!
//! The HTTP container is an external collaborator; it parses the bundle
//! filename out of the request path and asks the catalog for the content.
//! An unknown or invalid ID yields `None` — the caller answers 404.

use std::time::Duration;

use tracing::warn;

use crate::catalog::BundleCatalog;

/// A bundle ready to be streamed to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredBundle {
    /// The merged bundle content.
    pub body: Vec<u8>,
    /// MIME type derived from the bundle's resource kind.
    pub mime_type: &'static str,
    /// Cache-control lifetime clients may cache the response for.
    pub max_age: Duration,
}

impl BundleCatalog {
    /// Resolve a requested bundle filename (`<id>.<ext>` — the extension
    /// exists only in the URL, the stored file carries none) to deliverable
    /// content. Returns `None` for unknown IDs or unreadable files.
    pub fn deliver(&self, filename: &str) -> Option<DeliveredBundle> {
        let id = filename
            .rsplit_once('.')
            .map(|(stem, _ext)| stem)
            .unwrap_or(filename);
        let bundle = self.get_resource_bundle_of_id(id)?;
        let body = match bundle.read_content() {
            Ok(body) => body,
            Err(err) => {
                warn!("Failed to read serialized resource bundle '{id}': {err}");
                return None;
            }
        };
        Some(DeliveredBundle {
            body,
            mime_type: bundle.mime_type(),
            max_age: self.delivery_max_age(),
        })
    }
}
