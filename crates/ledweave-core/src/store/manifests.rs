// ── Model manifest cache ──

use dashmap::DashMap;
use ledweave_api::{ModelManifest, WeaveApi};
use tracing::debug;

/// Process-lifetime cache of model manifests, keyed by manifest id.
///
/// Manifests are immutable vendor metadata, so entries are never
/// evicted. Lookup failures are not cached: a manifest that could not
/// be fetched is retried the next time a device references it.
pub struct ManifestCache {
    manifests: DashMap<String, ModelManifest>,
}

impl ManifestCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            manifests: DashMap::new(),
        }
    }

    /// Cached manifest, if one was ever fetched for this id.
    #[must_use]
    pub fn get(&self, manifest_id: &str) -> Option<ModelManifest> {
        self.manifests
            .get(manifest_id)
            .map(|entry| entry.value().clone())
    }

    /// Return the cached manifest or fetch and cache it.
    ///
    /// A failed fetch is logged and reported as `None`; device listing
    /// carries on with a placeholder model name instead of failing.
    pub async fn get_or_fetch(
        &self,
        api: &dyn WeaveApi,
        manifest_id: &str,
    ) -> Option<ModelManifest> {
        if let Some(cached) = self.get(manifest_id) {
            return Some(cached);
        }

        match api.get_model_manifest(manifest_id).await {
            Ok(manifest) => {
                self.manifests
                    .insert(manifest_id.to_owned(), manifest.clone());
                Some(manifest)
            }
            Err(err) => {
                debug!(manifest_id, "model manifest lookup failed: {err}");
                None
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}

impl Default for ManifestCache {
    fn default() -> Self {
        Self::new()
    }
}
