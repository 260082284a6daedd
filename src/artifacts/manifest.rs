//! Commit record for a persisted model/explainer pair.
//!
//! Blobs are written under names tagged with their model id. The pair
//! becomes visible only when the manifest naming it is written, and a
//! manifest write replaces the previous one in a single `put`.

use crate::artifacts::store::ArtifactStore;
use crate::config::ArtifactConfig;
use crate::core::{now, Error, Result, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Blob names of one pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairBlobs {
    pub model_id: String,
    pub model: String,
    pub explainer: String,
}

impl PairBlobs {
    /// Names for the pair of `model_id` under the configured file names.
    pub fn for_model(config: &ArtifactConfig, model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            model: tagged_name(&config.model_file, model_id),
            explainer: tagged_name(&config.explainer_file, model_id),
        }
    }

    /// Best-effort removal of both blobs.
    pub async fn discard(&self, store: &dyn ArtifactStore) {
        for name in [&self.model, &self.explainer] {
            if let Err(e) = store.delete(name).await {
                warn!(blob = %name, error = %e, "could not remove artifact blob");
            }
        }
    }
}

/// The committed pair, plus the one it replaced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub current: PairBlobs,
    /// Kept on disk for rollback until the next commit
    pub previous: Option<PairBlobs>,
    pub committed_at: Timestamp,
}

impl ArtifactManifest {
    pub fn new(current: PairBlobs, previous: Option<PairBlobs>) -> Self {
        Self {
            current,
            previous,
            committed_at: now(),
        }
    }

    /// Read the committed manifest. Absent or unparsable manifests fail
    /// with `ArtifactMissing`.
    pub async fn read(store: &dyn ArtifactStore, config: &ArtifactConfig) -> Result<Self> {
        let bytes = store.get(&config.manifest_file).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            Error::ArtifactMissing(format!(
                "{} unreadable: {}",
                store.locate(&config.manifest_file),
                e
            ))
        })
    }

    /// Write the manifest; this is the commit point of a save.
    pub async fn commit(&self, store: &dyn ArtifactStore, config: &ArtifactConfig) -> Result<()> {
        store
            .put(&config.manifest_file, serde_json::to_vec_pretty(self)?)
            .await
    }
}

/// `global_credit_model.bin` + `abc` -> `global_credit_model.abc.bin`
fn tagged_name(file: &str, tag: &str) -> String {
    let path = Path::new(file);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!(
            "{}.{}.{}",
            stem.to_string_lossy(),
            tag,
            ext.to_string_lossy()
        ),
        _ => format!("{}.{}", file, tag),
    }
}
