//! Artifact Persistence
//!
//! Sealed model and explainer blobs, the stores that hold them, and the
//! registry that serves the live pair.

pub mod envelope;
pub mod manifest;
pub mod registry;
pub mod store;

pub use envelope::{ArtifactEnvelope, ArtifactKind, FORMAT_VERSION};
pub use manifest::{ArtifactManifest, PairBlobs};
pub use registry::{ArtifactRegistry, ArtifactSet};
pub use store::{ArtifactStore, FsArtifactStore, MemoryArtifactStore, StoreType};

use crate::config::ArtifactConfig;
use crate::core::Result;
use crate::explain::Explainer;
use crate::features::FeatureSchema;
use crate::federated::TrainedModel;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Where a saved pair ended up.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub model: String,
    pub explainer: String,
    pub manifest: String,
}

/// Persist both artifacts and commit them as one pair.
///
/// Both blobs are written under model-tagged names before the manifest is
/// replaced, so a failure at any step leaves the committed pair as it was.
/// The pair before the replaced one is pruned after the commit.
pub async fn save_artifacts(
    store: &dyn ArtifactStore,
    config: &ArtifactConfig,
    set: &ArtifactSet,
) -> Result<ArtifactPaths> {
    let model = ArtifactEnvelope::for_model(set.model())?;
    let explainer = ArtifactEnvelope::for_explainer(set.explainer())?;
    let blobs = PairBlobs::for_model(config, &set.model().model_id);

    let previous = ArtifactManifest::read(store, config).await.ok();
    let recommit = previous
        .as_ref()
        .is_some_and(|m| m.current.model_id == blobs.model_id);
    let referenced = recommit
        || previous
            .as_ref()
            .and_then(|m| m.previous.as_ref())
            .is_some_and(|p| p.model_id == blobs.model_id);

    let staged = async {
        store.put(&blobs.model, model.to_bytes()?).await?;
        store.put(&blobs.explainer, explainer.to_bytes()?).await?;
        let replaced = match (&previous, recommit) {
            (Some(m), true) => m.previous.clone(),
            (Some(m), false) => Some(m.current.clone()),
            (None, _) => None,
        };
        ArtifactManifest::new(blobs.clone(), replaced).commit(store, config).await
    }
    .await;
    if let Err(e) = staged {
        warn!(error = %e, model_id = %blobs.model_id, "artifact save failed; committed pair unchanged");
        if !referenced {
            blobs.discard(store).await;
        }
        return Err(e);
    }

    if !recommit {
        if let Some(stale) = previous.and_then(|m| m.previous) {
            if stale.model_id != blobs.model_id {
                stale.discard(store).await;
            }
        }
    }

    let paths = ArtifactPaths {
        model: store.locate(&blobs.model),
        explainer: store.locate(&blobs.explainer),
        manifest: store.locate(&config.manifest_file),
    };
    info!(
        store = %store.store_type(),
        model = %paths.model,
        explainer = %paths.explainer,
        model_id = %set.model().model_id,
        "artifacts committed"
    );
    Ok(paths)
}

/// Load and validate the committed pair.
///
/// An absent manifest, or absent or unreadable blobs, fail with
/// `ArtifactMissing`; blobs from a different schema, or an explainer from a
/// different model, fail with `SchemaMismatch`.
pub async fn load_artifacts(store: &dyn ArtifactStore, config: &ArtifactConfig) -> Result<ArtifactSet> {
    let running = FeatureSchema::binding();
    let blobs = ArtifactManifest::read(store, config).await?.current;

    let model_env = ArtifactEnvelope::from_bytes(&store.get(&blobs.model).await?)?;
    running.ensure_matches(&model_env.schema)?;
    let model: TrainedModel = model_env.open(ArtifactKind::Model)?;

    let explainer_env = ArtifactEnvelope::from_bytes(&store.get(&blobs.explainer).await?)?;
    running.ensure_matches(&explainer_env.schema)?;
    if explainer_env.model_id != model.model_id {
        warn!(
            model_id = %model.model_id,
            explainer_model_id = %explainer_env.model_id,
            "explainer artifact belongs to another model"
        );
    }
    let explainer: Explainer = explainer_env.open(ArtifactKind::Explainer)?;

    let set = ArtifactSet::new(model, explainer)?;
    info!(
        store = %store.store_type(),
        model_id = %set.model().model_id,
        model_version = %set.model().version,
        "artifacts loaded"
    );
    Ok(set)
}
