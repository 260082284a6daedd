//! Versioned, checksummed artifact blobs.
//!
//! Payloads are bincode, LZ4-compressed, with a SHA3-256 checksum over the
//! compressed bytes. A blob that fails any check is reported as missing.

use crate::core::{now, Error, Hash256, Result, Timestamp};
use crate::explain::Explainer;
use crate::features::SchemaBinding;
use crate::federated::TrainedModel;
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Envelope layout version.
pub const FORMAT_VERSION: u32 = 1;

/// What an envelope holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Model,
    Explainer,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Model => write!(f, "model"),
            ArtifactKind::Explainer => write!(f, "explainer"),
        }
    }
}

/// A sealed artifact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactEnvelope {
    pub kind: ArtifactKind,
    pub format_version: u32,
    /// Schema the payload was produced against
    pub schema: SchemaBinding,
    /// Model the payload belongs to
    pub model_id: String,
    pub created_at: Timestamp,
    /// SHA3-256 of `payload`
    pub checksum: Hash256,
    /// LZ4-compressed bincode
    payload: Vec<u8>,
}

impl ArtifactEnvelope {
    /// Seal a value.
    pub fn seal<T: Serialize>(
        kind: ArtifactKind,
        schema: SchemaBinding,
        model_id: &str,
        value: &T,
    ) -> Result<Self> {
        let encoded = bincode::serialize(value)?;
        let payload = compress_prepend_size(&encoded);
        Ok(Self {
            kind,
            format_version: FORMAT_VERSION,
            schema,
            model_id: model_id.to_string(),
            created_at: now(),
            checksum: Hash256::digest(&payload),
            payload,
        })
    }

    /// Seal a trained model.
    pub fn for_model(model: &TrainedModel) -> Result<Self> {
        Self::seal(ArtifactKind::Model, model.schema.clone(), &model.model_id, model)
    }

    /// Seal an explainer.
    pub fn for_explainer(explainer: &Explainer) -> Result<Self> {
        Self::seal(
            ArtifactKind::Explainer,
            explainer.schema().clone(),
            explainer.model_id(),
            explainer,
        )
    }

    /// Verify and decode the payload.
    pub fn open<T: DeserializeOwned>(&self, expected: ArtifactKind) -> Result<T> {
        if self.kind != expected {
            return Err(Error::ArtifactMissing(format!(
                "expected {} artifact, found {}",
                expected, self.kind
            )));
        }
        if self.format_version != FORMAT_VERSION {
            return Err(Error::ArtifactMissing(format!(
                "unsupported {} artifact format {}",
                self.kind, self.format_version
            )));
        }
        if Hash256::digest(&self.payload) != self.checksum {
            return Err(Error::ArtifactMissing(format!("{} artifact checksum mismatch", self.kind)));
        }

        let encoded = decompress_size_prepended(&self.payload)
            .map_err(|e| Error::ArtifactMissing(format!("{} artifact unreadable: {}", self.kind, e)))?;
        bincode::deserialize(&encoded)
            .map_err(|e| Error::ArtifactMissing(format!("{} artifact unreadable: {}", self.kind, e)))
    }

    /// Encode for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from storage.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| Error::ArtifactMissing(format!("artifact envelope unreadable: {}", e)))
    }

    /// Compressed payload size.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}
