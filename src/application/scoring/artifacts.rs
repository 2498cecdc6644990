use crate::domain::errors::ScoringError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use smartcore::ensemble::random_forest_regressor::RandomForestRegressor;
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Fitted scoring model for one ensemble member. Trained offline; outputs a
/// surge probability estimate in [0, 1] per row.
pub type SurgeModel = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// One ensemble member as declared in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDescriptor {
    pub model_id: String,
    /// Model file name, relative to the artifact directory.
    pub file: String,
    pub weight: f64,
}

/// Versioned descriptor for a complete artifact set: the trainer writes it,
/// the scorer validates it at load time. Schema mismatches are rejected
/// instead of silently loading incompatible weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: String,
    /// Ordered feature-name list shared by every member. Column order is a
    /// breaking contract with the trainer.
    pub feature_names: Vec<String>,
    /// Hex sha256 over the feature names, guarding against a manifest edited
    /// out of sync with the models.
    pub feature_list_sha256: String,
    pub members: Vec<MemberDescriptor>,
}

impl ArtifactManifest {
    pub fn feature_hash(names: &[String]) -> String {
        let mut hasher = Sha256::new();
        for name in names {
            hasher.update(name.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    fn validate(&self) -> Result<(), ScoringError> {
        if self.members.is_empty() {
            return Err(ScoringError::SchemaMismatch {
                reason: "manifest declares no ensemble members".to_string(),
            });
        }
        if self.feature_names.is_empty() {
            return Err(ScoringError::SchemaMismatch {
                reason: "manifest declares no feature columns".to_string(),
            });
        }

        let expected = Self::feature_hash(&self.feature_names);
        if expected != self.feature_list_sha256 {
            return Err(ScoringError::SchemaMismatch {
                reason: format!(
                    "feature list hash {} does not match declared {}",
                    expected, self.feature_list_sha256
                ),
            });
        }

        let sum: f64 = self.members.iter().map(|m| m.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE || self.members.iter().any(|m| m.weight < 0.0) {
            return Err(ScoringError::MalformedWeights { sum });
        }
        Ok(())
    }
}

/// A loaded ensemble member: descriptor plus deserialized model.
#[derive(Debug)]
pub struct EnsembleMember {
    pub descriptor: MemberDescriptor,
    pub model: SurgeModel,
}

/// The full validated artifact set the scorer runs with.
///
/// Loading is fail-fast: a missing or unreadable member is fatal, a model is
/// never silently dropped from the ensemble.
#[derive(Debug)]
pub struct ModelArtifacts {
    pub manifest: ArtifactManifest,
    pub members: Vec<EnsembleMember>,
}

impl ModelArtifacts {
    pub fn load(dir: &Path) -> Result<Self, ScoringError> {
        let manifest_path = dir.join("manifest.json");
        if !manifest_path.exists() {
            return Err(ScoringError::ArtifactMissing {
                path: manifest_path,
            });
        }

        let manifest_file =
            File::open(&manifest_path).map_err(|e| ScoringError::ArtifactCorrupt {
                path: manifest_path.clone(),
                reason: e.to_string(),
            })?;
        let manifest: ArtifactManifest =
            serde_json::from_reader(manifest_file).map_err(|e| ScoringError::ArtifactCorrupt {
                path: manifest_path.clone(),
                reason: e.to_string(),
            })?;
        manifest.validate()?;

        let mut members = Vec::with_capacity(manifest.members.len());
        for descriptor in &manifest.members {
            let model_path = dir.join(&descriptor.file);
            if !model_path.exists() {
                return Err(ScoringError::ArtifactMissing { path: model_path });
            }
            let model_file = File::open(&model_path).map_err(|e| ScoringError::ArtifactCorrupt {
                path: model_path.clone(),
                reason: e.to_string(),
            })?;
            let model: SurgeModel = serde_json::from_reader(model_file).map_err(|e| {
                ScoringError::ArtifactCorrupt {
                    path: model_path.clone(),
                    reason: e.to_string(),
                }
            })?;
            members.push(EnsembleMember {
                descriptor: descriptor.clone(),
                model,
            });
        }

        info!(
            version = %manifest.version,
            members = members.len(),
            features = manifest.feature_names.len(),
            "loaded model artifacts"
        );
        Ok(Self { manifest, members })
    }

    /// Assemble artifacts from already-loaded parts. The manifest is still
    /// validated; used by tests and embedded deployments.
    pub fn from_parts(
        manifest: ArtifactManifest,
        members: Vec<EnsembleMember>,
    ) -> Result<Self, ScoringError> {
        manifest.validate()?;
        if members.len() != manifest.members.len() {
            return Err(ScoringError::SchemaMismatch {
                reason: format!(
                    "manifest declares {} members, {} provided",
                    manifest.members.len(),
                    members.len()
                ),
            });
        }
        Ok(Self { manifest, members })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(weights: &[f64]) -> ArtifactManifest {
        let feature_names: Vec<String> =
            ["gap_pct", "rel_volume", "rsi"].iter().map(|s| s.to_string()).collect();
        ArtifactManifest {
            version: "2024.04.01".to_string(),
            feature_list_sha256: ArtifactManifest::feature_hash(&feature_names),
            feature_names,
            members: weights
                .iter()
                .enumerate()
                .map(|(i, w)| MemberDescriptor {
                    model_id: format!("rf-{i}"),
                    file: format!("rf-{i}.json"),
                    weight: *w,
                })
                .collect(),
        }
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        assert!(manifest(&[0.5, 0.5]).validate().is_ok());
        assert!(manifest(&[0.25, 0.25, 0.25, 0.25]).validate().is_ok());

        let err = manifest(&[0.5, 0.4]).validate().unwrap_err();
        assert!(matches!(err, ScoringError::MalformedWeights { .. }));

        let err = manifest(&[1.5, -0.5]).validate().unwrap_err();
        assert!(matches!(err, ScoringError::MalformedWeights { .. }));
    }

    #[test]
    fn test_feature_hash_mismatch_rejected() {
        let mut m = manifest(&[1.0]);
        m.feature_list_sha256 = "deadbeef".to_string();
        let err = m.validate().unwrap_err();
        assert!(matches!(err, ScoringError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_empty_manifest_rejected() {
        let mut m = manifest(&[1.0]);
        m.members.clear();
        assert!(m.validate().is_err());

        let mut m = manifest(&[1.0]);
        m.feature_names.clear();
        m.feature_list_sha256 = ArtifactManifest::feature_hash(&[]);
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_load_missing_dir_is_fatal() {
        let err = ModelArtifacts::load(Path::new("/nonexistent/artifacts")).unwrap_err();
        assert!(matches!(err, ScoringError::ArtifactMissing { .. }));
    }

    #[test]
    fn test_feature_hash_is_order_sensitive() {
        let a = ArtifactManifest::feature_hash(&["x".to_string(), "y".to_string()]);
        let b = ArtifactManifest::feature_hash(&["y".to_string(), "x".to_string()]);
        assert_ne!(a, b);
    }
}
