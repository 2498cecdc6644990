mod artifacts;
mod ensemble;

pub use artifacts::{ArtifactManifest, EnsembleMember, MemberDescriptor, ModelArtifacts, SurgeModel};
pub use ensemble::{EnsembleScorer, ScoredBatch, MIN_FEATURE_COVERAGE};
