use crate::application::scoring::artifacts::ModelArtifacts;
use crate::domain::errors::ScoringError;
use crate::domain::types::{FeatureVector, Prediction};
use rayon::prelude::*;
use smartcore::linalg::basic::matrix::DenseMatrix;
use tracing::{debug, warn};

/// Minimum fraction of declared feature columns a row must carry to be
/// scored. Rows below this are excluded, never given a default score.
pub const MIN_FEATURE_COVERAGE: f64 = 0.70;

/// Outcome of one batch pass: predictions for eligible rows plus the
/// per-row exclusions (all `FeatureInsufficient`).
pub struct ScoredBatch {
    pub predictions: Vec<Prediction>,
    pub skipped: Vec<ScoringError>,
}

/// Combines N independently trained models into one surge probability per
/// row as the weighted arithmetic mean of member outputs.
///
/// Inference is deterministic: member outputs are computed in manifest order
/// and the imputation statistics depend only on the eligible batch itself.
pub struct EnsembleScorer {
    artifacts: ModelArtifacts,
}

impl EnsembleScorer {
    pub fn new(artifacts: ModelArtifacts) -> Self {
        Self { artifacts }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.artifacts.manifest.feature_names
    }

    pub fn artifact_version(&self) -> &str {
        &self.artifacts.manifest.version
    }

    /// Score a feature batch. Rows under the coverage floor are reported in
    /// `skipped`; remaining gaps are imputed with the eligible-batch column
    /// mean, falling back to zero for columns missing across the batch.
    pub fn score_batch(&self, batch: &[FeatureVector]) -> Result<ScoredBatch, ScoringError> {
        let names = &self.artifacts.manifest.feature_names;

        let mut eligible: Vec<&FeatureVector> = Vec::with_capacity(batch.len());
        let mut skipped = Vec::new();
        for row in batch {
            let coverage = row.coverage(names);
            if coverage >= MIN_FEATURE_COVERAGE {
                eligible.push(row);
            } else {
                debug!(ticker = %row.ticker, coverage, "row excluded from scoring");
                skipped.push(ScoringError::FeatureInsufficient {
                    ticker: row.ticker.clone(),
                    coverage: coverage * 100.0,
                    required: MIN_FEATURE_COVERAGE * 100.0,
                });
            }
        }

        if eligible.is_empty() {
            if !batch.is_empty() {
                warn!(total = batch.len(), "no rows met the feature coverage floor");
            }
            return Ok(ScoredBatch {
                predictions: Vec::new(),
                skipped,
            });
        }

        // Column means over the eligible batch only; None when a column is
        // entirely missing, imputed as zero below.
        let column_means: Vec<Option<f64>> = names
            .iter()
            .map(|name| {
                let values: Vec<f64> = eligible
                    .iter()
                    .filter_map(|row| row.features.get(name.as_str()).copied())
                    .collect();
                if values.is_empty() {
                    None
                } else {
                    Some(values.iter().sum::<f64>() / values.len() as f64)
                }
            })
            .collect();

        let rows: Vec<Vec<f64>> = eligible
            .iter()
            .map(|row| {
                names
                    .iter()
                    .zip(&column_means)
                    .map(|(name, mean)| {
                        row.features
                            .get(name.as_str())
                            .copied()
                            .unwrap_or_else(|| mean.unwrap_or(0.0))
                    })
                    .collect()
            })
            .collect();

        let matrix =
            DenseMatrix::from_2d_vec(&rows).map_err(|e| ScoringError::SchemaMismatch {
                reason: format!("failed to assemble feature matrix: {e}"),
            })?;

        // Member outputs in manifest order; parallel across members, combined
        // sequentially so the weighted mean is reproducible.
        let member_outputs: Vec<Vec<f64>> = self
            .artifacts
            .members
            .par_iter()
            .map(|member| {
                member
                    .model
                    .predict(&matrix)
                    .map_err(|e| ScoringError::Inference {
                        model_id: member.descriptor.model_id.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let predictions = eligible
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let probability: f64 = self
                    .artifacts
                    .members
                    .iter()
                    .zip(&member_outputs)
                    .map(|(member, outputs)| member.descriptor.weight * outputs[i])
                    .sum();
                Prediction {
                    ticker: row.ticker.clone(),
                    issue_date: row.as_of_date,
                    probability: probability.clamp(0.0, 1.0),
                }
            })
            .collect();

        Ok(ScoredBatch {
            predictions,
            skipped,
        })
    }
}
