//! Remote scorer — delegates scoring to an external service, degrading
//! silently to the local heuristic on any failure.
//!
//! One outbound POST per request, bounded by a configured timeout. No
//! retries: at most one fallback (to the heuristic) ever happens per
//! request, and the degradation is observable via `ScoreOutcome::degraded`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::features::StudentFeatures;
use crate::kb::ProgramRecord;
use crate::scoring::{AdmissionScorer, HeuristicScorer, ScoreOutcome};

#[derive(Debug, Error)]
pub enum RemoteScorerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid verdict: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    features: &'a StudentFeatures,
    program: &'a str,
}

/// Response contract of the external scoring service.
#[derive(Debug, Deserialize)]
struct RemoteVerdict {
    probability: f64,
    probability_raw: Option<f64>,
    program_match: Option<String>,
    weights: Option<serde_json::Value>,
    explanation: Option<String>,
}

/// External scoring backend. Wraps `HeuristicScorer` as its fallback via
/// composition.
pub struct RemoteScorer {
    client: Client,
    url: String,
    fallback: HeuristicScorer,
}

impl RemoteScorer {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            url,
            fallback: HeuristicScorer,
        }
    }

    async fn call_remote(
        &self,
        features: &StudentFeatures,
        program_label: &str,
    ) -> Result<RemoteVerdict, RemoteScorerError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ScoreRequest {
                features,
                program: program_label,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteScorerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let verdict: RemoteVerdict = response
            .json()
            .await
            .map_err(|e| RemoteScorerError::Invalid(e.to_string()))?;

        // Probability must stay strictly inside (0,1).
        if !verdict.probability.is_finite()
            || verdict.probability <= 0.0
            || verdict.probability >= 1.0
        {
            return Err(RemoteScorerError::Invalid(format!(
                "probability out of range: {}",
                verdict.probability
            )));
        }

        debug!(
            "Remote scorer verdict: probability={:.4}, program_match={:?}",
            verdict.probability, verdict.program_match
        );
        Ok(verdict)
    }
}

#[async_trait]
impl AdmissionScorer for RemoteScorer {
    async fn score(
        &self,
        features: &StudentFeatures,
        record: Option<&ProgramRecord>,
        program_label: &str,
    ) -> Result<ScoreOutcome, AppError> {
        match self.call_remote(features, program_label).await {
            Ok(verdict) => Ok(ScoreOutcome {
                probability: verdict.probability,
                probability_raw: verdict.probability_raw,
                program_match: verdict
                    .program_match
                    .or_else(|| Some(program_label.to_string())),
                components: None,
                tags: Vec::new(),
                weights: verdict.weights,
                explanation: verdict.explanation,
                backend: "remote",
                degraded: false,
            }),
            Err(e) => {
                warn!("Remote scorer failed, degrading to heuristic: {e}");
                let mut outcome = self.fallback.score(features, record, program_label).await?;
                outcome.degraded = true;
                Ok(outcome)
            }
        }
    }
}
