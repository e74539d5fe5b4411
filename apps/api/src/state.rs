use std::sync::Arc;

use crate::config::Config;
use crate::kb::KbHandle;
use crate::scoring::AdmissionScorer;

/// Shared application state injected into all route handlers via Axum
/// extractors.
#[derive(Clone)]
pub struct AppState {
    /// Handle over the current immutable KB snapshot; hot reload swaps it
    /// atomically.
    pub kb: KbHandle,
    /// Pluggable scorer. Default: HeuristicScorer. Swapped to RemoteScorer
    /// via SCORER_URL / USE_REMOTE_SCORER at startup.
    pub scorer: Arc<dyn AdmissionScorer>,
    pub config: Config,
}
