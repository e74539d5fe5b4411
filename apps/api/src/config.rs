use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable has a default, so the service boots with no `.env` at all.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub kb_path: String,
    pub rust_log: String,
    /// Base URL of the external scoring service. Unset → local heuristic only.
    pub scorer_url: Option<String>,
    /// Master switch for the remote scorer (USE_REMOTE_SCORER=0/false disables).
    pub use_remote_scorer: bool,
    pub scorer_timeout_secs: u64,
    /// Acceptance threshold (0–100) for (university, major) pair resolution.
    pub pair_match_threshold: f64,
    /// Acceptance threshold (0–100) for batch major-only matching.
    pub major_match_threshold: f64,
    /// Candidate limit for batch major-only matching.
    pub major_match_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 8000)?,
            kb_path: std::env::var("KB_PATH").unwrap_or_else(|_| "kb/majors.json".to_string()),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            scorer_url: std::env::var("SCORER_URL").ok().filter(|s| !s.is_empty()),
            use_remote_scorer: env_flag("USE_REMOTE_SCORER", true),
            scorer_timeout_secs: parse_env("SCORER_TIMEOUT_SECS", 10)?,
            pair_match_threshold: parse_env("PAIR_MATCH_THRESHOLD", 70.0)?,
            major_match_threshold: parse_env("MAJOR_MATCH_THRESHOLD", 80.0)?,
            major_match_limit: parse_env("MAJOR_MATCH_LIMIT", 80)?,
        })
    }

    /// Whether the remote scorer backend is selected at startup.
    pub fn remote_scorer_enabled(&self) -> bool {
        self.use_remote_scorer && self.scorer_url.is_some()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid value, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => !matches!(v.as_str(), "0" | "false" | "False"),
        Err(_) => default,
    }
}
