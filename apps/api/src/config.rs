use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Which `AnswerScorer` backs the scorecard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorerBackend {
    Heuristic,
    Llm,
}

/// Application configuration loaded from environment variables.
///
/// Every collaborator is optional: without an API key questions come from the
/// local deck, without a database finalized sessions are only logged, and
/// without a recorder URL sessions run text-only.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub anthropic_api_key: Option<String>,
    pub database_url: Option<String>,
    pub recorder_url: Option<String>,
    pub question_timeout: Duration,
    pub tick_interval: Duration,
    pub scorer: ScorerBackend,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let scorer = match optional("SCORER").as_deref() {
            None | Some("heuristic") => ScorerBackend::Heuristic,
            Some("llm") => ScorerBackend::Llm,
            Some(other) => bail!("SCORER must be 'heuristic' or 'llm', got '{other}'"),
        };
        let anthropic_api_key = optional("ANTHROPIC_API_KEY");
        if scorer == ScorerBackend::Llm && anthropic_api_key.is_none() {
            bail!("SCORER=llm requires ANTHROPIC_API_KEY");
        }

        let question_timeout_secs: u64 =
            parse_or(&optional, "QUESTION_GENERATION_TIMEOUT_SECS", 20)?;
        if question_timeout_secs == 0 {
            bail!("QUESTION_GENERATION_TIMEOUT_SECS must be greater than zero");
        }
        // The tick schedule cannot run on a zero period.
        let tick_interval_ms: u64 = parse_or(&optional, "TICK_INTERVAL_MS", 1000)?;
        if tick_interval_ms == 0 {
            bail!("TICK_INTERVAL_MS must be greater than zero");
        }

        Ok(Config {
            port: parse_or(&optional, "PORT", 8080)?,
            rust_log: optional("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            anthropic_api_key,
            database_url: optional("DATABASE_URL"),
            recorder_url: optional("RECORDER_URL"),
            question_timeout: Duration::from_secs(question_timeout_secs),
            tick_interval: Duration::from_millis(tick_interval_ms),
            scorer,
        })
    }
}

fn parse_or<T>(optional: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_any_env() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
        assert!(config.anthropic_api_key.is_none());
        assert!(config.database_url.is_none());
        assert_eq!(config.question_timeout, Duration::from_secs(20));
        assert_eq!(config.tick_interval, Duration::from_millis(1000));
        assert_eq!(config.scorer, ScorerBackend::Heuristic);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = load(&[
            ("PORT", "9000"),
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("SCORER", "llm"),
            ("TICK_INTERVAL_MS", "250"),
            ("RECORDER_URL", "http://recorder:7000"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.scorer, ScorerBackend::Llm);
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.recorder_url.as_deref(), Some("http://recorder:7000"));
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_llm_scorer_requires_api_key() {
        assert!(load(&[("SCORER", "llm")]).is_err());
        assert!(load(&[("SCORER", "random")]).is_err());
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config = load(&[("DATABASE_URL", "  "), ("PORT", "")]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_zero_durations_are_rejected() {
        let err = load(&[("TICK_INTERVAL_MS", "0")]).unwrap_err();
        assert!(err.to_string().contains("TICK_INTERVAL_MS"));

        let err = load(&[("QUESTION_GENERATION_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("QUESTION_GENERATION_TIMEOUT_SECS"));
    }
}
