use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::models::document::WordBudget;
use crate::pipeline::PipelineConfig;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub llm_timeout: Duration,
    pub llm_max_retries: u32,
    /// Defaults every generation request starts from.
    pub pipeline: PipelineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            max_improvement_passes: optional_env(
                "MAX_IMPROVEMENT_PASSES",
                defaults.max_improvement_passes,
            )?,
            word_budget: WordBudget {
                min: optional_env("WORD_BUDGET_MIN", defaults.word_budget.min)?,
                max: optional_env("WORD_BUDGET_MAX", defaults.word_budget.max)?,
            },
            ..defaults
        };
        pipeline
            .validate()
            .context("Pipeline defaults from the environment are invalid")?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: optional_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            llm_timeout: Duration::from_secs(optional_env("LLM_TIMEOUT_SECS", 60)?),
            llm_max_retries: optional_env("LLM_MAX_RETRIES", 3)?,
            pipeline,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
