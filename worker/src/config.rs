//! Worker configuration loaded from the environment

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use extractor::{EngineConfig, ResponseEncoding};
use shared::Platform;

use crate::error::{WorkerError, WorkerResult};

/// MySQL connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub connect_timeout: Duration,
}

/// Complete worker configuration
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub coordinator_url: Url,
    pub platform: Platform,
    pub model: String,
    pub prompt_id: u8,
    pub max_workers: usize,
    pub task_timeout: Option<Duration>,
    pub max_chars_per_batch: usize,
    pub max_items_per_batch: usize,
    pub max_retries: u32,
    pub max_qps: f64,
    pub progress_interval: Duration,
    pub poll_interval: Duration,
    pub database: DatabaseConfig,
    pub record_table: String,
    pub results_table: String,
    pub worker_name: Option<String>,
}

impl WorkerConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let coordinator_url = env.string("CENTRAL_API_BASE_URL", "http://127.0.0.1:5001");
        let coordinator_url = Url::parse(&coordinator_url)
            .map_err(|e| WorkerError::config(format!("CENTRAL_API_BASE_URL '{coordinator_url}': {e}")))?;

        let config = Self {
            coordinator_url,
            platform: env.parse("LLM_PLATFORM", Platform::SiliconFlow)?,
            model: env.string("PLACE_EXTRACT_MODEL", "deepseek-ai/DeepSeek-V3.2"),
            prompt_id: env.parse("PLACE_PROMPT_ID", 3)?,
            max_workers: env.parse("MAX_WORKERS", 8)?,
            task_timeout: match env.parse::<u64>("TASK_TIMEOUT", 120)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            max_chars_per_batch: env.parse("MAX_CHARS_PER_BATCH", 1000)?,
            max_items_per_batch: env.parse("MAX_ITEMS_PER_BATCH", 20)?,
            max_retries: env.parse("MAX_RETRIES", 2)?,
            max_qps: env.parse("MAX_QPS", 0.0)?,
            progress_interval: Duration::from_secs(env.parse("PROGRESS_INTERVAL", 10)?),
            poll_interval: Duration::from_secs(env.parse("POLL_INTERVAL", 30)?),
            database: DatabaseConfig {
                host: env.string("MYSQL_HOST", "127.0.0.1"),
                port: env.parse("MYSQL_PORT", 3306)?,
                user: env.string("MYSQL_USER", "poem"),
                password: env.string("MYSQL_PASSWORD", ""),
                database: env.string("MYSQL_DATABASE", "poem"),
                connect_timeout: Duration::from_secs(env.parse("MYSQL_CONNECT_TIMEOUT", 30)?),
            },
            record_table: env.string("POEM_TABLE", "quiz_poem_2"),
            results_table: env.string("RESULTS_TABLE", "place_names_match_results"),
            worker_name: env.optional("WORKER_NAME"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the worker cannot run with
    pub fn validate(&self) -> WorkerResult<()> {
        if !self.max_qps.is_finite() || self.max_qps < 0.0 {
            return Err(WorkerError::config(format!("MAX_QPS must be >= 0, got {}", self.max_qps)));
        }
        if self.poll_interval.is_zero() {
            return Err(WorkerError::config("POLL_INTERVAL must be positive"));
        }
        for (name, table) in [("POEM_TABLE", &self.record_table), ("RESULTS_TABLE", &self.results_table)] {
            if !is_identifier(table) {
                return Err(WorkerError::config(format!("{name} '{table}' is not a valid table name")));
            }
        }
        self.engine_config()?.validate()?;
        Ok(())
    }

    /// Engine settings derived from this configuration
    pub fn engine_config(&self) -> WorkerResult<EngineConfig> {
        Ok(EngineConfig {
            model: self.model.clone(),
            encoding: ResponseEncoding::from_prompt_id(self.prompt_id)?,
            max_workers: self.max_workers,
            task_timeout: self.task_timeout,
            max_chars_per_batch: self.max_chars_per_batch,
            max_items_per_batch: self.max_items_per_batch,
            max_retries: self.max_retries,
            progress_interval: self.progress_interval,
        })
    }

    /// Coordinator endpoint for an API path such as `api/task/claim`
    pub fn coordinator_endpoint(&self, path: &str) -> WorkerResult<Url> {
        endpoint(&self.coordinator_url, path)
    }
}

/// Join an API path onto a base URL, keeping any path prefix of the base
pub fn endpoint(base: &Url, path: &str) -> WorkerResult<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| WorkerError::config(format!("invalid coordinator path '{path}': {e}")))
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T) -> WorkerResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e| WorkerError::config(format!("{key} = '{raw}': {e}"))),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> WorkerResult<WorkerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.platform, Platform::SiliconFlow);
        assert_eq!(config.model, "deepseek-ai/DeepSeek-V3.2");
        assert_eq!(config.prompt_id, 3);
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.task_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.max_chars_per_batch, 1000);
        assert_eq!(config.max_items_per_batch, 20);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.max_qps, 0.0);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.record_table, "quiz_poem_2");
        assert_eq!(config.results_table, "place_names_match_results");
        assert_eq!(config.worker_name, None);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("LLM_PLATFORM", "openrouter"),
            ("PLACE_PROMPT_ID", "4"),
            ("MAX_WORKERS", "2"),
            ("TASK_TIMEOUT", "0"),
            ("MAX_QPS", "1.5"),
            ("WORKER_NAME", "  box-7 "),
        ])
        .unwrap();

        assert_eq!(config.platform, Platform::OpenRouter);
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.task_timeout, None);
        assert_eq!(config.max_qps, 1.5);
        assert_eq!(config.worker_name.as_deref(), Some("box-7"));
        assert_eq!(
            config.engine_config().unwrap().encoding,
            ResponseEncoding::DelimitedBatch
        );
    }

    #[test]
    fn test_unparseable_number_is_config_error() {
        let err = load(&[("MAX_WORKERS", "many")]).unwrap_err();
        assert!(matches!(err, WorkerError::ConfigError { .. }));
        assert!(err.to_string().contains("MAX_WORKERS"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load(&[("MAX_WORKERS", "0")]).is_err());
        assert!(load(&[("PLACE_PROMPT_ID", "7")]).is_err());
        assert!(load(&[("LLM_PLATFORM", "gemini")]).is_err());
        assert!(load(&[("MAX_QPS", "-1")]).is_err());
        assert!(load(&[("POEM_TABLE", "poems; DROP TABLE x")]).is_err());
        assert!(load(&[("CENTRAL_API_BASE_URL", "not a url")]).is_err());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base = Url::parse("http://host:5001/prefix").unwrap();
        assert_eq!(
            endpoint(&base, "api/task/claim").unwrap().as_str(),
            "http://host:5001/prefix/api/task/claim"
        );

        let base = Url::parse("http://host:5001/").unwrap();
        assert_eq!(endpoint(&base, "/api/health").unwrap().as_str(), "http://host:5001/api/health");
    }
}
