//! Process configuration: the external service endpoints, the worker
//! settings and the startup validation that decides which of them are
//! mandatory.
//!
//! Values are read through a lookup function so the same code serves the
//! real environment and tests. Layering of CLI flags and the config file
//! on top happens in the binary.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::persistence::{HttpPlanStore, MemoryPlanStore, PlanStore, SigningKey};
use crate::pipeline::{
    DeterministicRecipes, FoodTable, HttpNutritionSource, HttpRecipeSource, NutritionSource,
    PipelineContext, QaConfig, RecipeSource,
};
use crate::queue::RetryPolicy;
use crate::worker::WorkerConfig;

pub const ENV: &str = "MEALFORGE_ENV";
pub const DATABASE_URL: &str = "MEALFORGE_DATABASE_URL";
pub const RECIPE_API_URL: &str = "MEALFORGE_RECIPE_API_URL";
pub const RECIPE_API_KEY: &str = "MEALFORGE_RECIPE_API_KEY";
pub const NUTRITION_API_URL: &str = "MEALFORGE_NUTRITION_API_URL";
pub const NUTRITION_API_KEY: &str = "MEALFORGE_NUTRITION_API_KEY";
pub const PERSISTENCE_URL: &str = "MEALFORGE_PERSISTENCE_URL";
pub const PERSISTENCE_SECRET: &str = "MEALFORGE_PERSISTENCE_SECRET";
pub const CONCURRENCY: &str = "MEALFORGE_CONCURRENCY";
pub const POLL_INTERVAL_MS: &str = "MEALFORGE_POLL_INTERVAL_MS";
pub const JOB_TIMEOUT_SECS: &str = "MEALFORGE_JOB_TIMEOUT_SECS";
pub const MAX_ATTEMPTS: &str = "MEALFORGE_MAX_ATTEMPTS";
pub const BACKOFF_BASE_MS: &str = "MEALFORGE_BACKOFF_BASE_MS";
pub const BACKOFF_MAX_MS: &str = "MEALFORGE_BACKOFF_MAX_MS";
pub const MIN_COMPOSITE: &str = "MEALFORGE_MIN_COMPOSITE";

/// Timeout for each call to an external service.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} is required in production")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "local" | "test" => Ok(Self::Development),
            other => Err(invalid(ENV, format!("unknown environment '{other}'"))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Production => "production",
            Self::Development => "development",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub job_timeout: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Plans scoring below this composite are rejected.
    pub min_composite: f64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        let worker = WorkerConfig::default();
        Self {
            concurrency: worker.concurrency,
            poll_interval: worker.poll_interval,
            job_timeout: worker.job_timeout,
            max_attempts: retry.max_attempts,
            backoff_base: retry.base_delay,
            backoff_max: retry.max_delay,
            min_composite: QaConfig::default().min_composite,
        }
    }
}

impl WorkerSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(invalid(CONCURRENCY, "must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(invalid(MAX_ATTEMPTS, "must be at least 1"));
        }
        if self.job_timeout.is_zero() {
            return Err(invalid(JOB_TIMEOUT_SECS, "must be positive"));
        }
        if self.backoff_base > self.backoff_max {
            return Err(invalid(BACKOFF_BASE_MS, "exceeds the backoff maximum"));
        }
        if !(1.0..=10.0).contains(&self.min_composite) {
            return Err(invalid(MIN_COMPOSITE, "must be within 1..=10"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.backoff_base, self.backoff_max)
    }
}

/// Every setting the service reads at startup. Unset optional values mean
/// "use the local fallback".
#[derive(Clone, Default, PartialEq)]
pub struct AppConfig {
    pub env: Environment,
    pub database_url: Option<String>,
    pub recipe_api_url: Option<String>,
    pub recipe_api_key: Option<String>,
    pub nutrition_api_url: Option<String>,
    pub nutrition_api_key: Option<String>,
    pub persistence_url: Option<String>,
    pub persistence_secret: Option<String>,
    pub worker: WorkerSettings,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[redacted]");
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("database_url", &self.database_url.is_some())
            .field("recipe_api_url", &self.recipe_api_url)
            .field("recipe_api_key", &redact(&self.recipe_api_key))
            .field("nutrition_api_url", &self.nutrition_api_url)
            .field("nutrition_api_key", &redact(&self.nutrition_api_key))
            .field("persistence_url", &self.persistence_url)
            .field("persistence_secret", &redact(&self.persistence_secret))
            .field("worker", &self.worker)
            .finish()
    }
}

fn parse_num<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, format!("'{raw}': {e}")))
}

fn check_url(key: &'static str, url: &Option<String>) -> Result<(), ConfigError> {
    match url {
        Some(u) if !(u.starts_with("http://") || u.starts_with("https://")) => {
            Err(invalid(key, "must be an http(s) URL"))
        }
        _ => Ok(()),
    }
}

impl AppConfig {
    /// Read every key through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut worker = WorkerSettings::default();
        if let Some(v) = get(CONCURRENCY) {
            worker.concurrency = parse_num(CONCURRENCY, &v)?;
        }
        if let Some(v) = get(POLL_INTERVAL_MS) {
            worker.poll_interval = Duration::from_millis(parse_num(POLL_INTERVAL_MS, &v)?);
        }
        if let Some(v) = get(JOB_TIMEOUT_SECS) {
            worker.job_timeout = Duration::from_secs(parse_num(JOB_TIMEOUT_SECS, &v)?);
        }
        if let Some(v) = get(MAX_ATTEMPTS) {
            worker.max_attempts = parse_num(MAX_ATTEMPTS, &v)?;
        }
        if let Some(v) = get(BACKOFF_BASE_MS) {
            worker.backoff_base = Duration::from_millis(parse_num(BACKOFF_BASE_MS, &v)?);
        }
        if let Some(v) = get(BACKOFF_MAX_MS) {
            worker.backoff_max = Duration::from_millis(parse_num(BACKOFF_MAX_MS, &v)?);
        }
        if let Some(v) = get(MIN_COMPOSITE) {
            worker.min_composite = parse_num(MIN_COMPOSITE, &v)?;
        }

        Ok(Self {
            env: get(ENV).map(|v| v.parse()).transpose()?.unwrap_or_default(),
            database_url: get(DATABASE_URL),
            recipe_api_url: get(RECIPE_API_URL),
            recipe_api_key: get(RECIPE_API_KEY),
            nutrition_api_url: get(NUTRITION_API_URL),
            nutrition_api_key: get(NUTRITION_API_KEY),
            persistence_url: get(PERSISTENCE_URL),
            persistence_secret: get(PERSISTENCE_SECRET),
            worker,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Startup check. Returns the warnings to log; in production missing
    /// queue or persistence settings are fatal.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        self.worker.validate()?;
        check_url(RECIPE_API_URL, &self.recipe_api_url)?;
        check_url(NUTRITION_API_URL, &self.nutrition_api_url)?;
        check_url(PERSISTENCE_URL, &self.persistence_url)?;

        let production = self.env.is_production();
        let mut warnings = Vec::new();

        let required = [
            (DATABASE_URL, self.database_url.is_none(), "using the default local database"),
            (PERSISTENCE_URL, self.persistence_url.is_none(), "plans are kept in memory"),
            (PERSISTENCE_SECRET, self.persistence_secret.is_none(), "plans are kept in memory"),
        ];
        for (key, missing, fallback) in required {
            if missing {
                if production {
                    return Err(ConfigError::Missing(key));
                }
                warnings.push(format!("{key} is not set; {fallback}"));
            }
        }

        if self.recipe_api_url.is_some() != self.recipe_api_key.is_some() {
            warnings.push(format!(
                "{RECIPE_API_URL} and {RECIPE_API_KEY} must be set together; using the built-in recipe library"
            ));
        } else if self.recipe_api_url.is_none() {
            warnings.push(format!("{RECIPE_API_URL} is not set; using the built-in recipe library"));
        }
        if self.nutrition_api_url.is_some() != self.nutrition_api_key.is_some() {
            warnings.push(format!(
                "{NUTRITION_API_URL} and {NUTRITION_API_KEY} must be set together; using the built-in food table"
            ));
        } else if self.nutrition_api_url.is_none() {
            warnings.push(format!("{NUTRITION_API_URL} is not set; using the built-in food table"));
        }

        Ok(warnings)
    }

    /// Recipe and nutrition sources: the HTTP services when fully
    /// configured, otherwise the deterministic built-ins.
    pub fn pipeline_context(&self) -> Result<PipelineContext> {
        let recipes: Arc<dyn RecipeSource> = match (&self.recipe_api_url, &self.recipe_api_key) {
            (Some(url), Some(key)) => Arc::new(HttpRecipeSource::new(url, key, HTTP_TIMEOUT)?),
            _ => Arc::new(DeterministicRecipes::new()),
        };
        let nutrition: Arc<dyn NutritionSource> =
            match (&self.nutrition_api_url, &self.nutrition_api_key) {
                (Some(url), Some(key)) => Arc::new(HttpNutritionSource::new(url, key, HTTP_TIMEOUT)?),
                _ => Arc::new(FoodTable::builtin()),
            };
        Ok(PipelineContext {
            recipes,
            nutrition,
            qa: QaConfig {
                min_composite: self.worker.min_composite,
            },
        })
    }

    /// The signed HTTP store when configured, otherwise an in-memory one.
    pub fn plan_store(&self) -> Result<Arc<dyn PlanStore>> {
        match (&self.persistence_url, &self.persistence_secret) {
            (Some(url), Some(secret)) => {
                let key = SigningKey::new(secret)?;
                Ok(Arc::new(HttpPlanStore::new(url, key, HTTP_TIMEOUT)?))
            }
            _ => Ok(Arc::new(MemoryPlanStore::new())),
        }
    }

    pub fn worker_config(&self, worker_id: impl Into<String>) -> WorkerConfig {
        WorkerConfig {
            concurrency: self.worker.concurrency,
            poll_interval: self.worker.poll_interval,
            job_timeout: self.worker.job_timeout,
            retry: self.worker.retry_policy(),
            worker_id: worker_id.into(),
            ..WorkerConfig::default()
        }
    }
}
