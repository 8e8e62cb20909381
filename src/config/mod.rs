mod plan;

pub use plan::*;

use std::env;
use std::path::PathBuf;

use crate::comparison::WinnerWeights;
use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Judge API settings.
    pub langbase: LangbaseConfig,
    /// Run history database.
    pub database: DatabaseConfig,
    /// Log level and format.
    pub logging: LoggingConfig,
    /// HTTP timeouts and retries.
    pub request: RequestConfig,
    /// Langbase pipe names.
    pub pipes: PipeConfig,
    /// Evaluation run limits.
    pub evaluation: EvaluationConfig,
    /// Overall winner vote weights.
    pub weights: WinnerWeights,
}

/// Langbase API configuration
#[derive(Debug, Clone)]
pub struct LangbaseConfig {
    /// Bearer token.
    pub api_key: String,
    /// API root, without a trailing slash.
    pub base_url: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite file path.
    pub path: PathBuf,
    /// Pool size.
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `tracing` filter directive.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// HTTP request configuration, shared by the judge client and the
/// retrieval adapters.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Per-request timeout.
    pub timeout_ms: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base backoff delay, doubled per retry.
    pub retry_delay_ms: u64,
}

/// Langbase pipe name configuration
#[derive(Debug, Clone)]
pub struct PipeConfig {
    /// Name of the similarity judge pipe.
    pub judge: String,
}

/// Evaluation run configuration
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Upper bound on in-flight (case, method) evaluations.
    pub max_concurrency: usize,
    /// Per external call timeout. A timeout degrades one result, never the run.
    pub call_timeout_ms: u64,
    /// Identity (user/session token) forwarded to every retrieval call.
    pub identity: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let langbase = LangbaseConfig {
            api_key: env::var("LANGBASE_API_KEY").map_err(|_| AppError::Config {
                message: "LANGBASE_API_KEY is required".to_string(),
            })?,
            base_url: env::var("LANGBASE_BASE_URL")
                .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
        };

        let database = DatabaseConfig::from_env();
        let logging = LoggingConfig::from_env();

        let request = RequestConfig {
            timeout_ms: parse_env("REQUEST_TIMEOUT_MS").unwrap_or(30000),
            max_retries: parse_env("MAX_RETRIES").unwrap_or(3),
            retry_delay_ms: parse_env("RETRY_DELAY_MS").unwrap_or(1000),
        };

        let pipes = PipeConfig {
            judge: env::var("PIPE_JUDGE").unwrap_or_else(|_| "memory-judge-v1".to_string()),
        };

        let evaluation = EvaluationConfig {
            max_concurrency: parse_env::<usize>("EVAL_MAX_CONCURRENCY")
                .unwrap_or(4)
                .max(1),
            call_timeout_ms: parse_env("EVAL_CALL_TIMEOUT_MS").unwrap_or(60000),
            identity: env::var("EVAL_IDENTITY").ok().filter(|s| !s.is_empty()),
        };

        let defaults = WinnerWeights::default();
        let weights = WinnerWeights {
            quality: parse_env("WEIGHT_QUALITY").unwrap_or(defaults.quality),
            performance: parse_env("WEIGHT_PERFORMANCE").unwrap_or(defaults.performance),
            memory_effectiveness: parse_env("WEIGHT_MEMORY")
                .unwrap_or(defaults.memory_effectiveness),
            user_experience: parse_env("WEIGHT_EXPERIENCE").unwrap_or(defaults.user_experience),
        };
        weights.validate().map_err(|message| AppError::Config { message })?;

        Ok(Config {
            langbase,
            database,
            logging,
            request,
            pipes,
            evaluation,
            weights,
        })
    }
}

impl DatabaseConfig {
    /// Database settings alone; commands that never call the judge use this
    /// instead of [`Config::from_env`].
    pub fn from_env() -> Self {
        Self {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/memory-bench.db".to_string()),
            ),
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS").unwrap_or(5),
        }
    }
}

impl LoggingConfig {
    /// Logging settings alone, readable before the full configuration.
    pub fn from_env() -> Self {
        Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            call_timeout_ms: 60000,
            identity: None,
        }
    }
}
