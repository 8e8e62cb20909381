use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid configuration or input file.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Evaluation failure.
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// Run history failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Judge API failure.
    #[error("Langbase error: {0}")]
    Langbase(#[from] LangbaseError),

    /// Report rendering or writing failed.
    #[error("Report error: {message}")]
    Report { message: String },

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bug or unexpected state.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Whether this error is a fatal misconfiguration (as opposed to an
    /// infrastructure failure). Drives the CLI exit code.
    pub fn is_configuration(&self) -> bool {
        match self {
            AppError::Config { .. } => true,
            AppError::Eval(e) => e.is_configuration(),
            _ => false,
        }
    }
}

/// Evaluation engine errors.
///
/// Configuration variants abort a run before any report is produced.
/// Transient retrieval/judge failures never surface here.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Corpus without scenarios.
    #[error("Corpus '{corpus}' has no scenarios")]
    EmptyCorpus { corpus: String },

    /// Scenario without test cases.
    #[error("Scenario '{scenario}' has no test cases")]
    EmptyScenario { scenario: String },

    /// No scenario produced an aggregate.
    #[error("Framework '{framework}' produced no scenario aggregates")]
    NoScenarios { framework: String },

    /// Two scenarios share a name.
    #[error("Duplicate scenario name in corpus: {name}")]
    DuplicateScenario { name: String },

    /// Scenario name not in the corpus.
    #[error("Unknown scenario: {name}")]
    UnknownScenario { name: String },

    /// Empty benchmark plan.
    #[error("Benchmark plan lists no frameworks")]
    NoFrameworks,

    /// Framework listed twice.
    #[error("Framework '{name}' is listed more than once")]
    DuplicateFramework { name: String },

    /// Framework without methods.
    #[error("Framework '{framework}' has no methods configured")]
    NoMethods { framework: String },

    /// Core method not among the methods.
    #[error("Core method '{method_id}' is missing for framework '{framework}'")]
    MissingCoreMethod { framework: String, method_id: String },

    /// Two methods of one framework share an id.
    #[error("Method '{method_id}' is configured more than once for framework '{framework}'")]
    DuplicateMethod { framework: String, method_id: String },

    /// The frameworks share no scenario.
    #[error("Frameworks '{framework_a}' and '{framework_b}' share no scenarios")]
    DisjointScenarios {
        framework_a: String,
        framework_b: String,
    },

    /// Aggregation produced inconsistent numbers.
    #[error("Aggregation invariant violated: {message}")]
    InvariantViolation { message: String },

    /// A spawned evaluation task panicked or was aborted.
    #[error("Evaluation task failed: {message}")]
    TaskFailed { message: String },

    /// Run interrupted by shutdown.
    #[error("Run of '{framework}' cancelled after {completed} scenario(s)")]
    Cancelled { framework: String, completed: usize },

    /// Transcript without turns.
    #[error("Conversation has no turns")]
    EmptyConversation,
}

impl EvalError {
    /// Configuration errors are caller mistakes; everything else is a bug or
    /// a deliberate interruption.
    pub fn is_configuration(&self) -> bool {
        !matches!(
            self,
            EvalError::InvariantViolation { .. }
                | EvalError::TaskFailed { .. }
                | EvalError::Cancelled { .. }
        )
    }
}

/// Retrieval adapter errors. Always contained by the case evaluator.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Retries exhausted.
    #[error("Retrieval backend unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    /// Non-2xx response.
    #[error("Retrieval API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body has an unexpected shape.
    #[error("Unexpected retrieval response shape: {message}")]
    InvalidResponse { message: String },

    /// Request timed out.
    #[error("Retrieval timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Similarity judge errors. Always contained by the case evaluator.
#[derive(Debug, Error)]
pub enum JudgeError {
    /// Pipe run failed.
    #[error("Judge transport failed: {0}")]
    Langbase(#[from] LangbaseError),

    /// Judge call exceeded its deadline.
    #[error("Judge timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Completion text was empty.
    #[error("Judge returned an empty completion")]
    EmptyCompletion,
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Cannot open the database.
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    /// Query failed.
    #[error("Query failed: {message}")]
    Query { message: String },

    /// No run with this id.
    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    /// Migration failed.
    #[error("Migration failed: {message}")]
    Migration { message: String },

    /// Stored JSON cannot be decoded.
    #[error("Stored payload is corrupt: {0}")]
    Payload(#[from] serde_json::Error),

    /// Driver error.
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Langbase API errors
#[derive(Debug, Error)]
pub enum LangbaseError {
    /// Retries exhausted.
    #[error("Langbase unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    /// Non-2xx response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body cannot be decoded.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    /// Request timed out.
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;

/// Result type alias for retrieval operations
pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// Result type alias for judge operations
pub type JudgeResult<T> = Result<T, JudgeError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for Langbase operations
pub type LangbaseResult<T> = Result<T, LangbaseError>;
