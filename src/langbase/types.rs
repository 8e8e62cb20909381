use serde::{Deserialize, Serialize};

/// Chat role understood by Langbase pipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model.
    System,
    /// End-user input.
    User,
}

/// One chat message sent to a pipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Message {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Body of `POST /v1/pipes/run`. Scoring never streams.
#[derive(Debug, Clone, Serialize)]
pub struct PipeRequest {
    /// Pipe name.
    pub name: String,
    /// Conversation sent to the pipe.
    pub messages: Vec<Message>,
    /// Always `false`.
    pub stream: bool,
}

impl PipeRequest {
    /// A non-streaming run of pipe `name`.
    pub fn new(name: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            name: name.into(),
            messages,
            stream: false,
        }
    }
}

/// The parts of a pipe run response the judge reads. Unknown fields
/// (`success`, `threadId`, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct PipeResponse {
    /// Generated text.
    #[serde(default)]
    pub completion: String,
    #[serde(default)]
    raw: Option<RawCompletion>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawCompletion {
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenUsage {
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl PipeResponse {
    /// Total tokens billed for the run, when the provider reported them.
    pub fn total_tokens(&self) -> Option<u32> {
        self.raw.as_ref()?.usage.as_ref()?.total_tokens
    }
}

/// Everything needed to provision a pipe.
///
/// Judge pipes run deterministically (temperature 0) with a short
/// completion budget; a verdict is a score plus one or two sentences.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeSpec {
    /// Pipe name.
    pub name: String,
    /// Shown in the Langbase dashboard.
    pub description: String,
    /// `provider:model` id.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token budget.
    pub max_tokens: u32,
    /// System prompt.
    pub system_prompt: String,
}

impl PipeSpec {
    /// Default model used for judge pipes.
    pub const DEFAULT_MODEL: &'static str = "openai:gpt-4o-mini";

    /// A deterministic scoring pipe.
    pub fn scoring(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            model: Self::DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 600,
            system_prompt: system_prompt.into(),
        }
    }
}

/// Body of `POST /v1/pipes`. Always an upsert, so re-provisioning a pipe
/// refreshes its prompt.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePipeRequest {
    /// Pipe name.
    pub name: String,
    /// Pipe description.
    pub description: String,
    /// `provider:model` id.
    pub model: String,
    /// Update the pipe if it exists.
    pub upsert: bool,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token budget.
    pub max_tokens: u32,
    /// Prompt messages.
    pub messages: Vec<Message>,
}

impl From<&PipeSpec> for CreatePipeRequest {
    fn from(spec: &PipeSpec) -> Self {
        Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            model: spec.model.clone(),
            upsert: true,
            temperature: spec.temperature,
            max_tokens: spec.max_tokens,
            messages: vec![Message::system(spec.system_prompt.clone())],
        }
    }
}

/// Response of `POST /v1/pipes`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePipeResponse {
    /// Name of the created pipe.
    pub name: String,
    /// Pipe URL.
    #[serde(default)]
    pub url: String,
}
