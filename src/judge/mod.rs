//! Similarity judge: the external scorer rating retrieved content against
//! the expected answer, plus the engine-owned parser for its output.

mod parse;

pub use parse::*;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{JudgeError, JudgeResult};
use crate::langbase::{LangbaseClient, Message, PipeRequest, PipeSpec};
use crate::prompts::{build_judge_prompt, JUDGE_SYSTEM_PROMPT};

/// External judge returning free text that contains a 0-10 score.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SimilarityJudge: Send + Sync {
    /// Rate `retrieved` against `expected` for `query`.
    async fn score(
        &self,
        query: &str,
        retrieved: &str,
        expected: &str,
        method_label: &str,
    ) -> JudgeResult<String>;
}

/// Judge backed by a Langbase pipe.
#[derive(Clone)]
pub struct LangbaseJudge {
    client: LangbaseClient,
    pipe_name: String,
}

impl LangbaseJudge {
    /// Create a judge using the given pipe.
    pub fn new(client: LangbaseClient, pipe_name: impl Into<String>) -> Self {
        Self {
            client,
            pipe_name: pipe_name.into(),
        }
    }

    /// Pipe name used for scoring.
    pub fn pipe_name(&self) -> &str {
        &self.pipe_name
    }

    /// Create the judge pipe if it does not exist yet.
    pub async fn ensure_pipe(&self) -> JudgeResult<()> {
        let spec = PipeSpec::scoring(
            &self.pipe_name,
            "Retrieval similarity judge for memory benchmarks",
            JUDGE_SYSTEM_PROMPT,
        );
        self.client.ensure_pipe(&spec).await?;
        Ok(())
    }
}

#[async_trait]
impl SimilarityJudge for LangbaseJudge {
    async fn score(
        &self,
        query: &str,
        retrieved: &str,
        expected: &str,
        method_label: &str,
    ) -> JudgeResult<String> {
        let messages = vec![
            Message::system(JUDGE_SYSTEM_PROMPT),
            Message::user(build_judge_prompt(query, method_label, retrieved, expected)),
        ];

        let response = self
            .client
            .call_pipe(PipeRequest::new(&self.pipe_name, messages))
            .await?;

        debug!(
            pipe = %self.pipe_name,
            method = %method_label,
            completion_len = response.completion.len(),
            "Judge responded"
        );

        if response.completion.trim().is_empty() {
            return Err(JudgeError::EmptyCompletion);
        }
        Ok(response.completion)
    }
}
