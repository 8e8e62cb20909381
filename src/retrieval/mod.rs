//! Retrieval adapter boundary.
//!
//! Every memory backend method is reached through [`RetrievalAdapter`]. Raw
//! backend payloads are mapped into [`RetrievedContent`] by one normalizer per
//! response shape (see [`normalize`]), so shape tolerance lives in one place.

mod http;
mod normalize;

pub use http::*;
pub use normalize::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalResult;

/// A single structured item returned by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedItem {
    /// Main text of the item.
    pub content: String,
    /// Extra labelled attributes rendered before the content, in order.
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
}

impl RetrievedItem {
    /// Create an item with only content.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            attributes: Vec::new(),
        }
    }

    /// Append a labelled attribute.
    pub fn with_attribute(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((label.into(), value.into()));
        self
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (label, value) in &self.attributes {
            out.push_str(label);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out.push_str("content: ");
        out.push_str(&self.content);
        out
    }
}

/// What a retrieval method returned, before scoring.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RetrievedContent {
    /// Nothing found.
    #[default]
    Empty,
    /// A plain text block.
    Text(String),
    /// A list of structured items.
    Items(Vec<RetrievedItem>),
}

impl RetrievedContent {
    /// Whether there is nothing to score.
    pub fn is_empty(&self) -> bool {
        match self {
            RetrievedContent::Empty => true,
            RetrievedContent::Text(t) => t.trim().is_empty(),
            RetrievedContent::Items(items) => items.is_empty(),
        }
    }

    /// Flatten into the text handed to the judge. Items are separated by a
    /// blank line; empty content renders as an empty string.
    pub fn to_text(&self) -> String {
        match self {
            RetrievedContent::Empty => String::new(),
            RetrievedContent::Text(t) => t.trim().to_string(),
            RetrievedContent::Items(items) => items
                .iter()
                .map(RetrievedItem::render)
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// One retrieval method of one memory backend.
#[async_trait]
pub trait RetrievalAdapter: Send + Sync {
    /// Stable method identifier used as the aggregation key.
    fn method_id(&self) -> &str;

    /// Human label passed to the judge. Defaults to the method id.
    fn label(&self) -> &str {
        self.method_id()
    }

    /// Retrieve memory relevant to `query` for the optional identity.
    async fn retrieve(
        &self,
        query: &str,
        identity: Option<&str>,
    ) -> RetrievalResult<RetrievedContent>;
}
