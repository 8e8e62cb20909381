//! Langbase pipes client, used as the transport for the LLM judge.

mod client;
mod types;

pub use client::*;
pub use types::*;
