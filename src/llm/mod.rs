//! Upstream text generation
//!
//! A small chat-completions client behind the `TextGenerator` trait.

mod client;
mod error;
mod types;

pub use client::{ChatCompletionClient, TextGenerator};
pub use error::LlmError;
pub use types::{ChatCompletionBody, ChatCompletionResponse, CompletionRequest};
