pub mod client;

pub use client::{Completion, CompletionRequest, LlmClient, LlmError, Part};
