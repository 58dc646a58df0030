//! Chat-completion access and the prompt fragments built on top of it.

mod api;
pub mod prompts;

pub use api::{Completion, CompletionOptions, LlmApiClient};
