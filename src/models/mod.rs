pub mod openai;

use crate::error::CompletionError;

pub use openai::{OpenAiClient, OpenAiConfig};

pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

/// A chat-completion backend: one system message, one user prompt, one reply.
///
/// Implementations must be shareable across worker threads; the pipeline may issue
/// calls for several chunks of the same stage at once.
pub trait CompletionClient: Send + Sync {
    fn complete(&self, prompt: &str, system_message: &str) -> Result<String, CompletionError>;
}

impl<C: CompletionClient + ?Sized> CompletionClient for &C {
    fn complete(&self, prompt: &str, system_message: &str) -> Result<String, CompletionError> {
        (**self).complete(prompt, system_message)
    }
}

impl<C: CompletionClient + ?Sized> CompletionClient for Box<C> {
    fn complete(&self, prompt: &str, system_message: &str) -> Result<String, CompletionError> {
        (**self).complete(prompt, system_message)
    }
}
