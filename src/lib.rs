pub mod config;
pub mod error;
pub mod ffi;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod splitter;
pub mod textutil;
pub mod tokenizer;

pub use error::{CompletionError, TemplateError, TranslateError};
pub use models::{CompletionClient, OpenAiClient, OpenAiConfig};
pub use pipeline::{Stage, Translation, TranslationAgent, TranslationRequest};
pub use tokenizer::{SplitDecision, TiktokenCounter, TokenCounter};
