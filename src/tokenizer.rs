use std::fmt;
use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::error::TranslateError;

/// Maps text to a token count. Must be deterministic for a given encoding.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

/// BPE counter backed by the tiktoken vocabularies.
#[derive(Clone)]
pub struct TiktokenCounter {
    identifier: String,
    bpe: Arc<CoreBPE>,
}

impl TiktokenCounter {
    pub fn for_encoding(name: &str) -> Result<Self, TranslateError> {
        let name = name.trim();
        let bpe = match name {
            "o200k_base" => tiktoken_rs::o200k_base(),
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "p50k_edit" => tiktoken_rs::p50k_edit(),
            "r50k_base" | "gpt2" => tiktoken_rs::r50k_base(),
            other => {
                return Err(TranslateError::configuration(format!(
                    "unknown token encoding: {other}"
                )))
            }
        }
        .map_err(|e| TranslateError::configuration(format!("load encoding {name}: {e}")))?;
        Ok(Self {
            identifier: name.to_string(),
            bpe: Arc::new(bpe),
        })
    }

    pub fn for_model(model: &str) -> Result<Self, TranslateError> {
        let model = model.trim();
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| {
            TranslateError::configuration(format!("no tokenizer for model {model}: {e}"))
        })?;
        Ok(Self {
            identifier: model.to_string(),
            bpe: Arc::new(bpe),
        })
    }

    /// An explicit encoding wins over the one implied by the model name.
    pub fn resolve(model: &str, encoding: Option<&str>) -> Result<Self, TranslateError> {
        match encoding.map(str::trim).filter(|s| !s.is_empty()) {
            Some(enc) => Self::for_encoding(enc),
            None => Self::for_model(model),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

impl fmt::Debug for TiktokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiktokenCounter")
            .field("identifier", &self.identifier)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitDecision {
    NoSplitNeeded { num_tokens: usize },
    SplitRequired { num_tokens: usize, chunk_size: usize },
}

impl SplitDecision {
    pub fn num_tokens(&self) -> usize {
        match *self {
            Self::NoSplitNeeded { num_tokens } | Self::SplitRequired { num_tokens, .. } => {
                num_tokens
            }
        }
    }
}

pub fn decide_split(
    counter: &dyn TokenCounter,
    text: &str,
    token_budget: usize,
) -> Result<SplitDecision, TranslateError> {
    if token_budget == 0 {
        return Err(TranslateError::configuration(
            "token budget must be at least 1",
        ));
    }
    let num_tokens = counter.count_tokens(text);
    if num_tokens <= token_budget {
        return Ok(SplitDecision::NoSplitNeeded { num_tokens });
    }
    Ok(SplitDecision::SplitRequired {
        num_tokens,
        chunk_size: calculate_chunk_size(num_tokens, token_budget),
    })
}

/// Spreads `num_tokens` evenly over the fewest chunks that fit the budget.
/// The result is clamped to `1..=token_budget`.
pub fn calculate_chunk_size(num_tokens: usize, token_budget: usize) -> usize {
    let budget = token_budget.max(1);
    if num_tokens <= budget {
        return num_tokens.max(1);
    }
    let num_chunks = num_tokens.div_ceil(budget);
    let mut chunk_size = num_tokens / num_chunks;
    let remaining = num_tokens % budget;
    if remaining > 0 {
        chunk_size += remaining / num_chunks;
    }
    chunk_size.clamp(1, budget)
}
