use thiserror::Error;

use crate::pipeline::Stage;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {template}: missing variable `{name}`")]
    MissingVariable { template: String, name: String },

    #[error("template {template}: unterminated placeholder at byte {offset}")]
    Unterminated { template: String, offset: usize },
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned error status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no completion choices returned")]
    NoChoices,

    #[error("completion backend: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("unit {index} failed at {stage}: {source}")]
    Unit {
        index: usize,
        stage: Stage,
        #[source]
        source: Box<TranslateError>,
    },
}

impl TranslateError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn in_unit(self, index: usize, stage: Stage) -> Self {
        Self::Unit {
            index,
            stage,
            source: Box::new(self),
        }
    }
}
