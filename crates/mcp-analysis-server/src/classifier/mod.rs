pub mod chat_completion;

use crate::model::check::ClassificationPrompt;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Invalid classifier backend address {0:?}")]
    InvalidUrl(String),
    #[error("Error sending the classification request: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Classifier backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Classifier backend returned a response without message content")]
    MalformedResponse,
}

/// A language model that answers a classification prompt with free text.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, prompt: &ClassificationPrompt) -> Result<String, ClassifierError>;
}
