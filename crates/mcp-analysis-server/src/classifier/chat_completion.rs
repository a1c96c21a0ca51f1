use super::{Classifier, ClassifierError};
use crate::constants::CHAT_COMPLETIONS_PATH;
use crate::model::check::ClassificationPrompt;
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where and how to reach an OpenAI-compatible chat completion backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatCompletionConfiguration {
    pub base_url: String,
    pub model: String,
    pub timeout: Option<Duration>,
    pub api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Classifier backed by `POST {base_url}/v1/chat/completions`.
///
/// Requests are sent with a temperature of zero so that scanning an
/// unchanged description gives the same answer every time.
pub struct ChatCompletionClassifier {
    client: reqwest::Client,
    url: Url,
    model: String,
    api_key: Option<String>,
}

impl ChatCompletionClassifier {
    pub fn new(configuration: &ChatCompletionConfiguration) -> Result<Self, ClassifierError> {
        let url = format!(
            "{}{}",
            configuration.base_url.trim_end_matches('/'),
            CHAT_COMPLETIONS_PATH
        );
        let url = Url::parse(&url)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or_else(|| ClassifierError::InvalidUrl(configuration.base_url.clone()))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = configuration.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            url,
            model: configuration.model.clone(),
            api_key: configuration.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait]
impl Classifier for ChatCompletionClassifier {
    async fn classify(&self, prompt: &ClassificationPrompt) -> Result<String, ClassifierError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        };

        let mut request = self.client.post(self.url.clone()).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or(ClassifierError::MalformedResponse)
    }
}
