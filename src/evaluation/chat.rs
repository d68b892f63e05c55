//! OpenAI-compatible chat-completions client

use crate::config::EvaluationConfig;
use crate::evaluation::{Completion, EvaluationError, Evaluator};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are an expert UX evaluator conducting heuristic evaluations. \
Give structured answers with specific scores and evidence from the page. \
Follow the evaluation criteria in the prompt exactly and finish with a line of the form \
\"Overall Numeric Score for <heuristic>: <score>\".";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<UsageBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageBody {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// [`Evaluator`] calling `{api_base}/chat/completions`
pub struct ChatEvaluator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ChatEvaluator {
    /// Creates an evaluator
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for every call
    /// * `api_base` - Base URL such as `https://api.openai.com/v1`
    /// * `api_key` - Bearer token
    /// * `model` - Model id sent with each request
    /// * `max_tokens` - Upper bound on completion tokens per call
    pub fn new(
        client: Client,
        api_base: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        }
    }

    /// Builds an evaluator from `[evaluation]`, reading the key from the environment
    pub fn from_config(config: &EvaluationConfig, timeout: Duration) -> Result<Self, EvaluationError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| EvaluationError::MissingApiKey(config.api_key_env.clone()))?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self::new(
            client,
            &config.api_base,
            api_key,
            &config.model,
            config.max_output_tokens,
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Evaluator for ChatEvaluator {
    async fn evaluate(&self, prompt: &str, content: &str) -> Result<Completion, EvaluationError> {
        let user_message = format!("{}\n\nPage Content:\n{}", prompt, content);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_message,
                },
            ],
            temperature: 0.0,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EvaluationError::Api {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| EvaluationError::MalformedResponse(e.to_string()))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| EvaluationError::MalformedResponse("no choices in response".to_string()))?;

        let (input_tokens, output_tokens) = match body.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => {
                tracing::warn!("Response from {} carried no usage block", self.endpoint);
                (0, 0)
            }
        };

        Ok(Completion {
            text,
            input_tokens,
            output_tokens,
        })
    }
}
