use crate::config::LlmConfig;
use crate::llm::prompt::ChatTurn;
use crate::llm::{CompletionClient, GatewayError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Client for the YandexGPT text-completion endpoint.
///
/// Issues exactly one HTTP request per call with a bounded total timeout and
/// never retries. SQL safety is not enforced here; the query validator runs
/// downstream.
pub struct YandexGptClient {
    client: reqwest::Client,
    endpoint_url: String,
    api_key: String,
    folder_id: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest<'a> {
    model_uri: String,
    completion_options: CompletionOptions,
    messages: &'a [ChatTurn],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    stream: bool,
    temperature: f32,
    // The endpoint expects this as a string.
    max_tokens: String,
}

/// The endpoint answers either `{"result": {"alternatives": [...]}}` or the
/// same payload without the `result` wrapper. Resolved once at parse time.
#[derive(Deserialize)]
#[serde(untagged)]
enum CompletionResponse {
    Nested { result: CompletionResult },
    Flat(CompletionResult),
}

#[derive(Deserialize)]
struct CompletionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Deserialize)]
struct Alternative {
    message: AlternativeMessage,
}

#[derive(Deserialize)]
struct AlternativeMessage {
    #[serde(default)]
    text: String,
}

impl YandexGptClient {
    pub fn new(config: &LlmConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(config.timeout_seconds))
            .build()
            .map_err(|e| GatewayError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            endpoint_url: config.endpoint_url.clone(),
            api_key: config.api_key.clone(),
            folder_id: config.folder_id.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionClient for YandexGptClient {
    async fn complete(&self, conversation: &[ChatTurn]) -> Result<String, GatewayError> {
        if self.api_key.trim().is_empty() {
            return Err(GatewayError::Config("llm.api_key is empty".to_string()));
        }
        if self.folder_id.trim().is_empty() {
            return Err(GatewayError::Config("llm.folder_id is empty".to_string()));
        }

        let request = CompletionRequest {
            model_uri: format!("gpt://{}/yandexgpt/rc", self.folder_id),
            completion_options: CompletionOptions {
                stream: false,
                temperature: self.temperature,
                max_tokens: self.max_tokens.to_string(),
            },
            messages: conversation,
        };

        let response = self
            .client
            .post(&self.endpoint_url)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        // Read the body as text so a non-standard content-type declaration
        // cannot break parsing.
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Connection(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = extract_completion_text(&body)?;
        let sql = clean_candidate_sql(&text);
        debug!("Candidate SQL from completion: {}", sql);
        Ok(sql)
    }
}

/// Pulls the first alternative's message text out of a completion body.
fn extract_completion_text(body: &str) -> Result<String, GatewayError> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::Response(format!("unparseable body: {} - {}", e, body)))?;

    let result = match response {
        CompletionResponse::Nested { result } => result,
        CompletionResponse::Flat(result) => result,
    };

    let first = result
        .alternatives
        .first()
        .ok_or_else(|| GatewayError::Response(format!("empty alternatives: {}", body)))?;

    let text = first.message.text.trim();
    if text.is_empty() {
        return Err(GatewayError::Response(format!(
            "empty message text: {}",
            body
        )));
    }

    Ok(text.to_string())
}

/// Strips markdown fencing (with an optional language tag on the opening
/// fence) and a trailing statement terminator from the completion text.
fn clean_candidate_sql(raw: &str) -> String {
    let mut text = raw.trim();

    if text.starts_with("```") {
        text = match text.split_once('\n') {
            Some((_, rest)) => rest,
            None => "",
        };
        if let Some(end) = text.rfind("```") {
            text = &text[..end];
        }
        text = text.trim();
    }

    match text.strip_suffix(';') {
        Some(stripped) => stripped.trim_end().to_string(),
        None => text.to_string(),
    }
}
