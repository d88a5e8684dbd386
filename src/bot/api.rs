use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum BotError {
    Config(String),
    Connection(String),
    Api(String),
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotError::Config(msg) => write!(f, "bot configuration error: {}", msg),
            BotError::Connection(msg) => write!(f, "bot connection error: {}", msg),
            BotError::Api(msg) => write!(f, "bot API error: {}", msg),
        }
    }
}

impl Error for BotError {}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<T>,
}

#[derive(Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Thin client for the two Telegram Bot API methods the dispatcher needs:
/// `getUpdates` long polling and `sendMessage`.
pub struct TelegramApi {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramApi {
    pub fn new(token: &str, poll_timeout_seconds: u64) -> Result<Self, BotError> {
        if token.trim().is_empty() {
            return Err(BotError::Config("telegram.token is empty".to_string()));
        }

        // The HTTP deadline sits above the long-poll window so an idle poll
        // is not reported as a transport failure.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_seconds + 10))
            .build()
            .map_err(|e| BotError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: format!("https://api.telegram.org/bot{}", token),
        })
    }

    pub async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>, BotError> {
        let request = GetUpdatesRequest {
            offset,
            timeout,
            allowed_updates: ["message"],
        };

        let envelope: ApiEnvelope<Vec<Update>> = self.call("getUpdates", &request).await?;
        Ok(envelope.result.unwrap_or_default())
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), BotError> {
        let request = SendMessageRequest { chat_id, text };
        let _: ApiEnvelope<serde_json::Value> = self.call("sendMessage", &request).await?;
        Ok(())
    }

    async fn call<T, R>(&self, method: &str, request: &R) -> Result<ApiEnvelope<T>, BotError>
    where
        T: serde::de::DeserializeOwned + Default,
        R: Serialize,
    {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(request)
            .send()
            .await
            .map_err(|e| BotError::Connection(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BotError::Connection(e.to_string()))?;

        let envelope: ApiEnvelope<T> = serde_json::from_str(&body)
            .map_err(|e| BotError::Api(format!("{} returned unparseable body: {}", method, e)))?;

        if !status.is_success() || !envelope.ok {
            return Err(BotError::Api(format!(
                "{} failed with status {}: {}",
                method,
                status,
                envelope.description.unwrap_or(body)
            )));
        }

        Ok(envelope)
    }
}
