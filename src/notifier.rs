use futures::future::join_all;
use reqwest::StatusCode;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DEFAULT_RETRY_BASE_DELAY, TELEGRAM_API_URL};
use crate::credentials::{validate_chat_id, Credentials};
use crate::error::DeliveryError;

/// Longest text the Bot API accepts in a single message.
pub const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    Markdown,
    MarkdownV2,
    #[serde(rename = "HTML")]
    Html,
}

impl FromStr for ParseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" => Ok(ParseMode::Markdown),
            "markdownv2" => Ok(ParseMode::MarkdownV2),
            "html" => Ok(ParseMode::Html),
            other => Err(format!("unknown parse mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub chat_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
}

impl OutboundMessage {
    pub fn new(text: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            parse_mode: None,
        }
    }

    /// Message addressed to the chat configured alongside the bot token.
    pub fn to_default_chat(text: impl Into<String>, credentials: &Credentials) -> Self {
        Self::new(text, credentials.chat_id())
    }

    pub fn with_parse_mode(mut self, parse_mode: Option<ParseMode>) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    fn validate(&self) -> Result<(), DeliveryError> {
        if self.text.is_empty() {
            return Err(DeliveryError::InvalidMessage(
                "message text is empty".to_owned(),
            ));
        }
        let length = self.text.chars().count();
        if length > MAX_MESSAGE_CHARS {
            return Err(DeliveryError::InvalidMessage(format!(
                "message text is {} characters long, the limit is {}",
                length, MAX_MESSAGE_CHARS
            )));
        }
        validate_chat_id(&self.chat_id)?;
        Ok(())
    }
}

/// Outcome of a single delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum DeliveryResult {
    Success,
    Failure(DeliveryError),
}

impl DeliveryResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryResult::Success)
    }

    pub fn error(&self) -> Option<&DeliveryError> {
        match self {
            DeliveryResult::Success => None,
            DeliveryResult::Failure(err) => Some(err),
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        self.error().and_then(DeliveryError::http_status)
    }

    pub fn reason(&self) -> Option<String> {
        self.error().map(DeliveryError::reason)
    }

    pub fn into_result(self) -> Result<(), DeliveryError> {
        match self {
            DeliveryResult::Success => Ok(()),
            DeliveryResult::Failure(err) => Err(err),
        }
    }
}

impl From<Result<(), DeliveryError>> for DeliveryResult {
    fn from(result: Result<(), DeliveryError>) -> Self {
        match result {
            Ok(()) => DeliveryResult::Success,
            Err(err) => DeliveryResult::Failure(err),
        }
    }
}

/// Backoff schedule for [`Notifier::send_with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Pause after `attempt` failed attempts (1-based): `base_delay * 2^(attempt - 1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

/// Client for the Bot API methods the bot needs.
///
/// Cheap to clone; clones share the underlying connection pool. The timeout
/// given at construction bounds every request, including reading the body.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: reqwest::Client,
    api_url: String,
}

impl Notifier {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: TELEGRAM_API_URL.to_owned(),
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_owned();
        self
    }

    fn method_url(&self, credentials: &Credentials, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, credentials.bot_token(), method)
    }

    /// Delivers `message` with a single `sendMessage` call.
    ///
    /// Credentials and message are checked locally first; when either is
    /// invalid no request is made.
    pub async fn send(&self, message: &OutboundMessage, credentials: &Credentials) -> DeliveryResult {
        let result = self.deliver(message, credentials).await;
        match &result {
            Ok(()) => log::info!("Message delivered to chat {}", message.chat_id),
            Err(err) => log::warn!("Delivery to chat {} failed: {}", message.chat_id, err),
        }
        result.into()
    }

    async fn deliver(
        &self,
        message: &OutboundMessage,
        credentials: &Credentials,
    ) -> Result<(), DeliveryError> {
        credentials.validate()?;
        message.validate()?;

        log::info!(
            "Sending message to chat {} ({} chars)",
            message.chat_id,
            message.text.chars().count()
        );
        let response = self
            .client
            .post(self.method_url(credentials, "sendMessage"))
            .json(message)
            .send()
            .await
            .map_err(DeliveryError::from_transport)?;

        read_response::<IgnoredAny>(response).await.map(|_| ())
    }

    /// Like [`Notifier::send`], repeating retryable failures per `policy`.
    pub async fn send_with_retry(
        &self,
        message: &OutboundMessage,
        credentials: &Credentials,
        policy: &RetryPolicy,
    ) -> DeliveryResult {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self.send(message, credentials).await;
            let retry = match &result {
                DeliveryResult::Success => false,
                DeliveryResult::Failure(err) => err.is_retryable() && attempt < policy.max_attempts,
            };
            if !retry {
                return result;
            }

            let delay = policy.delay_after(attempt);
            log::warn!(
                "Attempt {}/{} failed, retrying in {:?}",
                attempt,
                policy.max_attempts,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Sends `text` to every chat concurrently. Results keep the order of `chat_ids`.
    pub async fn broadcast(
        &self,
        text: &str,
        chat_ids: &[String],
        credentials: &Credentials,
        parse_mode: Option<ParseMode>,
    ) -> Vec<(String, DeliveryResult)> {
        let sends = chat_ids.iter().map(|chat_id| async move {
            let message = OutboundMessage::new(text, chat_id.as_str()).with_parse_mode(parse_mode);
            let result = self.send(&message, credentials).await;
            (chat_id.clone(), result)
        });
        join_all(sends).await
    }

    /// Calls `getMe`, which succeeds only for a valid token.
    pub async fn get_me(&self, credentials: &Credentials) -> Result<BotIdentity, DeliveryError> {
        credentials.validate()?;

        let response = self
            .client
            .get(self.method_url(credentials, "getMe"))
            .send()
            .await
            .map_err(DeliveryError::from_transport)?;

        read_response::<BotIdentity>(response)
            .await?
            .ok_or_else(|| DeliveryError::UnknownApi {
                status: Some(StatusCode::OK.as_u16()),
                description: "getMe returned no result".to_owned(),
            })
    }
}

async fn read_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Option<T>, DeliveryError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(DeliveryError::from_transport)?;
    let parsed = serde_json::from_str::<ApiResponse<T>>(&body).ok();
    classify(status, parsed, &body)
}

fn classify<T>(
    status: StatusCode,
    parsed: Option<ApiResponse<T>>,
    body: &str,
) -> Result<Option<T>, DeliveryError> {
    let (ok, description, result) = match parsed {
        Some(api) => (api.ok, api.description, api.result),
        None => (false, None, None),
    };
    if status.is_success() && ok {
        return Ok(result);
    }

    let description = description.unwrap_or_else(|| fallback_description(status, body));
    Err(match status {
        StatusCode::UNAUTHORIZED => DeliveryError::Authentication { description },
        StatusCode::BAD_REQUEST => DeliveryError::InvalidRecipient { description },
        _ => DeliveryError::UnknownApi {
            status: Some(status.as_u16()),
            description,
        },
    })
}

fn fallback_description(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("no description")
            .to_owned();
    }
    body.chars().take(200).collect()
}
