use thiserror::Error;

use crate::credentials::CredentialsError;

/// Why a delivery did not happen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] CredentialsError),
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    /// HTTP 401, the bot token was rejected.
    #[error("Bot token is invalid or unauthorized: {description}")]
    Authentication { description: String },
    /// HTTP 400, usually the chat does not exist or the bot was never started there.
    #[error("Chat id is invalid or unreachable: {description}")]
    InvalidRecipient { description: String },
    #[error("Transient network error: {0}")]
    TransientNetwork(String),
    #[error("Unexpected API response{}: {description}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    UnknownApi {
        status: Option<u16>,
        description: String,
    },
}

impl DeliveryError {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            DeliveryError::Authentication { .. } => Some(401),
            DeliveryError::InvalidRecipient { .. } => Some(400),
            DeliveryError::UnknownApi { status, .. } => *status,
            DeliveryError::Configuration(_)
            | DeliveryError::InvalidMessage(_)
            | DeliveryError::TransientNetwork(_) => None,
        }
    }

    /// Failure reason, verbatim from the API where it supplied one.
    pub fn reason(&self) -> String {
        match self {
            DeliveryError::Authentication { description }
            | DeliveryError::InvalidRecipient { description }
            | DeliveryError::UnknownApi { description, .. } => description.clone(),
            DeliveryError::Configuration(err) => err.to_string(),
            DeliveryError::InvalidMessage(reason) | DeliveryError::TransientNetwork(reason) => {
                reason.clone()
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::TransientNetwork(_) => true,
            DeliveryError::UnknownApi {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// What the operator should check next.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            DeliveryError::Configuration(_) => {
                Some("Check TG_BOT_TOKEN and TG_CHAT_ID in your environment or .env file")
            }
            DeliveryError::Authentication { .. } => {
                Some("Make sure you copied the token correctly from @BotFather")
            }
            DeliveryError::InvalidRecipient { .. } => {
                Some("Make sure the chat id is right and you have sent /start to the bot")
            }
            DeliveryError::TransientNetwork(_) => Some("Check your connection and try again"),
            DeliveryError::InvalidMessage(_) | DeliveryError::UnknownApi { .. } => None,
        }
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            DeliveryError::TransientNetwork(format!("request timed out: {}", err))
        } else if err.is_connect() || err.is_request() || err.is_body() {
            DeliveryError::TransientNetwork(err.to_string())
        } else {
            DeliveryError::UnknownApi {
                status: err.status().map(|s| s.as_u16()),
                description: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_reason() {
        let err = DeliveryError::InvalidRecipient {
            description: "Bad Request: chat not found".to_owned(),
        };
        assert_eq!(err.http_status(), Some(400));
        assert_eq!(err.reason(), "Bad Request: chat not found");

        let err = DeliveryError::Configuration(CredentialsError::MissingToken);
        assert_eq!(err.http_status(), None);
        assert_eq!(err.reason(), "bot token is not set");
    }

    #[test]
    fn test_retryable_classes() {
        assert!(DeliveryError::TransientNetwork("reset".to_owned()).is_retryable());
        for status in [429, 500, 502] {
            let err = DeliveryError::UnknownApi {
                status: Some(status),
                description: String::new(),
            };
            assert!(err.is_retryable(), "status {}", status);
        }

        let not_retryable = [
            DeliveryError::Authentication {
                description: "Unauthorized".to_owned(),
            },
            DeliveryError::InvalidRecipient {
                description: "Bad Request".to_owned(),
            },
            DeliveryError::UnknownApi {
                status: Some(403),
                description: "Forbidden".to_owned(),
            },
            DeliveryError::UnknownApi {
                status: None,
                description: "garbage".to_owned(),
            },
            DeliveryError::InvalidMessage("empty".to_owned()),
            DeliveryError::Configuration(CredentialsError::MalformedToken),
        ];
        for err in not_retryable {
            assert!(!err.is_retryable(), "{:?}", err);
        }
    }

    #[test]
    fn test_hints() {
        let err = DeliveryError::InvalidRecipient {
            description: "Bad Request: chat not found".to_owned(),
        };
        assert!(err.hint().unwrap().contains("/start"));
        let err = DeliveryError::Authentication {
            description: "Unauthorized".to_owned(),
        };
        assert!(err.hint().unwrap().contains("@BotFather"));
        assert_eq!(DeliveryError::InvalidMessage("empty".to_owned()).hint(), None);
    }

    #[test]
    fn test_display_includes_status() {
        let err = DeliveryError::UnknownApi {
            status: Some(502),
            description: "Bad Gateway".to_owned(),
        };
        assert_eq!(err.to_string(), "Unexpected API response (502): Bad Gateway");

        let err = DeliveryError::UnknownApi {
            status: None,
            description: "not json".to_owned(),
        };
        assert_eq!(err.to_string(), "Unexpected API response: not json");
    }
}
