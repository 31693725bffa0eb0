use std::fmt;
use thiserror::Error;

use crate::constants::{BOT_TOKEN_PATTERN, CHAT_ID_PATTERN};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("bot token is not set")]
    MissingToken,
    #[error("bot token format is invalid (expected '<bot id>:<secret>')")]
    MalformedToken,
    #[error("chat id is not set")]
    MissingChatId,
    #[error("chat id '{0}' is invalid (expected digits only)")]
    MalformedChatId(String),
}

/// Bot token plus the default chat that receives notifications.
///
/// Construction never fails so that a broken environment can still be
/// represented; [`Credentials::validate`] is what the notifier checks before
/// touching the network.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    bot_token: String,
    chat_id: String,
}

impl Credentials {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into().trim().to_owned(),
            chat_id: chat_id.into().trim().to_owned(),
        }
    }

    pub fn bot_token(&self) -> &str {
        &self.bot_token
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn validate(&self) -> Result<(), CredentialsError> {
        if self.bot_token.is_empty() {
            return Err(CredentialsError::MissingToken);
        }
        if !BOT_TOKEN_PATTERN.is_match(&self.bot_token) {
            return Err(CredentialsError::MalformedToken);
        }
        validate_chat_id(&self.chat_id)
    }

    /// Token safe to print: keeps the first 10 and last 4 characters.
    pub fn masked_token(&self) -> String {
        let chars: Vec<char> = self.bot_token.chars().collect();
        if chars.len() <= 20 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..10].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bot_token", &self.masked_token())
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

pub fn validate_chat_id(chat_id: &str) -> Result<(), CredentialsError> {
    if chat_id.is_empty() {
        return Err(CredentialsError::MissingChatId);
    }
    if !CHAT_ID_PATTERN.is_match(chat_id) {
        return Err(CredentialsError::MalformedChatId(chat_id.to_owned()));
    }
    Ok(())
}
