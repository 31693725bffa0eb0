use std::time::Duration;
use thiserror::Error;

use crate::constants::{
    BOT_TOKEN_VAR, CHAT_ID_VAR, DEFAULT_RETRY_BASE_DELAY, DEFAULT_TIMEOUT, EXTRA_CHAT_IDS_VAR,
    LISTEN_COMMANDS_VAR, PARSE_MODE_VAR, RETRY_ATTEMPTS_VAR, RETRY_BASE_MS_VAR, TIMEOUT_SECS_VAR,
};
use crate::credentials::{validate_chat_id, Credentials, CredentialsError};
use crate::notifier::{ParseMode, RetryPolicy};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set in environment variables")]
    Missing(&'static str),
    #[error("{key} has an invalid value '{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0}")]
    Credentials(#[from] CredentialsError),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub extra_chat_ids: Vec<String>,
    pub parse_mode: Option<ParseMode>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub listen_commands: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let bot_token = get(BOT_TOKEN_VAR).ok_or(ConfigError::Missing(BOT_TOKEN_VAR))?;
        let chat_id = get(CHAT_ID_VAR).ok_or(ConfigError::Missing(CHAT_ID_VAR))?;
        let credentials = Credentials::new(bot_token, chat_id);
        credentials.validate()?;

        let extra_chat_ids = match get(EXTRA_CHAT_IDS_VAR) {
            Some(value) => parse_chat_ids(&value)?,
            None => Vec::new(),
        };

        let parse_mode = match get(PARSE_MODE_VAR) {
            None => Some(ParseMode::Markdown),
            Some(value) if value.eq_ignore_ascii_case("none") => None,
            Some(value) => Some(value.parse::<ParseMode>().map_err(|reason| ConfigError::InvalidValue {
                key: PARSE_MODE_VAR,
                value: value.clone(),
                reason,
            })?),
        };

        let timeout = match get(TIMEOUT_SECS_VAR) {
            Some(value) => match parse_number::<u64>(TIMEOUT_SECS_VAR, &value)? {
                0 => {
                    return Err(ConfigError::InvalidValue {
                        key: TIMEOUT_SECS_VAR,
                        value,
                        reason: "must be greater than zero".to_owned(),
                    })
                }
                secs => Duration::from_secs(secs),
            },
            None => DEFAULT_TIMEOUT,
        };

        let attempts = match get(RETRY_ATTEMPTS_VAR) {
            Some(value) => parse_number::<u32>(RETRY_ATTEMPTS_VAR, &value)?,
            None => 1,
        };
        let base_delay = match get(RETRY_BASE_MS_VAR) {
            Some(value) => Duration::from_millis(parse_number::<u64>(RETRY_BASE_MS_VAR, &value)?),
            None => DEFAULT_RETRY_BASE_DELAY,
        };

        let listen_commands = match get(LISTEN_COMMANDS_VAR) {
            Some(value) => parse_bool(LISTEN_COMMANDS_VAR, &value)?,
            None => true,
        };

        Ok(Self {
            credentials,
            extra_chat_ids,
            parse_mode,
            timeout,
            retry: RetryPolicy::exponential(attempts, base_delay),
            listen_commands,
        })
    }

    /// Default chat first, then the extra chats, without duplicates.
    pub fn all_chat_ids(&self) -> Vec<String> {
        let mut chat_ids = vec![self.credentials.chat_id().to_owned()];
        for chat_id in &self.extra_chat_ids {
            if !chat_ids.contains(chat_id) {
                chat_ids.push(chat_id.clone());
            }
        }
        chat_ids
    }

    pub fn log_summary(&self) {
        log::info!("Bot token: {}", self.credentials.masked_token());
        log::info!("Chat id: {}", self.credentials.chat_id());
        if !self.extra_chat_ids.is_empty() {
            log::info!("Extra chat ids: {}", self.extra_chat_ids.join(", "));
        }
        log::info!(
            "Timeout: {:?}, attempts: {}, parse mode: {:?}",
            self.timeout,
            self.retry.max_attempts,
            self.parse_mode
        );
    }
}

fn parse_chat_ids(value: &str) -> Result<Vec<String>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|chat_id| !chat_id.is_empty())
        .map(|chat_id| -> Result<String, ConfigError> {
            validate_chat_id(chat_id).map_err(|err| ConfigError::InvalidValue {
                key: EXTRA_CHAT_IDS_VAR,
                value: value.to_owned(),
                reason: err.to_string(),
            })?;
            Ok(chat_id.to_owned())
        })
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
        key,
        value: value.to_owned(),
        reason: err.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_owned(),
            reason: "expected true or false".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const BASE: [(&str, &str); 2] = [("TG_BOT_TOKEN", "123456789:ABCdef"), ("TG_CHAT_ID", "123456789")];

    #[test]
    fn test_defaults() {
        let config = load(&BASE).unwrap();
        assert_eq!(config.credentials, Credentials::new("123456789:ABCdef", "123456789"));
        assert!(config.extra_chat_ids.is_empty());
        assert_eq!(config.parse_mode, Some(ParseMode::Markdown));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.retry, RetryPolicy::none());
        assert!(config.listen_commands);
    }

    #[test]
    fn test_missing_values() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("TG_BOT_TOKEN"));
        assert_eq!(
            load(&[("TG_BOT_TOKEN", "123456789:ABCdef"), ("TG_CHAT_ID", "   ")]).unwrap_err(),
            ConfigError::Missing("TG_CHAT_ID")
        );
    }

    #[test]
    fn test_malformed_credentials() {
        assert_eq!(
            load(&[("TG_BOT_TOKEN", "your_telegram_bot_token_here"), ("TG_CHAT_ID", "1")])
                .unwrap_err(),
            ConfigError::Credentials(CredentialsError::MalformedToken)
        );
        assert_eq!(
            load(&[("TG_BOT_TOKEN", "1:abc"), ("TG_CHAT_ID", "your_chat_id")]).unwrap_err(),
            ConfigError::Credentials(CredentialsError::MalformedChatId("your_chat_id".to_owned()))
        );
    }

    #[test]
    fn test_overrides() {
        let mut vars = BASE.to_vec();
        vars.extend([
            ("TG_EXTRA_CHAT_IDS", " 222, 333 ,,123456789"),
            ("TG_PARSE_MODE", "html"),
            ("TG_TIMEOUT_SECS", "3"),
            ("TG_RETRY_ATTEMPTS", "3"),
            ("TG_RETRY_BASE_MS", "250"),
            ("TG_LISTEN_COMMANDS", "off"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(config.extra_chat_ids, vec!["222", "333", "123456789"]);
        assert_eq!(config.all_chat_ids(), vec!["123456789", "222", "333"]);
        assert_eq!(config.parse_mode, Some(ParseMode::Html));
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(
            config.retry,
            RetryPolicy::exponential(3, Duration::from_millis(250))
        );
        assert!(!config.listen_commands);
    }

    #[test]
    fn test_plain_text_parse_mode() {
        let mut vars = BASE.to_vec();
        vars.push(("TG_PARSE_MODE", "None"));
        assert_eq!(load(&vars).unwrap().parse_mode, None);
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("TG_EXTRA_CHAT_IDS", "222,abc"),
            ("TG_PARSE_MODE", "rtf"),
            ("TG_TIMEOUT_SECS", "0"),
            ("TG_TIMEOUT_SECS", "ten"),
            ("TG_RETRY_ATTEMPTS", "-1"),
            ("TG_LISTEN_COMMANDS", "maybe"),
        ] {
            let mut vars = BASE.to_vec();
            vars.push((key, value));
            match load(&vars) {
                Err(ConfigError::InvalidValue { key: found, .. }) => assert_eq!(found, key),
                other => panic!("{}={} gave {:?}", key, value, other),
            }
        }
    }
}
