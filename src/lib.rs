//! Telegram delivery for the Stock News Bot.
//!
//! [`Notifier`] sends one message per call through the Bot API and reports
//! the outcome as a [`DeliveryResult`]; it never retries unless asked to with
//! [`Notifier::send_with_retry`].

pub mod config;
pub mod console;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod notifier;

pub use config::{Config, ConfigError};
pub use credentials::{Credentials, CredentialsError};
pub use error::DeliveryError;
pub use notifier::{
    BotIdentity, DeliveryResult, Notifier, OutboundMessage, ParseMode, RetryPolicy,
};
