use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

pub const BOT_TOKEN_VAR: &str = "TG_BOT_TOKEN";
pub const CHAT_ID_VAR: &str = "TG_CHAT_ID";
pub const EXTRA_CHAT_IDS_VAR: &str = "TG_EXTRA_CHAT_IDS";
pub const PARSE_MODE_VAR: &str = "TG_PARSE_MODE";
pub const TIMEOUT_SECS_VAR: &str = "TG_TIMEOUT_SECS";
pub const RETRY_ATTEMPTS_VAR: &str = "TG_RETRY_ATTEMPTS";
pub const RETRY_BASE_MS_VAR: &str = "TG_RETRY_BASE_MS";
pub const LISTEN_COMMANDS_VAR: &str = "TG_LISTEN_COMMANDS";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

/// `<bot id>:<secret>` as issued by BotFather.
pub static BOT_TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+:[A-Za-z0-9_-]+$").expect("valid bot token regex"));

pub static CHAT_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+$").expect("valid chat id regex"));
