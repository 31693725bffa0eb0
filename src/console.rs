use chrono::Local;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Config;
use crate::error::DeliveryError;
use crate::notifier::{DeliveryResult, Notifier, OutboundMessage};

const AVAILABLE: &str = "test, send, broadcast, check, help, quit";

const HELP: &str = "Commands:
  test              - send the test report to Telegram
  send <text>       - send <text> to the default chat
  broadcast <text>  - send <text> to every configured chat
  check             - verify the bot token and chat id
  help              - show this text
  quit              - exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Test,
    Send(String),
    Broadcast(String),
    Check,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ConsoleCommand {
    /// The command word is case-insensitive, its argument is kept as typed.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" => ConsoleCommand::Empty,
            "test" => ConsoleCommand::Test,
            "send" => ConsoleCommand::Send(rest.to_owned()),
            "broadcast" => ConsoleCommand::Broadcast(rest.to_owned()),
            "check" => ConsoleCommand::Check,
            "help" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => ConsoleCommand::Unknown(other.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    Quit,
    EndOfInput,
}

/// Fixed Markdown report used to check delivery end to end.
pub fn test_report(generated_at: &str) -> String {
    format!(
        "📈 *Stock News Bot test*\n\n\
         This is a test message from your Stock News Bot.\n\
         If you can read it, the bot token and chat id are configured correctly.\n\n\
         _Generated at {}_",
        generated_at
    )
}

pub fn describe(result: &DeliveryResult) -> String {
    match result {
        DeliveryResult::Success => "Message sent successfully".to_owned(),
        DeliveryResult::Failure(err) => describe_error(err),
    }
}

fn describe_error(err: &DeliveryError) -> String {
    match err.hint() {
        Some(hint) => format!("FAILED: {}\n  {}", err, hint),
        None => format!("FAILED: {}", err),
    }
}

/// Line-oriented command handler for the terminal.
pub struct Console {
    notifier: Notifier,
    config: Config,
}

impl Console {
    pub fn new(notifier: Notifier, config: Config) -> Self {
        Self { notifier, config }
    }

    pub async fn run<R, W>(&self, input: R, mut output: W) -> io::Result<ConsoleExit>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        say(&mut output, "Stock News Bot command handler").await?;
        say(&mut output, HELP).await?;

        let mut lines = input.lines();
        loop {
            output.write_all(b"Enter command: ").await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                say(&mut output, "").await?;
                return Ok(ConsoleExit::EndOfInput);
            };

            let command = ConsoleCommand::parse(&line);
            log::debug!("Console command: {:?}", command);
            if command == ConsoleCommand::Quit {
                say(&mut output, "Goodbye!").await?;
                return Ok(ConsoleExit::Quit);
            }
            self.execute(command, &mut output).await?;
        }
    }

    async fn execute<W>(&self, command: ConsoleCommand, output: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match command {
            ConsoleCommand::Empty | ConsoleCommand::Quit => Ok(()),
            ConsoleCommand::Help => say(output, HELP).await,
            ConsoleCommand::Unknown(word) => {
                say(
                    output,
                    &format!("Unknown command: '{}'. Available: {}", word, AVAILABLE),
                )
                .await
            }
            ConsoleCommand::Test => {
                say(output, "Sending test report to Telegram...").await?;
                let report = test_report(&Local::now().format("%H:%M:%S").to_string());
                let result = self.send_to_default_chat(report).await;
                say(output, &describe(&result)).await
            }
            ConsoleCommand::Send(text) if text.is_empty() => say(output, "Usage: send <text>").await,
            ConsoleCommand::Send(text) => {
                let result = self.send_to_default_chat(text).await;
                say(output, &describe(&result)).await
            }
            ConsoleCommand::Broadcast(text) if text.is_empty() => {
                say(output, "Usage: broadcast <text>").await
            }
            ConsoleCommand::Broadcast(text) => {
                let results = self
                    .notifier
                    .broadcast(
                        &text,
                        &self.config.all_chat_ids(),
                        &self.config.credentials,
                        self.config.parse_mode,
                    )
                    .await;
                for (chat_id, result) in results {
                    say(output, &format!("Chat {}: {}", chat_id, describe(&result))).await?;
                }
                Ok(())
            }
            ConsoleCommand::Check => self.check(output).await,
        }
    }

    async fn send_to_default_chat(&self, text: String) -> DeliveryResult {
        let credentials = &self.config.credentials;
        let message =
            OutboundMessage::to_default_chat(text, credentials).with_parse_mode(self.config.parse_mode);
        self.notifier
            .send_with_retry(&message, credentials, &self.config.retry)
            .await
    }

    async fn check<W>(&self, output: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let credentials = &self.config.credentials;
        say(output, &format!("Bot token: {}", credentials.masked_token())).await?;
        say(output, &format!("Chat id: {}", credentials.chat_id())).await?;

        match self.notifier.get_me(credentials).await {
            Ok(identity) => {
                let username = identity.username.as_deref().unwrap_or("unknown");
                say(
                    output,
                    &format!("Bot found: @{} ({})", username, identity.first_name),
                )
                .await
            }
            Err(err) => say(output, &describe_error(&err)).await,
        }
    }
}

async fn say<W>(output: &mut W, text: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await
}
