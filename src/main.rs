use chrono::Local;
use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tokio::io::BufReader;

use tgnotify::console::{self, Console, ConsoleExit};
use tgnotify::{Config, Notifier, OutboundMessage};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
enum Command {
    #[command(description = "display this text.")]
    Help,
    #[command(description = "display current application version.")]
    Version,
    #[command(description = "show the id of this chat.")]
    ChatId,
    #[command(description = "send the test report to the configured chat.")]
    Test,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    pretty_env_logger::init();

    log::info!("Starting Stock News Bot notifier...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };
    config.log_summary();

    let notifier = match Notifier::new(config.timeout) {
        Ok(notifier) => notifier,
        Err(err) => {
            log::error!("Failed to build HTTP client: {}", err);
            std::process::exit(1);
        }
    };

    let console = Console::new(notifier.clone(), config.clone());

    if !config.listen_commands {
        run_console(console).await;
        return;
    }

    let bot = Bot::new(config.credentials.bot_token());
    let mut dispatcher = Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![notifier, config])
        .enable_ctrlc_handler()
        .build();

    let shutdown = dispatcher.shutdown_token();
    tokio::spawn(async move {
        if run_console(console).await != ConsoleExit::Quit {
            log::info!("Console input closed, bot keeps listening for commands");
            return;
        }
        match shutdown.shutdown() {
            Ok(stopped) => stopped.await,
            Err(err) => {
                log::warn!("Dispatcher was not running: {}", err);
                std::process::exit(0);
            }
        }
    });

    dispatcher.dispatch().await;
    log::info!("Bot stopped");
    // A pending stdin read cannot be cancelled and would block runtime shutdown.
    std::process::exit(0);
}

async fn run_console(console: Console) -> ConsoleExit {
    let input = BufReader::new(tokio::io::stdin());
    match console.run(input, tokio::io::stdout()).await {
        Ok(exit) => exit,
        Err(err) => {
            log::error!("Console failed: {}", err);
            ConsoleExit::EndOfInput
        }
    }
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Help].endpoint(help))
        .branch(case![Command::Version].endpoint(version))
        .branch(case![Command::ChatId].endpoint(chat_id))
        .branch(case![Command::Test].endpoint(test));

    Update::filter_message()
        .branch(command_handler)
        .branch(dptree::endpoint(invalid_command))
}

async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn version(bot: Bot, msg: Message) -> HandlerResult {
    let version = env!("CARGO_PKG_VERSION");
    bot.send_message(msg.chat.id, format!("Current version is: {} 🏷️", version))
        .await?;
    Ok(())
}

async fn chat_id(bot: Bot, msg: Message) -> HandlerResult {
    log::info!("Chat id requested from chat {}", msg.chat.id);
    bot.send_message(msg.chat.id, format!("This chat id is: {}", msg.chat.id))
        .await?;
    Ok(())
}

async fn test(bot: Bot, msg: Message, notifier: Notifier, config: Config) -> HandlerResult {
    let credentials = &config.credentials;
    if msg.chat.id.0.to_string() != credentials.chat_id() {
        log::warn!("Test report requested from foreign chat {}", msg.chat.id);
        bot.send_message(
            msg.chat.id,
            "Test reports can only be requested from the configured chat.",
        )
        .await?;
        return Ok(());
    }

    let report = console::test_report(&Local::now().format("%H:%M:%S").to_string());
    let message =
        OutboundMessage::to_default_chat(report, credentials).with_parse_mode(config.parse_mode);
    let result = notifier
        .send_with_retry(&message, credentials, &config.retry)
        .await;

    if let Err(err) = result.into_result() {
        bot.send_message(msg.chat.id, format!("Test report failed: {}", err))
            .await?;
    }
    Ok(())
}

async fn invalid_command(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "Unable to handle the message. Type /help to see the usage.",
    )
    .await?;
    Ok(())
}
