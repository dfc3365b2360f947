use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};

mod application;
mod domain;
mod infrastructure;
mod ops;

use application::messaging::{Dispatcher, MessageParser};
use domain::entities::User;
use domain::traits::Bot;
use infrastructure::adapters::console::ConsoleAdapter;
use infrastructure::adapters::telegram::TelegramAdapter;
use infrastructure::config::Config;
use infrastructure::units::{CommandRegistry, LibraryLoader};

/// Long-poll timeout for getUpdates, in seconds.
const POLL_TIMEOUT: i64 = 30;

#[derive(Parser)]
#[command(name = "opsbot")]
#[command(about = "Chat-driven remote command dispatcher", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Bot token (overrides config)
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_bot(cli.config, cli.token),
        Commands::Version => println!("opsbot v{}", env!("CARGO_PKG_VERSION")),
        Commands::InitConfig => init_config(cli.config),
    }
}

fn run_bot(config_path: String, token_override: Option<String>) {
    let config = if Path::new(&config_path).exists() {
        Config::load(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using environment", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    };

    tracing::info!("Starting {}", config.bot.name);

    let loader = LibraryLoader::new(&config.units.directory);
    let registry = Arc::new(CommandRegistry::new(Box::new(loader)));
    match registry.initialize() {
        Ok(outcome) => tracing::info!(
            "Unit load: {} commands from {} units ({} failed)",
            outcome.commands,
            outcome.units_loaded,
            outcome.units_failed
        ),
        Err(e) => {
            // Without a readable units directory the registry can never
            // discover anything; refuse to start.
            tracing::error!("Cannot initialize unit registry: {}", e);
            std::process::exit(1);
        }
    }

    let dispatcher = Dispatcher::new(registry.clone(), config.allowed_users());

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(token) = token_override.or_else(|| config.telegram_token()) {
        rt.block_on(run_telegram_bot(token, &config, &dispatcher));
    } else {
        rt.block_on(run_console_bot(&config, &dispatcher));
    }
}

async fn run_telegram_bot(token: String, config: &Config, dispatcher: &Dispatcher) {
    let mut bot = TelegramAdapter::new(token);

    if let Err(e) = bot.fetch_bot_info().await {
        tracing::error!("Failed to fetch bot info: {}", e);
        return;
    }
    let info = bot.bot_info();
    tracing::info!("Bot started: @{}", info.username);

    if let Err(e) = bot.register_commands(&dispatcher.menu()).await {
        tracing::warn!("Failed to register command menu: {}", e);
    }

    let parser = MessageParser::new(&config.bot.prefix);
    let bot: Arc<TelegramAdapter> = Arc::new(bot);
    let mut offset: i64 = 0;

    tracing::info!("Listening for commands...");

    loop {
        match bot.get_updates(offset, POLL_TIMEOUT).await {
            Ok(updates) => {
                for update in &updates {
                    let Some(msg) = &update.message else { continue };
                    let Some(text) = msg.text.as_deref() else {
                        continue;
                    };
                    if text.is_empty() {
                        continue;
                    }

                    let chat_id = msg.chat.id.to_string();
                    let sender = msg.from.as_ref().map(|from| {
                        let mut user = User::new(from.id.to_string());
                        if let Some(ref username) = from.username {
                            user = user.with_username(username.clone());
                        }
                        if let Some(ref first) = from.first_name {
                            user = user.with_first_name(first.clone());
                        }
                        user
                    });

                    let message = parser.parse(&chat_id, text, sender);
                    if let Err(e) = dispatcher
                        .dispatch(&message, bot.clone() as Arc<dyn Bot>)
                        .await
                    {
                        tracing::error!("Dispatch error: {}", e);
                    }
                }

                offset = TelegramAdapter::next_offset(&updates).max(offset);
            }
            Err(e) => {
                tracing::error!("Failed to get updates: {}", e);
                tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
            }
        }
    }
}

async fn run_console_bot(config: &Config, dispatcher: &Dispatcher) {
    let bot = Arc::new(ConsoleAdapter::new());
    let parser = MessageParser::new(&config.bot.prefix);

    tracing::info!("Console mode; type commands, Ctrl-D to exit");

    loop {
        let Some(line) = bot.read_line("> ").await else {
            break;
        };
        if line.is_empty() {
            continue;
        }

        let message = parser.parse("console", line, Some(User::new("console")));
        if let Err(e) = dispatcher
            .dispatch(&message, bot.clone() as Arc<dyn Bot>)
            .await
        {
            tracing::error!("Dispatch error: {}", e);
        }
    }
}

fn init_config(config_path: String) {
    if Path::new(&config_path).exists() {
        tracing::error!("{} already exists, not overwriting", config_path);
        std::process::exit(1);
    }

    let yaml = match Config::default().to_yaml() {
        Ok(yaml) => yaml,
        Err(e) => {
            tracing::error!("Failed to render default config: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = std::fs::write(&config_path, yaml) {
        tracing::error!("Failed to write {}: {}", config_path, e);
        std::process::exit(1);
    }
    println!("Wrote default config to {}", config_path);
}
