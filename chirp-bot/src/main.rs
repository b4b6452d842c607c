//! chirp-bot - Scheduled posting bot for Twitter/X
//!
//! Operator commands edit the stored documents or publish once; `start`
//! runs the scheduler until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use libchirpcast::config::load_env_files;
use libchirpcast::logging::LogSettings;
use libchirpcast::{Bot, BotStats, ChirpcastError, Config, Schedule, Store};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "chirp-bot")]
#[command(version)]
#[command(about = "Scheduled posting bot for Twitter/X")]
#[command(long_about = "\
chirp-bot - Scheduled posting bot for Twitter/X

DESCRIPTION:
    chirp-bot posts short texts on a schedule: a fixed interval tick plus
    daily peak times. Each post is generated from templates or picked from
    the content library, skipping anything posted recently. Duplicate
    rejections are retried with fresh content; over-long posts are
    truncated and retried once.

USAGE:
    # Run the scheduler (default)
    chirp-bot start

    # Post now
    chirp-bot post \"Hello from the bot\"

    # Grow the library
    chirp-bot add Gradient descent, but for my coffee intake

ENVIRONMENT:
    TWITTER_API_KEY, TWITTER_API_SECRET,
    TWITTER_ACCESS_TOKEN, TWITTER_ACCESS_SECRET   required for test/post/start
    GROK_API_KEY                                  optional, enables images
    Variables are also read from bot.env and .env in the working directory.

CONFIGURATION:
    Configuration file: ~/.config/chirpcast/config.toml (or $CHIRPCAST_CONFIG)
    Data directory:     ~/.local/share/chirpcast

EXIT CODES:
    0 - Success
    1 - Configuration, storage or posting error
    2 - Authentication error
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding the bot's documents (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish the test post, then show stats
    Test,

    /// Publish a post now
    Post {
        /// Text to post
        text: Vec<String>,
    },

    /// Add a text to the content library
    Add {
        /// Text to add
        text: Vec<String>,
    },

    /// Show the generation config
    AiConfig,

    /// Enable templated generation
    AiEnable,

    /// Disable templated generation
    AiDisable,

    /// Set the generation prompt hint
    AiPrompt {
        /// New prompt
        prompt: Vec<String>,
    },

    /// Show library and history statistics
    Stats,

    /// Run the scheduler until interrupted
    Start,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<ChirpcastError>()
            .map_or(1, ChirpcastError::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    load_env_files();

    let mut config = Config::load()?;
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.to_string_lossy().into_owned();
    }
    LogSettings::resolve(&config, cli.verbose)?.install()?;

    let bot = Bot::new(Arc::new(Store::open(config.data_dir())));
    bot.initialize().await?;

    match cli.command.unwrap_or(Command::Start) {
        Command::Test => {
            let bot = bot.connect(&config)?;
            bot.test().await;
            print_stats(&bot.stats().await)?;
        }
        Command::Post { text } => {
            let text = joined(text, "Usage: chirp-bot post \"Your tweet here\"")?;
            let bot = bot.connect(&config)?;
            match bot.post(Some(text)).await? {
                Some(record) => println!("Posted {} at {}", record.id, record.timestamp),
                None => println!("Skipped: the platform kept rejecting the post as a duplicate"),
            }
        }
        Command::Add { text } => {
            let text = joined(text, "Usage: chirp-bot add \"Your tweet here\"")?;
            if bot.add_content(&text).await? {
                println!("Added to library: {}", text);
            } else {
                println!("Already in library: {}", text);
            }
        }
        Command::AiConfig => {
            let generation = bot.generation_config().await?;
            println!("{}", serde_json::to_string_pretty(&generation)?);
        }
        Command::AiEnable => {
            bot.update_generation_config(|c| c.enabled = true).await?;
            println!("Templated generation enabled");
        }
        Command::AiDisable => {
            bot.update_generation_config(|c| c.enabled = false).await?;
            println!("Templated generation disabled");
        }
        Command::AiPrompt { prompt } => {
            let prompt = joined(prompt, "Usage: chirp-bot ai-prompt \"Your custom prompt\"")?;
            let hint = prompt.clone();
            bot.update_generation_config(move |c| c.prompt_hint = hint)
                .await?;
            println!("Prompt updated: \"{}\"", prompt);
        }
        Command::Stats => {
            print_stats(&bot.stats().await)?;
        }
        Command::Start => {
            let schedule = Schedule::from_config(&config.schedule)?;
            let bot = bot.connect(&config)?;
            info!("Bot is running, press Ctrl+C to stop");

            let bot = &bot;
            schedule
                .run(shutdown_signal(), |firing| async move {
                    bot.on_trigger(&firing.trigger).await
                })
                .await;
            info!("Bot stopped");
        }
    }

    Ok(())
}

/// Join command words, rejecting an empty result
fn joined(words: Vec<String>, usage: &str) -> Result<String, ChirpcastError> {
    let text = words.join(" ");
    if text.trim().is_empty() {
        return Err(ChirpcastError::InvalidInput(usage.to_string()));
    }
    Ok(text)
}

fn print_stats(stats: &BotStats) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(stats).context("Failed to render stats")?;
    println!("{}", json);
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
#[cfg(unix)]
async fn shutdown_signal() {
    use futures::StreamExt;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook_tokio::Signals;

    match Signals::new([SIGINT, SIGTERM]) {
        Ok(mut signals) => {
            if let Some(signal) = signals.next().await {
                info!("Received signal {}, stopping gracefully...", signal);
            }
        }
        Err(e) => {
            tracing::warn!("Signal setup failed ({}), listening for Ctrl+C only", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C, stopping gracefully...");
    }
}
