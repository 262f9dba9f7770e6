use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use membership_tracker::{
    bot, format_notification, init_tracing, App, Config, DailySchedule, TelegramClient,
    DEFAULT_LOG_FILTER,
};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(version, about = "Membership expiry tracker and Telegram bot")]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,

    #[command(flatten)]
    config: Config,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Run the bot (long polling) plus the daily expiry checks (default)
    Run,
    /// Look up one member by email or Telegram username and print the report
    Check { identity: String },
    /// Print the members whose membership expires tomorrow
    Scan {
        /// Also send the notification to the configured chat
        #[arg(long)]
        notify: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(DEFAULT_LOG_FILTER);

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let app = Arc::new(App::from_config(&cli.config, client.clone()));

    match cli.mode.unwrap_or(Mode::Run) {
        Mode::Run => run_bot(app, &cli.config, client).await,
        Mode::Check { identity } => {
            println!("{}", app.check(&identity).await);
            Ok(())
        }
        Mode::Scan { notify } => run_scan(&app, &cli.config, client, notify).await,
    }
}

fn telegram_client(config: &Config, client: reqwest::Client) -> Result<TelegramClient> {
    let token = config.require_bot_token()?;
    Ok(TelegramClient::new(client, &config.telegram_api_base, token))
}

async fn run_bot(app: Arc<App>, config: &Config, client: reqwest::Client) -> Result<()> {
    let telegram = Arc::new(telegram_client(config, client)?);
    let chat = config.require_notify_chat()?.to_string();

    info!(
        version = membership_tracker::VERSION,
        timezone = %app.timezone(),
        sources = app.sources.len(),
        "Starting membership bot"
    );

    let schedule = DailySchedule::new(config.check_times.clone(), config.timezone);
    let handles = schedule.spawn({
        let app = Arc::clone(&app);
        let telegram = Arc::clone(&telegram);
        move |now| {
            let app = Arc::clone(&app);
            let telegram = Arc::clone(&telegram);
            let chat = chat.clone();
            async move {
                app.notifier
                    .run_scheduled(&app.sources, telegram.as_ref(), &chat, now)
                    .await;
            }
        }
    });

    tokio::select! {
        _ = bot::run_polling(&app, &telegram, config.poll_timeout) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Shutting down");
        }
    }

    for handle in handles {
        handle.abort();
    }
    Ok(())
}

async fn run_scan(app: &App, config: &Config, client: reqwest::Client, notify: bool) -> Result<()> {
    let now = app.now();

    if notify {
        let telegram = telegram_client(config, client)?;
        let chat = config.require_notify_chat()?;
        let count = app.notifier.notify(&app.sources, &telegram, chat, now).await?;
        println!("Notified {} member(s) expiring tomorrow", count);
        return Ok(());
    }

    let urgent = app.notifier.scan(&app.sources, now).await?;
    match format_notification(&urgent) {
        Some(text) => println!("{}", text),
        None => println!("No memberships expire tomorrow."),
    }
    Ok(())
}
