use std::path::PathBuf;
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sentiment_chat::config::{Config, API_URL_ENV};
use sentiment_chat::tui::{self, EventHandler, Tui};
use sentiment_chat::app::App;
use sentiment_chat::{
    handler, ui, AnalysisGateway, AnalysisMode, DownloadDir, InputController, Role, Submission,
};

#[derive(Parser)]
#[command(name = "sentiment-chat", version)]
#[command(about = "Chat-style front end for Vietnamese sentiment analysis")]
struct Cli {
    /// Base URL of the sentiment service
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Directory analyzed CSV files are saved into
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one piece of text and print the conversation
    Text {
        /// Vietnamese text to analyze
        text: String,
    },
    /// Upload a CSV file with a "comment" column for batch analysis
    Csv {
        /// Path to the CSV file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load()
        .unwrap_or_else(|_| Config::new())
        .with_overrides(std::env::var(API_URL_ENV).ok(), cli.api_url, cli.download_dir);

    match cli.command {
        None => {
            let _guard = init_file_logging(&config)?;
            run_tui(config).await
        }
        Some(command) => {
            init_stderr_logging();
            run_once(config, command).await
        }
    }
}

/// The terminal owns stdout/stderr while the TUI runs, so logs go to a file.
fn init_file_logging(config: &Config) -> Result<WorkerGuard> {
    let log_dir = config.resolved_log_dir()?;
    std::fs::create_dir_all(&log_dir)?;

    let appender = tracing_appender::rolling::daily(&log_dir, "sentiment-chat.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentiment_chat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    Ok(guard)
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentiment_chat=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_tui(config: Config) -> Result<()> {
    info!(api_url = %config.api_url, "starting TUI");
    tui::install_panic_hook();

    let mut terminal = tui::init()?;
    let mut app = App::new(&config);
    let mut events = EventHandler::new();

    let result = run_app(&mut terminal, &mut app, &mut events).await;

    if let Err(e) = tui::restore() {
        error!("Failed to restore terminal: {}", e);
    }

    result
}

async fn run_app(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }

        // Outcomes of finished requests
        app.sync_requests();
    }
    Ok(())
}

/// Run a single analysis without the TUI and print the resulting transcript.
async fn run_once(config: Config, command: Commands) -> Result<()> {
    let gateway = AnalysisGateway::new(&config.api_url);
    let downloads = DownloadDir::new(config.resolved_download_dir());
    let mut controller = InputController::new(gateway, Box::new(downloads));

    let submission = match command {
        Commands::Text { text } => {
            controller.set_input(&text);
            controller.submit_text()
        }
        Commands::Csv { path } => {
            controller.set_mode(AnalysisMode::Csv);
            controller.select_file(path)
        }
    };

    if let Submission::Skipped(reason) = submission {
        bail!("Nothing to analyze: {}", reason);
    }

    controller.wait_settled().await;

    let mut failed = false;
    for message in controller.messages() {
        let label = match message.role() {
            Role::User => "You",
            Role::Assistant => "AI",
            Role::System => "Info",
        };
        println!("{}: {}\n", label, message.content());
        failed |= message.role() == Role::System && message.content().starts_with('✗');
    }

    if let Some(path) = controller.last_download() {
        println!("Saved to {}", path.display());
    }

    if failed {
        bail!("Analysis failed");
    }
    Ok(())
}
