//! narrator - play in the terminal or serve the game over HTTP

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use narrator::log::LogEntry;
use narrator::scheduler::spawn_turn_scheduler;
use narrator::{build_session, open_store, Command, Config, Server, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "narrator", version, about = "A narrated tabletop skirmish")]
struct Cli {
    /// Config file (defaults to ./narrator.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log diagnostics as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Seed the dice for a reproducible game
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Play in the terminal (default)
    Play,
    /// Serve the command surface over HTTP
    Serve {
        /// Address to listen on
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let mut config = Config::load(cli.config.as_deref())?;
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    match cli.command.unwrap_or(Mode::Play) {
        Mode::Play => play(config).await,
        Mode::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            serve(config).await
        }
    }
}

/// Diagnostics go to stderr so they stay out of the game text
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "narrator=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn serve(config: Config) -> Result<()> {
    let server = Arc::new(Server::new(config).await?);

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await
}

async fn play(config: Config) -> Result<()> {
    let store = open_store(&config).await?;
    let session = Arc::new(build_session(&config, store)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = spawn_turn_scheduler(
        session.clone(),
        config.pacing.turn_delay(),
        shutdown_rx.clone(),
    );
    let printer = spawn_printer(session.clone(), shutdown_rx);

    print_help(&session);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "help" => print_help(&session),
            "new" => session.reset(),
            _ => match Command::from_input(line) {
                Some(command) => {
                    let session = session.clone();
                    tokio::spawn(async move {
                        if let Err(e) = session.handle(command).await {
                            warn!(error = %e, "Command failed");
                        }
                    });
                }
                None => println!("Unknown command: {}", line),
            },
        }
    }

    let _ = shutdown_tx.send(true);
    scheduler.await?;
    printer.await?;
    Ok(())
}

/// Print log entries as they are appended
fn spawn_printer(session: Arc<Session>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = 0;
        let mut tick = tokio::time::interval(Duration::from_millis(100));
        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.changed() => break,
            }
            for entry in session.log_since(last) {
                println!("{}", render(&entry));
                last = entry.id;
            }
        }
        for entry in session.log_since(last) {
            println!("{}", render(&entry));
        }
    })
}

fn render(entry: &LogEntry) -> String {
    format!("[{}] {}", entry.kind, entry.content)
}

fn print_help(session: &Session) {
    let state = session.snapshot();
    let foes: Vec<String> = state
        .standing_enemies()
        .map(|e| format!("{} ({})", e.id, e.name))
        .collect();

    println!("Commands: attack <target>, search, save, load, image, new, help, quit");
    if !foes.is_empty() {
        println!("Foes: {}", foes.join(", "));
    }
}
