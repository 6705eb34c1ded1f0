//! bgshell - run shell commands in the background and watch them
//!
//! Starts one or more commands under the supervisor, refreshes a status
//! table while they run, and prints each command's output once it finishes.

use anyhow::Result;
use bgshell::{ui, Config, ProcessEvent, ProcessManager, SavedCommand, StartRequest};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Background shell supervisor
#[derive(Parser, Debug)]
#[command(name = "bgshell")]
#[command(version)]
#[command(about = "Run shell commands in the background and watch their output")]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging to file
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the given commands and watch them until they finish
    Run {
        /// Shell commands to run, one process each
        #[arg(required = true)]
        commands: Vec<String>,

        #[command(flatten)]
        watch: WatchArgs,
    },
    /// Start the saved commands marked auto_start in the config file
    Saved {
        #[command(flatten)]
        watch: WatchArgs,
    },
    /// Save a command in the config file, replacing one with the same name
    Add {
        /// Name, also used as the process id
        name: String,

        /// Shell command line
        command: String,

        /// Optional description
        #[arg(long)]
        description: Option<String>,

        /// Working directory for the command
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Start this command with `bgshell saved`
        #[arg(long)]
        auto_start: bool,
    },
    /// Remove a saved command from the config file
    Remove {
        /// Name of the saved command
        name: String,
    },
    /// List the saved commands in the config file
    Commands,
}

#[derive(clap::Args, Debug)]
struct WatchArgs {
    /// Only print output lines matching this regular expression
    #[arg(short, long)]
    filter: Option<String>,

    /// Stop everything still running after this many seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Status table refresh interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    if cli.debug {
        let log_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bgshell")
            .join("logs");
        std::fs::create_dir_all(&log_dir)?;

        let log_file = std::fs::File::create(log_dir.join("bgshell.log"))?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(log_file)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(tracing_subscriber::EnvFilter::new("bgshell=debug"))
            .init();
    }

    let mut config = Config::load(cli.config.clone())?;

    let (requests, watch): (Vec<StartRequest>, WatchArgs) = match cli.command {
        Command::Run { commands, watch } => {
            (commands.into_iter().map(StartRequest::new).collect(), watch)
        }
        Command::Saved { watch } => {
            let requests: Vec<_> = config
                .auto_start_commands()
                .into_iter()
                .map(saved_request)
                .collect();
            if requests.is_empty() {
                println!("No saved commands are marked auto_start");
                return Ok(());
            }
            (requests, watch)
        }
        Command::Add {
            name,
            command,
            description,
            cwd,
            auto_start,
        } => {
            let saved = SavedCommand {
                description,
                cwd,
                auto_start,
                ..SavedCommand::new(name.clone(), command)
            };
            let replaced = config.add_saved_command(saved);
            config.save(cli.config)?;
            if replaced {
                println!("✓ Updated saved command {name}");
            } else {
                println!("✓ Saved command {name}");
            }
            return Ok(());
        }
        Command::Remove { name } => {
            if !config.remove_saved_command(&name) {
                anyhow::bail!("no saved command named {name}");
            }
            config.save(cli.config)?;
            println!("✓ Removed saved command {name}");
            return Ok(());
        }
        Command::Commands => {
            print_saved_commands(&config);
            return Ok(());
        }
    };

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let manager = ProcessManager::with_events(config.supervisor.clone(), event_tx);

    for request in requests {
        if let Err(e) = manager.start(request) {
            eprintln!("✗ {e}");
        }
    }

    let result = watch_processes(&manager, event_rx, &watch).await;
    manager.shutdown().await;
    result
}

fn print_saved_commands(config: &Config) {
    if config.saved_commands.is_empty() {
        println!("No saved commands");
        return;
    }
    for saved in &config.saved_commands {
        let marker = if saved.auto_start { "*" } else { " " };
        println!("{marker} {:<16} {}", saved.name, saved.command);
        if let Some(description) = &saved.description {
            println!("  {:<16} {description}", "");
        }
    }
}

fn saved_request(saved: &SavedCommand) -> StartRequest {
    let mut request = StartRequest::new(saved.command.clone()).with_id(saved.name.clone());
    request.cwd = saved.cwd.clone();
    request.env = saved.env.clone();
    request
}

async fn watch_processes(
    manager: &ProcessManager,
    mut event_rx: mpsc::UnboundedReceiver<ProcessEvent>,
    watch: &WatchArgs,
) -> Result<()> {
    let mut tick = tokio::time::interval(Duration::from_millis(watch.tick_ms.max(50)));
    let deadline = watch
        .timeout
        .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!("\nInterrupted, stopping processes...");
                stop_all(manager).await;
                break;
            }
            _ = sleep_until(deadline) => {
                println!("\nTimeout reached, stopping processes...");
                stop_all(manager).await;
                break;
            }
            Some(event) = event_rx.recv() => {
                report_event(manager, &event, watch.filter.as_deref()).await?;
            }
            _ = tick.tick() => {
                print!("{}", ui::render_table(&manager.list()));
                if manager.running_count() == 0 {
                    break;
                }
            }
        }
    }

    // Events raised while stopping
    while let Ok(event) = event_rx.try_recv() {
        report_event(manager, &event, watch.filter.as_deref()).await?;
    }
    print!("{}", ui::render_table(&manager.list()));
    Ok(())
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// One-line notice for events that need no lookup in the manager
fn event_notice(event: &ProcessEvent) -> Option<String> {
    match event {
        ProcessEvent::Started { id, pid: Some(pid) } => {
            Some(format!("✓ {id} started (PID: {pid})"))
        }
        ProcessEvent::Started { id, pid: None } => Some(format!("✓ {id} started")),
        // Already reported where `start` returned the error
        ProcessEvent::SpawnFailed { .. } => None,
        ProcessEvent::Exited { .. } | ProcessEvent::Killed { .. } => None,
    }
}

async fn report_event(
    manager: &ProcessManager,
    event: &ProcessEvent,
    filter: Option<&str>,
) -> Result<()> {
    if let Some(notice) = event_notice(event) {
        println!("{notice}");
    }
    if let ProcessEvent::Exited { id, .. } | ProcessEvent::Killed { id, .. } = event {
        let info = manager.wait(id, manager.settings().kill_timeout()).await?;
        println!("── {} {} ──", info.id, info.status);
        print!("{}", manager.get_output(id, filter, false)?);
    }
    Ok(())
}

async fn stop_all(manager: &ProcessManager) {
    for info in manager.list() {
        if !info.status.is_running() {
            continue;
        }
        match manager.terminate(&info.id, false).await {
            Ok(outcome) if outcome.is_confirmed() => {}
            Ok(_) => eprintln!("⚠️  {} did not confirm exit", info.id),
            Err(e) => eprintln!("✗ {e}"),
        }
    }
}
