// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! `sessionwatch` CLI: run an interactive idle-timeout session in the terminal
//! and inspect the local settings and activity record.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use sessionwatch::config::{config_path, load_config, save_config, AppConfig};
use sessionwatch::error::format_error;
use sessionwatch::session::{
    ActivityKind, ActivityOutcome, ActivitySink, AuthProvider, FileActivityLog, LocalAuth,
    NoopActivityLog, SessionConfig, SessionManager, SessionSnapshot, SessionState, User,
    WarningSnapshot,
};
use sessionwatch::status_line::{render_status_line, render_warning};
use sessionwatch::telemetry::init_tracing;

/// Idle-timeout session lifecycle for authenticated dashboards.
#[derive(Parser)]
#[command(name = "sessionwatch")]
#[command(version)]
#[command(about = "Idle-timeout session lifecycle for authenticated dashboards.")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose mode: debug-level session audit lines
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and run a session, reading commands from stdin
    ///
    /// Commands: extend, dismiss, status, logout, quit.
    /// `activity <kind> [detail]` records a specific activity kind;
    /// any other line counts as keyboard input.
    Run {
        /// User to sign in as
        #[arg(long, default_value = "operator")]
        user: String,
        /// Divide every session duration by this factor (overrides config)
        #[arg(long)]
        speedup: Option<u32>,
    },
    /// Show or reset settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print the last persisted activity
    LastActivity,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the current settings
    Show,
    /// Print the settings file location
    Path,
    /// Restore default settings
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "{}",
                format_error(
                    &format!("Failed to load configuration: {:#}", e),
                    &["Settings file is not valid JSON"],
                    &["Reset it: sessionwatch config reset"],
                )
            );
            AppConfig::default()
        }
    };

    let filter = if cli.verbose { "debug" } else { config.log_filter.as_str() };
    init_tracing(filter);

    match cli.command {
        Commands::Run { user, speedup } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(run_session(&config, user, speedup))
        }
        Commands::Config { command } => handle_config(command, &config),
        Commands::LastActivity => handle_last_activity(),
    }
}

fn handle_config(command: ConfigCommands, config: &AppConfig) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigCommands::Path => {
            println!("{}", config_path().display());
        }
        ConfigCommands::Reset => {
            save_config(&AppConfig::default())?;
            println!("{} Settings reset: {}", "[✓]".green(), config_path().display());
        }
    }
    Ok(())
}

fn handle_last_activity() -> Result<()> {
    let log = FileActivityLog::new(FileActivityLog::default_path());
    match log.load_last()? {
        Some(entry) => {
            println!("session:   {}", entry.session_id);
            println!("user:      {}", entry.user_id);
            println!("kind:      {}", entry.kind);
            println!("timestamp: {}", entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
            if let Some(detail) = entry.detail {
                println!("detail:    {}", detail);
            }
        }
        None => println!("No activity recorded yet ({})", log.path().display()),
    }
    Ok(())
}

/// What the terminal last showed, so ticks only print on change
#[derive(PartialEq)]
struct Rendered {
    state: Option<SessionState>,
    warning: WarningSnapshot,
}

impl Rendered {
    fn of(snapshot: Option<&SessionSnapshot>) -> Self {
        Self {
            state: snapshot.map(|s| s.status.state),
            warning: snapshot.map(|s| s.warning.clone()).unwrap_or_default(),
        }
    }
}

async fn run_session(config: &AppConfig, user: String, speedup: Option<u32>) -> Result<()> {
    let speedup = speedup.unwrap_or(config.demo_speedup).max(1);
    let session_config = SessionConfig::dashboard_default().accelerated(speedup);

    let auth = Arc::new(LocalAuth::signed_in(User::new(user.clone(), user.clone())));
    let activity_log: Arc<dyn ActivitySink> = if config.activity_log_enabled {
        Arc::new(FileActivityLog::new(FileActivityLog::default_path()))
    } else {
        Arc::new(NoopActivityLog)
    };

    let manager = match SessionManager::new(session_config, auth.clone(), activity_log) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!(
                "{}",
                format_error(
                    &format!("Invalid session configuration: {}", e),
                    &["Speedup factor too large for the tick period"],
                    &["Try a smaller value: sessionwatch run --speedup 60"],
                )
            );
            std::process::exit(1);
        }
    };

    manager.sync_with_auth();
    let budget = manager.config().inactivity_budget;
    println!(
        "{} Signed in as {} (idle budget {}s, speedup x{})",
        "[✓]".green(),
        user.bold(),
        budget.as_secs(),
        speedup
    );
    println!("Commands: extend | dismiss | status | logout | quit | activity <kind> [detail]");

    let mut snapshots = manager.subscribe();
    let mut last = Rendered::of(snapshots.borrow().as_ref());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut auth_poll = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(line.trim(), &manager, &auth) {
                    break;
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let current = Rendered::of(snapshot.as_ref());
                if current != last {
                    print_snapshot(snapshot.as_ref(), &last);
                    last = current;
                }
            }
            _ = auth_poll.tick() => {
                if auth.current_user().is_none() && manager.session_id().is_some() {
                    manager.sync_with_auth();
                    println!("{} Signed out. Session closed.", "[✗]".red());
                    break;
                }
            }
        }
    }

    manager.end_session("cli_exit");
    Ok(())
}

fn print_snapshot(snapshot: Option<&SessionSnapshot>, previous: &Rendered) {
    eprintln!("{}", render_status_line(snapshot));
    if let Some(snapshot) = snapshot {
        if snapshot.warning != previous.warning {
            if let Some(text) = render_warning(&snapshot.warning) {
                eprintln!("{}", text);
            }
        }
    }
}

/// Returns false when the loop should stop
fn handle_command(line: &str, manager: &SessionManager, auth: &LocalAuth) -> bool {
    let mut parts = line.splitn(3, ' ');
    match parts.next().unwrap_or("") {
        "quit" | "exit" => return false,
        "logout" => {
            auth.logout();
            manager.sync_with_auth();
            println!("{} Signed out.", "[✓]".green());
            return false;
        }
        "status" => {
            eprintln!("{}", render_status_line(manager.snapshot().as_ref()));
        }
        "dismiss" => {
            if !manager.dismiss_warning() {
                println!("No warning to dismiss.");
            }
        }
        "extend" => report(manager.extend_session()),
        "activity" => {
            let kind = parts.next().unwrap_or("");
            match kind.parse::<ActivityKind>() {
                Ok(kind) => report(manager.record_activity(kind, parts.next())),
                Err(e) => println!("{} {}", "[!]".yellow(), e),
            }
        }
        _ => report(manager.record_activity(ActivityKind::KeyboardInput, None)),
    }
    true
}

fn report(outcome: ActivityOutcome) {
    match outcome {
        ActivityOutcome::Recorded(status) => {
            println!("{} Session extended ({} left)", "[✓]".green(), status.formatted_remaining)
        }
        ActivityOutcome::Expired => {
            println!("{} Session expired. Sign in again to continue.", "[✗]".red())
        }
        ActivityOutcome::NoSession => println!("{} Not signed in.", "[!]".yellow()),
    }
}
