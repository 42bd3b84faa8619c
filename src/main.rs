//! wakeup - alarm clock daemon and CLI
//!
//! The daemon keeps exact timers for scheduled alarms and rings them with
//! sound, vibration and a persistent notification. The CLI schedules,
//! cancels, stops and snoozes alarms over a Unix socket.

use anyhow::Result;
use clap::{CommandFactory, Parser};

use wakeup::cli::{run_watch, Cli, Commands, Display, IpcClient};
use wakeup::config::AlarmConfig;
use wakeup::{daemon, launchagent};

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(&cli);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` wins; otherwise the daemon logs at info, `--verbose` at
/// debug and everything else at warn.
fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if cli.verbose {
        "debug"
    } else if matches!(cli.command, Some(Commands::Daemon)) {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = fmt().with_env_filter(filter).with_target(false);
    if matches!(cli.command, Some(Commands::Daemon)) {
        builder.init();
    } else {
        builder.without_time().init();
    }
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Schedule(args)) => {
            let response = IpcClient::new()?.schedule(&args).await?;
            Display::show_schedule(&response);
        }
        Some(Commands::Cancel { id }) => {
            let response = IpcClient::new()?.cancel(&id).await?;
            Display::show_cancel(&response);
        }
        Some(Commands::CancelAll) => {
            let response = IpcClient::new()?.cancel_all().await?;
            Display::show_cancel(&response);
        }
        Some(Commands::Ring(args)) => {
            let response = IpcClient::new()?.ring(&args).await?;
            Display::show_ring(&response);
        }
        Some(Commands::Stop) => {
            let response = IpcClient::new()?.stop().await?;
            Display::show_action(&response);
        }
        Some(Commands::Snooze) => {
            let response = IpcClient::new()?.snooze().await?;
            Display::show_action(&response);
        }
        Some(Commands::Status) => {
            let response = IpcClient::new()?.status().await?;
            Display::show_status(&response);
        }
        Some(Commands::Permissions) => {
            let response = IpcClient::new()?.permissions().await?;
            Display::show_permissions(&response);
        }
        Some(Commands::Settings { surface }) => {
            let response = IpcClient::new()?.open_settings(surface).await?;
            Display::show_settings(&response);
        }
        Some(Commands::Watch { since }) => {
            run_watch(&IpcClient::new()?, since).await?;
        }
        Some(Commands::Daemon) => {
            daemon::run_daemon(AlarmConfig::load()?).await?;
        }
        Some(Commands::Install) => {
            launchagent::install()?;
            Display::show_install_success();
        }
        Some(Commands::Uninstall) => {
            launchagent::uninstall()?;
            Display::show_uninstall_success();
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}
