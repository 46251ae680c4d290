//! War Council - command-line entry point
//!
//! Loads configuration, runs one council session and prints messages and
//! eliminations as they happen.

mod cli;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use war_council::backend::{self, BackendKind};
use war_council::config::{self, CouncilConfig};
use war_council::council::{ChannelObserver, Message, SessionController, SessionEvent, SessionStatus};
use war_council::error::{Error, ErrorCode, Result};
use war_council::logging::{self, LogGuards};
use war_council::persona::RoleRegistry;
use war_council::version;

use crate::cli::{Cli, Commands, ConfigSubcommand};

fn main() {
    match try_main() {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprint!("{}", e.format_for_terminal());
            std::process::exit(e.exit_code());
        }
    }
}

/// Returns the process exit code. Log guards are dropped before it is used.
fn try_main() -> Result<i32> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(0)
        }
        Commands::Personas => {
            print_personas();
            Ok(0)
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            handle_config_command(subcommand)?;
            Ok(0)
        }
        Commands::Run {
            config,
            impostor,
            mock,
            max_turns,
            no_pacing,
        } => {
            let mut config = CouncilConfig::load(config.as_deref())?;
            if let Some(index) = impostor {
                config.session.impostor_index = Some(index as usize);
            }
            if let Some(max_turns) = max_turns {
                config.session.max_turns = max_turns;
            }
            if no_pacing {
                config.pacing.min_turn_delay_ms = 0;
                config.pacing.max_turn_delay_ms = 0;
            }
            if mock {
                config.backend.kind = BackendKind::Mock;
            }

            // The guards must be kept alive for the lifetime of the program
            let _log_guards = init_logging_from_config(&config, cli.verbose, cli.quiet)?;

            let build = version::BuildInfo::current();
            info!(
                version = %build.full_version(),
                target = %build.target,
                profile = %build.profile,
                "Starting War Council"
            );

            let status = run_council(config)?;
            Ok(status_exit_code(status))
        }
    }
}

fn init_logging_from_config(config: &CouncilConfig, verbose: u8, quiet: bool) -> Result<LogGuards> {
    logging::init_logging(&config.logging, verbose, quiet)
}

/// Run one session on a fresh runtime
fn run_council(config: CouncilConfig) -> Result<SessionStatus> {
    info!(
        backend = %config.backend.kind,
        model = %config.backend.model,
        max_turns = config.session.max_turns,
        eliminations = config.elimination.enabled,
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("war-council")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    runtime.block_on(async_council_main(config))
}

/// An aborted session exits like a generation failure
fn status_exit_code(status: SessionStatus) -> i32 {
    match status {
        SessionStatus::Aborted => ErrorCode::GenerationFailed.exit_code(),
        _ => 0,
    }
}

async fn async_council_main(config: CouncilConfig) -> Result<SessionStatus> {
    let generator = backend::create_backend(&config.backend)?;
    let (observer, events) = ChannelObserver::new();

    let controller = SessionController::new(generator, config.controller_settings()).with_observer(Arc::new(observer));

    let session = controller.initialize_conversation(config.session.impostor_index).await?;
    info!(
        session_id = %session.id(),
        impostor = %session.impostor(),
        "Session started"
    );

    pump_events(&controller, events).await;

    let outcome = controller.wait().await?;
    match outcome.status {
        SessionStatus::Aborted => {
            eprintln!(
                "Session aborted after {} turns: {}",
                outcome.turns,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
        status => {
            println!();
            println!("Session {} after {} turns.", status, outcome.turns);
        }
    }
    println!("The impostor was the {}.", session.impostor());

    Ok(outcome.status)
}

/// Print events until the session ends or Ctrl+C stops it
async fn pump_events(controller: &SessionController, mut events: UnboundedReceiver<SessionEvent>) {
    let shutdown_signal = tokio::signal::ctrl_c();
    tokio::pin!(shutdown_signal);
    let mut stopping = false;

    loop {
        tokio::select! {
            result = &mut shutdown_signal, if !stopping => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                info!("Shutdown signal received");
                controller.stop_conversation();
                stopping = true;
            }

            event = events.recv() => {
                match event {
                    Some(SessionEvent::Message(message)) => print_message(&message),
                    Some(SessionEvent::Elimination { name }) => {
                        println!();
                        println!("*** The {} has been removed from the council. ***", name);
                        println!();
                    }
                    Some(SessionEvent::Ended(_)) | None => break,
                }
            }
        }
    }
}

fn print_message(message: &Message) {
    println!("[{}] {}", message.name, message.content);
}

fn print_personas() {
    let registry = RoleRegistry::new();
    for (index, persona) in registry.list_personas().iter().enumerate() {
        println!("{:>2}  {:<11} {}", index, persona.name.as_str(), persona.help_text);
    }
}

/// Handle config subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = CouncilConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate { config } => {
            CouncilConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
