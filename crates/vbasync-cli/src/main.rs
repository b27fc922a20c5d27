mod cli;
mod commands;
mod interactive;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use commands::CommandOptions;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    // First Ctrl+C stops a running watcher, otherwise it interrupts
    let stop = Arc::new(AtomicBool::new(false));
    let watching = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        let watching = Arc::clone(&watching);
        ctrlc::set_handler(move || {
            if watching.load(Ordering::SeqCst) && !stop.swap(true, Ordering::SeqCst) {
                eprintln!("\nStopping...");
                return;
            }
            eprintln!("\n\nInterrupted by user (Ctrl+C)");
            std::process::exit(130); // Standard exit code for SIGINT
        })
        .context("Failed to set Ctrl+C handler")?;
    }

    let options = CommandOptions::new(
        cli.config.as_deref(),
        cli.no_config,
        cli.host_state.as_deref(),
    );

    match &cli.command {
        Commands::Export { sync, output } => {
            commands::Export::execute(sync, output.as_deref(), &options)
                .context("Failed to execute export command")?;
        }
        Commands::Import { sync, input } => {
            commands::Import::execute(sync, input.as_deref(), &options)
                .context("Failed to execute import command")?;
        }
        Commands::Edit {
            sync,
            output,
            sync_delete,
            no_bidirectional,
            poll_interval,
        } => {
            let watch = commands::EditArgs {
                output: output.as_deref(),
                sync_delete: *sync_delete,
                no_bidirectional: *no_bidirectional,
                poll_interval: *poll_interval,
            };
            watching.store(true, Ordering::SeqCst);
            commands::Edit::execute(sync, &watch, &options, &stop)
                .context("Failed to execute edit command")?;
        }
        Commands::Config => {
            commands::Config::execute(&options).context("Failed to execute config command")?;
        }
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
