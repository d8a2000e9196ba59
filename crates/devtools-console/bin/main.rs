use clap::{Parser, Subcommand};
use eyre::Result;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

mod cmd;

use cmd::console::ConsoleArgs;

#[derive(Debug, Parser)]
#[command(name = "devtools-console", version, about = "Live console for sandboxed code runners")]
struct Cli {
    /// File receiving diagnostic logs; filtered with RUST_LOG
    #[arg(long, global = true, default_value = "devtools-console.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Attach to a running process and show its console
    Console(ConsoleArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(&cli.log_file)?;

    match cli.cmd {
        Command::Console(args) => args.run(),
    }
}

// The terminal belongs to the TUI, so diagnostics only go to a file.
fn init_tracing(path: &PathBuf) -> Result<WorkerGuard> {
    let log_file = OpenOptions::new().create(true).append(true).open(path)?;
    let (writer, guard) = non_blocking(log_file);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("devtools_console=warn"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(env_filter);

    let _ = tracing_subscriber::registry().with(file_layer).try_init();
    Ok(guard)
}
