//! `evm2`: run, assemble and disassemble EVM2 images

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use evm2_runtime::{Process, VmConfig};
use tokio::signal;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "evm2", version, about = "ESET-VM2 toolchain")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and run a program image
    Run {
        /// Program image (.evm)
        program: PathBuf,
        /// Binary file served by the read and write instructions
        file: Option<PathBuf>,
    },
    /// Assemble a source file into a program image
    Asm { source: PathBuf, output: PathBuf },
    /// Print a listing of a program image
    Disasm { program: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    install_tracing(cli.verbose);

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn install_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn execute(command: Command) -> Result<()> {
    match command {
        Command::Run { program, file } => run(program, file),
        Command::Asm { source, output } => {
            let text = fs::read_to_string(&source)
                .with_context(|| format!("reading {}", source.display()))?;
            let program = evm2_assembler::assemble(&text)?;
            fs::write(&output, program.to_bytes())
                .with_context(|| format!("writing {}", output.display()))?;
            Ok(())
        }
        Command::Disasm { program } => {
            let program = evm2_runtime::loader::load(&program)?;
            print!("{}", evm2_disassembler::disassemble(&program)?);
            Ok(())
        }
    }
}

fn run(program: PathBuf, file: Option<PathBuf>) -> Result<()> {
    let config = VmConfig {
        binary_file: file,
        ..VmConfig::default()
    };
    let process = Process::load_with_config(&program, config)?;
    watch_interrupt(process.clone());
    process.start()?;
    Ok(())
}

/// Stop `process` on Ctrl-C
fn watch_interrupt(process: Process) {
    let spawned = thread::Builder::new()
        .name("evm2-interrupt".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    warn!(error = %err, "interrupt handler unavailable");
                    return;
                }
            };

            if runtime.block_on(signal::ctrl_c()).is_ok() {
                debug!("interrupted");
                process.stop();
            }
        });

    if let Err(err) = spawned {
        warn!(error = %err, "interrupt handler unavailable");
    }
}
