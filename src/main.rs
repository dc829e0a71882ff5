//! cbloop - CLI

use anyhow::{Context, Result};
use cbloop::util::config::RuntimeConfig;
use cbloop::util::logger::{self, LogLevel};
use cbloop::{check_file, run_file, NAME, VERSION};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// Run Cb programs on the cooperative async scheduler
#[derive(Parser, Debug)]
#[command(name = "cbloop")]
#[command(author = "Cb Team")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (debug logging)
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (RON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a program file
    Run {
        /// Program to run
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Load a program file and report what it declares
    Check {
        /// Program to check
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Run a program file and print the final task table as JSON
    Tasks {
        /// Program to run
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = RuntimeConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        config.log.level
    };
    logger::init_with_level(level);

    if args.verbose {
        eprintln!("cbloop version: {}", VERSION);
        eprintln!("Host: {}", std::env::consts::OS);
    }

    match args.command {
        Commands::Run { file } => {
            if let Err(e) = run_file(&file, &config) {
                eprintln!("{} {:#}", "error:".red().bold(), e);
                std::process::exit(1);
            }
        }
        Commands::Check { file } => {
            let summary = check_file(&file).with_context(|| format!("Failed to check: {}", file.display()))?;
            println!("{} {}", "ok".green().bold(), file.display());
            println!("  structs:          {}", summary.structs);
            println!(
                "  functions:        {} ({} async, {} auto-yield)",
                summary.functions, summary.async_functions, summary.auto_yield_functions
            );
            println!("  main statements:  {}", summary.main_statements);
            println!("  total statements: {}", summary.total_statements);
        }
        Commands::Tasks { file } => {
            config.interpreter.echo_output = false;
            let report = run_file(&file, &config).with_context(|| format!("Failed to run: {}", file.display()))?;
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize task table")?;
            println!("{}", json);
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}
