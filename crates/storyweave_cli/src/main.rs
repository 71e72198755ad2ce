//! Command-line entry point for timeline imports.
//!
//! # Responsibility
//! - Parse arguments, optionally start file logging, and run one import.
//! - Print the tagged result line verbatim and map it to the exit code.

use clap::Parser;
use log::warn;
use std::path::PathBuf;
use std::process::ExitCode;
use storyweave_core::{default_log_level, import_timeline, init_logging, target_path, ImportConfig};

/// Merge an Aeon Timeline 3 project or CSV export into a yWriter 7 project.
#[derive(Parser, Debug)]
#[command(name = "storyweave")]
#[command(version)]
struct Args {
    /// Aeon Timeline 3 project file (.aeon) or CSV export
    source: PathBuf,

    /// Print only the result line
    #[arg(short, long)]
    silent: bool,

    /// Absolute directory for rolling log files; logging is off when omitted
    #[arg(long, env = "STORYWEAVE_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(log_dir) = &args.log_dir {
        let level = args.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(message) = init_logging(level, &log_dir.to_string_lossy()) {
            eprintln!("WARNING: logging disabled: {message}");
        }
    }

    if !args.silent {
        println!("Timeline: {}", args.source.display());
        println!("Project:  {}", target_path(&args.source).display());
    }

    match import_timeline(&args.source, &ImportConfig::default()) {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            warn!("event=cli_exit module=cli status=error");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
