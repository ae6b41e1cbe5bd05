use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process;

use token_ledger::backfill::{Backfill, BackfillOutcome};
use token_ledger::config::Config;
use token_ledger::logging::init_logging;

#[derive(Parser)]
#[command(name = "token-ledger")]
#[command(about = "Per-turn token and cost ledger for Claude Code sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the project's transcripts into its ledger
    Backfill {
        /// Project root whose sessions should be recorded
        project_root: PathBuf,
    },
    /// Fill in missing turn durations from the project's transcripts
    PatchDurations {
        /// Project root whose ledger should be patched
        project_root: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let _guard = init_logging(&config.logging, &config.paths.log_directory);
    let backfill = Backfill::new(&config);

    match cli.command {
        Commands::Backfill { project_root } => match backfill.run(&project_root)? {
            BackfillOutcome::NoTranscripts { .. } => {
                println!("No transcript directory found, nothing to backfill.");
            }
            BackfillOutcome::Completed(report) => {
                println!(
                    "{} processed, {} written.",
                    plural(report.sessions_processed, "session"),
                    plural(report.turns_written(), "turn")
                );
            }
        },
        Commands::PatchDurations { project_root } => {
            match backfill.patch_durations(&project_root)? {
                BackfillOutcome::NoTranscripts { .. } => {
                    println!("No transcript directory found, nothing to patch.");
                }
                BackfillOutcome::Completed(report) => {
                    println!(
                        "{} patched, {} migrated to per-turn format.",
                        plural(report.turns_patched, "turn"),
                        plural(report.sessions_migrated, "session")
                    );
                }
            }
        }
    }

    Ok(())
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}
