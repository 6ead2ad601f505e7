use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use implicit_rec_core::{load_dotenv, FactorFormat, LogFormat};
use std::path::PathBuf;

mod commands;

use commands::Settings;

#[derive(Parser)]
#[command(name = "irec")]
#[command(about = "Implicit-feedback recommendations with weighted ALS", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    overrides: Overrides,
}

/// Flags that override `IMPLICIT_REC_*` environment settings
#[derive(Args, Debug, Default)]
pub struct Overrides {
    #[arg(long, global = true, help = "Tab-separated ratings file (user item rating [timestamp])")]
    pub ratings: Option<PathBuf>,

    #[arg(long, global = true, help = "Pipe-separated item catalog (id|title|...)")]
    pub catalog: Option<PathBuf>,

    #[arg(long, global = true, help = "Directory for persisted factors")]
    pub factor_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Factor file format: tsv or snapshot")]
    pub format: Option<FactorFormat>,

    #[arg(long, global = true, help = "Number of latent factors")]
    pub factors: Option<usize>,

    #[arg(long, global = true, help = "Number of ALS iterations")]
    pub iterations: Option<usize>,

    #[arg(long, global = true, help = "Ridge regularization (lambda)")]
    pub regularization: Option<f64>,

    #[arg(long, global = true, help = "Confidence scaling (alpha)")]
    pub alpha: Option<f64>,

    #[arg(long, global = true, help = "Seed for factor initialization")]
    pub seed: Option<u64>,

    #[arg(long, global = true, help = "Solve rows in parallel")]
    pub parallel: bool,

    #[arg(long, global = true, help = "Log format: pretty, compact or json")]
    pub log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fit factors from the ratings file and save them")]
    Fit,

    #[command(about = "Recommend items for a user")]
    Recommend {
        #[arg(short, long, help = "External user id (as in the ratings file)")]
        user: u64,

        #[arg(short, default_value = "5", help = "Number of items to return")]
        k: usize,

        #[arg(long, help = "Rank items the user already interacted with")]
        include_seen: bool,

        #[arg(long, help = "Ignore saved factors and fit again")]
        refit: bool,

        #[arg(long, help = "Print JSON instead of a table")]
        json: bool,
    },

    #[command(about = "Show the effective configuration")]
    Config,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    load_dotenv();

    let cli = Cli::parse();
    let settings = Settings::resolve(&cli.overrides)?;

    // Config only prints, so it skips the log subscriber
    if let Commands::Config = cli.command {
        commands::config(&settings)?;
        return Ok(());
    }

    implicit_rec_core::init_logging(&settings.log)?;

    match cli.command {
        Commands::Fit => {
            commands::fit(&settings)?;
        }
        Commands::Recommend {
            user,
            k,
            include_seen,
            refit,
            json,
        } => {
            commands::recommend(&settings, user, k, include_seen, refit, json)?;
        }
        Commands::Config => unreachable!("Config command handled above"),
    }

    Ok(())
}
