use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod branding;
mod commands;

#[derive(Parser)]
#[command(name = "tokenproof")]
#[command(about = "Differential conformance testing for fungible-token contracts", long_about = None)]
struct Cli {
    /// Configuration file (defaults to .tokenproof.toml in the current directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a randomized differential campaign against a token
    Fuzz(commands::fuzz::FuzzArgs),
    /// Run the fixed conformance scenarios against a token
    Check(commands::check::CheckArgs),
    /// List the bundled tokens
    Tokens(commands::tokens::TokensArgs),
    /// Initialize tokenproof in a new project
    Init(commands::init::InitArgs),
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let clean = match cli.command {
        Commands::Fuzz(args) => {
            if !args.format.is_json() {
                branding::print_logo();
            }
            let config = commands::load_config(cli.config.as_deref())?;
            commands::fuzz::exec(args, config)?
        }
        Commands::Check(args) => {
            if !args.format.is_json() {
                branding::print_logo();
            }
            let config = commands::load_config(cli.config.as_deref())?;
            commands::check::exec(args, config)?
        }
        Commands::Tokens(args) => {
            commands::tokens::exec(args)?;
            true
        }
        Commands::Init(args) => {
            commands::init::exec(args)?;
            true
        }
    };

    if !clean {
        std::process::exit(1);
    }
    Ok(())
}
