use aixos::commands::{cmd_config, cmd_doctor, cmd_history, cmd_query, cmd_stats};
use aixos::config::load_config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aixos", version, about = "Say what you want done; get shell commands, run safely")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Run without asking for confirmation
    #[arg(short = 'y', long = "yes")]
    yes: bool,

    /// Only show the plan
    #[arg(short = 'e', long = "explain")]
    explain: bool,

    /// Config file (TOML or JSON)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Cmd>,

    /// What you want done, in plain words
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Show recent requests
    History,
    /// Show memory statistics
    Stats,
    /// Check backend, memory, and config
    Doctor,
    /// Open the config file in $EDITOR
    Config,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("aixos={}", level.to_lowercase())));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("aixos: {}", e);
            std::process::exit(2);
        }
    };
    init_logging(&config.logging.level);

    let result = match cli.command {
        Some(Cmd::History) => cmd_history(&config),
        Some(Cmd::Stats) => cmd_stats(&config),
        Some(Cmd::Doctor) => cmd_doctor(&config),
        Some(Cmd::Config) => cmd_config(),
        None => {
            let query = cli.query.join(" ");
            if query.trim().is_empty() {
                eprintln!("usage: aixos [-y] [-e] <request>");
                eprintln!("       aixos history | stats | doctor | config");
                return;
            }
            cmd_query(&query, &config, cli.yes, cli.explain)
        }
    };

    if let Err(e) = result {
        eprintln!("aixos: {}", e);
        std::process::exit(1);
    }
}
