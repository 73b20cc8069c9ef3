use clap::{Parser, Subcommand};
use std::path::Path;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use weatherflower::cli::commands;
use weatherflower::config::{AppConfig, Environment};

#[derive(Parser)]
#[command(name = "weatherflower")]
#[command(about = "A hex-flower weather generator with a JSON HTTP API")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    /// Environment table to merge over the base configuration
    #[arg(short, long, global = true, value_enum, default_value = "development")]
    env: Environment,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,

    /// List climates and their seasons
    Climates,

    /// Show the dice-to-direction table
    Table,

    /// Run an offline random walk over the flower
    Walk {
        /// Climate id (defaults to app.default_climate)
        #[arg(long)]
        climate: Option<String>,

        /// Season id (defaults to app.default_season)
        #[arg(long)]
        season: Option<String>,

        /// Number of transitions to roll
        #[arg(short = 'n', long, default_value_t = 10)]
        steps: u32,

        /// Seed for reproducible dice
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn init_logging(config: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config_path = Path::new(&cli.config);
    let (config, found) = match AppConfig::from_file_or_default(config_path, Some(cli.env)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    if !found {
        warn!(path = %config_path.display(), "Config file not found, using defaults");
    }

    let result = match cli.command {
        Commands::Serve => commands::run_server(&config).await,
        Commands::Climates => commands::list_climates(&config),
        Commands::Table => {
            commands::print_table();
            Ok(())
        }
        Commands::Walk {
            climate,
            season,
            steps,
            seed,
        } => commands::walk(
            &config,
            climate.as_deref(),
            season.as_deref(),
            steps,
            seed,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
