// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Outfit Classifier CLI
//!
//! Runs the classification web server and a few maintenance commands over
//! the data directory.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use outfit_classifier::config::AppConfig;
use outfit_classifier::images::ImageLibrary;
use outfit_classifier::store::DataStore;
use outfit_classifier::weather::{self, CONDITION_TYPES_FILE, POSSIBLE_CONDITIONS_FILE};
use outfit_classifier::{ClassifierError, Result};

/// Outfit Classifier - manual outfit tagging server
#[derive(Parser, Debug)]
#[command(name = "outfit-classifier")]
#[command(version)]
#[command(about = "Local web tool for classifying outfit image directories", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Base directory holding data/ and static/ (overrides config and DIRNAME)
    #[arg(short, long, global = true)]
    base_data_path: Option<PathBuf>,

    /// Image tree root (default: <base>/../images)
    #[arg(long, global = true)]
    images_path: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the classification web server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Rebuild directories.json from the image tree
    Sync {
        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Show classification progress
    Progress,

    /// Create the data directory with empty state files
    Init {
        /// Base directory to initialize (default: configured base)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Reset existing state files and configuration
        #[arg(long)]
        force: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Derive weather condition types from cached forecasts
    Weather {
        #[command(subcommand)]
        action: WeatherCommands,
    },
}

#[derive(Subcommand, Debug)]
enum WeatherCommands {
    /// Count the dominant descriptor of every cached forecast day
    Describe {
        /// Forecast cache (city -> list of days)
        #[arg(short, long, default_value = "weather.json")]
        input: PathBuf,

        /// Output file (default: <data>/condition_types.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List observed condition types close to each preset condition
    Match,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration and check the data layout
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = resolve_config(&cli)?;

    match cli.command {
        Some(Commands::Serve { host, port }) => run_serve(config, host, port).await,
        Some(Commands::Sync { dry_run }) => run_sync(&config, dry_run),
        Some(Commands::Progress) => run_progress(&config),
        Some(Commands::Init { dir, force }) => run_init(config, dir, force, &cli.config),
        Some(Commands::Config { action }) => run_config_command(&config, action, &cli.config),
        Some(Commands::Weather { action }) => run_weather_command(&config, action),
        None => run_serve(config, None, None).await,
    }
}

/// Config file, then `DIRNAME`, then command-line flags
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(&cli.config)?;
    config.apply_env();

    if let Some(base) = &cli.base_data_path {
        config.base_data_path = base.clone();
    }
    if let Some(images) = &cli.images_path {
        config.images_path = Some(images.clone());
    }

    Ok(config)
}

async fn run_serve(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.web.host = host;
    }
    if let Some(port) = port {
        config.web.port = port;
    }

    info!("Outfit Classifier v{}", env!("CARGO_PKG_VERSION"));

    if !config.data_dir().is_dir() {
        warn!("Data directory {:?} not found. Try: outfit-classifier init", config.data_dir());
    }

    outfit_classifier::web::start_server(config).await
}

/// Sync the registry with the outfit directories on disk
fn run_sync(config: &AppConfig, dry_run: bool) -> Result<()> {
    let library = ImageLibrary::new(config.images_dir());
    let store = DataStore::new(config.data_dir());

    let names = library.outfit_names()?;
    info!("Found {} outfit directories in {:?}", names.len(), library.root());

    let report = store.sync_directories(&names, dry_run)?;

    for name in &report.added {
        println!("  + {}", name);
    }
    for name in &report.removed {
        println!("  - {}", name);
    }

    if dry_run {
        println!(
            "Would sync {} outfits ({} added, {} removed)",
            report.total,
            report.added.len(),
            report.removed.len()
        );
    } else {
        println!(
            "Synced {} outfits ({} added, {} removed)",
            report.total,
            report.added.len(),
            report.removed.len()
        );
    }

    Ok(())
}

fn run_progress(config: &AppConfig) -> Result<()> {
    let store = DataStore::new(config.data_dir());
    let progress = store.progress()?;

    println!("Classification progress:");
    println!("  Classified: {} / {}", progress.classified, progress.total);
    println!("  Pending: {}", progress.pending);
    println!("  Remaining: {}", progress.total.saturating_sub(progress.classified));

    Ok(())
}

/// Initialize a base directory
fn run_init(mut config: AppConfig, dir: Option<PathBuf>, force: bool, config_path: &Path) -> Result<()> {
    if let Some(dir) = dir {
        config.base_data_path = dir;
    }

    if config_path.exists() && !force {
        return Err(ClassifierError::Config(format!(
            "{} already exists. Use --force to overwrite",
            config_path.display()
        )));
    }

    let store = DataStore::new(config.data_dir());
    let created = store.initialize(force)?;
    std::fs::create_dir_all(config.static_dir())?;
    config.save(config_path)?;

    println!("Initialized {:?}", config.base_data_path);
    println!("\nCreated:");
    for path in &created {
        println!("  - {}", path.display());
    }
    println!("  - {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Put outfit folders in {:?}", config.images_dir());
    println!("  2. Register them: outfit-classifier sync");
    println!("  3. Start the server: outfit-classifier serve");

    Ok(())
}

fn run_config_command(config: &AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            println!("Configuration at {:?} is valid", config_path);
            let checks = [
                ("Data", config.data_dir()),
                ("Static", config.static_dir()),
                ("Images", config.images_dir()),
            ];
            for (label, path) in checks {
                let status = if path.is_dir() { "ok" } else { "missing" };
                println!("  {} directory: {} ({})", label, path.display(), status);
            }
            println!("  Listen address: {}", config.bind_addr());
        }
    }

    Ok(())
}

fn run_weather_command(config: &AppConfig, action: WeatherCommands) -> Result<()> {
    match action {
        WeatherCommands::Describe { input, output } => {
            let output = output.unwrap_or_else(|| config.data_dir().join(CONDITION_TYPES_FILE));
            let types = weather::describe_cache(&input, &output)?;

            for (descriptor, count) in &types.counts {
                println!("  {:>4}  {}", count, descriptor);
            }
            println!(
                "Wrote {} condition types from {} days to {:?}",
                types.counts.len(),
                types.days,
                output
            );
            if types.dropped_cities > 0 {
                warn!("{} cities had no forecast data", types.dropped_cities);
            }
        }
        WeatherCommands::Match => {
            let presets = weather::load_conditions(&config.data_dir().join(POSSIBLE_CONDITIONS_FILE))?;
            let observed = weather::load_condition_types(&config.data_dir().join(CONDITION_TYPES_FILE))?;

            let matches = weather::close_matches(&presets, observed.keys().map(String::as_str));
            for (preset, close) in &matches {
                println!("{} ({} close)", preset, close.len());
                for descriptor in close {
                    println!("  - {} [{}]", descriptor, observed.get(descriptor).copied().unwrap_or(0));
                }
            }
        }
    }

    Ok(())
}
