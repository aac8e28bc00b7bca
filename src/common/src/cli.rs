use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments shared across binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Subcommands that only inspect the configuration
#[derive(Subcommand, Debug, Clone)]
pub enum CommonCommands {
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Pick the log level implied by the CLI flags, quiet wins over verbose
    pub fn log_level(args: &CommonArgs) -> &'static str {
        if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Initialize logging based on CLI arguments
    ///
    /// Logs go to stderr so stdout stays reserved for produced metrics.
    /// `RUST_LOG` takes precedence over the flags when set.
    pub fn init_logging(args: &CommonArgs) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(args)));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("metricjson configuration:");
            println!("=========================");
            println!("Output format: {:?}", config.output.format);
            println!("Rule sets: {}", config.rule_sets.len());

            for rule_set in &config.rule_sets {
                println!("- metric '{}'", rule_set.metric_name);
                for field in &rule_set.basic_fields {
                    let name = field.name.as_deref().unwrap_or("<last segment>");
                    match field.field_type {
                        Some(ty) => println!("    basic  {} -> {name} ({ty})", field.query),
                        None => println!("    basic  {} -> {name}", field.query),
                    }
                }
                for field in &rule_set.object_fields {
                    println!(
                        "    object {} ({} renames, {} typed keys)",
                        field.query,
                        field.name_map.len(),
                        field.type_map.len()
                    );
                }
            }
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        config.validate()?;

        if config.rule_sets.is_empty() {
            log::warn!("No rule sets configured, parsing will not produce any metrics");
        }

        log::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Handle the configuration-only commands
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<()> {
        match command {
            CommonCommands::Config { json } => display_config(config, *json),
            CommonCommands::Validate => validate_config(config),
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(())
            }
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}
