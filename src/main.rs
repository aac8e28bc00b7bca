use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};
use common::config::{Configuration, OutputFormat};
use common::model::Metric;
use parser::{JsonParser, MetricParser};

#[derive(Parser)]
#[command(name = "metricjson")]
#[command(about = "Turn JSON documents into flat metrics using declarative field rules")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a JSON document and print the resulting metrics (default)
    Parse(ParseArgs),
    #[command(flatten)]
    Common(CommonCommands),
}

impl Default for Commands {
    fn default() -> Self {
        Self::Parse(ParseArgs::default())
    }
}

#[derive(Args, Debug, Default)]
struct ParseArgs {
    /// Document to read, stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output format, overrides the configured one
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    utils::init_logging(&cli.common);

    let config = utils::load_config(cli.common.config.as_ref())?;

    match cli.command.unwrap_or_default() {
        Commands::Common(command) => utils::handle_common_command(&command, &config),
        Commands::Parse(args) => run_parse(&args, &config),
    }
}

fn run_parse(args: &ParseArgs, config: &Configuration) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    if config.rule_sets.is_empty() {
        log::warn!("No rule sets configured, no metrics will be produced");
    }

    let input = read_input(args.input.as_deref())?;
    tracing::debug!(bytes = input.len(), "Read input document");

    let parser = JsonParser::from_config(config);
    let metrics = parser.parse(&input).context("Failed to parse document")?;

    let format = args.format.unwrap_or(config.output.format);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut written = 0;
    for metric in &metrics {
        match render(metric, format)? {
            Some(rendered) => {
                writeln!(out, "{rendered}")?;
                written += 1;
            }
            None => log::debug!("Skipping metric '{}' without fields", metric.name),
        }
    }
    out.flush()?;

    log::info!("Produced {} metrics, wrote {written}", metrics.len());
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("Failed to read input file {}", path.display())),
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("Failed to read input from stdin")?;
            Ok(buffer)
        }
    }
}

/// Render one metric, `None` when it carries nothing to write
fn render(metric: &Metric, format: OutputFormat) -> Result<Option<String>> {
    match format {
        OutputFormat::Line => Ok(metric.to_line_protocol()),
        OutputFormat::Json if metric.field_count() == 0 => Ok(None),
        OutputFormat::Json => serde_json::to_string(metric)
            .map(Some)
            .context("Failed to serialize metric to JSON"),
    }
}
