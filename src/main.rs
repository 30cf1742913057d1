use clap::{Parser, ValueHint};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use terrain_graph::commands::{PreviewRequest, PreviewService};
use terrain_graph::config::PreviewConfig;
use terrain_graph::eval::Strategy;
use terrain_graph::{telemetry, Result};
use tracing::error;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Evaluate a terrain node graph and print the preview heightmap as JSON"
)]
struct Cli {
    /// Preview request JSON: `{ nodes, connections, width?, height?, seed? }`
    #[arg(long, value_hint = ValueHint::FilePath)]
    graph: PathBuf,

    /// Override the grid width
    #[arg(long, allow_negative_numbers = true)]
    width: Option<i64>,

    /// Override the grid height
    #[arg(long, allow_negative_numbers = true)]
    height: Option<i64>,

    /// Override the seed
    #[arg(long, allow_negative_numbers = true)]
    seed: Option<i32>,

    /// TOML config file (defaults to ./terrain-preview.toml)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Evaluate nodes one at a time instead of level-parallel
    #[arg(long)]
    sequential: bool,

    /// Pretty-print the response
    #[arg(long)]
    pretty: bool,
}

fn run(cli: Cli) -> Result<String> {
    let config_path = cli.config.unwrap_or_else(PreviewConfig::default_path);
    let mut config = PreviewConfig::load(&config_path);
    if cli.sequential {
        config.strategy = Strategy::Recursive;
    }

    let data = fs::read_to_string(&cli.graph)?;
    let mut request: PreviewRequest = serde_json::from_str(&data)?;
    request.width = cli.width.or(request.width);
    request.height = cli.height.or(request.height);
    request.seed = cli.seed.or(request.seed);

    let response = PreviewService::new(config).evaluate(request)?;
    let json = if cli.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    Ok(json)
}

fn main() -> ExitCode {
    telemetry::init_tracing();
    let cli = Cli::parse();
    let graph = cli.graph.display().to_string();
    match run(cli) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%graph, "preview failed: {err}");
            ExitCode::FAILURE
        }
    }
}
