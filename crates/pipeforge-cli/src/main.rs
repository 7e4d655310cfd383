mod display;
mod orb_http;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use orb_http::HttpOrbSource;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pipeforge",
    version,
    about = "pipeforge — compiles a high-level CircleCI-style pipeline config into a flat, fully-expanded low-level pipeline document"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a pipeline config, resolving parameters, orbs, conditionals, and matrices
    Compile {
        /// Path to the source config file
        path: PathBuf,

        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pipeline parameter values, as a JSON object (e.g. '{"parameters": {"image": "node:18"}}')
        #[arg(long)]
        pipeline_values: Option<String>,
    },

    /// Validate a legacy v2/2.1 config against the structural rule set
    Validate {
        /// Path to the source config file
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            path,
            output,
            pipeline_values,
        } => cmd_compile(&path, output.as_deref(), pipeline_values.as_deref()),
        Commands::Validate { path } => cmd_validate(&path),
    }
}

fn cmd_compile(path: &std::path::Path, output: Option<&std::path::Path>, pipeline_values: Option<&str>) -> Result<()> {
    let source = std::fs::read(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;

    let pipeline_params = pipeline_values
        .map(serde_json::from_str)
        .transpose()
        .context("--pipeline-values must be valid JSON")?;

    let orb_source = HttpOrbSource::new();
    let compiled = pipeforge_core::compile(&source, pipeline_params, &orb_source);

    match compiled {
        Ok(bytes) => {
            match output {
                Some(out_path) => {
                    std::fs::write(out_path, &bytes)
                        .with_context(|| format!("failed to write '{}'", out_path.display()))?;
                    display::print_success(&format!("compiled config written to {}", out_path.display()));
                }
                None => {
                    print!("{}", String::from_utf8_lossy(&bytes));
                }
            }
            Ok(())
        }
        Err(err) => {
            display::print_error(&err);
            anyhow::bail!("compilation failed");
        }
    }
}

fn cmd_validate(path: &std::path::Path) -> Result<()> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;

    match pipeforge_core::validate(&source) {
        Ok(()) => {
            display::print_success(&format!("'{}' is valid", path.display()));
            Ok(())
        }
        Err(err) => {
            display::print_error(&err);
            anyhow::bail!("validation failed");
        }
    }
}
