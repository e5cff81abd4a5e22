use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pattern_preview::{pattern_bytes, process_bytes, PaletteStore, PatternRequest, PipelineConfig};

/// Turn images into thread-catalog pattern previews.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Optional JSON pipeline configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Quantize images to catalog colors
    Pattern {
        /// One or more input image paths
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// SQLite catalog with a dmc_colors table
        #[arg(long)]
        db: PathBuf,

        /// Maximum number of colors (defaults to the config value)
        #[arg(short = 'k', long)]
        n_colors: Option<usize>,

        /// Working width in pixels (defaults to the config value)
        #[arg(short, long)]
        width: Option<u32>,

        /// Comma-separated catalog codes to restrict matching to
        #[arg(short = 'c', long)]
        codes: Option<String>,

        /// Substitution in the form SOURCE=TARGET, may be repeated
        #[arg(short = 's', long = "substitute")]
        substitutions: Vec<String>,

        /// Median-blur before reduction to flatten fine noise
        #[arg(long)]
        grid_filter: bool,

        /// Output directory
        #[arg(short = 'd', long)]
        out_dir: Option<PathBuf>,

        /// Output filename prefix (ignored when --out-dir supplied)
        #[arg(short = 'p', long, default_value = "pattern_")]
        prefix: String,
    },
    /// Apply a simple operation (resize, grayscale)
    Process {
        input: PathBuf,

        #[arg(long)]
        operation: String,

        #[arg(short, long)]
        output: PathBuf,
    },
}

fn parse_substitutions(raw: &[String]) -> Result<BTreeMap<String, String>> {
    raw.iter()
        .map(|pair| {
            let (source, target) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("substitution must be SOURCE=TARGET, got {pair:?}"))?;
            Ok((source.trim().to_string(), target.trim().to_string()))
        })
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pattern_preview=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Pattern {
            inputs,
            db,
            n_colors,
            width,
            codes,
            substitutions,
            grid_filter,
            out_dir,
            prefix,
        } => {
            let store = PaletteStore::open(&db)
                .with_context(|| format!("opening catalog {}", db.display()))?;
            let request = PatternRequest {
                codes: codes.map(|s| {
                    s.split(',')
                        .map(|x| x.trim().to_string())
                        .filter(|x| !x.is_empty())
                        .collect()
                }),
                substitutions: parse_substitutions(&substitutions)?,
                n_colors: n_colors.unwrap_or(config.default_n_colors),
                width: width.unwrap_or(config.default_width),
                grid_filter,
            };

            for input in &inputs {
                let bytes = fs::read(input)
                    .with_context(|| format!("reading {}", input.display()))?;
                let output = pattern_bytes(&bytes, &request, &store, &config)
                    .context("pattern processing failed")?;

                let out_path = if let Some(dir) = &out_dir {
                    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
                    dir.join(format!("{stem}.png"))
                } else {
                    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
                    PathBuf::from(format!("{prefix}{stem}.png"))
                };

                if let Some(parent) = out_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&out_path, &output.image)?;
                eprintln!("Saved → {}", out_path.display());
                println!("{}", serde_json::to_string(&output)?);
            }
        }
        Commands::Process {
            input,
            operation,
            output,
        } => {
            let bytes = fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
            let png = process_bytes(&bytes, &operation, &config)?;
            fs::write(&output, png)?;
            eprintln!("Saved → {}", output.display());
        }
    }

    Ok(())
}
