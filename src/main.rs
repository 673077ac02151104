use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use songform::config::{AppConfig, SegmentationConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "songform", version, about = "Song structure analyzer")]
struct Cli {
    /// Path to a config file (defaults to the XDG config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Per-run overrides; anything left unset falls back to the config file.
#[derive(Args, Default)]
struct Overrides {
    /// Classifier split point as a fraction (0.5 = median)
    #[arg(long)]
    threshold_percentile: Option<f64>,

    /// Width of the hysteresis dead zone around the median
    #[arg(long)]
    hysteresis_factor: Option<f64>,

    /// Minimum section length in seconds
    #[arg(long)]
    min_section_duration: Option<f64>,

    /// Minimum relative energy change to flag a transition
    #[arg(long)]
    spike_threshold: Option<f64>,

    /// Beats averaged into the transition baseline
    #[arg(long)]
    lookback_window: Option<usize>,

    /// Minimum seconds between reported transitions
    #[arg(long)]
    min_time_gap: Option<f64>,

    /// Weight of zero-crossing rate in the energy score
    #[arg(long)]
    zcr_weight: Option<f64>,
}

impl Overrides {
    fn apply(&self, mut config: SegmentationConfig) -> SegmentationConfig {
        if let Some(v) = self.threshold_percentile {
            config.threshold_percentile = v;
        }
        if let Some(v) = self.hysteresis_factor {
            config.hysteresis_factor = v;
        }
        if let Some(v) = self.min_section_duration {
            config.min_section_duration = v;
        }
        if let Some(v) = self.spike_threshold {
            config.spike_threshold = v;
        }
        if let Some(v) = self.lookback_window {
            config.lookback_window = v;
        }
        if let Some(v) = self.min_time_gap {
            config.min_time_gap = v;
        }
        if let Some(v) = self.zcr_weight {
            config.weights.zero_crossing_rate = v;
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Segment tracks into energy sections and detect transitions
    Segment {
        /// Feature files or directories containing them
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Print results as JSON instead of a text report
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Print the effective segmentation config
    Config {
        #[command(flatten)]
        overrides: Overrides,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Explicit --config must load; the default location is optional
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path).context("Failed to load config")?,
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Segment {
            paths,
            jobs,
            json,
            overrides,
        } => {
            let segmentation = overrides.apply(config.segmentation.clone());
            segmentation.validate().context("Invalid segmentation parameters")?;

            let files = songform::input::discover_feature_files(&paths)
                .context("Failed to collect feature files")?;
            if files.is_empty() {
                anyhow::bail!("No feature files found in the given paths.");
            }

            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let result = songform::analyzer::analyze_files(&files, &segmentation, workers, !json)
                .context("Analysis failed")?;

            if json {
                let tracks: Vec<serde_json::Value> = result
                    .analyses
                    .iter()
                    .map(|(path, analysis)| {
                        serde_json::json!({
                            "path": path.display().to_string(),
                            "analysis": analysis,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&tracks).context("Failed to encode results")?
                );
            } else {
                for (path, analysis) in &result.analyses {
                    println!("{}", songform::report::render(&path.display().to_string(), analysis));
                }
                println!(
                    "Segmentation complete: {} analyzed, {} failed",
                    result.analyses.len(),
                    result.failed
                );
            }
        }

        Commands::Config { overrides } => {
            let effective = AppConfig {
                workers: config.workers,
                segmentation: overrides.apply(config.segmentation.clone()),
            };
            let text = toml::to_string_pretty(&effective).context("Failed to encode config")?;
            print!("{}", text);
        }
    }

    Ok(())
}
