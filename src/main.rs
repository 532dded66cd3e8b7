use std::path::PathBuf;

use clap::Parser;
use cluster::{Cluster, ClusterConfig, HttpFeed, StdinFeed, TelemetrySource};

#[derive(Parser)]
#[command(version, about = "Instrument cluster gauges", long_about = None)]
struct Args {
    /// TOML file with window, feed and gauge settings.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// TrueType font for dial labels.
    #[arg(long)]
    font: Option<PathBuf>,
    /// Read JSON telemetry lines from stdin.
    #[arg(long)]
    stdin: bool,
    /// Poll this URL for JSON telemetry.
    #[arg(long, value_name = "URL", conflicts_with = "stdin")]
    url: Option<String>,
    /// Write one SVG per gauge into this directory and exit.
    #[arg(long, value_name = "DIR")]
    snapshot: Option<PathBuf>,
    /// Seed for the synthetic generator.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ClusterConfig::from_file(path)?,
        None => ClusterConfig::default(),
    };
    if let Some(font) = args.font {
        config.font_path = Some(font);
    }
    if let Some(seed) = args.seed {
        config.mock.seed = Some(seed);
    }

    if let Some(url) = args.url {
        config.feed.url = Some(url);
    }

    let live: Option<Box<dyn TelemetrySource>> = if args.stdin {
        log::info!("reading telemetry from stdin");
        Some(Box::new(StdinFeed::spawn(&config.feed)))
    } else if let Some(url) = &config.feed.url {
        log::info!("polling telemetry from {}", url);
        Some(Box::new(HttpFeed::spawn(url.clone(), &config.feed)))
    } else {
        None
    };

    let cluster = Cluster::new(config, live);
    match args.snapshot {
        Some(dir) => {
            cluster.snapshot_svg(&dir)?;
        }
        None => cluster.run_window()?,
    }
    Ok(())
}
