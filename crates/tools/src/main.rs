use std::path::PathBuf;

use clap::Parser;
use countries::IndexCache;
use tools::input::{load_airports, load_countries};
use tools::output::{write_airports, write_pgm, write_routes};
use tools::{SynthConfig, ToolError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Synthesize a dense airport set, a route network and its density heatmap.
#[derive(Debug, Parser)]
#[command(name = "globe-synth", version)]
struct Args {
    /// Country boundaries as a GeoJSON FeatureCollection.
    #[arg(long)]
    countries: PathBuf,

    /// Seed airports: JSON array of {name, latitude, longitude}.
    #[arg(long)]
    airports: PathBuf,

    /// Optional JSON config; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    target: Option<usize>,

    /// Minimum airport spacing in degrees.
    #[arg(long)]
    spacing: Option<f64>,

    /// Number of routes to build.
    #[arg(long)]
    routes: Option<usize>,

    /// Seed route synthesis for a reproducible network.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "out")]
    out: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = real_main(Args::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main(args: Args) -> Result<(), ToolError> {
    let mut config = match &args.config {
        Some(path) => SynthConfig::load(path)?,
        None => SynthConfig::default(),
    };
    if let Some(target) = args.target {
        config.airports.target_count = target;
    }
    if let Some(spacing) = args.spacing {
        config.airports.min_spacing_deg = spacing;
    }
    if let Some(count) = args.routes {
        config.routes.count = count;
    }
    if args.seed.is_some() {
        config.route_seed = args.seed;
    }

    let countries = load_countries(&args.countries)?.shared();
    let base = load_airports(&args.airports)?;

    let cache = IndexCache::new();
    let out = tools::run(&config, &countries, &base, &cache);
    if out.heatmap_fell_back {
        warn!("heatmap was built on the calling thread");
    }

    let airports_path = args.out.join("airports.json");
    let routes_path = args.out.join("routes.json");
    let heatmap_path = args.out.join("heatmap.pgm");
    write_airports(&airports_path, &out.airports)?;
    write_routes(&routes_path, &out.routes.routes)?;
    write_pgm(&heatmap_path, &out.heatmap)?;

    info!(
        airports = out.airports.len(),
        routes = out.routes.len(),
        out = %args.out.display(),
        "wrote airports.json, routes.json, heatmap.pgm"
    );
    Ok(())
}
