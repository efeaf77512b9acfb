use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hexcat::aggregate::{Aggregator, GridSpec};
use hexcat::catalogue::{CatalogueError, load_catalogue};
use hexcat::config::HexConfig;
use log::{info, warn};

/// Aggregates catalogue footprints into a hexagonal grid artifact.
#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// Where to write the artifact. Defaults to the configured artifact path.
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Map zoom level the grid is built for.
  #[arg(short, long)]
  zoom: Option<u8>,

  /// Grid bounds as min_lon,min_lat,max_lon,max_lat.
  #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
  bounds: Option<Vec<f64>>,

  /// Spacing of the sampling lattice in degrees.
  #[arg(short, long)]
  step: Option<f64>,

  /// The catalogue export to aggregate.
  catalogue: PathBuf,
}

impl Args {
  fn config(&self) -> HexConfig {
    let from_args = HexConfig {
      bounds: self.bounds.clone(),
      zoom_level: self.zoom,
      sample_step: self.step,
      artifact: self.output.as_ref().map(|p| p.display().to_string()),
      ..HexConfig::default()
    };
    from_args.merge(HexConfig::new())
  }
}

fn main() -> Result<()> {
  env_logger::init();
  let args = Args::parse();
  let cfg = args.config();

  let catalogue = match load_catalogue(&args.catalogue) {
    Ok(catalogue) => catalogue,
    Err(CatalogueError::Missing { path }) => {
      warn!("No catalogue at {}, nothing to aggregate", path.display());
      return Ok(());
    }
    Err(e) => return Err(e).context("Failed to load catalogue"),
  };

  let grid = GridSpec::from(&cfg);
  info!(
    "Aggregating {} datasets at zoom {} (resolution {})",
    catalogue.datasets.len(),
    grid.zoom_level,
    u8::from(grid.resolution)
  );
  let result = Aggregator::new(grid).run_catalogue(&catalogue);
  result.stats.log();

  let output = PathBuf::from(cfg.artifact());
  result
    .artifact
    .write_atomic(&output)
    .with_context(|| format!("Failed to write {}", output.display()))?;
  info!("Wrote {}", output.display());
  Ok(())
}
