use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hexcat::catalogue::load_catalogue;
use hexcat::config::HexConfig;
use hexcat::render::{
  ActiveFilter, ArtifactLocation, Facets, RenderSession, fetch_artifact, load_artifact,
};
use hexcat::server::{DEFAULT_PORT, ServerState, serve};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Renders and serves hexagonal density layers.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// Artifact file or http(s) url. Defaults to the configured artifact.
  #[arg(short, long, global = true)]
  artifact: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Writes the styled layer as a GeoJSON feature collection.
  Render {
    /// File with the active dataset ids, one per line or a JSON array. All datasets if absent.
    #[arg(short, long)]
    datasets: Option<PathBuf>,

    /// Catalogue used to derive organizations and variables of the active datasets.
    #[arg(short, long)]
    catalogue: Option<PathBuf>,

    /// Cell to highlight.
    #[arg(long)]
    highlight: Option<String>,

    /// Output file, stdout if absent.
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Prints a summary of the artifact.
  Inspect,
  /// Serves the artifact and filtered layers over http.
  Serve {
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Catalogue used to derive organizations and variables of filtered layers.
    #[arg(short, long)]
    catalogue: Option<PathBuf>,
  },
}

fn read_dataset_ids(path: &Path) -> Result<Vec<String>> {
  let data = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read {}", path.display()))?;
  if data.trim_start().starts_with('[') {
    return serde_json::from_str(&data).context("Dataset list is not a JSON array of strings");
  }
  Ok(
    data
      .lines()
      .map(str::trim)
      .filter(|l| !l.is_empty())
      .map(ToString::to_string)
      .collect(),
  )
}

fn read_facets(path: Option<&Path>) -> Result<Option<Facets>> {
  path
    .map(|p| {
      load_catalogue(p)
        .map(|catalogue| Facets::from_catalogue(&catalogue.datasets))
        .context("Failed to load catalogue")
    })
    .transpose()
}

async fn render(
  location: &ArtifactLocation,
  cfg: &HexConfig,
  datasets: Option<&Path>,
  catalogue: Option<&Path>,
  highlight: Option<&str>,
  output: Option<&Path>,
) -> Result<()> {
  let mut session = RenderSession::from_config(cfg);
  if let Some(path) = datasets {
    let mut filter = ActiveFilter::only(read_dataset_ids(path)?);
    if let Some(facets) = read_facets(catalogue)? {
      filter = filter.with_facets(facets.into());
    }
    session.set_filter(filter);
  }
  session.resolve(load_artifact(location, cfg.load_timeout()).await);
  if let Some(reason) = session.unavailable_reason() {
    warn!("Rendering an empty layer: {reason}");
  }
  if let Some(id) = highlight
    && session.focus(id).is_none()
  {
    warn!("Cell {id} is not part of the layer");
  }
  info!(
    "Rendered {} cells, max count {}",
    session.layer().len(),
    session.layer().max_count()
  );

  let collection = session.to_geojson();
  let mut writer: Box<dyn Write> = match output {
    Some(path) => Box::new(BufWriter::new(
      File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
    )),
    None => Box::new(std::io::stdout().lock()),
  };
  serde_json::to_writer(&mut writer, &collection)?;
  writer.flush()?;
  Ok(())
}

async fn inspect(location: &ArtifactLocation, cfg: &HexConfig) -> Result<()> {
  let artifact = fetch_artifact(location, cfg.load_timeout()).await?;
  let summary = artifact.summary();
  println!("generated at:  {}", summary.generated_at);
  println!("zoom level:    {}", summary.zoom_level);
  println!("h3 resolution: {}", summary.h3_resolution);
  println!("cells:         {}", summary.cells);
  println!("datasets:      {}", summary.datasets);
  println!("max count:     {}", summary.max_count);
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_target(false)
    .with_env_filter(EnvFilter::from_default_env())
    .compact()
    .init();

  let args = Args::parse();
  let cfg = HexConfig {
    artifact: args.artifact.clone(),
    ..HexConfig::default()
  }
  .merge(HexConfig::new());
  let location = ArtifactLocation::parse(&cfg.artifact())?;

  match args.command {
    Command::Render {
      datasets,
      catalogue,
      highlight,
      output,
    } => {
      render(
        &location,
        &cfg,
        datasets.as_deref(),
        catalogue.as_deref(),
        highlight.as_deref(),
        output.as_deref(),
      )
      .await
    }
    Command::Inspect => inspect(&location, &cfg).await,
    Command::Serve { port, catalogue } => {
      let outcome = load_artifact(&location, cfg.load_timeout()).await;
      let mut state = ServerState::new(outcome, &cfg);
      if let Some(facets) = read_facets(catalogue.as_deref())? {
        state = state.with_facets(facets);
      }
      serve(state, SocketAddr::from(([127, 0, 0, 1], port))).await
    }
  }
}
