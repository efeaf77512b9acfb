//! Serves the artifact and filtered hexagon layers to map clients.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{Path, State},
  http::StatusCode,
  routing::{get, post},
};
use geojson::FeatureCollection;
use log::info;
use serde::{Deserialize, Serialize};
use tower_http::trace::{self, TraceLayer};

use crate::artifact::Artifact;
use crate::config::HexConfig;
use crate::grid::{LonLat, cell_boundary, parse_cell};
use crate::render::{
  ActiveFilter, ColorScale, Facets, HexLayer, LayerStyle, LoadOutcome, RenderedCell,
  filter_artifact,
};

pub const DEFAULT_PORT: u16 = 12346;

/// Everything a request needs. Built once after the artifact load resolved.
#[derive(Debug)]
pub struct ServerState {
  outcome: LoadOutcome,
  palette: ColorScale,
  style: LayerStyle,
  facets: Option<Arc<Facets>>,
  all: HexLayer,
}

impl ServerState {
  #[must_use]
  pub fn new(outcome: LoadOutcome, cfg: &HexConfig) -> Self {
    let mut state = Self {
      outcome,
      palette: ColorScale::from_spec(&cfg.color_scale(), cfg.palette_size()),
      style: LayerStyle::from(cfg),
      facets: None,
      all: HexLayer::default(),
    };
    state.all = state.build_layer(&ActiveFilter::all());
    state
  }

  #[must_use]
  pub fn with_facets(mut self, facets: Facets) -> Self {
    self.facets = Some(Arc::new(facets));
    self
  }

  fn build_layer(&self, filter: &ActiveFilter) -> HexLayer {
    match self.outcome.artifact() {
      Some(artifact) => HexLayer::build(
        filter_artifact(artifact, filter),
        &self.palette,
        &self.style,
      ),
      None => HexLayer::default(),
    }
  }

  /// The layer for a dataset selection, all datasets if `datasets` is `None`.
  #[must_use]
  pub fn layer(&self, datasets: Option<Vec<String>>) -> FeatureCollection {
    match datasets {
      None => self.all.to_geojson(&self.style, None),
      Some(ids) => {
        let mut filter = ActiveFilter::only(ids);
        if let Some(facets) = &self.facets {
          filter = filter.with_facets(Arc::clone(facets));
        }
        self.build_layer(&filter).to_geojson(&self.style, None)
      }
    }
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct LayerRequest {
  #[serde(default)]
  pub datasets: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct CellResponse {
  #[serde(flatten)]
  pub cell: RenderedCell,
  pub boundary: Vec<LonLat>,
}

async fn healthcheck() {}

async fn artifact(State(state): State<Arc<ServerState>>) -> Result<Json<Artifact>, StatusCode> {
  state
    .outcome
    .artifact()
    .map(|artifact| Json(Artifact::clone(artifact)))
    .ok_or(StatusCode::NOT_FOUND)
}

async fn layer(
  State(state): State<Arc<ServerState>>,
  Json(request): Json<LayerRequest>,
) -> Json<FeatureCollection> {
  Json(state.layer(request.datasets))
}

async fn cell(
  State(state): State<Arc<ServerState>>,
  Path(id): Path<String>,
) -> Result<Json<CellResponse>, StatusCode> {
  let index = parse_cell(&id).map_err(|_| StatusCode::BAD_REQUEST)?;
  let rendered = state.all.get(&id).ok_or(StatusCode::NOT_FOUND)?;
  Ok(Json(CellResponse {
    cell: rendered.clone(),
    boundary: cell_boundary(index),
  }))
}

pub fn router(state: Arc<ServerState>) -> Router {
  Router::new()
    .route("/healthcheck", get(healthcheck))
    .route("/artifact", get(artifact))
    .route("/layer", post(layer))
    .route("/cells/{id}", get(cell))
    .with_state(state)
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_response(trace::DefaultOnResponse::new().level(tracing::Level::INFO)),
    )
}

pub async fn serve(state: ServerState, addr: SocketAddr) -> anyhow::Result<()> {
  let listener = tokio::net::TcpListener::bind(addr).await?;
  info!("Serving hexagon layers on {addr}");
  axum::serve(listener, router(Arc::new(state))).await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::artifact::CellRecord;
  use crate::grid::cell_at;
  use h3o::Resolution;
  use std::collections::BTreeSet;

  fn loaded() -> (Arc<ServerState>, String) {
    let cell = cell_at(LonLat::new(-60.0, 45.0), Resolution::Three).unwrap();
    let artifact = Artifact::new(
      5,
      Resolution::Three,
      vec![CellRecord::new(
        cell,
        BTreeSet::from(["a".to_string(), "b".to_string()]),
        BTreeSet::new(),
        BTreeSet::new(),
      )],
    );
    let state = ServerState::new(
      LoadOutcome::Loaded(Arc::new(artifact)),
      &HexConfig::default(),
    );
    (Arc::new(state), cell.to_string())
  }

  #[tokio::test]
  async fn artifact_is_served_when_loaded() {
    let (state, _) = loaded();
    let Json(served) = artifact(State(state)).await.unwrap();
    assert_eq!(served.cells.len(), 1);
  }

  #[tokio::test]
  async fn unavailable_artifact_is_not_found() {
    let state = Arc::new(ServerState::new(
      LoadOutcome::Unavailable("missing".to_string()),
      &HexConfig::default(),
    ));
    assert_eq!(
      artifact(State(Arc::clone(&state))).await.unwrap_err(),
      StatusCode::NOT_FOUND
    );
    let Json(empty) = layer(State(state), Json(LayerRequest::default())).await;
    assert!(empty.features.is_empty());
  }

  #[tokio::test]
  async fn layer_respects_selection() {
    let (state, _) = loaded();
    let Json(all) = layer(State(Arc::clone(&state)), Json(LayerRequest::default())).await;
    assert_eq!(all.features.len(), 1);

    let request = LayerRequest {
      datasets: Some(vec!["c".to_string()]),
    };
    let Json(none) = layer(State(state), Json(request)).await;
    assert!(none.features.is_empty());
  }

  #[tokio::test]
  async fn cell_lookup() {
    let (state, id) = loaded();
    let Json(found) = cell(State(Arc::clone(&state)), Path(id)).await.unwrap();
    assert_eq!(found.cell.cell.count(), 2);
    assert!(found.boundary.len() >= 7);
    assert_eq!(
      cell(State(state), Path("bogus".to_string()))
        .await
        .unwrap_err(),
      StatusCode::BAD_REQUEST
    );
  }
}
