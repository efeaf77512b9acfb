use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;

use super::filter::{ActiveFilter, FilteredCell, filter_artifact, max_count};
use super::loader::{ArtifactSource, LoadOutcome, load_artifact};
use super::palette::{ColorScale, Rgb, opacity_for};
use crate::artifact::Artifact;
use crate::config::{HexConfig, OpacityRange};

const OUTLINE_WEIGHT: f64 = 0.5;
const HIGHLIGHT_WEIGHT: f64 = 2.0;
const HIGHLIGHT_OUTLINE: Rgb = Rgb::new(255, 255, 255);

/// Style settings shared by all cells of a layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerStyle {
  pub opacity_range: OpacityRange,
  /// Fill opacity of a highlighted cell.
  pub fill_opacity: f64,
  /// Outline opacity.
  pub opacity: f64,
}

impl Default for LayerStyle {
  fn default() -> Self {
    Self::from(&HexConfig::default())
  }
}

impl From<&HexConfig> for LayerStyle {
  fn from(cfg: &HexConfig) -> Self {
    Self {
      opacity_range: cfg.opacity_range(),
      fill_opacity: cfg.fill_opacity(),
      opacity: cfg.opacity(),
    }
  }
}

/// How a cell is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellStyle {
  pub fill: Rgb,
  pub fill_opacity: f64,
  pub color: Rgb,
  pub opacity: f64,
  pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedCell {
  #[serde(flatten)]
  pub cell: FilteredCell,
  pub color_index: usize,
  pub style: CellStyle,
}

/// The drawable cells of one filter application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HexLayer {
  cells: Vec<RenderedCell>,
  by_id: HashMap<String, usize>,
  max_count: usize,
}

impl HexLayer {
  /// Colors `cells` relative to their densest cell.
  #[must_use]
  pub fn build(cells: Vec<FilteredCell>, palette: &ColorScale, style: &LayerStyle) -> Self {
    let max = max_count(&cells);
    let cells: Vec<RenderedCell> = cells
      .into_iter()
      .map(|cell| {
        let count = cell.count();
        let fill = palette.color_for(count, max);
        RenderedCell {
          color_index: palette.index_for(count, max),
          style: CellStyle {
            fill,
            fill_opacity: opacity_for(count, max, style.opacity_range),
            color: fill,
            opacity: style.opacity,
            weight: OUTLINE_WEIGHT,
          },
          cell,
        }
      })
      .collect();
    let by_id = cells
      .iter()
      .enumerate()
      .map(|(i, c)| (c.cell.id.clone(), i))
      .collect();
    Self {
      cells,
      by_id,
      max_count: max,
    }
  }

  #[must_use]
  pub fn cells(&self) -> &[RenderedCell] {
    &self.cells
  }

  #[must_use]
  pub fn get(&self, id: &str) -> Option<&RenderedCell> {
    self.by_id.get(id).map(|i| &self.cells[*i])
  }

  #[must_use]
  pub fn max_count(&self) -> usize {
    self.max_count
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.cells.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.cells.is_empty()
  }
}

/// Applies the highlight override to a rendered style.
#[must_use]
pub fn highlight_style(base: CellStyle, style: &LayerStyle) -> CellStyle {
  CellStyle {
    fill_opacity: base.fill_opacity.max(style.fill_opacity),
    color: HIGHLIGHT_OUTLINE,
    opacity: 1.0,
    weight: HIGHLIGHT_WEIGHT,
    ..base
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
  /// Not part of the active layer.
  Inactive,
  Rendered,
  Highlighted,
}

#[derive(Debug, Clone)]
enum LoadState {
  Loading { queued: Option<ActiveFilter> },
  Ready(Arc<Artifact>),
  Unavailable(String),
}

/// One map session: the loaded artifact, the active filter and the current layer.
#[derive(Debug, Clone)]
pub struct RenderSession {
  palette: ColorScale,
  style: LayerStyle,
  state: LoadState,
  filter: ActiveFilter,
  layer: HexLayer,
  highlighted: Option<String>,
}

impl RenderSession {
  /// A session waiting for its artifact.
  #[must_use]
  pub fn new(palette: ColorScale, style: LayerStyle) -> Self {
    Self {
      palette,
      style,
      state: LoadState::Loading { queued: None },
      filter: ActiveFilter::all(),
      layer: HexLayer::default(),
      highlighted: None,
    }
  }

  #[must_use]
  pub fn from_config(cfg: &HexConfig) -> Self {
    Self::new(
      ColorScale::from_spec(&cfg.color_scale(), cfg.palette_size()),
      LayerStyle::from(cfg),
    )
  }

  /// Creates a session and resolves it with a single artifact load.
  pub async fn open<S: ArtifactSource>(source: &S, cfg: &HexConfig) -> Self {
    let mut session = Self::from_config(cfg);
    session.resolve(load_artifact(source, cfg.load_timeout()).await);
    session
  }

  /// Finishes loading. A filter requested meanwhile is applied now, else all datasets are shown.
  pub fn resolve(&mut self, outcome: LoadOutcome) {
    let queued = match &mut self.state {
      LoadState::Loading { queued } => queued.take(),
      _ => {
        warn!("Artifact already resolved, ignoring second load");
        return;
      }
    };
    match outcome {
      LoadOutcome::Loaded(artifact) => {
        self.state = LoadState::Ready(artifact);
        let filter = queued.unwrap_or_else(|| self.filter.clone());
        self.apply(filter);
      }
      LoadOutcome::Unavailable(reason) => {
        self.state = LoadState::Unavailable(reason);
        if let Some(filter) = queued {
          self.filter = filter;
        }
        self.layer = HexLayer::default();
      }
    }
  }

  /// Replaces the active filter. Returns whether the layer was rebuilt now; while loading the
  /// latest request is queued instead.
  pub fn set_filter(&mut self, filter: ActiveFilter) -> bool {
    if let LoadState::Loading { queued } = &mut self.state {
      debug!("Artifact still loading, queueing filter");
      *queued = Some(filter);
      return false;
    }
    let ready = matches!(self.state, LoadState::Ready(_));
    self.apply(filter);
    ready
  }

  fn apply(&mut self, filter: ActiveFilter) {
    if let LoadState::Ready(artifact) = &self.state {
      let cells = filter_artifact(artifact, &filter);
      self.layer = HexLayer::build(cells, &self.palette, &self.style);
      debug!(
        "Layer rebuilt with {} cells, max count {}",
        self.layer.len(),
        self.layer.max_count()
      );
    }
    self.filter = filter;
    self.highlighted = None;
  }

  #[must_use]
  pub fn is_loading(&self) -> bool {
    matches!(self.state, LoadState::Loading { .. })
  }

  #[must_use]
  pub fn artifact(&self) -> Option<&Arc<Artifact>> {
    match &self.state {
      LoadState::Ready(artifact) => Some(artifact),
      _ => None,
    }
  }

  #[must_use]
  pub fn unavailable_reason(&self) -> Option<&str> {
    match &self.state {
      LoadState::Unavailable(reason) => Some(reason),
      _ => None,
    }
  }

  #[must_use]
  pub fn filter(&self) -> &ActiveFilter {
    &self.filter
  }

  #[must_use]
  pub fn layer(&self) -> &HexLayer {
    &self.layer
  }

  #[must_use]
  pub fn style(&self) -> &LayerStyle {
    &self.style
  }

  #[must_use]
  pub fn palette(&self) -> &ColorScale {
    &self.palette
  }

  #[must_use]
  pub fn highlighted(&self) -> Option<&str> {
    self.highlighted.as_deref()
  }

  /// Highlights a rendered cell and returns its details. Unknown cells clear the highlight.
  pub fn focus(&mut self, id: &str) -> Option<&RenderedCell> {
    self.highlighted = self.layer.get(id).map(|c| c.cell.id.clone());
    self.highlighted.as_deref().and_then(|id| self.layer.get(id))
  }

  /// Restores the rendered style of the highlighted cell.
  pub fn blur(&mut self) {
    self.highlighted = None;
  }

  #[must_use]
  pub fn cell_state(&self, id: &str) -> CellState {
    if self.highlighted.as_deref() == Some(id) {
      CellState::Highlighted
    } else if self.layer.get(id).is_some() {
      CellState::Rendered
    } else {
      CellState::Inactive
    }
  }

  #[must_use]
  pub fn cell_style(&self, id: &str) -> Option<CellStyle> {
    let cell = self.layer.get(id)?;
    Some(match self.cell_state(id) {
      CellState::Highlighted => highlight_style(cell.style, &self.style),
      _ => cell.style,
    })
  }

  /// Datasets, organizations and variables of a rendered cell.
  #[must_use]
  pub fn cell_details(&self, id: &str) -> Option<&FilteredCell> {
    self.layer.get(id).map(|c| &c.cell)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::artifact::CellRecord;
  use crate::grid::{LonLat, cell_at};
  use h3o::Resolution;
  use std::collections::BTreeSet;

  fn artifact() -> Arc<Artifact> {
    let record = |lon, lat, ids: &[&str]| {
      CellRecord::new(
        cell_at(LonLat::new(lon, lat), Resolution::Three).unwrap(),
        ids.iter().map(ToString::to_string).collect(),
        BTreeSet::new(),
        BTreeSet::new(),
      )
    };
    Arc::new(Artifact::new(
      5,
      Resolution::Three,
      vec![record(0.0, 0.0, &["a", "b"]), record(8.0, 8.0, &["b"])],
    ))
  }

  fn session() -> RenderSession {
    RenderSession::new(ColorScale::default(), LayerStyle::default())
  }

  #[test]
  fn first_render_shows_all_datasets() {
    let mut s = session();
    assert!(s.is_loading());
    assert!(s.layer().is_empty());
    s.resolve(LoadOutcome::Loaded(artifact()));
    assert_eq!(s.layer().len(), 2);
    assert_eq!(s.layer().max_count(), 2);
  }

  #[test]
  fn filter_is_queued_until_load() {
    let mut s = session();
    assert!(!s.set_filter(ActiveFilter::only(["b", "a"])));
    assert!(!s.set_filter(ActiveFilter::only(["a"])));
    s.resolve(LoadOutcome::Loaded(artifact()));
    assert_eq!(s.layer().len(), 1);
    assert!(s.filter().is_active("a"));
    assert!(!s.filter().is_active("b"));
  }

  #[test]
  fn unavailable_artifact_renders_nothing() {
    let mut s = session();
    s.resolve(LoadOutcome::Unavailable("gone".to_string()));
    assert!(!s.set_filter(ActiveFilter::all()));
    assert!(s.layer().is_empty());
    assert_eq!(s.unavailable_reason(), Some("gone"));
  }

  #[test]
  fn second_resolve_is_ignored() {
    let mut s = session();
    s.resolve(LoadOutcome::Loaded(artifact()));
    s.resolve(LoadOutcome::Unavailable("late".to_string()));
    assert!(s.artifact().is_some());
  }

  #[test]
  fn highlight_and_blur() {
    let mut s = session();
    s.resolve(LoadOutcome::Loaded(artifact()));
    let id = s.layer().cells()[0].cell.id.clone();
    let rendered = s.cell_style(&id).unwrap();

    assert_eq!(s.focus(&id).map(|c| c.cell.count()), Some(2));
    assert_eq!(s.cell_state(&id), CellState::Highlighted);
    let highlighted = s.cell_style(&id).unwrap();
    assert_eq!(highlighted.fill, rendered.fill);
    assert!(highlighted.weight > rendered.weight);

    s.blur();
    assert_eq!(s.cell_state(&id), CellState::Rendered);
    assert_eq!(s.cell_style(&id), Some(rendered));
    assert_eq!(s.cell_state("8f2830828052d25"), CellState::Inactive);
  }

  #[test]
  fn refilter_clears_highlight() {
    let mut s = session();
    s.resolve(LoadOutcome::Loaded(artifact()));
    let id = s.layer().cells()[0].cell.id.clone();
    s.focus(&id);
    assert!(s.set_filter(ActiveFilter::only(["b"])));
    assert_eq!(s.highlighted(), None);
    assert_eq!(s.cell_details(&id).map(FilteredCell::count), Some(1));
  }
}
