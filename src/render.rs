//! Turns an aggregation artifact into a styled, filterable hexagon layer.

use crate::grid::{CellIdError, LonLat, cell_boundary, parse_cell};

mod export;
mod filter;
mod loader;
mod palette;
mod session;

pub use filter::{ActiveFilter, DatasetFacets, Facets, FilteredCell, filter_artifact, max_count};
pub use loader::{
  ArtifactLocation, ArtifactSource, FileSource, HttpSource, LoadError, LoadOutcome, fetch_artifact,
  load_artifact,
};
pub use palette::{ColorScale, NamedScale, Rgb, log_normalized, opacity_for};
pub use session::{
  CellState, CellStyle, HexLayer, LayerStyle, RenderSession, RenderedCell, highlight_style,
};

/// The closed boundary ring of a cell id, ready to be drawn as a polygon.
pub fn cell_to_renderable(id: &str) -> Result<Vec<LonLat>, CellIdError> {
  parse_cell(id).map(cell_boundary)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grid::cell_at;
  use h3o::Resolution;

  #[test]
  fn renderable_ring_is_closed() {
    let cell = cell_at(LonLat::new(2.35, 48.85), Resolution::Three).unwrap();
    let ring = cell_to_renderable(&cell.to_string()).unwrap();
    assert!(ring.len() >= 7);
    assert!(ring[0].exact_eq(&ring[ring.len() - 1]));
  }

  #[test]
  fn malformed_id_is_an_error() {
    assert!(cell_to_renderable("not-a-cell").is_err());
  }
}
