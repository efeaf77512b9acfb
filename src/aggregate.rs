//! Buckets dataset footprints into hexagonal grid cells.
//!
//! Every dataset is sampled on a regular lattice over its bounding box. Each sample point names a
//! candidate cell, and the dataset claims the candidate only if the cell's own center lies inside
//! the footprint. Datasets are independent, so they are classified in parallel and the per-thread
//! cell maps are merged afterwards.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use h3o::{CellIndex, Resolution};
use log::{debug, warn};
use rayon::prelude::*;

use crate::artifact::{Artifact, CellRecord};
use crate::catalogue::{Catalogue, Dataset, Footprint, FootprintError};
use crate::config::HexConfig;
use crate::grid::{BoundingBox, cell_at, cell_bbox, cell_center, near_date_line, zoom_to_resolution};

mod sampling;
mod stats;

pub use sampling::{MAX_SAMPLES, lattice};
pub use stats::RunStats;

/// Parameters of one aggregation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
  pub bounds: BoundingBox,
  pub zoom_level: u8,
  pub resolution: Resolution,
  pub sample_step: f64,
}

impl GridSpec {
  #[must_use]
  pub fn new(bounds: BoundingBox, zoom_level: u8, sample_step: f64) -> Self {
    Self {
      bounds,
      zoom_level,
      resolution: zoom_to_resolution(zoom_level),
      sample_step,
    }
  }
}

impl From<&HexConfig> for GridSpec {
  fn from(cfg: &HexConfig) -> Self {
    Self::new(cfg.bounds(), cfg.zoom_level(), cfg.sample_step())
  }
}

/// The result of classifying a single dataset.
#[derive(Debug, PartialEq)]
pub enum Classification {
  NoSpatial,
  Invalid(FootprintError),
  OutOfBounds,
  Cells(BTreeSet<u64>),
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Membership {
  datasets: BTreeSet<String>,
  organizations: BTreeSet<String>,
  eovs: BTreeSet<String>,
}

impl Membership {
  fn add(&mut self, dataset: &Dataset) {
    self.datasets.insert(dataset.id.clone());
    if let Some(name) = dataset.organization_name() {
      self.organizations.insert(name.to_string());
    }
    self
      .eovs
      .extend(dataset.eov_tags().map(ToString::to_string));
  }

  fn merge(&mut self, other: Membership) {
    self.datasets.extend(other.datasets);
    self.organizations.extend(other.organizations);
    self.eovs.extend(other.eovs);
  }
}

/// Cell memberships collected by one worker.
#[derive(Debug, Default)]
struct Partial {
  cells: BTreeMap<u64, Membership>,
  /// Datasets that claimed cells before the date line and bounds filter.
  claimed: usize,
  stats: RunStats,
}

impl Partial {
  fn merge(self, other: Partial) -> Partial {
    let (mut large, small) = if self.cells.len() >= other.cells.len() {
      (self, other)
    } else {
      (other, self)
    };
    for (cell, membership) in small.cells {
      large.cells.entry(cell).or_default().merge(membership);
    }
    large.claimed += small.claimed;
    large.stats += small.stats;
    large
  }
}

/// Output of [`Aggregator::run`].
#[derive(Debug)]
pub struct Aggregation {
  pub artifact: Artifact,
  pub stats: RunStats,
}

pub struct Aggregator {
  grid: GridSpec,
}

impl Aggregator {
  #[must_use]
  pub fn new(grid: GridSpec) -> Self {
    Self { grid }
  }

  #[must_use]
  pub fn grid(&self) -> &GridSpec {
    &self.grid
  }

  /// Aggregates the whole catalogue. Failures of single datasets or cells are logged and skipped.
  #[must_use]
  pub fn run(&self, datasets: &[Dataset]) -> Aggregation {
    let partial = datasets
      .par_iter()
      .fold(Partial::default, |mut partial, dataset| {
        partial.stats.datasets += 1;
        match self.classify(dataset) {
          Classification::NoSpatial => {
            debug!("{}: no spatial data", dataset.id);
            partial.stats.no_spatial += 1;
          }
          Classification::Invalid(e) => {
            warn!("{}: skipping geometry: {e}", dataset.id);
            partial.stats.invalid += 1;
          }
          Classification::OutOfBounds => {
            debug!("{}: outside of grid bounds", dataset.id);
            partial.stats.out_of_bounds += 1;
          }
          Classification::Cells(cells) if cells.is_empty() => {
            debug!("{}: no cell center inside the footprint", dataset.id);
            partial.stats.empty += 1;
          }
          Classification::Cells(cells) => {
            partial.claimed += 1;
            for cell in cells {
              partial.cells.entry(cell).or_default().add(dataset);
            }
          }
        }
        partial
      })
      .reduce(Partial::default, Partial::merge);

    let mut stats = partial.stats;
    let records = self.finish_cells(partial.cells, &mut stats);
    stats.cells = records.len();
    stats.integrated = records
      .iter()
      .flat_map(|record| record.datasets.iter())
      .collect::<BTreeSet<_>>()
      .len();
    stats.dropped = partial.claimed - stats.integrated;

    Aggregation {
      artifact: Artifact::new(self.grid.zoom_level, self.grid.resolution, records),
      stats,
    }
  }

  /// Aggregates a parsed catalogue, accounting for the records it rejected.
  #[must_use]
  pub fn run_catalogue(&self, catalogue: &Catalogue) -> Aggregation {
    let mut aggregation = self.run(&catalogue.datasets);
    aggregation.stats.rejected = catalogue.rejected;
    aggregation
  }

  /// Decides which cells a dataset claims.
  #[must_use]
  pub fn classify(&self, dataset: &Dataset) -> Classification {
    let footprint = match dataset.footprint() {
      None => return Classification::NoSpatial,
      Some(Err(e)) => return Classification::Invalid(e),
      Some(Ok(footprint)) => footprint,
    };

    let bbox = footprint.bbox();
    if !bbox.is_valid() {
      return Classification::Invalid(FootprintError::Empty);
    }
    if !bbox.intersects(&self.grid.bounds) {
      return Classification::OutOfBounds;
    }

    Classification::Cells(self.cells_for(&footprint))
  }

  /// Cells whose centers lie inside `footprint`. A point claims the cell containing it.
  #[must_use]
  pub fn cells_for(&self, footprint: &Footprint) -> BTreeSet<u64> {
    let resolution = self.grid.resolution;
    if let Footprint::Point(p) = footprint {
      return cell_at((*p).into(), resolution)
        .map(u64::from)
        .into_iter()
        .collect();
    }

    let candidates: HashSet<CellIndex> = lattice(footprint.bbox(), self.grid.sample_step)
      .filter_map(|point| cell_at(point, resolution))
      .collect();

    candidates
      .into_iter()
      .filter(|cell| footprint.contains(cell_center(*cell)))
      .map(u64::from)
      .collect()
  }

  /// Drops cells at the date line or outside the grid bounds and builds the artifact records.
  fn finish_cells(
    &self,
    cells: BTreeMap<u64, Membership>,
    stats: &mut RunStats,
  ) -> Vec<CellRecord> {
    cells
      .into_iter()
      .filter_map(|(raw, membership)| {
        let cell = CellIndex::try_from(raw)
          .inspect_err(|e| warn!("Skipping cell {raw:#x}: {e}"))
          .ok()?;
        let bbox = cell_bbox(cell);
        if near_date_line(&bbox) {
          stats.hexes_date_line += 1;
          return None;
        }
        if !self.grid.bounds.contains_box(&bbox) {
          stats.hexes_out_of_bounds += 1;
          return None;
        }
        Some(CellRecord::new(
          cell,
          membership.datasets,
          membership.organizations,
          membership.eovs,
        ))
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn square(min: f64, max: f64) -> serde_json::Value {
    json!({
      "type": "Polygon",
      "coordinates": [[[min, min], [max, min], [max, max], [min, max], [min, min]]]
    })
  }

  fn near_seam() -> serde_json::Value {
    json!({
      "type": "Polygon",
      "coordinates": [[[172.0, 10.0], [179.5, 10.0], [179.5, 14.0], [172.0, 14.0], [172.0, 10.0]]]
    })
  }

  fn aggregator(bounds: [f64; 4]) -> Aggregator {
    Aggregator::new(GridSpec::new(BoundingBox::from(bounds), 5, 0.5))
  }

  #[test]
  fn classify_outcomes() {
    let agg = aggregator([-10.0, -10.0, 10.0, 10.0]);
    assert_eq!(agg.classify(&Dataset::new("a")), Classification::NoSpatial);
    assert_eq!(
      agg.classify(&Dataset::new("b").with_spatial(square(50.0, 60.0))),
      Classification::OutOfBounds
    );
    let line = json!({"type": "LineString", "coordinates": [[0, 0], [1, 1]]});
    assert!(matches!(
      agg.classify(&Dataset::new("c").with_spatial(line)),
      Classification::Invalid(FootprintError::Unsupported { .. })
    ));
    assert!(matches!(
      agg.classify(&Dataset::new("d").with_spatial(square(0.0, 1.0))),
      Classification::Cells(cells) if !cells.is_empty()
    ));
  }

  #[test]
  fn claimed_cells_have_centers_inside() {
    let agg = aggregator([-180.0, -90.0, 180.0, 90.0]);
    let footprint = Footprint::from_geojson(&square(0.0, 3.0)).unwrap();
    let cells = agg.cells_for(&footprint);
    assert!(!cells.is_empty());
    for raw in cells {
      let cell = CellIndex::try_from(raw).unwrap();
      assert_eq!(cell.resolution(), Resolution::Three);
      assert!(footprint.contains(cell_center(cell)));
    }
  }

  #[test]
  fn point_claims_its_own_cell() {
    let agg = aggregator([-180.0, -90.0, 180.0, 90.0]);
    let footprint =
      Footprint::from_geojson(&json!({"type": "Point", "coordinates": [-63.5, 44.6]})).unwrap();
    let expected = cell_at(crate::grid::LonLat::new(-63.5, 44.6), Resolution::Three).unwrap();
    assert_eq!(
      agg.cells_for(&footprint),
      BTreeSet::from([u64::from(expected)])
    );
  }

  #[test]
  fn date_line_cells_are_dropped() {
    let agg = aggregator([-180.0, -90.0, 180.0, 90.0]);
    let result = agg.run(&[Dataset::new("seam").with_spatial(near_seam())]);
    assert!(result.artifact.cells.is_empty());
    assert!(result.stats.hexes_date_line > 0);
    assert_eq!(result.stats.integrated, 0);
    assert_eq!(result.stats.dropped, 1);
  }

  #[test]
  fn integrated_counts_surviving_datasets() {
    let agg = aggregator([-180.0, -90.0, 180.0, 90.0]);
    let kept = Dataset::new("kept").with_spatial(square(0.0, 3.0));
    let seam = Dataset::new("seam").with_spatial(near_seam());
    let result = agg.run_catalogue(&Catalogue {
      datasets: vec![kept, seam],
      rejected: 2,
    });
    assert_eq!(result.stats.datasets, 2);
    assert_eq!(result.stats.integrated, 1);
    assert_eq!(result.stats.dropped, 1);
    assert_eq!(result.stats.rejected, 2);
  }

  #[test]
  fn partial_merge_unions_memberships() {
    let mut a = Partial {
      claimed: 1,
      ..Default::default()
    };
    a.cells.entry(1).or_default().add(&Dataset::new("x").with_organization("O1"));
    a.stats.datasets = 1;
    let mut b = Partial::default();
    b.cells.entry(1).or_default().add(&Dataset::new("y").with_eov(&["oxygen"]));
    b.cells.entry(2).or_default().add(&Dataset::new("y"));
    b.stats.datasets = 1;

    let merged = a.merge(b);
    assert_eq!(merged.claimed, 1);
    assert_eq!(merged.stats.datasets, 2);
    assert_eq!(merged.cells.len(), 2);
    let cell = &merged.cells[&1];
    assert_eq!(cell.datasets.len(), 2);
    assert!(cell.organizations.contains("O1"));
    assert!(cell.eovs.contains("oxygen"));
  }
}
