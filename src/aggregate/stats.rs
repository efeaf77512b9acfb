use std::fmt::Display;
use std::ops::AddAssign;

use log::info;
use serde::Serialize;

/// Counters of one aggregation run. Reported through the log, never persisted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunStats {
  /// Catalogue records without a usable id, never classified.
  pub rejected: usize,
  pub datasets: usize,
  /// Datasets present in at least one written cell.
  pub integrated: usize,
  /// Datasets whose cells were all dropped at the date line or the bounds.
  pub dropped: usize,
  pub no_spatial: usize,
  pub out_of_bounds: usize,
  /// Geometries that could not be parsed or classified.
  pub invalid: usize,
  /// In bounds but too small or thin for the sampling lattice.
  pub empty: usize,
  pub hexes_date_line: usize,
  pub hexes_out_of_bounds: usize,
  pub cells: usize,
}

impl AddAssign for RunStats {
  fn add_assign(&mut self, other: Self) {
    self.rejected += other.rejected;
    self.datasets += other.datasets;
    self.integrated += other.integrated;
    self.dropped += other.dropped;
    self.no_spatial += other.no_spatial;
    self.out_of_bounds += other.out_of_bounds;
    self.invalid += other.invalid;
    self.empty += other.empty;
    self.hexes_date_line += other.hexes_date_line;
    self.hexes_out_of_bounds += other.hexes_out_of_bounds;
    self.cells += other.cells;
  }
}

impl RunStats {
  pub fn log(&self) {
    info!("Catalogue records rejected: {}", self.rejected);
    info!("Datasets read: {}", self.datasets);
    info!("  integrated:     {}", self.integrated);
    info!("  all cells dropped: {}", self.dropped);
    info!("  no spatial:     {}", self.no_spatial);
    info!("  out of bounds:  {}", self.out_of_bounds);
    info!("  invalid:        {}", self.invalid);
    info!("  no cells:       {}", self.empty);
    info!(
      "Hexagons filtered: {} near the date line, {} out of bounds",
      self.hexes_date_line, self.hexes_out_of_bounds
    );
    info!("Hexagons written: {}", self.cells);
  }
}

impl Display for RunStats {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{} datasets ({} rejected records, {} integrated, {} with all cells dropped, {} without \
       spatial data, {} out of bounds, {} invalid, {} without cells), {} cells ({} dropped at the \
       date line, {} out of bounds)",
      self.datasets,
      self.rejected,
      self.integrated,
      self.dropped,
      self.no_spatial,
      self.out_of_bounds,
      self.invalid,
      self.empty,
      self.cells,
      self.hexes_date_line,
      self.hexes_out_of_bounds
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn add_assign_sums_fields() {
    let mut a = RunStats {
      datasets: 2,
      integrated: 1,
      no_spatial: 1,
      ..Default::default()
    };
    a += RunStats {
      datasets: 3,
      out_of_bounds: 2,
      invalid: 1,
      ..Default::default()
    };
    assert_eq!(a.datasets, 5);
    assert_eq!(a.integrated, 1);
    assert_eq!(a.out_of_bounds, 2);
    assert_eq!(a.invalid, 1);
  }

  #[test]
  fn display_mentions_all_counters() {
    let text = RunStats::default().to_string();
    assert!(text.contains("0 datasets"));
    assert!(text.contains("rejected"));
    assert!(text.contains("date line"));
  }
}
