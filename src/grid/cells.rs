use h3o::{CellIndex, LatLng, Resolution};
use thiserror::Error;

use super::{BoundingBox, LonLat};

/// Cells whose boundary reaches beyond this longitude are treated as date line cells.
pub const DATE_LINE_GUARD: f64 = 170.0;

/// Upper zoom bound (inclusive) and the resolution used up to it.
const ZOOM_RESOLUTION_STEPS: [(u8, Resolution); 6] = [
  (2, Resolution::One),
  (4, Resolution::Two),
  (6, Resolution::Three),
  (8, Resolution::Four),
  (10, Resolution::Five),
  (u8::MAX, Resolution::Six),
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CellIdError {
  #[error("Not a cell identifier: {id}")]
  Malformed { id: String },
}

/// Maps a map zoom level to the grid resolution aggregated for it.
#[must_use]
pub fn zoom_to_resolution(zoom: u8) -> Resolution {
  ZOOM_RESOLUTION_STEPS
    .iter()
    .find(|(max_zoom, _)| zoom <= *max_zoom)
    .map_or(Resolution::Six, |(_, res)| *res)
}

/// The cell containing `coord`, `None` for non finite coordinates.
#[must_use]
pub fn cell_at(coord: LonLat, resolution: Resolution) -> Option<CellIndex> {
  LatLng::new(coord.lat, coord.lon)
    .ok()
    .map(|ll| ll.to_cell(resolution))
}

#[must_use]
pub fn cell_center(cell: CellIndex) -> LonLat {
  LatLng::from(cell).into()
}

/// The boundary of a cell as a closed ring (first vertex repeated at the end).
#[must_use]
pub fn cell_boundary(cell: CellIndex) -> Vec<LonLat> {
  let mut ring: Vec<LonLat> = cell.boundary().iter().copied().map(LonLat::from).collect();
  if let Some(first) = ring.first().copied() {
    ring.push(first);
  }
  ring
}

#[must_use]
pub fn cell_bbox(cell: CellIndex) -> BoundingBox {
  BoundingBox::from_iterator(cell.boundary().iter().copied().map(LonLat::from))
}

/// Whether a cell box straddles the antimeridian or comes too close to it.
#[must_use]
pub fn near_date_line(bbox: &BoundingBox) -> bool {
  bbox.width() > 180.0 || bbox.min().lon < -DATE_LINE_GUARD || bbox.max().lon > DATE_LINE_GUARD
}

pub fn parse_cell(id: &str) -> Result<CellIndex, CellIdError> {
  id.parse::<CellIndex>().map_err(|_| CellIdError::Malformed {
    id: id.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use assert_approx_eq::assert_approx_eq;
  use rstest::rstest;

  #[rstest]
  #[case(0, Resolution::One)]
  #[case(2, Resolution::One)]
  #[case(3, Resolution::Two)]
  #[case(5, Resolution::Three)]
  #[case(6, Resolution::Three)]
  #[case(8, Resolution::Four)]
  #[case(10, Resolution::Five)]
  #[case(11, Resolution::Six)]
  #[case(22, Resolution::Six)]
  fn zoom_table(#[case] zoom: u8, #[case] expected: Resolution) {
    assert_eq!(zoom_to_resolution(zoom), expected);
  }

  #[test]
  fn zoom_table_is_monotonic() {
    let resolutions: Vec<u8> = (0..=20).map(|z| u8::from(zoom_to_resolution(z))).collect();
    assert!(resolutions.windows(2).all(|w| w[0] <= w[1]));
  }

  #[test]
  fn cell_at_resolution() {
    let cell = cell_at(LonLat::new(10.0, 52.0), Resolution::Three).unwrap();
    assert_eq!(cell.resolution(), Resolution::Three);
    assert!(cell_at(LonLat::new(f64::NAN, 0.0), Resolution::Three).is_none());
  }

  #[test]
  fn center_lies_in_own_cell() {
    let cell = cell_at(LonLat::new(-63.5, 44.6), Resolution::Four).unwrap();
    let center = cell_center(cell);
    assert_eq!(cell_at(center, Resolution::Four), Some(cell));
    assert_approx_eq!(center.lat, 44.6, 0.5);
  }

  #[test]
  fn boundary_is_closed_and_pure() {
    let cell = cell_at(LonLat::new(0.5, 0.5), Resolution::Three).unwrap();
    let ring = cell_boundary(cell);
    assert!(ring.len() >= 7);
    assert!(ring.first().unwrap().exact_eq(ring.last().unwrap()));
    let again = cell_boundary(cell);
    assert_eq!(ring.len(), again.len());
    assert!(ring.iter().zip(&again).all(|(a, b)| a.exact_eq(b)));
  }

  #[test]
  fn bbox_encloses_center() {
    let cell = cell_at(LonLat::new(20.0, -30.0), Resolution::Two).unwrap();
    assert!(cell_bbox(cell).contains(cell_center(cell)));
  }

  #[rstest]
  #[case([-179.5, 0.0, 179.5, 1.0], true)]
  #[case([169.0, 0.0, 171.0, 1.0], true)]
  #[case([-171.0, 0.0, -169.0, 1.0], true)]
  #[case([0.0, 0.0, 1.0, 1.0], false)]
  #[case([168.0, 0.0, 170.0, 1.0], false)]
  fn date_line(#[case] bbox: [f64; 4], #[case] expected: bool) {
    assert_eq!(near_date_line(&BoundingBox::from(bbox)), expected);
  }

  #[test]
  fn cell_ids_round_trip_through_strings() {
    let cell = cell_at(LonLat::new(-123.1, 49.3), Resolution::Three).unwrap();
    assert_eq!(parse_cell(&cell.to_string()), Ok(cell));
    assert!(parse_cell("not-a-cell").is_err());
  }
}
