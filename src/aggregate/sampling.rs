use log::warn;

use crate::grid::{BoundingBox, LonLat};

/// Upper bound on the points of one lattice.
pub const MAX_SAMPLES: usize = 1_000_000;

fn counts(bbox: &BoundingBox, step: f64) -> (f64, f64) {
  (
    (bbox.width() / step).floor() + 1.0,
    (bbox.height() / step).floor() + 1.0,
  )
}

/// A regular lattice of sample points over `bbox`, starting at its south west corner.
///
/// Points are spaced `step` degrees apart in both axes. Degenerate boxes yield their single corner.
/// A step that would produce more than [`MAX_SAMPLES`] points is widened until it fits.
#[allow(
  clippy::cast_possible_truncation,
  clippy::cast_sign_loss,
  clippy::cast_precision_loss
)]
pub fn lattice(bbox: BoundingBox, step: f64) -> impl Iterator<Item = LonLat> {
  let mut step = step;
  let (cols, rows) = if bbox.is_valid() && step.is_finite() && step > 0.0 {
    let (mut cols, mut rows) = counts(&bbox, step);
    if cols * rows > MAX_SAMPLES as f64 {
      let requested = step;
      while cols * rows > MAX_SAMPLES as f64 {
        step *= (cols * rows / MAX_SAMPLES as f64).sqrt().max(1.01);
        (cols, rows) = counts(&bbox, step);
      }
      warn!("Sample step {requested} is too fine for {bbox:?}, using {step}");
    }
    (cols as usize, rows as usize)
  } else {
    (0, 0)
  };
  let origin = bbox.min();
  itertools::iproduct!(0..rows, 0..cols).map(move |(row, col)| {
    LonLat::new(
      origin.lon + col as f64 * step,
      origin.lat + row as f64 * step,
    )
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use assert_approx_eq::assert_approx_eq;

  #[test]
  fn unit_square_half_degree() {
    let points: Vec<_> = lattice(BoundingBox::from([0.0, 0.0, 1.0, 1.0]), 0.5).collect();
    assert_eq!(points.len(), 9);
    assert!(points.iter().all(|p| p.lon <= 1.0 && p.lat <= 1.0));
    assert_approx_eq!(points[8].lon, 1.0);
    assert_approx_eq!(points[8].lat, 1.0);
  }

  #[test]
  fn step_larger_than_box() {
    let points: Vec<_> = lattice(BoundingBox::from([3.0, 4.0, 3.2, 4.1]), 0.5).collect();
    assert_eq!(points, vec![LonLat::new(3.0, 4.0)]);
  }

  #[test]
  fn degenerate_box_is_a_single_point() {
    let bbox = BoundingBox::from_iterator([LonLat::new(-63.5, 44.6)]);
    assert_eq!(lattice(bbox, 0.5).count(), 1);
  }

  #[test]
  fn tiny_step_is_capped() {
    let bbox = BoundingBox::from([-180.0, -90.0, 180.0, 90.0]);
    let points: Vec<_> = lattice(bbox, 1e-9).collect();
    assert!(points.len() <= MAX_SAMPLES);
    assert!(points.len() > MAX_SAMPLES / 2);
    assert!(points.iter().all(|p| p.lon <= 180.0 + 1e-6 && p.lat <= 90.0 + 1e-6));
  }

  #[test]
  fn invalid_input_is_empty() {
    assert_eq!(lattice(BoundingBox::new(), 0.5).count(), 0);
    assert_eq!(lattice(BoundingBox::from([0.0, 0.0, 1.0, 1.0]), 0.0).count(), 0);
    assert_eq!(lattice(BoundingBox::from([0.0, 0.0, 1.0, 1.0]), f64::NAN).count(), 0);
  }
}
