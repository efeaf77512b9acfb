use geo_types::Point;
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate in GeoJSON axis order.
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct LonLat {
  #[serde(alias = "longitude", alias = "lng")]
  pub lon: f64,
  #[serde(alias = "latitude")]
  pub lat: f64,
}

impl LonLat {
  #[must_use]
  pub fn new(lon: f64, lat: f64) -> Self {
    Self { lon, lat }
  }

  #[must_use]
  pub fn is_valid(&self) -> bool {
    self.lon.is_finite()
      && self.lat.is_finite()
      && (-90.0..=90.0).contains(&self.lat)
      && (-180.0..=180.0).contains(&self.lon)
  }

  /// Exact equality comparison using bit representation
  #[must_use]
  pub fn exact_eq(&self, other: &Self) -> bool {
    self.lon.to_bits() == other.lon.to_bits() && self.lat.to_bits() == other.lat.to_bits()
  }
}

impl From<LonLat> for Point<f64> {
  fn from(coord: LonLat) -> Self {
    Point::new(coord.lon, coord.lat)
  }
}

impl From<Point<f64>> for LonLat {
  fn from(point: Point<f64>) -> Self {
    Self::new(point.x(), point.y())
  }
}

impl From<h3o::LatLng> for LonLat {
  fn from(ll: h3o::LatLng) -> Self {
    Self::new(ll.lng(), ll.lat())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validity() {
    assert!(LonLat::new(13.4, 52.5).is_valid());
    assert!(LonLat::new(180.0, -90.0).is_valid());
    assert!(!LonLat::new(181.0, 0.0).is_valid());
    assert!(!LonLat::new(0.0, f64::NAN).is_valid());
  }

  #[test]
  fn point_conversion_keeps_axis_order() {
    let p: Point<f64> = LonLat::new(10.0, 52.0).into();
    assert_eq!(p.x(), 10.0);
    assert_eq!(p.y(), 52.0);
    assert!(LonLat::from(p).exact_eq(&LonLat::new(10.0, 52.0)));
  }

  #[test]
  fn deserialize_aliases() {
    let c: LonLat = serde_json::from_str(r#"{"lng": 1.5, "latitude": -3.0}"#).unwrap();
    assert_eq!(c, LonLat::new(1.5, -3.0));
  }
}
