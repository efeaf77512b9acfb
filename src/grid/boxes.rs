use serde::{Deserialize, Serialize};

use super::LonLat;

/// An axis aligned lon/lat box. Serialized as `[minLng, minLat, maxLng, maxLat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
  min_lon: f64,
  min_lat: f64,
  max_lon: f64,
  max_lat: f64,
}

impl Default for BoundingBox {
  fn default() -> Self {
    Self::new()
  }
}

impl From<[f64; 4]> for BoundingBox {
  fn from([min_lon, min_lat, max_lon, max_lat]: [f64; 4]) -> Self {
    Self {
      min_lon,
      min_lat,
      max_lon,
      max_lat,
    }
  }
}

impl From<BoundingBox> for [f64; 4] {
  fn from(bb: BoundingBox) -> Self {
    [bb.min_lon, bb.min_lat, bb.max_lon, bb.max_lat]
  }
}

impl From<geo_types::Rect<f64>> for BoundingBox {
  fn from(rect: geo_types::Rect<f64>) -> Self {
    Self {
      min_lon: rect.min().x,
      min_lat: rect.min().y,
      max_lon: rect.max().x,
      max_lat: rect.max().y,
    }
  }
}

impl BoundingBox {
  #[must_use]
  pub fn new() -> Self {
    Self::get_invalid()
  }

  /// The whole globe.
  #[must_use]
  pub fn global() -> Self {
    Self::from([-180.0, -90.0, 180.0, 90.0])
  }

  #[must_use]
  pub fn get_invalid() -> Self {
    Self {
      min_lon: f64::MAX,
      min_lat: f64::MAX,
      max_lon: f64::MIN,
      max_lat: f64::MIN,
    }
  }

  pub fn from_iterator<I: IntoIterator<Item = LonLat>>(positions: I) -> Self {
    let mut bb = Self::get_invalid();
    positions
      .into_iter()
      .for_each(|pos| bb.add_coordinate(pos));
    bb
  }

  #[must_use]
  pub fn is_valid(&self) -> bool {
    self.min_lon.is_finite()
      && self.min_lat.is_finite()
      && self.max_lon.is_finite()
      && self.max_lat.is_finite()
      && self.min_lon <= self.max_lon
      && self.min_lat <= self.max_lat
  }

  pub fn add_coordinate(&mut self, coord: LonLat) {
    self.min_lon = self.min_lon.min(coord.lon);
    self.min_lat = self.min_lat.min(coord.lat);
    self.max_lon = self.max_lon.max(coord.lon);
    self.max_lat = self.max_lat.max(coord.lat);
  }

  #[must_use]
  pub fn extend(self, bb: &Self) -> Self {
    if !self.is_valid() {
      return *bb;
    }

    if !bb.is_valid() {
      return self;
    }

    Self {
      min_lon: self.min_lon.min(bb.min_lon),
      min_lat: self.min_lat.min(bb.min_lat),
      max_lon: self.max_lon.max(bb.max_lon),
      max_lat: self.max_lat.max(bb.max_lat),
    }
  }

  #[must_use]
  pub fn min(&self) -> LonLat {
    LonLat::new(self.min_lon, self.min_lat)
  }

  #[must_use]
  pub fn max(&self) -> LonLat {
    LonLat::new(self.max_lon, self.max_lat)
  }

  /// Longitude extent in degrees.
  #[must_use]
  pub fn width(&self) -> f64 {
    self.max_lon - self.min_lon
  }

  /// Latitude extent in degrees.
  #[must_use]
  pub fn height(&self) -> f64 {
    self.max_lat - self.min_lat
  }

  /// Touching edges count as intersecting.
  #[must_use]
  pub fn intersects(&self, other: &Self) -> bool {
    self.is_valid()
      && other.is_valid()
      && self.min_lon <= other.max_lon
      && other.min_lon <= self.max_lon
      && self.min_lat <= other.max_lat
      && other.min_lat <= self.max_lat
  }

  /// Whether `other` lies completely inside this box.
  #[must_use]
  pub fn contains_box(&self, other: &Self) -> bool {
    self.is_valid()
      && other.is_valid()
      && self.min_lon <= other.min_lon
      && self.min_lat <= other.min_lat
      && other.max_lon <= self.max_lon
      && other.max_lat <= self.max_lat
  }

  #[must_use]
  pub fn contains(&self, coord: LonLat) -> bool {
    (self.min_lon..=self.max_lon).contains(&coord.lon)
      && (self.min_lat..=self.max_lat).contains(&coord.lat)
  }
}
