use geo::{BoundingRect, Contains, CoordsIter};
use geo_types::{MultiPolygon, Point, Polygon};
use serde_json::Value;
use thiserror::Error;

use crate::grid::{BoundingBox, LonLat};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FootprintError {
  #[error("Invalid GeoJSON geometry: {0}")]
  Json(String),
  #[error("Unsupported geometry type {kind} (expected Point, Polygon or MultiPolygon)")]
  Unsupported { kind: String },
  #[error("Geometry contains non finite coordinates")]
  NonFinite,
  #[error("Geometry has no coordinates")]
  Empty,
}

/// The spatial extent of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Footprint {
  Point(Point<f64>),
  Polygon(Polygon<f64>),
  MultiPolygon(MultiPolygon<f64>),
}

impl Footprint {
  /// Parses a GeoJSON geometry. Catalogues sometimes store the geometry as an encoded string.
  pub fn from_geojson(value: &Value) -> Result<Self, FootprintError> {
    let value = match value {
      Value::String(encoded) => {
        serde_json::from_str(encoded).map_err(|e| FootprintError::Json(e.to_string()))?
      }
      other => other.clone(),
    };
    let geometry =
      geojson::Geometry::from_json_value(value).map_err(|e| FootprintError::Json(e.to_string()))?;

    let footprint = match geometry.value {
      v @ geojson::Value::Point(_) => {
        Self::Point(v.try_into().map_err(|e: geojson::Error| FootprintError::Json(e.to_string()))?)
      }
      v @ geojson::Value::Polygon(_) => Self::Polygon(
        v.try_into()
          .map_err(|e: geojson::Error| FootprintError::Json(e.to_string()))?,
      ),
      v @ geojson::Value::MultiPolygon(_) => Self::MultiPolygon(
        v.try_into()
          .map_err(|e: geojson::Error| FootprintError::Json(e.to_string()))?,
      ),
      other => {
        return Err(FootprintError::Unsupported {
          kind: geojson_kind(&other).to_string(),
        });
      }
    };

    footprint.validate()?;
    Ok(footprint)
  }

  fn validate(&self) -> Result<(), FootprintError> {
    let (count, finite) = match self {
      Self::Point(p) => (1, p.x().is_finite() && p.y().is_finite()),
      Self::Polygon(p) => (
        p.coords_count(),
        p.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite()),
      ),
      Self::MultiPolygon(mp) => (
        mp.coords_count(),
        mp.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite()),
      ),
    };
    if count == 0 {
      return Err(FootprintError::Empty);
    }
    if !finite {
      return Err(FootprintError::NonFinite);
    }
    Ok(())
  }

  /// The axis aligned extent, invalid for empty geometries.
  #[must_use]
  pub fn bbox(&self) -> BoundingBox {
    match self {
      Self::Point(p) => BoundingBox::from_iterator([LonLat::from(*p)]),
      Self::Polygon(p) => p.bounding_rect().map_or_else(BoundingBox::new, BoundingBox::from),
      Self::MultiPolygon(mp) => mp.bounding_rect().map_or_else(BoundingBox::new, BoundingBox::from),
    }
  }

  /// Point in polygon test. Points on the boundary are not contained.
  #[must_use]
  pub fn contains(&self, coord: LonLat) -> bool {
    let point = Point::from(coord);
    match self {
      Self::Point(p) => p.contains(&point),
      Self::Polygon(p) => p.contains(&point),
      Self::MultiPolygon(mp) => mp.contains(&point),
    }
  }

  #[must_use]
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Point(_) => "Point",
      Self::Polygon(_) => "Polygon",
      Self::MultiPolygon(_) => "MultiPolygon",
    }
  }
}

fn geojson_kind(value: &geojson::Value) -> &'static str {
  match value {
    geojson::Value::Point(_) => "Point",
    geojson::Value::MultiPoint(_) => "MultiPoint",
    geojson::Value::LineString(_) => "LineString",
    geojson::Value::MultiLineString(_) => "MultiLineString",
    geojson::Value::Polygon(_) => "Polygon",
    geojson::Value::MultiPolygon(_) => "MultiPolygon",
    geojson::Value::GeometryCollection(_) => "GeometryCollection",
  }
}
