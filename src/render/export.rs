use geojson::{Feature, FeatureCollection, Geometry, JsonObject, feature::Id};
use serde_json::{Value, json};

use super::session::{HexLayer, LayerStyle, RenderSession, RenderedCell, highlight_style};
use crate::grid::cell_boundary;

fn feature(cell: &RenderedCell, style: &LayerStyle, highlighted: bool) -> Feature {
  let ring = cell_boundary(cell.cell.cell)
    .into_iter()
    .map(|c| vec![c.lon, c.lat])
    .collect();
  let cell_style = if highlighted {
    highlight_style(cell.style, style)
  } else {
    cell.style
  };

  let mut properties = JsonObject::new();
  properties.insert("id".to_string(), json!(cell.cell.id));
  properties.insert("count".to_string(), json!(cell.cell.count()));
  properties.insert("colorIndex".to_string(), json!(cell.color_index));
  properties.insert("fill".to_string(), json!(cell_style.fill));
  properties.insert("fillOpacity".to_string(), json!(cell_style.fill_opacity));
  properties.insert("color".to_string(), json!(cell_style.color));
  properties.insert("opacity".to_string(), json!(cell_style.opacity));
  properties.insert("weight".to_string(), json!(cell_style.weight));
  properties.insert("datasets".to_string(), json!(cell.cell.datasets));
  properties.insert("organizations".to_string(), json!(cell.cell.organizations));
  properties.insert("eovs".to_string(), json!(cell.cell.eovs));
  properties.insert("highlighted".to_string(), Value::Bool(highlighted));

  Feature {
    bbox: None,
    geometry: Some(Geometry::new(geojson::Value::Polygon(vec![ring]))),
    id: Some(Id::String(cell.cell.id.clone())),
    properties: Some(properties),
    foreign_members: None,
  }
}

impl HexLayer {
  /// One polygon feature per cell, carrying its style and membership as properties.
  #[must_use]
  pub fn to_geojson(&self, style: &LayerStyle, highlighted: Option<&str>) -> FeatureCollection {
    let features = self
      .cells()
      .iter()
      .map(|cell| feature(cell, style, highlighted == Some(cell.cell.id.as_str())))
      .collect();
    FeatureCollection {
      bbox: None,
      features,
      foreign_members: None,
    }
  }
}

impl RenderSession {
  #[must_use]
  pub fn to_geojson(&self) -> FeatureCollection {
    self.layer().to_geojson(self.style(), self.highlighted())
  }
}
