//! Dataset catalogue input for the aggregator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

mod footprint;
pub use footprint::{Footprint, FootprintError};

#[derive(Error, Debug)]
pub enum CatalogueError {
  #[error("Catalogue not found: {}", path.display())]
  Missing { path: PathBuf },
  #[error("Failed to read catalogue {}: {source}", path.display())]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("Catalogue is not valid JSON: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("Catalogue must be an array of datasets or an object with a `datasets` array")]
  Shape,
}

/// The organization publishing a dataset, in the shapes catalogues export it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Organization {
  Titles { titles: BTreeMap<String, String> },
  Title { title: String },
  Name(String),
}

impl Organization {
  /// The display name, preferring the English title.
  #[must_use]
  pub fn name(&self) -> Option<&str> {
    match self {
      Organization::Titles { titles } => localized(titles),
      Organization::Title { title } => Some(title.as_str()),
      Organization::Name(name) => Some(name.as_str()),
    }
    .filter(|name| !name.trim().is_empty())
  }
}

/// English if present, else the first entry by locale.
fn localized(titles: &BTreeMap<String, String>) -> Option<&str> {
  titles
    .get("en")
    .or_else(|| titles.values().next())
    .map(String::as_str)
}

/// One catalogue record. Immutable for the duration of an aggregation run.
///
/// Only `id` is required. Other fields in an unexpected shape are dropped, never the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
  #[serde(deserialize_with = "lenient::id")]
  pub id: String,
  #[serde(default, deserialize_with = "lenient::title")]
  pub title: Option<String>,
  #[serde(default)]
  pub spatial: Option<Value>,
  #[serde(default, deserialize_with = "lenient::organization")]
  pub organization: Option<Organization>,
  #[serde(default, deserialize_with = "lenient::tags")]
  pub eov: Vec<String>,
}

/// Field deserializers that fall back instead of failing the record.
mod lenient {
  use std::collections::BTreeMap;

  use log::debug;
  use serde::Deserialize;
  use serde::de::{Deserializer, Error};
  use serde_json::Value;

  use super::{Organization, localized};

  /// String or integer ids.
  pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
      Value::String(id) if !id.trim().is_empty() => Ok(id),
      Value::Number(n) => Ok(n.to_string()),
      other => Err(D::Error::custom(format!("unusable dataset id {other}"))),
    }
  }

  /// A plain title or a locale map.
  pub fn title<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
      Value::String(title) => Some(title),
      v @ Value::Object(_) => serde_json::from_value::<BTreeMap<String, String>>(v)
        .ok()
        .and_then(|titles| localized(&titles).map(ToString::to_string)),
      _ => None,
    })
  }

  pub fn organization<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Option<Organization>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
      return Ok(None);
    }
    Ok(
      serde_json::from_value(value)
        .inspect_err(|e| debug!("Ignoring organization: {e}"))
        .ok(),
    )
  }

  /// A list of tags, a single tag or nothing. Non string entries are ignored.
  pub fn tags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
      Value::String(tag) => vec![tag],
      Value::Array(tags) => tags
        .into_iter()
        .filter_map(|tag| match tag {
          Value::String(tag) => Some(tag),
          _ => None,
        })
        .collect(),
      _ => Vec::new(),
    })
  }
}

impl Dataset {
  #[must_use]
  pub fn new(id: &str) -> Self {
    Self {
      id: id.to_string(),
      title: None,
      spatial: None,
      organization: None,
      eov: Vec::new(),
    }
  }

  #[must_use]
  pub fn with_spatial(mut self, spatial: Value) -> Self {
    self.spatial = Some(spatial);
    self
  }

  #[must_use]
  pub fn with_organization(mut self, name: &str) -> Self {
    self.organization = Some(Organization::Name(name.to_string()));
    self
  }

  #[must_use]
  pub fn with_eov(mut self, eov: &[&str]) -> Self {
    self.eov = eov.iter().map(ToString::to_string).collect();
    self
  }

  /// `None` when the dataset has no spatial data at all.
  #[must_use]
  pub fn footprint(&self) -> Option<Result<Footprint, FootprintError>> {
    match &self.spatial {
      None | Some(Value::Null) => None,
      Some(Value::String(s)) if s.trim().is_empty() => None,
      Some(spatial) => Some(Footprint::from_geojson(spatial)),
    }
  }

  #[must_use]
  pub fn organization_name(&self) -> Option<&str> {
    self.organization.as_ref().and_then(Organization::name)
  }

  /// Non empty EOV tags.
  pub fn eov_tags(&self) -> impl Iterator<Item = &str> {
    self
      .eov
      .iter()
      .map(|tag| tag.trim())
      .filter(|tag| !tag.is_empty())
  }
}

/// The usable records of a catalogue export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalogue {
  pub datasets: Vec<Dataset>,
  /// Records without a usable id.
  pub rejected: usize,
}

/// Reads a catalogue file. A missing file is reported as [`CatalogueError::Missing`].
pub fn load_catalogue(path: &Path) -> Result<Catalogue, CatalogueError> {
  let data = std::fs::read_to_string(path).map_err(|source| {
    if source.kind() == std::io::ErrorKind::NotFound {
      CatalogueError::Missing {
        path: path.to_path_buf(),
      }
    } else {
      CatalogueError::Io {
        path: path.to_path_buf(),
        source,
      }
    }
  })?;
  parse_catalogue(&data)
}

/// Parses a catalogue document. Records that do not deserialize are skipped and counted.
pub fn parse_catalogue(data: &str) -> Result<Catalogue, CatalogueError> {
  let document: Value = serde_json::from_str(data)?;
  let records = match document {
    Value::Array(records) => records,
    Value::Object(mut obj) => match obj.remove("datasets").or_else(|| obj.remove("results")) {
      Some(Value::Array(records)) => records,
      _ => return Err(CatalogueError::Shape),
    },
    _ => return Err(CatalogueError::Shape),
  };

  let total = records.len();
  let datasets: Vec<Dataset> = records
    .into_iter()
    .enumerate()
    .filter_map(|(idx, record)| {
      serde_json::from_value::<Dataset>(record)
        .inspect_err(|e| warn!("Skipping catalogue record {idx}: {e}"))
        .ok()
    })
    .collect();
  let rejected = total - datasets.len();
  debug!("Parsed {} of {total} catalogue records", datasets.len());
  Ok(Catalogue { datasets, rejected })
}
