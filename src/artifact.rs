//! The persisted aggregation artifact.
//!
//! Field names of cell records are kept short since the artifact is fetched by every map session.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use h3o::{CellIndex, Resolution};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::{CellIdError, parse_cell};

#[derive(Error, Debug)]
pub enum ArtifactError {
  #[error("Failed to access artifact {}: {source}", path.display())]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("Artifact is not valid JSON: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("Artifact has invalid grid resolution {0}")]
  Resolution(u8),
}

/// Membership of one grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRecord {
  pub id: String,
  /// Always equal to `datasets.len()`.
  #[serde(rename = "c")]
  pub count: usize,
  #[serde(rename = "d")]
  pub datasets: Vec<String>,
  #[serde(rename = "o", default)]
  pub organizations: Vec<String>,
  #[serde(rename = "e", default)]
  pub eovs: Vec<String>,
}

impl CellRecord {
  #[must_use]
  pub fn new(
    cell: CellIndex,
    datasets: BTreeSet<String>,
    organizations: BTreeSet<String>,
    eovs: BTreeSet<String>,
  ) -> Self {
    Self {
      id: cell.to_string(),
      count: datasets.len(),
      datasets: datasets.into_iter().collect(),
      organizations: organizations.into_iter().collect(),
      eovs: eovs.into_iter().collect(),
    }
  }

  pub fn cell(&self) -> Result<CellIndex, CellIdError> {
    parse_cell(&self.id)
  }

  /// Removes duplicate dataset ids and restores the count invariant.
  fn normalize(&mut self) -> bool {
    let unique: BTreeSet<String> = self.datasets.drain(..).collect();
    let changed = unique.len() != self.count;
    self.datasets = unique.into_iter().collect();
    self.count = self.datasets.len();
    changed
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
  pub cells: Vec<CellRecord>,
  pub zoom_level: u8,
  pub h3_resolution: u8,
  pub generated_at: DateTime<Utc>,
}

/// Headline numbers of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSummary {
  pub cells: usize,
  pub datasets: usize,
  pub max_count: usize,
  pub zoom_level: u8,
  pub h3_resolution: u8,
  pub generated_at: DateTime<Utc>,
}

impl Artifact {
  #[must_use]
  pub fn new(zoom_level: u8, resolution: Resolution, cells: Vec<CellRecord>) -> Self {
    Self {
      cells,
      zoom_level,
      h3_resolution: u8::from(resolution),
      generated_at: Utc::now(),
    }
  }

  pub fn resolution(&self) -> Result<Resolution, ArtifactError> {
    Resolution::try_from(self.h3_resolution)
      .map_err(|_| ArtifactError::Resolution(self.h3_resolution))
  }

  #[must_use]
  pub fn summary(&self) -> ArtifactSummary {
    let datasets: BTreeSet<&str> = self
      .cells
      .iter()
      .flat_map(|c| c.datasets.iter().map(String::as_str))
      .collect();
    ArtifactSummary {
      cells: self.cells.len(),
      datasets: datasets.len(),
      max_count: self.cells.iter().map(|c| c.count).max().unwrap_or(0),
      zoom_level: self.zoom_level,
      h3_resolution: self.h3_resolution,
      generated_at: self.generated_at,
    }
  }

  /// Parses and validates an artifact document.
  pub fn from_json(data: &[u8]) -> Result<Self, ArtifactError> {
    let artifact: Self = serde_json::from_slice(data)?;
    artifact.validated()
  }

  pub fn read(path: &Path) -> Result<Self, ArtifactError> {
    let data = fs::read(path).map_err(|source| ArtifactError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json(&data)
  }

  /// Drops cells that cannot be rendered and repairs inconsistent counts.
  pub fn validated(mut self) -> Result<Self, ArtifactError> {
    let resolution = self.resolution()?;
    let before = self.cells.len();
    self.cells.retain_mut(|record| match record.cell() {
      Ok(cell) if cell.resolution() == resolution => {
        if record.normalize() {
          warn!("Repaired dataset count of cell {}", record.id);
        }
        !record.datasets.is_empty()
      }
      Ok(_) => {
        warn!("Dropping cell {} with foreign resolution", record.id);
        false
      }
      Err(e) => {
        warn!("Dropping cell: {e}");
        false
      }
    });
    if self.cells.len() != before {
      debug!("Kept {} of {before} artifact cells", self.cells.len());
    }
    Ok(self)
  }

  /// Writes the artifact next to its destination and renames it into place, so readers never see a
  /// partially written file.
  pub fn write_atomic(&self, path: &Path) -> Result<(), ArtifactError> {
    let io_err = |source| ArtifactError::Io {
      path: path.to_path_buf(),
      source,
    };
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let data = serde_json::to_vec(self)?;
    let written = fs::File::create(&tmp_path)
      .and_then(|mut f| f.write_all(&data).and_then(|()| f.sync_all()))
      .and_then(|()| fs::rename(&tmp_path, path));
    if let Err(e) = written {
      let _ = fs::remove_file(&tmp_path);
      return Err(io_err(e));
    }
    Ok(())
  }
}
