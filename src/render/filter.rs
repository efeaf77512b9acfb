use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use h3o::CellIndex;
use log::warn;
use serde::Serialize;

use crate::artifact::{Artifact, CellRecord};
use crate::catalogue::Dataset;

/// Organization and variables of a single dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetFacets {
  pub organization: Option<String>,
  pub eovs: BTreeSet<String>,
}

/// Per dataset facets, used to re-derive organizations and variables of filtered cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facets {
  by_dataset: HashMap<String, DatasetFacets>,
}

impl Facets {
  #[must_use]
  pub fn from_catalogue(datasets: &[Dataset]) -> Self {
    let by_dataset = datasets
      .iter()
      .map(|dataset| {
        let facets = DatasetFacets {
          organization: dataset.organization_name().map(ToString::to_string),
          eovs: dataset.eov_tags().map(ToString::to_string).collect(),
        };
        (dataset.id.clone(), facets)
      })
      .collect();
    Self { by_dataset }
  }

  #[must_use]
  pub fn get(&self, dataset_id: &str) -> Option<&DatasetFacets> {
    self.by_dataset.get(dataset_id)
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.by_dataset.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.by_dataset.is_empty()
  }
}

/// The set of datasets currently shown on the map.
#[derive(Debug, Clone, Default)]
pub struct ActiveFilter {
  /// `None` means every dataset is active.
  datasets: Option<HashSet<String>>,
  facets: Option<Arc<Facets>>,
}

impl ActiveFilter {
  #[must_use]
  pub fn all() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn only<I, S>(ids: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      datasets: Some(ids.into_iter().map(Into::into).collect()),
      facets: None,
    }
  }

  #[must_use]
  pub fn with_facets(mut self, facets: Arc<Facets>) -> Self {
    self.facets = Some(facets);
    self
  }

  #[must_use]
  pub fn is_all(&self) -> bool {
    self.datasets.is_none()
  }

  #[must_use]
  pub fn is_active(&self, dataset_id: &str) -> bool {
    self
      .datasets
      .as_ref()
      .is_none_or(|ids| ids.contains(dataset_id))
  }

  /// The filtered view of a single cell, `None` if no active dataset is in it.
  #[must_use]
  pub fn apply(&self, record: &CellRecord) -> Option<FilteredCell> {
    let cell = record
      .cell()
      .inspect_err(|e| warn!("Skipping cell: {e}"))
      .ok()?;
    let datasets: Vec<String> = record
      .datasets
      .iter()
      .filter(|id| self.is_active(id))
      .cloned()
      .collect();
    if datasets.is_empty() {
      return None;
    }

    let (organizations, eovs) = match (&self.datasets, &self.facets) {
      (Some(_), Some(facets)) => derive_facets(&datasets, facets),
      _ => (record.organizations.clone(), record.eovs.clone()),
    };

    Some(FilteredCell {
      id: record.id.clone(),
      cell,
      datasets,
      organizations,
      eovs,
    })
  }
}

fn derive_facets(datasets: &[String], facets: &Facets) -> (Vec<String>, Vec<String>) {
  let mut organizations = BTreeSet::new();
  let mut eovs = BTreeSet::new();
  for facet in datasets.iter().filter_map(|id| facets.get(id)) {
    organizations.extend(facet.organization.iter().cloned());
    eovs.extend(facet.eovs.iter().cloned());
  }
  (
    organizations.into_iter().collect(),
    eovs.into_iter().collect(),
  )
}

/// A cell restricted to the active datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilteredCell {
  pub id: String,
  #[serde(skip)]
  pub cell: CellIndex,
  pub datasets: Vec<String>,
  pub organizations: Vec<String>,
  pub eovs: Vec<String>,
}

impl FilteredCell {
  /// Number of active datasets in the cell.
  #[must_use]
  pub fn count(&self) -> usize {
    self.datasets.len()
  }
}

/// Restricts every cell to the active datasets. Cells left without datasets are dropped.
#[must_use]
pub fn filter_artifact(artifact: &Artifact, filter: &ActiveFilter) -> Vec<FilteredCell> {
  artifact
    .cells
    .iter()
    .filter_map(|record| filter.apply(record))
    .collect()
}

#[must_use]
pub fn max_count(cells: &[FilteredCell]) -> usize {
  cells.iter().map(FilteredCell::count).max().unwrap_or(0)
}
