use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use surf::Url;
use thiserror::Error;

use crate::artifact::{Artifact, ArtifactError};

/// Errors while fetching an artifact.
#[derive(Error, Debug)]
pub enum LoadError {
  #[error("Failed to read {}: {source}", path.display())]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("Invalid artifact url {url}: {reason}")]
  Url { url: String, reason: String },
  #[error("Request to {url} failed: {reason}")]
  Http { url: String, reason: String },
  #[error("Artifact was not loaded within {0:?}")]
  Timeout(Duration),
  #[error(transparent)]
  Artifact(#[from] ArtifactError),
}

/// Where the renderer gets the raw artifact document from.
pub trait ArtifactSource {
  /// Fetches the raw document.
  async fn fetch(&self) -> Result<Vec<u8>, LoadError>;
  /// A human readable location for log messages.
  fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct FileSource {
  path: PathBuf,
}

impl FileSource {
  #[must_use]
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

impl ArtifactSource for FileSource {
  async fn fetch(&self) -> Result<Vec<u8>, LoadError> {
    tokio::fs::read(&self.path)
      .await
      .map_err(|source| LoadError::Io {
        path: self.path.clone(),
        source,
      })
  }

  fn describe(&self) -> String {
    self.path.display().to_string()
  }
}

#[derive(Debug, Clone)]
pub struct HttpSource {
  url: Url,
}

impl HttpSource {
  pub fn new(url: &str) -> Result<Self, LoadError> {
    let url = Url::parse(url).map_err(|e| LoadError::Url {
      url: url.to_string(),
      reason: e.to_string(),
    })?;
    Ok(Self { url })
  }
}

impl ArtifactSource for HttpSource {
  async fn fetch(&self) -> Result<Vec<u8>, LoadError> {
    info!("Downloading {}.", self.url);
    surf::get(self.url.as_str())
      .recv_bytes()
      .await
      .map_err(|e| LoadError::Http {
        url: self.url.to_string(),
        reason: e.to_string(),
      })
  }

  fn describe(&self) -> String {
    self.url.to_string()
  }
}

/// A file path or an http(s) url.
#[derive(Debug, Clone)]
pub enum ArtifactLocation {
  File(FileSource),
  Http(HttpSource),
}

impl ArtifactLocation {
  pub fn parse(location: &str) -> Result<Self, LoadError> {
    if location.starts_with("http://") || location.starts_with("https://") {
      HttpSource::new(location).map(Self::Http)
    } else {
      Ok(Self::File(FileSource::new(location)))
    }
  }
}

impl ArtifactSource for ArtifactLocation {
  async fn fetch(&self) -> Result<Vec<u8>, LoadError> {
    match self {
      Self::File(source) => source.fetch().await,
      Self::Http(source) => source.fetch().await,
    }
  }

  fn describe(&self) -> String {
    match self {
      Self::File(source) => source.describe(),
      Self::Http(source) => source.describe(),
    }
  }
}

/// Result of the one-shot artifact load.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
  Loaded(Arc<Artifact>),
  Unavailable(String),
}

impl LoadOutcome {
  #[must_use]
  pub fn artifact(&self) -> Option<&Arc<Artifact>> {
    match self {
      Self::Loaded(artifact) => Some(artifact),
      Self::Unavailable(_) => None,
    }
  }
}

/// Fetches and validates the artifact.
pub async fn fetch_artifact<S: ArtifactSource>(
  source: &S,
  timeout: Duration,
) -> Result<Artifact, LoadError> {
  let data = tokio::time::timeout(timeout, source.fetch())
    .await
    .map_err(|_| LoadError::Timeout(timeout))??;
  Ok(Artifact::from_json(&data)?)
}

/// Loads the artifact once. Any failure turns into [`LoadOutcome::Unavailable`].
pub async fn load_artifact<S: ArtifactSource>(source: &S, timeout: Duration) -> LoadOutcome {
  match fetch_artifact(source, timeout).await {
    Ok(artifact) => {
      info!(
        "Loaded {} cells from {}",
        artifact.cells.len(),
        source.describe()
      );
      LoadOutcome::Loaded(Arc::new(artifact))
    }
    Err(e) => {
      error!("Artifact {} unavailable: {e}", source.describe());
      LoadOutcome::Unavailable(e.to_string())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rstest::rstest;

  #[rstest]
  #[case("hexgrid.json", false)]
  #[case("/var/www/hexgrid.json", false)]
  #[case("https://example.org/hexgrid.json", true)]
  #[case("http://localhost:8080/hexgrid.json", true)]
  fn location_kind(#[case] location: &str, #[case] http: bool) {
    let parsed = ArtifactLocation::parse(location).unwrap();
    assert_eq!(matches!(parsed, ArtifactLocation::Http(_)), http);
  }

  #[test]
  fn malformed_url_is_rejected() {
    assert!(matches!(
      ArtifactLocation::parse("http://"),
      Err(LoadError::Url { .. })
    ));
  }

  struct Stalled;

  impl ArtifactSource for Stalled {
    async fn fetch(&self) -> Result<Vec<u8>, LoadError> {
      tokio::time::sleep(Duration::from_secs(60)).await;
      Ok(Vec::new())
    }

    fn describe(&self) -> String {
      "stalled".to_string()
    }
  }

  #[tokio::test]
  async fn timeout_makes_artifact_unavailable() {
    let outcome = load_artifact(&Stalled, Duration::from_millis(10)).await;
    assert!(matches!(outcome, LoadOutcome::Unavailable(reason) if reason.contains("within")));
  }

  #[tokio::test]
  async fn missing_file_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let source = FileSource::new(dir.path().join("missing.json"));
    let outcome = load_artifact(&source, Duration::from_secs(1)).await;
    assert!(outcome.artifact().is_none());
  }

  #[tokio::test]
  async fn malformed_document_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hexgrid.json");
    std::fs::write(&path, b"{\"cells\": 12}").unwrap();
    let outcome = load_artifact(&FileSource::new(path), Duration::from_secs(1)).await;
    assert!(matches!(outcome, LoadOutcome::Unavailable(_)));
  }
}
