use std::path::PathBuf;

use dirs::home_dir;
use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::grid::BoundingBox;

pub const DEFAULT_ZOOM_LEVEL: u8 = 5;
pub const DEFAULT_SAMPLE_STEP: f64 = 0.5;
pub const DEFAULT_COLOR_SCALE: &str = "viridis";
pub const DEFAULT_PALETTE_SIZE: usize = 10;
pub const DEFAULT_ARTIFACT: &str = "hexgrid.json";

/// A named color scale or an explicit list of colors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorScaleSpec {
  Named(String),
  Colors(Vec<String>),
}

impl Default for ColorScaleSpec {
  fn default() -> Self {
    ColorScaleSpec::Named(DEFAULT_COLOR_SCALE.to_string())
  }
}

/// Opacity assigned to the sparsest and the densest cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpacityRange {
  pub min: f64,
  pub max: f64,
}

impl Default for OpacityRange {
  fn default() -> Self {
    Self {
      min: 0.05,
      max: 0.75,
    }
  }
}

impl OpacityRange {
  /// Clamps both ends into `[0, 1]` and orders them.
  #[must_use]
  pub fn sanitized(self) -> Self {
    let clamp = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
    let (min, max) = (clamp(self.min), clamp(self.max));
    Self {
      min: min.min(max),
      max: min.max(max),
    }
  }
}

/// Settings shared by the aggregator and the renderer. Missing values fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HexConfig {
  #[serde(skip)]
  pub config_path: Option<PathBuf>,
  pub bounds: Option<Vec<f64>>,
  pub zoom_level: Option<u8>,
  pub sample_step: Option<f64>,
  pub color_scale: Option<ColorScaleSpec>,
  pub palette_size: Option<usize>,
  pub fill_opacity: Option<f64>,
  pub opacity: Option<f64>,
  pub opacity_range: Option<OpacityRange>,
  pub artifact: Option<String>,
  pub load_timeout_secs: Option<u64>,
}

impl HexConfig {
  /// Environment first, then the config file.
  #[must_use]
  pub fn new() -> Self {
    let from_env = Self::from_env();
    match Self::from_file() {
      Some(from_file) => from_env.merge(from_file),
      None => from_env,
    }
  }

  fn from_env() -> Self {
    let config_path = std::env::var("HEXCAT_CONFIG").ok().map(PathBuf::from);
    let artifact = std::env::var("HEXCAT_ARTIFACT").ok();
    let zoom_level = std::env::var("HEXCAT_ZOOM").ok().and_then(|z| {
      z.parse()
        .inspect_err(|e| error!("Ignoring HEXCAT_ZOOM={z}: {e}"))
        .ok()
    });

    Self {
      config_path,
      artifact,
      zoom_level,
      ..Self::default()
    }
  }

  fn from_file() -> Option<Self> {
    let config_path = std::env::var("HEXCAT_CONFIG")
      .ok()
      .map(PathBuf::from)
      .or_else(|| home_dir().map(|p| p.join(".config").join("hexcat")))?;
    let file = config_path.join("config.json");

    let mut cfg: Self = serde_json::from_str(&std::fs::read_to_string(&file).ok()?)
      .inspect_err(|e| error!("Failed to read config file {}: {e}", file.display()))
      .ok()?;
    cfg.config_path = Some(config_path);
    Some(cfg)
  }

  /// Values set on `self` win over values of `other`.
  #[must_use]
  pub fn merge(self, other: Self) -> Self {
    Self {
      config_path: self.config_path.or(other.config_path),
      bounds: self.bounds.or(other.bounds),
      zoom_level: self.zoom_level.or(other.zoom_level),
      sample_step: self.sample_step.or(other.sample_step),
      color_scale: self.color_scale.or(other.color_scale),
      palette_size: self.palette_size.or(other.palette_size),
      fill_opacity: self.fill_opacity.or(other.fill_opacity),
      opacity: self.opacity.or(other.opacity),
      opacity_range: self.opacity_range.or(other.opacity_range),
      artifact: self.artifact.or(other.artifact),
      load_timeout_secs: self.load_timeout_secs.or(other.load_timeout_secs),
    }
  }

  /// The configured grid bounds, the whole globe if missing or malformed.
  #[must_use]
  pub fn bounds(&self) -> BoundingBox {
    match self.bounds.as_deref() {
      None => BoundingBox::global(),
      Some(&[a, b, c, d]) if BoundingBox::from([a, b, c, d]).is_valid() => {
        BoundingBox::from([a, b, c, d])
      }
      Some(other) => {
        warn!("Invalid bounds {other:?}, using global bounds");
        BoundingBox::global()
      }
    }
  }

  #[must_use]
  pub fn zoom_level(&self) -> u8 {
    self.zoom_level.unwrap_or(DEFAULT_ZOOM_LEVEL)
  }

  #[must_use]
  pub fn sample_step(&self) -> f64 {
    match self.sample_step {
      Some(step) if step.is_finite() && step > 0.0 => step,
      Some(step) => {
        warn!("Invalid sample step {step}, using {DEFAULT_SAMPLE_STEP}");
        DEFAULT_SAMPLE_STEP
      }
      None => DEFAULT_SAMPLE_STEP,
    }
  }

  #[must_use]
  pub fn color_scale(&self) -> ColorScaleSpec {
    self.color_scale.clone().unwrap_or_default()
  }

  #[must_use]
  pub fn palette_size(&self) -> usize {
    self.palette_size.filter(|n| *n > 0).unwrap_or(DEFAULT_PALETTE_SIZE)
  }

  #[must_use]
  pub fn fill_opacity(&self) -> f64 {
    unit(self.fill_opacity, 0.6)
  }

  #[must_use]
  pub fn opacity(&self) -> f64 {
    unit(self.opacity, 0.8)
  }

  #[must_use]
  pub fn opacity_range(&self) -> OpacityRange {
    self.opacity_range.unwrap_or_default().sanitized()
  }

  #[must_use]
  pub fn artifact(&self) -> String {
    self
      .artifact
      .clone()
      .unwrap_or_else(|| DEFAULT_ARTIFACT.to_string())
  }

  #[must_use]
  pub fn load_timeout(&self) -> std::time::Duration {
    std::time::Duration::from_secs(self.load_timeout_secs.unwrap_or(10))
  }
}

fn unit(value: Option<f64>, default: f64) -> f64 {
  value
    .filter(|v| v.is_finite())
    .map_or(default, |v| v.clamp(0.0, 1.0))
}
