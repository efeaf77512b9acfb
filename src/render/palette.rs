use std::fmt::Display;

use log::warn;
use serde::{Serialize, Serializer};

use crate::config::{ColorScaleSpec, DEFAULT_COLOR_SCALE, OpacityRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
  pub r: u8,
  pub g: u8,
  pub b: u8,
}

impl Rgb {
  #[must_use]
  pub const fn new(r: u8, g: u8, b: u8) -> Self {
    Self { r, g, b }
  }

  /// Parses `#rgb`, `#rrggbb`, `#rrggbbaa` (alpha ignored), `rgb(r, g, b)` and a few names.
  #[must_use]
  pub fn parse(color_str: &str) -> Option<Self> {
    let color_str = color_str.trim();

    if let Some(hex) = color_str.strip_prefix('#') {
      return Self::parse_hex(hex);
    }

    if color_str.starts_with("rgb(") && color_str.ends_with(')') {
      return Self::parse_rgb(&color_str[4..color_str.len() - 1]);
    }

    match color_str.to_lowercase().as_str() {
      "red" => Some(Self::new(255, 0, 0)),
      "green" => Some(Self::new(0, 128, 0)),
      "blue" => Some(Self::new(0, 0, 255)),
      "yellow" => Some(Self::new(255, 255, 0)),
      "orange" => Some(Self::new(255, 165, 0)),
      "purple" => Some(Self::new(128, 0, 128)),
      "black" => Some(Self::new(0, 0, 0)),
      "white" => Some(Self::new(255, 255, 255)),
      "gray" | "grey" => Some(Self::new(128, 128, 128)),
      _ => None,
    }
  }

  fn parse_hex(hex: &str) -> Option<Self> {
    if !hex.is_ascii() {
      return None;
    }
    match hex.len() {
      3 => {
        let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
        let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
        let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
        Some(Self::new(r, g, b))
      }
      6 | 8 => {
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::new(r, g, b))
      }
      _ => None,
    }
  }

  fn parse_rgb(rgb: &str) -> Option<Self> {
    let parts: Vec<&str> = rgb.split(',').map(str::trim).collect();
    if parts.len() >= 3 {
      let r = parts[0].parse::<u8>().ok()?;
      let g = parts[1].parse::<u8>().ok()?;
      let b = parts[2].parse::<u8>().ok()?;
      Some(Self::new(r, g, b))
    } else {
      None
    }
  }

  #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
  fn lerp(self, other: Self, t: f64) -> Self {
    let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
    Self::new(
      mix(self.r, other.r),
      mix(self.g, other.g),
      mix(self.b, other.b),
    )
  }
}

impl Display for Rgb {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
  }
}

impl Serialize for Rgb {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// Predefined sequential scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedScale {
  Viridis,
  Magma,
  Plasma,
  YlOrRd,
  Blues,
}

const VIRIDIS: &[Rgb] = &[
  Rgb::new(68, 1, 84),
  Rgb::new(59, 82, 139),
  Rgb::new(33, 145, 140),
  Rgb::new(94, 201, 98),
  Rgb::new(253, 231, 37),
];

const MAGMA: &[Rgb] = &[
  Rgb::new(0, 0, 4),
  Rgb::new(81, 18, 124),
  Rgb::new(183, 55, 121),
  Rgb::new(252, 137, 97),
  Rgb::new(252, 253, 191),
];

const PLASMA: &[Rgb] = &[
  Rgb::new(13, 8, 135),
  Rgb::new(126, 3, 168),
  Rgb::new(204, 71, 120),
  Rgb::new(248, 149, 64),
  Rgb::new(240, 249, 33),
];

const YL_OR_RD: &[Rgb] = &[
  Rgb::new(255, 255, 204),
  Rgb::new(254, 217, 118),
  Rgb::new(253, 141, 60),
  Rgb::new(227, 26, 28),
  Rgb::new(128, 0, 38),
];

const BLUES: &[Rgb] = &[
  Rgb::new(247, 251, 255),
  Rgb::new(198, 219, 239),
  Rgb::new(107, 174, 214),
  Rgb::new(33, 113, 181),
  Rgb::new(8, 48, 107),
];

impl NamedScale {
  pub const ALL: &[NamedScale] = &[
    Self::Viridis,
    Self::Magma,
    Self::Plasma,
    Self::YlOrRd,
    Self::Blues,
  ];

  #[must_use]
  pub fn name(&self) -> &'static str {
    match self {
      Self::Viridis => "viridis",
      Self::Magma => "magma",
      Self::Plasma => "plasma",
      Self::YlOrRd => "YlOrRd",
      Self::Blues => "Blues",
    }
  }

  /// Case insensitive lookup.
  #[must_use]
  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL
      .iter()
      .copied()
      .find(|scale| scale.name().eq_ignore_ascii_case(name.trim()))
  }

  fn anchors(self) -> &'static [Rgb] {
    match self {
      Self::Viridis => VIRIDIS,
      Self::Magma => MAGMA,
      Self::Plasma => PLASMA,
      Self::YlOrRd => YL_OR_RD,
      Self::Blues => BLUES,
    }
  }
}

/// Evaluates evenly spaced anchors at `t` in `[0, 1]`.
#[allow(
  clippy::cast_possible_truncation,
  clippy::cast_sign_loss,
  clippy::cast_precision_loss
)]
fn interpolate(anchors: &[Rgb], t: f64) -> Rgb {
  match anchors {
    [] => Rgb::new(0, 0, 0),
    [only] => *only,
    _ => {
      let pos = t.clamp(0.0, 1.0) * (anchors.len() - 1) as f64;
      let lower = (pos.floor() as usize).min(anchors.len() - 2);
      anchors[lower].lerp(anchors[lower + 1], pos - lower as f64)
    }
  }
}

/// `ln(count + 1) / ln(max_count + 1)` clamped to `[0, 1]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn log_normalized(count: usize, max_count: usize) -> f64 {
  if max_count == 0 {
    return 0.0;
  }
  let normalized = ((count + 1) as f64).ln() / ((max_count + 1) as f64).ln();
  normalized.clamp(0.0, 1.0)
}

/// Log scaled opacity, so sparse cells stay nearly transparent.
#[must_use]
pub fn opacity_for(count: usize, max_count: usize, range: OpacityRange) -> f64 {
  range.min + log_normalized(count, max_count) * (range.max - range.min)
}

/// A discrete palette built once per render session.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
  colors: Vec<Rgb>,
}

impl ColorScale {
  /// Samples `size` colors from a named scale. Unknown names use the default scale.
  #[must_use]
  pub fn named(name: &str, size: usize) -> Self {
    let scale = NamedScale::from_name(name).unwrap_or_else(|| {
      warn!("Unknown color scale {name}, using {DEFAULT_COLOR_SCALE}");
      NamedScale::Viridis
    });
    Self::sample(scale.anchors(), size)
  }

  /// Spreads an explicit color list over `size` colors. Unparsable entries are skipped.
  #[must_use]
  pub fn from_colors(colors: &[String], size: usize) -> Self {
    let anchors: Vec<Rgb> = colors
      .iter()
      .filter_map(|c| {
        let parsed = Rgb::parse(c);
        if parsed.is_none() {
          warn!("Ignoring unparsable color {c}");
        }
        parsed
      })
      .collect();
    if anchors.is_empty() {
      warn!("No usable colors in color scale, using {DEFAULT_COLOR_SCALE}");
      return Self::named(DEFAULT_COLOR_SCALE, size);
    }
    Self::sample(&anchors, size)
  }

  #[must_use]
  pub fn from_spec(spec: &ColorScaleSpec, size: usize) -> Self {
    match spec {
      ColorScaleSpec::Named(name) => Self::named(name, size),
      ColorScaleSpec::Colors(colors) => Self::from_colors(colors, size),
    }
  }

  #[allow(clippy::cast_precision_loss)]
  fn sample(anchors: &[Rgb], size: usize) -> Self {
    let size = size.max(1);
    let colors = (0..size)
      .map(|i| {
        let t = if size == 1 {
          0.0
        } else {
          i as f64 / (size - 1) as f64
        };
        interpolate(anchors, t)
      })
      .collect();
    Self { colors }
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.colors.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.colors.is_empty()
  }

  #[must_use]
  pub fn colors(&self) -> &[Rgb] {
    &self.colors
  }

  /// `floor(normalized * (len - 1))`.
  #[must_use]
  #[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
  )]
  pub fn index_for(&self, count: usize, max_count: usize) -> usize {
    let last = self.colors.len().saturating_sub(1);
    ((log_normalized(count, max_count) * last as f64).floor() as usize).min(last)
  }

  #[must_use]
  pub fn color_for(&self, count: usize, max_count: usize) -> Rgb {
    self.colors[self.index_for(count, max_count)]
  }
}

impl Default for ColorScale {
  fn default() -> Self {
    Self::named(DEFAULT_COLOR_SCALE, crate::config::DEFAULT_PALETTE_SIZE)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use assert_approx_eq::assert_approx_eq;
  use rstest::rstest;

  #[rstest]
  #[case("#ff0000", Some(Rgb::new(255, 0, 0)))]
  #[case("#f00", Some(Rgb::new(255, 0, 0)))]
  #[case("#ff000080", Some(Rgb::new(255, 0, 0)))]
  #[case("rgb(1, 2, 3)", Some(Rgb::new(1, 2, 3)))]
  #[case(" Blue ", Some(Rgb::new(0, 0, 255)))]
  #[case("#ggg", None)]
  #[case("#12345", None)]
  #[case("chartreuse-ish", None)]
  fn parse_colors(#[case] input: &str, #[case] expected: Option<Rgb>) {
    assert_eq!(Rgb::parse(input), expected);
  }

  #[test]
  fn hex_display() {
    assert_eq!(Rgb::new(68, 1, 84).to_string(), "#440154");
    assert_eq!(
      serde_json::to_string(&Rgb::new(255, 255, 0)).unwrap(),
      "\"#ffff00\""
    );
  }

  #[test]
  fn named_scale_endpoints() {
    let scale = ColorScale::named("Viridis", 10);
    assert_eq!(scale.len(), 10);
    assert_eq!(scale.colors()[0], VIRIDIS[0]);
    assert_eq!(scale.colors()[9], VIRIDIS[4]);
  }

  #[test]
  fn unknown_name_falls_back() {
    assert_eq!(ColorScale::named("no-such-scale", 10), ColorScale::default());
  }

  #[test]
  fn explicit_colors() {
    let scale = ColorScale::from_colors(&["#000000".to_string(), "#ffffff".to_string()], 3);
    assert_eq!(
      scale.colors(),
      &[Rgb::new(0, 0, 0), Rgb::new(128, 128, 128), Rgb::new(255, 255, 255)]
    );
    let fallback = ColorScale::from_colors(&["nope".to_string()], 10);
    assert_eq!(fallback, ColorScale::default());
  }

  #[rstest]
  #[case(0, 10, 0.0)]
  #[case(10, 10, 1.0)]
  #[case(20, 10, 1.0)]
  #[case(1, 0, 0.0)]
  #[case(1, 3, 0.5)]
  fn normalization(#[case] count: usize, #[case] max: usize, #[case] expected: f64) {
    assert_approx_eq!(log_normalized(count, max), expected);
  }

  #[test]
  fn index_is_monotonic_and_spans_palette() {
    let scale = ColorScale::default();
    let max = 250;
    let indices: Vec<usize> = (1..=max).map(|c| scale.index_for(c, max)).collect();
    assert!(indices.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(scale.index_for(max, max), scale.len() - 1);
    assert_eq!(scale.index_for(0, max), 0);
  }

  #[test]
  fn single_color_palette() {
    let scale = ColorScale::from_colors(&["red".to_string()], 1);
    assert_eq!(scale.index_for(5, 10), 0);
    assert_eq!(scale.color_for(10, 10), Rgb::new(255, 0, 0));
  }

  #[test]
  fn opacity_range() {
    let range = OpacityRange::default();
    assert_approx_eq!(opacity_for(0, 100, range), 0.05);
    assert_approx_eq!(opacity_for(100, 100, range), 0.75);
    let mid = opacity_for(10, 100, range);
    assert!(mid > 0.05 && mid < 0.75);
  }
}
