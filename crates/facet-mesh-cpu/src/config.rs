use std::fs;
use std::path::Path;

use facet_field::MARGIN;
use serde::Deserialize;

use crate::constants::DEFAULT_MAX_SMOOTH_ANGLE;
use crate::error::ConfigError;

/// Chunk discretization and shading thresholds.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct QualityParams {
    /// Grid cells per chunk side.
    #[serde(default = "default_resolution")]
    pub resolution: usize,
    /// Chunk side length in world units.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: f32,
    /// Distance that maps to a fully saturated sample.
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
    /// Adjacent wall faces bending more than this (degrees) get a hard edge.
    #[serde(default = "default_max_smooth_angle")]
    pub max_smooth_angle: f32,
}
fn default_resolution() -> usize {
    32
}
fn default_chunk_size() -> f32 {
    16.0
}
fn default_max_distance() -> f32 {
    4.0
}
fn default_max_smooth_angle() -> f32 {
    DEFAULT_MAX_SMOOTH_ANGLE
}
impl Default for QualityParams {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            chunk_size: default_chunk_size(),
            max_distance: default_max_distance(),
            max_smooth_angle: default_max_smooth_angle(),
        }
    }
}

impl QualityParams {
    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.chunk_size / self.resolution as f32
    }

    /// Widest profile whose walls stay outside the chunk where the window border closes a
    /// contour half a cell inside the margin.
    #[inline]
    pub fn max_profile_width(&self) -> f32 {
        (MARGIN as f32 - 0.5) * self.cell_size()
    }

    /// Cosine of `max_smooth_angle`.
    #[inline]
    pub fn min_smooth_normal_dot(&self) -> f32 {
        self.max_smooth_angle.to_radians().cos()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution == 0 {
            return Err(ConfigError::Invalid("resolution must be at least 1".into()));
        }
        if !(self.chunk_size.is_finite() && self.chunk_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "chunk_size must be positive, got {}",
                self.chunk_size
            )));
        }
        if !(self.max_distance.is_finite() && self.max_distance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_distance must be positive, got {}",
                self.max_distance
            )));
        }
        if !(0.0..=180.0).contains(&self.max_smooth_angle) {
            return Err(ConfigError::Invalid(format!(
                "max_smooth_angle must be within 0..=180 degrees, got {}",
                self.max_smooth_angle
            )));
        }
        Ok(())
    }
}

/// One bevel step: inset by `width`, raise by `height`. An infinite width closes the shape.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct ProfileStep {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub smooth: bool,
}

impl ProfileStep {
    pub const fn new(width: f32, height: f32, smooth: bool) -> Self {
        Self {
            width,
            height,
            smooth,
        }
    }

    pub const fn close(smooth: bool) -> Self {
        Self::new(f32::INFINITY, 0.0, smooth)
    }

    #[inline]
    pub fn is_close(&self) -> bool {
        self.width == f32::INFINITY
    }
}

/// Bevel cross-section, applied to every shape in order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Profile {
    pub steps: Vec<ProfileStep>,
}

impl Profile {
    fn with_depth(depth: f32) -> Self {
        let mut steps = Vec::new();
        if depth > 0.0 {
            steps.push(ProfileStep::new(0.0, depth, false));
        }
        Self { steps }
    }

    /// Vertical walls of `depth`, then a flat cap.
    pub fn sharp(depth: f32) -> Self {
        let mut p = Self::with_depth(depth);
        p.steps.push(ProfileStep::close(false));
        p
    }

    /// Vertical walls of `depth`, one 45° chamfer of `width`, then a flat cap.
    pub fn chamfer(depth: f32, width: f32) -> Self {
        let mut p = Self::with_depth(depth);
        p.steps.push(ProfileStep::new(width, width, false));
        p.steps.push(ProfileStep::close(false));
        p
    }

    /// Vertical walls of `depth`, then a quarter circle of `radius` in `segments` smooth steps.
    pub fn rounded(depth: f32, radius: f32, segments: u32) -> Self {
        let mut p = Self::with_depth(depth);
        let segments = segments.max(1);
        let (mut w0, mut h0) = (0.0f32, 0.0f32);
        for i in 1..=segments {
            let theta = i as f32 / segments as f32 * std::f32::consts::FRAC_PI_2;
            let w = radius * (1.0 - theta.cos());
            let h = radius * theta.sin();
            p.steps.push(ProfileStep::new((w - w0).max(0.0), h - h0, true));
            (w0, h0) = (w, h);
        }
        p.steps.push(ProfileStep::close(true));
        p
    }

    /// Total inset of the finite steps.
    pub fn total_width(&self) -> f32 {
        self.steps
            .iter()
            .filter(|s| !s.is_close())
            .map(|s| s.width)
            .sum()
    }

    /// Height of the front face above the back face.
    pub fn total_height(&self) -> f32 {
        self.steps
            .iter()
            .filter(|s| !s.is_close())
            .map(|s| s.height)
            .sum()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, s) in self.steps.iter().enumerate() {
            if s.width.is_nan() || s.width < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "profile step {i}: width must be non-negative, got {}",
                    s.width
                )));
            }
            if !s.height.is_finite() || (s.is_close() && s.height != 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "profile step {i}: invalid height {}",
                    s.height
                )));
            }
        }
        Ok(())
    }
}

/// Profile as written in config files.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "preset", rename_all = "lowercase")]
pub enum ProfileConfig {
    Sharp {
        #[serde(default)]
        depth: f32,
    },
    Chamfer {
        #[serde(default)]
        depth: f32,
        width: f32,
    },
    Rounded {
        #[serde(default)]
        depth: f32,
        radius: f32,
        #[serde(default = "default_segments")]
        segments: u32,
    },
    Steps {
        steps: Vec<ProfileStep>,
    },
}
fn default_segments() -> u32 {
    4
}
impl Default for ProfileConfig {
    fn default() -> Self {
        ProfileConfig::Chamfer {
            depth: 0.5,
            width: 0.25,
        }
    }
}

impl ProfileConfig {
    pub fn to_profile(&self) -> Profile {
        match *self {
            ProfileConfig::Sharp { depth } => Profile::sharp(depth),
            ProfileConfig::Chamfer { depth, width } => Profile::chamfer(depth, width),
            ProfileConfig::Rounded {
                depth,
                radius,
                segments,
            } => Profile::rounded(depth, radius, segments),
            ProfileConfig::Steps { ref steps } => Profile {
                steps: steps.clone(),
            },
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct MeshConfig {
    #[serde(default)]
    pub quality: QualityParams,
    #[serde(default)]
    pub profile: ProfileConfig,
}

impl MeshConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: MeshConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.quality.validate()?;
        let profile = self.profile.to_profile();
        profile.validate()?;
        let (width, limit) = (profile.total_width(), self.quality.max_profile_width());
        if width > limit {
            return Err(ConfigError::Invalid(format!(
                "profile insets {width} in total but cells of {} allow at most {limit}",
                self.quality.cell_size()
            )));
        }
        Ok(())
    }
}
