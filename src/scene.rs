//! Scene files: mesh settings plus the shapes to rasterize.

use std::fs;
use std::path::Path;

use facet_field::{FieldError, Sdf, SdfConfig};
use facet_mesh_cpu::{ConfigError, MeshConfig};
use serde::Deserialize;
use thiserror::Error;

pub const DEMO_SCENE: &str = include_str!("../scenes/demo.toml");

#[derive(Debug, Error)]
pub enum SceneError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("shape {index}: {source}")]
    Shape { index: usize, source: FieldError },

    #[error("scene has no shapes")]
    Empty,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SceneConfig {
    #[serde(flatten)]
    pub mesh: MeshConfig,
    #[serde(default)]
    pub shapes: Vec<SdfConfig>,
}

impl SceneConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, SceneError> {
        let scene: SceneConfig = toml::from_str(s).map_err(ConfigError::from)?;
        scene.mesh.validate()?;
        if scene.shapes.is_empty() {
            return Err(SceneError::Empty);
        }
        Ok(scene)
    }

    pub fn from_path(path: &Path) -> Result<Self, SceneError> {
        let s = fs::read_to_string(path).map_err(ConfigError::from)?;
        Self::from_toml_str(&s)
    }

    /// All shapes merged into one field, so overlapping shapes mesh as one outline.
    pub fn build_sdf(&self) -> Result<Sdf, SceneError> {
        let mut merged: Option<Sdf> = None;
        for (index, shape) in self.shapes.iter().enumerate() {
            let sdf = shape
                .build()
                .map_err(|source| SceneError::Shape { index, source })?;
            merged = Some(match merged {
                Some(acc) => Sdf::Union(Box::new(acc), Box::new(sdf)),
                None => sdf,
            });
        }
        merged.ok_or(SceneError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_geom::Vec2;
    use facet_mesh_cpu::ProfileConfig;

    #[test]
    fn demo_scene_parses() {
        let scene = SceneConfig::from_toml_str(DEMO_SCENE).unwrap();
        assert_eq!(scene.shapes.len(), 3);
        assert_eq!(scene.mesh.quality.resolution, 32);
        assert!(matches!(scene.mesh.profile, ProfileConfig::Rounded { .. }));
        let sdf = scene.build_sdf().unwrap();
        // Inside the washer ring, outside its hole.
        assert!(sdf.sample(Vec2::new(8.0, 12.5)) < 0.0);
        assert!(sdf.sample(Vec2::new(8.0, 8.0)) > 0.0);
    }

    #[test]
    fn mesh_tables_default() {
        let scene = SceneConfig::from_toml_str(
            r#"
            [[shapes]]
            kind = "box"
            center = { x = 0.0, y = 0.0 }
            half_extents = { x = 2.0, y = 1.0 }
            "#,
        )
        .unwrap();
        assert_eq!(scene.mesh, MeshConfig::default());
    }

    #[test]
    fn bad_scenes_are_rejected() {
        assert!(matches!(
            SceneConfig::from_toml_str("[quality]\nresolution = 8"),
            Err(SceneError::Empty)
        ));
        assert!(matches!(
            SceneConfig::from_toml_str(
                "[[shapes]]\nkind = \"circle\"\ncenter = { x = 0.0, y = 0.0 }\nradius = -1.0"
            )
            .and_then(|s| s.build_sdf()),
            Err(SceneError::Shape { index: 0, .. })
        ));
    }
}
