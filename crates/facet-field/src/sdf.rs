//! Analytic 2D signed-distance shapes (negative inside) and their composition wrappers.

use fastnoise_lite::{FastNoiseLite, NoiseType};
use facet_geom::{Rect, Vec2};
use serde::Deserialize;

use crate::error::FieldError;

/// Closed set of shape variants; composition is expressed with wrapper variants.
pub enum Sdf {
    Circle {
        center: Vec2,
        radius: f32,
    },
    Box {
        center: Vec2,
        half_extents: Vec2,
    },
    Capsule {
        a: Vec2,
        b: Vec2,
        radius: f32,
    },
    Texture(TextureSdf),
    Noise(NoiseSdf),
    Translate {
        offset: Vec2,
        inner: Box<Sdf>,
    },
    /// Rotation (radians, counter-clockwise) followed by a uniform scale.
    Transform {
        rotation: f32,
        scale: f32,
        inner: Box<Sdf>,
    },
    Expand {
        amount: f32,
        inner: Box<Sdf>,
    },
    Intersect(Box<Sdf>, Box<Sdf>),
    Union(Box<Sdf>, Box<Sdf>),
    Subtract(Box<Sdf>, Box<Sdf>),
}

/// Distances sampled on a regular lattice, interpolated bilinearly.
pub struct TextureSdf {
    pub origin: Vec2,
    pub cell_size: f32,
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
}

/// Thresholded noise clipped to a bounding rectangle.
pub struct NoiseSdf {
    pub noise: FastNoiseLite,
    pub threshold: f32,
    pub amplitude: f32,
    pub bounds: Rect,
}

impl Sdf {
    /// Region outside of which the shape is guaranteed to be positive.
    pub fn bounds(&self) -> Rect {
        match self {
            Sdf::Circle { center, radius } => {
                Rect::new(*center, *center).expanded(radius.max(0.0))
            }
            Sdf::Box {
                center,
                half_extents,
            } => Rect::new(*center - *half_extents, *center + *half_extents),
            Sdf::Capsule { a, b, radius } => {
                Rect::new(a.min(*b), a.max(*b)).expanded(radius.max(0.0))
            }
            Sdf::Texture(t) => t.rect(),
            Sdf::Noise(n) => n.bounds,
            Sdf::Translate { offset, inner } => {
                let r = inner.bounds();
                Rect::new(r.min + *offset, r.max + *offset)
            }
            Sdf::Transform {
                rotation,
                scale,
                inner,
            } => {
                let r = inner.bounds();
                let (s, c) = rotation.sin_cos();
                let mut out = Rect::EMPTY;
                for p in [
                    r.min,
                    Vec2::new(r.max.x, r.min.y),
                    r.max,
                    Vec2::new(r.min.x, r.max.y),
                ] {
                    out.include(Vec2::new(p.x * c - p.y * s, p.x * s + p.y * c) * *scale);
                }
                out
            }
            Sdf::Expand { amount, inner } => inner.bounds().expanded(amount.max(0.0)),
            Sdf::Intersect(a, b) => a.bounds().intersection(b.bounds()),
            Sdf::Union(a, b) => a.bounds().union(b.bounds()),
            Sdf::Subtract(a, _) => a.bounds(),
        }
    }

    pub fn sample(&self, p: Vec2) -> f32 {
        match self {
            Sdf::Circle { center, radius } => (p - *center).length() - radius,
            Sdf::Box {
                center,
                half_extents,
            } => box_distance(p - *center, *half_extents),
            Sdf::Capsule { a, b, radius } => segment_distance(p, *a, *b) - radius,
            Sdf::Texture(t) => t.sample(p),
            Sdf::Noise(n) => n.sample(p),
            Sdf::Translate { offset, inner } => inner.sample(p - *offset),
            Sdf::Transform {
                rotation,
                scale,
                inner,
            } => {
                let (s, c) = rotation.sin_cos();
                let q = p / *scale;
                let local = Vec2::new(q.x * c + q.y * s, -q.x * s + q.y * c);
                inner.sample(local) * *scale
            }
            Sdf::Expand { amount, inner } => inner.sample(p) - amount,
            Sdf::Intersect(a, b) => a.sample(p).max(b.sample(p)),
            Sdf::Union(a, b) => a.sample(p).min(b.sample(p)),
            Sdf::Subtract(a, b) => a.sample(p).max(-b.sample(p)),
        }
    }
}

fn box_distance(p: Vec2, half: Vec2) -> f32 {
    let q = Vec2::new(p.x.abs() - half.x, p.y.abs() - half.y);
    let outside = Vec2::new(q.x.max(0.0), q.y.max(0.0)).length();
    outside + q.x.max(q.y).min(0.0)
}

fn segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len2 = ab.length_squared();
    let t = if len2 > 0.0 {
        ((p - a).dot(ab) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (p - (a + ab * t)).length()
}

impl TextureSdf {
    fn rect(&self) -> Rect {
        let size = Vec2::new(
            self.width.saturating_sub(1) as f32,
            self.height.saturating_sub(1) as f32,
        ) * self.cell_size;
        Rect::new(self.origin, self.origin + size)
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.width + x]
    }

    fn sample(&self, p: Vec2) -> f32 {
        let rect = self.rect();
        let clamped = p.max(rect.min).min(rect.max);
        let g = (clamped - self.origin) / self.cell_size;
        let x0 = (g.x.floor() as usize).min(self.width.saturating_sub(2));
        let y0 = (g.y.floor() as usize).min(self.height.saturating_sub(2));
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = (g.x - x0 as f32).clamp(0.0, 1.0);
        let fy = (g.y - y0 as f32).clamp(0.0, 1.0);
        let bottom = self.at(x0, y0) + (self.at(x1, y0) - self.at(x0, y0)) * fx;
        let top = self.at(x0, y1) + (self.at(x1, y1) - self.at(x0, y1)) * fx;
        let inner = bottom + (top - bottom) * fy;
        // Beyond the texture the clamped edge value grows with the distance to it.
        inner + (p - clamped).length()
    }
}

impl NoiseSdf {
    fn sample(&self, p: Vec2) -> f32 {
        let n = self.noise.get_noise_2d(p.x, p.y);
        let d = (self.threshold - n) * self.amplitude;
        let half = self.bounds.size() * 0.5;
        let centre = self.bounds.min + half;
        d.max(box_distance(p - centre, half))
    }
}

fn default_frequency() -> f32 {
    0.02
}
fn default_scale() -> f32 {
    1.0
}

/// Serialized shape description, turned into an [`Sdf`] with [`SdfConfig::build`].
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SdfConfig {
    Circle {
        center: Vec2,
        radius: f32,
    },
    Box {
        center: Vec2,
        half_extents: Vec2,
    },
    Capsule {
        a: Vec2,
        b: Vec2,
        radius: f32,
    },
    Texture {
        origin: Vec2,
        cell_size: f32,
        width: usize,
        height: usize,
        values: Vec<f32>,
    },
    Noise {
        seed: i32,
        #[serde(default = "default_frequency")]
        frequency: f32,
        threshold: f32,
        amplitude: f32,
        min: Vec2,
        max: Vec2,
    },
    Translate {
        offset: Vec2,
        shape: Box<SdfConfig>,
    },
    Transform {
        #[serde(default)]
        rotation_degrees: f32,
        #[serde(default = "default_scale")]
        scale: f32,
        shape: Box<SdfConfig>,
    },
    Expand {
        amount: f32,
        shape: Box<SdfConfig>,
    },
    Intersect {
        a: Box<SdfConfig>,
        b: Box<SdfConfig>,
    },
    Union {
        a: Box<SdfConfig>,
        b: Box<SdfConfig>,
    },
    Subtract {
        a: Box<SdfConfig>,
        b: Box<SdfConfig>,
    },
}

impl SdfConfig {
    pub fn build(&self) -> Result<Sdf, FieldError> {
        Ok(match self {
            SdfConfig::Circle { center, radius } => {
                positive("circle radius", *radius)?;
                Sdf::Circle {
                    center: *center,
                    radius: *radius,
                }
            }
            SdfConfig::Box {
                center,
                half_extents,
            } => {
                positive("box half extent", half_extents.x)?;
                positive("box half extent", half_extents.y)?;
                Sdf::Box {
                    center: *center,
                    half_extents: *half_extents,
                }
            }
            SdfConfig::Capsule { a, b, radius } => {
                positive("capsule radius", *radius)?;
                Sdf::Capsule {
                    a: *a,
                    b: *b,
                    radius: *radius,
                }
            }
            SdfConfig::Texture {
                origin,
                cell_size,
                width,
                height,
                values,
            } => {
                positive("texture cell size", *cell_size)?;
                if *width < 2 || *height < 2 || values.len() != width * height {
                    return Err(FieldError::InvalidShape(format!(
                        "texture needs at least 2x2 values and width*height = {} entries, got {}",
                        width * height,
                        values.len()
                    )));
                }
                Sdf::Texture(TextureSdf {
                    origin: *origin,
                    cell_size: *cell_size,
                    width: *width,
                    height: *height,
                    values: values.clone(),
                })
            }
            SdfConfig::Noise {
                seed,
                frequency,
                threshold,
                amplitude,
                min,
                max,
            } => {
                positive("noise amplitude", *amplitude)?;
                let bounds = Rect::new(*min, *max);
                if bounds.is_empty() {
                    return Err(FieldError::InvalidShape("noise bounds are empty".into()));
                }
                let mut noise = FastNoiseLite::with_seed(*seed);
                noise.set_noise_type(Some(NoiseType::OpenSimplex2));
                noise.set_frequency(Some(*frequency));
                Sdf::Noise(NoiseSdf {
                    noise,
                    threshold: *threshold,
                    amplitude: *amplitude,
                    bounds,
                })
            }
            SdfConfig::Translate { offset, shape } => Sdf::Translate {
                offset: *offset,
                inner: Box::new(shape.build()?),
            },
            SdfConfig::Transform {
                rotation_degrees,
                scale,
                shape,
            } => {
                positive("transform scale", *scale)?;
                Sdf::Transform {
                    rotation: rotation_degrees.to_radians(),
                    scale: *scale,
                    inner: Box::new(shape.build()?),
                }
            }
            SdfConfig::Expand { amount, shape } => Sdf::Expand {
                amount: *amount,
                inner: Box::new(shape.build()?),
            },
            SdfConfig::Intersect { a, b } => {
                Sdf::Intersect(Box::new(a.build()?), Box::new(b.build()?))
            }
            SdfConfig::Union { a, b } => Sdf::Union(Box::new(a.build()?), Box::new(b.build()?)),
            SdfConfig::Subtract { a, b } => {
                Sdf::Subtract(Box::new(a.build()?), Box::new(b.build()?))
            }
        })
    }
}

fn positive(what: &str, v: f32) -> Result<(), FieldError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(FieldError::InvalidShape(format!("{what} must be positive, got {v}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle(r: f32) -> Sdf {
        Sdf::Circle {
            center: Vec2::ZERO,
            radius: r,
        }
    }

    #[test]
    fn primitives_are_negative_inside() {
        assert!(circle(2.0).sample(Vec2::new(1.0, 0.0)) < 0.0);
        assert!((circle(2.0).sample(Vec2::new(5.0, 0.0)) - 3.0).abs() < 1e-6);
        let b = Sdf::Box {
            center: Vec2::new(1.0, 1.0),
            half_extents: Vec2::new(1.0, 2.0),
        };
        assert!((b.sample(Vec2::new(1.0, 1.0)) + 1.0).abs() < 1e-6);
        assert!((b.sample(Vec2::new(4.0, 1.0)) - 2.0).abs() < 1e-6);
        let c = Sdf::Capsule {
            a: Vec2::new(0.0, 0.0),
            b: Vec2::new(4.0, 0.0),
            radius: 1.0,
        };
        assert!((c.sample(Vec2::new(2.0, 3.0)) - 2.0).abs() < 1e-6);
        assert!((c.sample(Vec2::new(-2.0, 0.0)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn wrappers_compose() {
        let moved = Sdf::Translate {
            offset: Vec2::new(10.0, 0.0),
            inner: Box::new(circle(1.0)),
        };
        assert!(moved.sample(Vec2::new(10.0, 0.0)) < 0.0);
        assert_eq!(moved.bounds().min, Vec2::new(9.0, -1.0));

        let grown = Sdf::Expand {
            amount: 1.0,
            inner: Box::new(circle(1.0)),
        };
        assert!((grown.sample(Vec2::new(3.0, 0.0)) - 1.0).abs() < 1e-6);

        let scaled = Sdf::Transform {
            rotation: 0.0,
            scale: 2.0,
            inner: Box::new(circle(1.0)),
        };
        assert!((scaled.sample(Vec2::new(3.0, 0.0)) - 1.0).abs() < 1e-5);

        let ring = Sdf::Subtract(Box::new(circle(3.0)), Box::new(circle(1.0)));
        assert!(ring.sample(Vec2::ZERO) > 0.0);
        assert!(ring.sample(Vec2::new(2.0, 0.0)) < 0.0);

        let lens = Sdf::Intersect(
            Box::new(circle(2.0)),
            Box::new(Sdf::Translate {
                offset: Vec2::new(2.0, 0.0),
                inner: Box::new(circle(2.0)),
            }),
        );
        assert!(lens.sample(Vec2::new(1.0, 0.0)) < 0.0);
        assert!(lens.sample(Vec2::new(-1.5, 0.0)) > 0.0);
    }

    #[test]
    fn rotation_moves_bounds() {
        let bar = Sdf::Transform {
            rotation: std::f32::consts::FRAC_PI_2,
            scale: 1.0,
            inner: Box::new(Sdf::Box {
                center: Vec2::ZERO,
                half_extents: Vec2::new(4.0, 1.0),
            }),
        };
        let b = bar.bounds();
        assert!((b.max.y - 4.0).abs() < 1e-5);
        assert!((b.max.x - 1.0).abs() < 1e-5);
        assert!(bar.sample(Vec2::new(0.0, 3.0)) < 0.0);
        assert!(bar.sample(Vec2::new(3.0, 0.0)) > 0.0);
    }

    #[test]
    fn texture_interpolates_and_extends() {
        let t = TextureSdf {
            origin: Vec2::ZERO,
            cell_size: 1.0,
            width: 2,
            height: 2,
            values: vec![-1.0, 1.0, -1.0, 1.0],
        };
        assert!(t.sample(Vec2::new(0.5, 0.5)).abs() < 1e-6);
        assert!((t.sample(Vec2::new(3.0, 0.5)) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn config_builds_nested_shapes() {
        let src = r#"
            kind = "translate"
            offset = { x = 4.0, y = 0.0 }
            shape = { kind = "circle", center = { x = 0.0, y = 0.0 }, radius = 2.0 }
        "#;
        let cfg: SdfConfig = toml::from_str(src).unwrap();
        let sdf = cfg.build().unwrap();
        assert!(sdf.sample(Vec2::new(4.0, 0.0)) < 0.0);

        let bad = SdfConfig::Circle {
            center: Vec2::ZERO,
            radius: -1.0,
        };
        assert!(matches!(bad.build(), Err(FieldError::InvalidShape(_))));
    }
}
