use facet_geom::Vec2;

use crate::error::FieldError;
use crate::sdf::Sdf;

/// Samples read on each side beyond the nominal chunk so contouring at chunk edges sees its
/// neighbours.
pub const MARGIN: i32 = 2;

/// Encoded zero crossing: `>= SAMPLE_ZERO` is outside, `< SAMPLE_ZERO` is inside.
pub const SAMPLE_ZERO: u8 = 128;

/// Read access to a chunk's sample window, valid for `x, y` in `[-MARGIN, resolution + MARGIN]`.
pub trait SampleSource {
    fn resolution(&self) -> usize;
    fn sample(&self, x: i32, y: i32) -> u8;
}

/// Dense window of encoded signed samples for one chunk, margin included.
#[derive(Clone, Debug)]
pub struct SampleGrid {
    resolution: usize,
    stride: usize,
    data: Vec<u8>,
}

impl SampleGrid {
    /// Number of samples per row (and rows) for a given chunk resolution.
    #[inline]
    pub fn stride_for(resolution: usize) -> usize {
        resolution + 2 * MARGIN as usize + 1
    }

    /// A window with every sample outside.
    pub fn new(resolution: usize) -> Self {
        let stride = Self::stride_for(resolution);
        Self {
            resolution,
            stride,
            data: vec![u8::MAX; stride * stride],
        }
    }

    pub fn from_fn(resolution: usize, mut f: impl FnMut(i32, i32) -> u8) -> Self {
        let mut grid = Self::new(resolution);
        let hi = resolution as i32 + MARGIN;
        for y in -MARGIN..=hi {
            for x in -MARGIN..=hi {
                let i = grid.idx(x, y);
                grid.data[i] = f(x, y);
            }
        }
        grid
    }

    /// Wraps already-decoded samples laid out row-major starting at `(-MARGIN, -MARGIN)`.
    pub fn from_samples(resolution: usize, data: Vec<u8>) -> Result<Self, FieldError> {
        if resolution == 0 {
            return Err(FieldError::InvalidResolution);
        }
        let stride = Self::stride_for(resolution);
        if data.len() != stride * stride {
            return Err(FieldError::SampleCount {
                resolution,
                expected: stride * stride,
                actual: data.len(),
            });
        }
        Ok(Self {
            resolution,
            stride,
            data,
        })
    }

    /// Samples `sdf` at every lattice point of the chunk window whose lower-left lattice point
    /// sits at `origin`.
    pub fn rasterize(
        sdf: &Sdf,
        origin: Vec2,
        cell_size: f32,
        resolution: usize,
        max_distance: f32,
    ) -> Result<Self, FieldError> {
        if resolution == 0 {
            return Err(FieldError::InvalidResolution);
        }
        if !(max_distance.is_finite() && max_distance > 0.0) {
            return Err(FieldError::InvalidMaxDistance(max_distance));
        }
        Ok(Self::from_fn(resolution, |x, y| {
            let p = origin + Vec2::new(x as f32, y as f32) * cell_size;
            encode(sdf.sample(p), max_distance)
        }))
    }

    #[inline]
    fn idx(&self, x: i32, y: i32) -> usize {
        (y + MARGIN) as usize * self.stride + (x + MARGIN) as usize
    }

    #[inline]
    pub fn set(&mut self, x: i32, y: i32, value: u8) {
        let i = self.idx(x, y);
        self.data[i] = value;
    }

    #[inline]
    pub fn samples(&self) -> &[u8] {
        &self.data
    }

    /// True when the window holds both inside and outside samples, i.e. a contour exists.
    pub fn has_surface(&self) -> bool {
        let inside = self.data.iter().any(|&v| v < SAMPLE_ZERO);
        let outside = self.data.iter().any(|&v| v >= SAMPLE_ZERO);
        inside && outside
    }
}

impl SampleSource for SampleGrid {
    #[inline]
    fn resolution(&self) -> usize {
        self.resolution
    }

    #[inline]
    fn sample(&self, x: i32, y: i32) -> u8 {
        self.data[self.idx(x, y)]
    }
}

/// Maps a signed distance to the 8-bit sample encoding, saturating at `±max_distance`.
#[inline]
pub fn encode(distance: f32, max_distance: f32) -> u8 {
    let v = f32::from(SAMPLE_ZERO) + distance / max_distance * 127.0;
    v.round().clamp(0.0, 255.0) as u8
}
