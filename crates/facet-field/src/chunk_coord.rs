use facet_geom::{Rect, Vec2};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cy: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cy: i32) -> Self {
        Self { cx, cy }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cy: self.cy + dy,
        }
    }

    /// World-space position of the chunk's lower-left corner.
    #[inline]
    pub fn origin(self, chunk_size: f32) -> Vec2 {
        Vec2::new(self.cx as f32 * chunk_size, self.cy as f32 * chunk_size)
    }

    #[inline]
    pub fn rect(self, chunk_size: f32) -> Rect {
        let min = self.origin(chunk_size);
        Rect::new(min, min + Vec2::new(chunk_size, chunk_size))
    }

    /// Every chunk whose square overlaps `rect`, row by row.
    pub fn covering(rect: Rect, chunk_size: f32) -> Vec<ChunkCoord> {
        if rect.is_empty() || !(chunk_size > 0.0) {
            return Vec::new();
        }
        let x0 = (rect.min.x / chunk_size).floor() as i32;
        let y0 = (rect.min.y / chunk_size).floor() as i32;
        let x1 = (rect.max.x / chunk_size).floor() as i32;
        let y1 = (rect.max.y / chunk_size).floor() as i32;
        let mut out = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)).max(0) as usize);
        for cy in y0..=y1 {
            for cx in x0..=x1 {
                out.push(ChunkCoord::new(cx, cy));
            }
        }
        out
    }

    #[inline]
    pub fn distance_sq(self, other: ChunkCoord) -> i64 {
        let dx = i64::from(self.cx - other.cx);
        let dy = i64::from(self.cy - other.cy);
        dx * dx + dy * dy
    }
}

impl From<(i32, i32)> for ChunkCoord {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<ChunkCoord> for (i32, i32) {
    fn from(value: ChunkCoord) -> Self {
        (value.cx, value.cy)
    }
}
