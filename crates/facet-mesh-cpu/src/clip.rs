//! Clipping of finished streams against an axis-aligned rectangle.

use facet_geom::{Rect, Vec3};
use hashbrown::HashMap;

use crate::mesh_build::{CollisionBuild, MeshBuild};

/// A triangle stream that can be cut by a plane.
pub trait ClipStream {
    fn vertex_count(&self) -> usize;
    fn position(&self, i: u32) -> Vec3;
    /// Appends the vertex `a + (b - a) * t` with interpolated attributes.
    fn push_lerp(&mut self, a: u32, b: u32, t: f32) -> u32;
    fn indices_mut(&mut self) -> &mut Vec<u32>;
    /// Keeps the vertices whose `remap` entry is not `u32::MAX`, moving vertex `i` to
    /// `remap[i]`. Kept vertices keep their relative order.
    fn compact(&mut self, remap: &[u32]);
}

fn compact_rows(data: &mut Vec<f32>, remap: &[u32]) {
    let mut kept = 0;
    for (i, &r) in remap.iter().enumerate() {
        if r != u32::MAX {
            let (src, dst) = (i * 3, r as usize * 3);
            data.copy_within(src..src + 3, dst);
            kept += 1;
        }
    }
    data.truncate(kept * 3);
}

impl ClipStream for MeshBuild {
    fn vertex_count(&self) -> usize {
        MeshBuild::vertex_count(self)
    }

    fn position(&self, i: u32) -> Vec3 {
        MeshBuild::position(self, i)
    }

    fn push_lerp(&mut self, a: u32, b: u32, t: f32) -> u32 {
        let p = self.position(a).lerp(self.position(b), t);
        let n = self.normal(a).lerp(self.normal(b), t).normalized();
        self.push_vertex(p, n)
    }

    fn indices_mut(&mut self) -> &mut Vec<u32> {
        &mut self.idx
    }

    fn compact(&mut self, remap: &[u32]) {
        compact_rows(&mut self.pos, remap);
        compact_rows(&mut self.norm, remap);
    }
}

impl ClipStream for CollisionBuild {
    fn vertex_count(&self) -> usize {
        CollisionBuild::vertex_count(self)
    }

    fn position(&self, i: u32) -> Vec3 {
        CollisionBuild::position(self, i)
    }

    fn push_lerp(&mut self, a: u32, b: u32, t: f32) -> u32 {
        let p = self.position(a).lerp(self.position(b), t);
        self.push_vertex(p)
    }

    fn indices_mut(&mut self) -> &mut Vec<u32> {
        &mut self.idx
    }

    fn compact(&mut self, remap: &[u32]) {
        compact_rows(&mut self.pos, remap);
    }
}

#[derive(Clone, Copy, Debug)]
struct HalfPlane {
    axis: usize,
    bound: f32,
    keep_above: bool,
}

impl HalfPlane {
    /// Signed distance, non-negative on the kept side.
    #[inline]
    fn distance(self, p: Vec3) -> f32 {
        let v = if self.axis == 0 { p.x } else { p.y };
        if self.keep_above {
            v - self.bound
        } else {
            self.bound - v
        }
    }
}

/// Scratch for [`clip_to_rect`]; reuse it across streams to keep allocations.
#[derive(Default, Debug)]
pub struct Clipper {
    crossings: HashMap<(u32, u32), u32>,
    tris: Vec<u32>,
    poly: Vec<u32>,
    remap: Vec<u32>,
}

impl Clipper {
    /// Clips every triangle of `stream` to `rect`, then drops unreferenced vertices.
    pub fn clip_to_rect<S: ClipStream + ?Sized>(&mut self, stream: &mut S, rect: Rect) {
        if stream.indices_mut().is_empty() {
            return;
        }
        let planes = [
            HalfPlane {
                axis: 0,
                bound: rect.min.x,
                keep_above: true,
            },
            HalfPlane {
                axis: 0,
                bound: rect.max.x,
                keep_above: false,
            },
            HalfPlane {
                axis: 1,
                bound: rect.min.y,
                keep_above: true,
            },
            HalfPlane {
                axis: 1,
                bound: rect.max.y,
                keep_above: false,
            },
        ];
        for plane in planes {
            self.clip_plane(stream, plane);
        }
        self.compact(stream);
    }

    fn clip_plane<S: ClipStream + ?Sized>(&mut self, stream: &mut S, plane: HalfPlane) {
        self.crossings.clear();
        self.tris.clear();
        self.tris.append(stream.indices_mut());
        let mut out = std::mem::take(stream.indices_mut());
        for tri in self.tris.chunks_exact(3) {
            let d = [
                plane.distance(stream.position(tri[0])),
                plane.distance(stream.position(tri[1])),
                plane.distance(stream.position(tri[2])),
            ];
            let inside = d.iter().filter(|&&x| x >= 0.0).count();
            if inside == 3 {
                out.extend_from_slice(tri);
                continue;
            }
            if inside == 0 {
                continue;
            }
            self.poly.clear();
            for i in 0..3 {
                let j = (i + 1) % 3;
                if d[i] >= 0.0 {
                    self.poly.push(tri[i]);
                }
                if (d[i] >= 0.0) != (d[j] >= 0.0) {
                    let (lo, hi, dl, dh) = if tri[i] < tri[j] {
                        (tri[i], tri[j], d[i], d[j])
                    } else {
                        (tri[j], tri[i], d[j], d[i])
                    };
                    let v = *self
                        .crossings
                        .entry((lo, hi))
                        .or_insert_with(|| stream.push_lerp(lo, hi, dl / (dl - dh)));
                    self.poly.push(v);
                }
            }
            for k in 1..self.poly.len().saturating_sub(1) {
                out.extend_from_slice(&[self.poly[0], self.poly[k], self.poly[k + 1]]);
            }
        }
        *stream.indices_mut() = out;
    }

    fn compact<S: ClipStream + ?Sized>(&mut self, stream: &mut S) {
        let n = stream.vertex_count();
        self.remap.clear();
        self.remap.resize(n, u32::MAX);
        for &i in stream.indices_mut().iter() {
            self.remap[i as usize] = 0;
        }
        let mut next = 0u32;
        for r in self.remap.iter_mut() {
            if *r != u32::MAX {
                *r = next;
                next += 1;
            }
        }
        if next as usize == n {
            return;
        }
        for i in stream.indices_mut().iter_mut() {
            *i = self.remap[*i as usize];
        }
        stream.compact(&self.remap);
    }
}

/// One-shot [`Clipper::clip_to_rect`].
pub fn clip_to_rect<S: ClipStream + ?Sized>(stream: &mut S, rect: Rect) {
    Clipper::default().clip_to_rect(stream, rect);
}
