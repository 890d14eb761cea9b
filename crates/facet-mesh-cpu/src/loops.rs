//! Stitches half-edges into closed loops and orders holes after their containing loop.

use std::f32::consts::TAU;
use std::ops::Range;

use facet_field::SampleSource;
use facet_geom::{Rect, Vec2};
use hashbrown::HashMap;

use crate::constants::{AREA_EPSILON, COLLINEAR_DOT, MIN_EDGE_LENGTH};
use crate::contour::{SourceEdge, VertexKey, Window};

const NONE: u32 = u32::MAX;

/// A closed loop over `LoopSet::points[first..first + count]`. Positive area is solid
/// (counter-clockwise), negative area a hole.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeLoop {
    pub first: usize,
    pub count: usize,
    pub area: f32,
    pub min: Vec2,
    pub max: Vec2,
}

impl EdgeLoop {
    #[inline]
    pub fn is_hole(&self) -> bool {
        self.area < 0.0
    }

    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::new(self.min, self.max)
    }
}

/// Assembled loops, each positive loop followed by the holes it contains.
#[derive(Default, Clone, Debug)]
pub struct LoopSet {
    pub points: Vec<Vec2>,
    pub loops: Vec<EdgeLoop>,
}

impl LoopSet {
    pub fn clear(&mut self) {
        self.points.clear();
        self.loops.clear();
    }

    #[inline]
    pub fn points_of(&self, l: &EdgeLoop) -> &[Vec2] {
        &self.points[l.first..l.first + l.count]
    }

    /// Connected regions: a positive loop followed by its holes.
    pub fn regions(&self) -> impl Iterator<Item = &[EdgeLoop]> + '_ {
        self.region_spans().map(|r| &self.loops[r])
    }

    /// Index ranges into `loops` of each positive loop and its holes.
    pub fn region_spans(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        let mut first = 0;
        std::iter::from_fn(move || {
            let head = self.loops.get(first)?;
            debug_assert!(!head.is_hole());
            let holes = self.loops[first + 1..]
                .iter()
                .take_while(|l| l.is_hole())
                .count();
            let span = first..first + 1 + holes;
            first = span.end;
            Some(span)
        })
    }

    /// Appends a loop from explicit points (already in loop order) after cleanup. Returns false
    /// when the loop was degenerate and dropped.
    pub fn push_loop(&mut self, points: &[Vec2]) -> bool {
        let mut scratch = points.to_vec();
        self.push_compacted(&mut scratch)
    }

    fn push_compacted(&mut self, pts: &mut Vec<Vec2>) -> bool {
        while pts.len() >= 3 && compact_pass(pts) {}
        if pts.len() < 3 {
            log::trace!("dropping loop with {} points", pts.len());
            return false;
        }
        let (area, bounds) = area_and_bounds(pts);
        if area.abs() <= AREA_EPSILON {
            log::trace!("dropping loop with area {area}");
            return false;
        }
        let first = self.points.len();
        self.points.extend_from_slice(pts);
        self.loops.push(EdgeLoop {
            first,
            count: pts.len(),
            area,
            min: bounds.min,
            max: bounds.max,
        });
        true
    }

    /// Sorts loops by area and moves every hole directly after the smallest positive loop
    /// containing it. Holes no loop contains are dropped.
    pub fn nest(&mut self) {
        self.loops.sort_by(|a, b| a.area.total_cmp(&b.area));
        let split = self.loops.partition_point(|l| l.is_hole());
        let (holes, solids) = self.loops.split_at(split);
        let mut parent = vec![None; holes.len()];
        for (hi, hole) in holes.iter().enumerate() {
            let probe = self.points[hole.first];
            parent[hi] = solids.iter().position(|s| {
                s.area >= -hole.area && contains(&self.points[s.first..s.first + s.count], s, probe)
            });
            if parent[hi].is_none() {
                log::debug!(
                    "dropping orphan hole with area {} at ({}, {})",
                    hole.area,
                    probe.x,
                    probe.y
                );
            }
        }
        let mut ordered = Vec::with_capacity(self.loops.len());
        for (si, solid) in solids.iter().enumerate() {
            ordered.push(*solid);
            for (hi, hole) in holes.iter().enumerate() {
                if parent[hi] == Some(si) {
                    ordered.push(*hole);
                }
            }
        }
        self.loops = ordered;
    }
}

/// Reusable scratch for [`LoopAssembler::assemble`].
#[derive(Default, Debug)]
pub struct LoopAssembler {
    first_out: HashMap<VertexKey, u32>,
    next_out: Vec<u32>,
    visited: Vec<bool>,
    walk: Vec<Vec2>,
}

impl LoopAssembler {
    pub fn clear(&mut self) {
        self.first_out.clear();
        self.next_out.clear();
        self.visited.clear();
        self.walk.clear();
    }

    /// Builds `out` from the half-edges of `src`'s window.
    pub fn assemble<S: SampleSource + ?Sized>(
        &mut self,
        src: &S,
        edges: &[SourceEdge],
        out: &mut LoopSet,
    ) {
        out.clear();
        self.clear();
        let win = Window::new(src);
        self.next_out.resize(edges.len(), NONE);
        self.visited.resize(edges.len(), false);
        for (i, e) in edges.iter().enumerate().rev() {
            let head = self.first_out.entry(e.from).or_insert(NONE);
            self.next_out[i] = *head;
            *head = i as u32;
        }

        for start in 0..edges.len() {
            if self.visited[start] {
                continue;
            }
            self.walk.clear();
            let mut cur = start;
            let closed = loop {
                self.visited[cur] = true;
                self.walk.push(win.position(edges[cur].from));
                let arrive = edges[cur].to;
                let d_in = win.position(arrive) - win.position(edges[cur].from);
                match self.pick_outgoing(&win, edges, arrive, d_in, start) {
                    Some(n) if n == start => break true,
                    Some(n) => cur = n,
                    None => break false,
                }
            };
            if !closed {
                log::trace!("dropping open chain of {} points", self.walk.len());
                continue;
            }
            let mut pts = std::mem::take(&mut self.walk);
            out.push_compacted(&mut pts);
            self.walk = pts;
        }
        out.nest();
    }

    /// Chooses the next half-edge leaving `at`: the unvisited one (or the loop's start) with the
    /// smallest clockwise turn from the reversed incoming direction.
    fn pick_outgoing<S: SampleSource + ?Sized>(
        &self,
        win: &Window<'_, S>,
        edges: &[SourceEdge],
        at: VertexKey,
        d_in: Vec2,
        start: usize,
    ) -> Option<usize> {
        let mut i = *self.first_out.get(&at)?;
        let back = -d_in;
        let origin = win.position(at);
        let mut best: Option<(f32, usize)> = None;
        let mut candidates = 0;
        while i != NONE {
            let idx = i as usize;
            i = self.next_out[idx];
            if self.visited[idx] && idx != start {
                continue;
            }
            candidates += 1;
            let d_out = win.position(edges[idx].to) - origin;
            let ccw = back.cross(d_out).atan2(back.dot(d_out));
            let mut cw = (-ccw).rem_euclid(TAU);
            if cw <= 0.0 {
                cw = TAU;
            }
            if best.is_none_or(|(b, _)| cw < b) {
                best = Some((cw, idx));
            }
        }
        if candidates > 1 {
            log::trace!("pinch vertex at {at:?} with {candidates} exits");
        }
        best.map(|(_, idx)| idx)
    }
}

/// One cleanup pass: merges near-coincident points and drops collinear ones. Returns whether
/// anything changed.
fn compact_pass(pts: &mut Vec<Vec2>) -> bool {
    let n = pts.len();
    let min_sq = MIN_EDGE_LENGTH * MIN_EDGE_LENGTH;
    let mut w = 0;
    for i in 0..n {
        let v = pts[i];
        let prev = if w == 0 { pts[n - 1] } else { pts[w - 1] };
        let next = pts[(i + 1) % n];
        let d1 = v - prev;
        let d2 = next - v;
        if d1.length_squared() < min_sq {
            continue;
        }
        if d2.length_squared() >= min_sq && d1.normalized().dot(d2.normalized()) >= COLLINEAR_DOT {
            continue;
        }
        pts[w] = v;
        w += 1;
    }
    let changed = w != n;
    pts.truncate(w);
    changed
}

fn area_and_bounds(pts: &[Vec2]) -> (f32, Rect) {
    let mut twice = 0.0f32;
    let mut bounds = Rect::EMPTY;
    let mut prev = pts[pts.len() - 1];
    for &p in pts {
        twice += prev.cross(p);
        bounds.include(p);
        prev = p;
    }
    (twice * 0.5, bounds)
}

/// Even-odd containment of `p` in the polygon `pts`, rejecting by bounds first.
pub(crate) fn contains(pts: &[Vec2], l: &EdgeLoop, p: Vec2) -> bool {
    if !l.bounds().contains(p) {
        return false;
    }
    let mut inside = false;
    let mut j = pts.len() - 1;
    for i in 0..pts.len() {
        let (a, b) = (pts[i], pts[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
