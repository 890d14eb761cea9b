//! Wavefront bevel engine.
//!
//! The active edges of one shape are offset inward step by step. Each step sweeps the ring from
//! the current `(distance, height)` to a target pair, processing close and split events on the
//! way and emitting the side walls into the cut stream. Closing hands the remaining ring to the
//! [`Triangulator`] as a flat cap in the front stream.

use facet_geom::{Rect, Vec2, Vec3};

use crate::arena::{EdgeArena, EdgeId, Op};
use crate::constants::{
    DEFAULT_MAX_SMOOTH_ANGLE, EVENT_EPSILON, FOLD_EPSILON, MERGE_EPSILON, REFLEX_EPSILON,
};
use crate::error::{BevelError, TopologyError};
use crate::mesh_build::MeshBuild;
use crate::monotone::{TriangleSink, Triangulator};
use crate::outline::Outline;

#[derive(Clone, Copy, Debug)]
enum Event {
    Close {
        edge: EdgeId,
        distance: f32,
    },
    Split {
        edge: EdgeId,
        other: EdgeId,
        distance: f32,
        at: Vec2,
    },
}

/// Normal of a wall face over an edge with inward normal `n`, tilted by `angle` from flat.
#[inline]
fn wall_normal(n: Vec2, angle: f32) -> Vec3 {
    let (s, c) = angle.sin_cos();
    Vec3::new(-n.x * s, -n.y * s, c)
}

#[inline]
fn tol(d: f32) -> f32 {
    EVENT_EPSILON * (1.0 + d.abs())
}

/// Writes cap triangles into the front stream at a fixed height.
struct CapSink<'a> {
    mesh: &'a mut MeshBuild,
    height: f32,
}

impl TriangleSink for CapSink<'_> {
    fn vertex(&mut self, p: Vec2) -> u32 {
        self.mesh.push_vertex(p.extend(self.height), Vec3::FRONT)
    }

    fn triangle(&mut self, a: u32, b: u32, c: u32) {
        self.mesh.push_triangle(a, b, c);
    }
}

#[derive(Debug)]
pub struct BevelEngine {
    arena: EdgeArena,
    triangulator: Triangulator,
    /// Event cursor inside the current step.
    distance: f32,
    prev_distance: f32,
    next_distance: f32,
    prev_height: f32,
    next_height: f32,
    prev_angle: f32,
    next_angle: f32,
    min_smooth_dot: f32,
    scale: f32,
    bounds: Rect,
    closed: bool,
    heads: Vec<EdgeId>,
    seen: Vec<bool>,
    ring: Vec<EdgeId>,
    next_slot: Vec<u32>,
    outline: Outline,
    points: Vec<Vec2>,
    pieces: Vec<Vec<Vec2>>,
}

impl Default for BevelEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SMOOTH_ANGLE.to_radians().cos())
    }
}

impl BevelEngine {
    pub fn new(min_smooth_dot: f32) -> Self {
        Self {
            arena: EdgeArena::default(),
            triangulator: Triangulator::default(),
            distance: 0.0,
            prev_distance: 0.0,
            next_distance: 0.0,
            prev_height: 0.0,
            next_height: 0.0,
            prev_angle: 0.0,
            next_angle: 0.0,
            min_smooth_dot,
            scale: 1.0,
            bounds: Rect::EMPTY,
            closed: false,
            heads: Vec::new(),
            seen: Vec::new(),
            ring: Vec::new(),
            next_slot: Vec::new(),
            outline: Outline::default(),
            points: Vec::new(),
            pieces: Vec::new(),
        }
    }

    /// Drops all edges and state but keeps allocations.
    pub fn reset(&mut self, min_smooth_dot: f32) {
        self.arena.clear();
        self.triangulator.clear();
        self.distance = 0.0;
        self.prev_distance = 0.0;
        self.next_distance = 0.0;
        self.prev_height = 0.0;
        self.next_height = 0.0;
        self.prev_angle = 0.0;
        self.next_angle = 0.0;
        self.min_smooth_dot = min_smooth_dot;
        self.scale = 1.0;
        self.bounds = Rect::EMPTY;
        self.closed = false;
        self.heads.clear();
        self.seen.clear();
        self.ring.clear();
        self.next_slot.clear();
        self.points.clear();
        self.pieces.clear();
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[inline]
    pub fn distance(&self) -> f32 {
        self.distance
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.next_height
    }

    #[inline]
    pub fn active_len(&self) -> usize {
        self.arena.active().len()
    }

    #[inline]
    pub fn arena(&self) -> &EdgeArena {
        &self.arena
    }

    pub fn dump_ops(&self, reason: &dyn std::fmt::Display) {
        self.arena.dump_ops(reason);
    }

    /// Adds a seed loop (solid on the left) at the current distance and height.
    pub fn add_loop(&mut self, points: &[Vec2]) -> Option<EdgeId> {
        let first = self.start_loop(points, self.distance, self.next_height)?;
        for &p in points {
            self.scale = self.scale.max(p.magnitude_hint());
            self.bounds.include(p);
        }
        Some(first)
    }

    fn start_loop(&mut self, points: &[Vec2], distance: f32, height: f32) -> Option<EdgeId> {
        let first = self.arena.push_loop(points, distance, height)?;
        let mut e = first;
        loop {
            self.arena.activate(e);
            self.update_velocity(e);
            e = self.arena[e].next;
            if e == first {
                break;
            }
        }
        loop {
            self.update_max_distance(e);
            e = self.arena[e].next;
            if e == first {
                break;
            }
        }
        Some(first)
    }

    /// Active loops as point lists at the current distance.
    pub fn ring_loops(&self) -> Vec<Vec<Vec2>> {
        let active = self.arena.active();
        let mut seen = vec![false; self.arena.len()];
        let mut out = Vec::new();
        for &head in active {
            if seen[head.index()] {
                continue;
            }
            let mut pts = Vec::new();
            let mut e = head;
            while !seen[e.index()] && pts.len() <= active.len() {
                seen[e.index()] = true;
                pts.push(self.arena[e].position_at(self.distance));
                e = self.arena[e].next;
            }
            out.push(pts);
        }
        out
    }

    /// Offsets the ring inward by `width` while raising it by `height`.
    /// An infinite width (with zero height) closes the shape.
    pub fn bevel(
        &mut self,
        width: f32,
        height: f32,
        smooth: bool,
        front: &mut MeshBuild,
        cut: &mut MeshBuild,
    ) -> Result<(), BevelError> {
        if self.closed {
            return Err(BevelError::Closed);
        }
        if width.is_nan() || width < 0.0 {
            return Err(BevelError::InvalidWidth(width));
        }
        if !height.is_finite() {
            return Err(BevelError::InvalidHeight(height));
        }
        if width == f32::INFINITY {
            if height != 0.0 {
                return Err(BevelError::InvalidHeight(height));
            }
            return self.close(smooth, front, cut);
        }
        self.arena.record(Op::Bevel {
            width,
            height,
            smooth,
        });
        if width == 0.0 && height == 0.0 {
            return Ok(());
        }

        self.prev_distance = self.next_distance;
        self.next_distance += width;
        self.prev_height = self.next_height;
        self.next_height += height;
        self.prev_angle = self.next_angle;
        self.next_angle = height.atan2(width);
        self.prepare_ring(smooth, cut);
        for i in 0..self.arena.active().len() {
            let e = self.arena.active()[i];
            self.update_velocity(e);
            self.update_max_distance(e);
        }

        self.run_events(cut)?;
        self.advance(cut)?;
        Ok(())
    }

    /// Sweeps the remaining region flat: the active loops become a cap at the current height.
    pub fn close(
        &mut self,
        smooth: bool,
        front: &mut MeshBuild,
        cut: &mut MeshBuild,
    ) -> Result<(), BevelError> {
        if self.closed {
            return Err(BevelError::Closed);
        }
        self.arena.record(Op::Close { smooth });
        if smooth {
            self.prev_angle = self.next_angle;
            self.next_angle = 0.0;
            self.prepare_ring(true, cut);
        }
        let mut sink = CapSink {
            mesh: front,
            height: self.next_height,
        };
        self.fill(&mut sink)?;
        self.arena.retire_all();
        self.closed = true;
        Ok(())
    }

    /// Triangulates the region enclosed by the active loops, leaving them untouched.
    /// Returns the number of triangles written to `sink`.
    pub fn fill<K: TriangleSink + ?Sized>(&mut self, sink: &mut K) -> Result<usize, TopologyError> {
        self.collect_heads()?;
        if self.heads.is_empty() {
            return Ok(0);
        }
        let heads = std::mem::take(&mut self.heads);
        let result = self.triangulator.triangulate(&mut self.arena, &heads, sink);
        self.heads = heads;
        result
    }

    fn collect_heads(&mut self) -> Result<(), TopologyError> {
        self.heads.clear();
        self.seen.clear();
        self.seen.resize(self.arena.len(), false);
        let count = self.arena.active().len();
        for i in 0..count {
            let head = self.arena.active()[i];
            if self.seen[head.index()] {
                continue;
            }
            self.heads.push(head);
            let mut e = head;
            let mut steps = 0;
            loop {
                self.seen[e.index()] = true;
                e = self.arena[e].next;
                if e == head {
                    break;
                }
                steps += 1;
                if steps > count || !self.arena.is_active(e) {
                    return Err(TopologyError::OpenLoop(head.0));
                }
            }
        }
        Ok(())
    }

    fn height_at(&self, d: f32) -> f32 {
        let span = self.next_distance - self.prev_distance;
        if span <= 0.0 {
            return self.next_height;
        }
        let t = ((d - self.prev_distance) / span).clamp(0.0, 1.0);
        self.prev_height + (self.next_height - self.prev_height) * t
    }

    /// Re-tilts or detaches the ring's realized vertices for a new step angle.
    fn prepare_ring(&mut self, smooth: bool, cut: &mut MeshBuild) {
        if (self.next_angle - self.prev_angle).abs() <= 1e-6 {
            return;
        }
        let mid = 0.5 * (self.prev_angle + self.next_angle);
        for i in 0..self.arena.active().len() {
            let e = self.arena.active()[i];
            let edge = &self.arena[e];
            if !edge.is_realized() {
                continue;
            }
            if !smooth {
                self.arena[e].vertices = (-1, -1);
                continue;
            }
            let (a, b) = edge.vertices;
            let n = edge.normal;
            let np = self.arena[edge.prev].normal;
            if a == b {
                cut.set_normal(a as u32, wall_normal((np + n).normalized(), mid));
            } else {
                cut.set_normal(a as u32, wall_normal(np, mid));
                cut.set_normal(b as u32, wall_normal(n, mid));
            }
        }
    }

    fn update_velocity(&mut self, e: EdgeId) {
        let prev = self.arena[e].prev;
        let s = self.arena[prev].normal + self.arena[e].normal;
        let l2 = s.length_squared();
        self.arena[e].velocity = if l2 < FOLD_EPSILON {
            Vec2::ZERO
        } else {
            s * (2.0 / l2)
        };
    }

    /// Distance at which `e` shrinks to zero length against its successor.
    fn update_max_distance(&mut self, e: EdgeId) {
        let edge = &self.arena[e];
        let next = &self.arena[edge.next];
        let base = edge.distance.max(next.distance);
        let t = edge.tangent;
        let length = (next.position_at(base) - edge.position_at(base)).dot(t);
        let max = if length <= EVENT_EPSILON * self.scale {
            base
        } else {
            let rate = (next.velocity - edge.velocity).dot(t);
            if rate < -EVENT_EPSILON {
                base - length / rate
            } else {
                f32::INFINITY
            }
        };
        self.arena[e].max_distance = max;
    }

    /// Where the start vertex of `e` crosses the supporting line of `o` inside its extent.
    /// Hits on either end of `o` are vertex against vertex collisions; they only count ahead of
    /// the cursor and never where a neighbour of `e` collapses into that end.
    fn split_hit(&self, e: EdgeId, o: EdgeId) -> Option<(f32, Vec2)> {
        let edge = &self.arena[e];
        let other = &self.arena[o];
        let k = edge.velocity.dot(other.normal);
        let denom = 1.0 - k;
        if denom <= EVENT_EPSILON {
            return None;
        }
        let q = (edge.origin - other.origin).dot(other.normal);
        let d = (other.distance + q - k * edge.distance) / denom;
        if d < self.distance - tol(self.distance) {
            return None;
        }
        let d = d.max(self.distance);
        let at = edge.position_at(d);
        let start = other.position_at(d);
        let end = self.arena[other.next].position_at(d);
        let s = (at - start).dot(other.tangent);
        let len = (end - start).dot(other.tangent);
        let eps = EVENT_EPSILON * self.scale;
        if s > eps && s < len - eps {
            return Some((d, at));
        }
        if len <= 2.0 * eps || d <= self.distance + tol(self.distance) {
            return None;
        }
        let at_start = s.abs() <= eps && o != edge.next;
        let at_end = (s - len).abs() <= eps && other.next != edge.prev;
        (at_start || at_end).then_some((d, at))
    }

    fn next_event(&self) -> Option<Event> {
        let limit = self.next_distance + tol(self.next_distance);
        let active = self.arena.active();

        let mut close: Option<(f32, EdgeId)> = None;
        for &e in active {
            let d = self.arena[e].max_distance;
            if d <= limit && close.is_none_or(|(best, _)| d < best) {
                close = Some((d, e));
            }
        }

        let mut split: Option<(f32, EdgeId, EdgeId, Vec2)> = None;
        for &e in active {
            let prev = self.arena[e].prev;
            if self.arena[prev].tangent.cross(self.arena[e].tangent) >= -REFLEX_EPSILON {
                continue;
            }
            for &o in active {
                if o == e || o == prev {
                    continue;
                }
                if let Some((d, at)) = self.split_hit(e, o) {
                    if d <= limit && split.is_none_or(|(best, ..)| d < best) {
                        split = Some((d, e, o, at));
                    }
                }
            }
        }

        match (close, split) {
            (Some((dc, edge)), Some((ds, ..))) if dc <= ds + tol(ds) => Some(Event::Close {
                edge,
                distance: dc.max(self.distance),
            }),
            (_, Some((distance, edge, other, at))) => Some(Event::Split {
                edge,
                other,
                distance,
                at,
            }),
            (Some((dc, edge)), None) => Some(Event::Close {
                edge,
                distance: dc.max(self.distance),
            }),
            (None, None) => None,
        }
    }

    fn run_events(&mut self, cut: &mut MeshBuild) -> Result<(), TopologyError> {
        let cap = self.arena.active().len().pow(2).max(1);
        let mut iterations = 0;
        while !self.arena.active().is_empty() {
            let Some(event) = self.next_event() else {
                break;
            };
            if iterations == cap {
                log::debug!(
                    "bevel to {} hit the event cap ({cap}) at distance {}",
                    self.next_distance,
                    self.distance
                );
                break;
            }
            iterations += 1;
            match event {
                Event::Close { edge, distance } => {
                    self.arena.record(Op::CloseEvent { edge, distance });
                    let merged = self.close_event(edge, distance, cut)?;
                    self.distance = self.distance.max(distance);
                    if let Some(d) = merged {
                        self.settle_loop(d, cut)?;
                    }
                }
                Event::Split {
                    edge,
                    other,
                    distance,
                    at,
                } => {
                    self.arena.record(Op::SplitEvent {
                        edge,
                        other,
                        distance,
                    });
                    let (o2, e2) = self.split_event(edge, other, distance, at, cut)?;
                    self.distance = self.distance.max(distance);
                    self.settle_loop(o2, cut)?;
                    self.settle_loop(e2, cut)?;
                }
            }
        }
        Ok(())
    }

    fn realize(&mut self, e: EdgeId, cut: &mut MeshBuild) -> (u32, u32) {
        let edge = &self.arena[e];
        if edge.is_realized() {
            return (edge.vertices.0 as u32, edge.vertices.1 as u32);
        }
        let n = edge.normal;
        let np = self.arena[edge.prev].normal;
        let p = edge.origin.extend(edge.height);
        let angle = self.next_angle;
        let vertices = if np.dot(n) >= self.min_smooth_dot {
            let i = cut.push_vertex(p, wall_normal((np + n).normalized(), angle));
            (i, i)
        } else {
            (
                cut.push_vertex(p, wall_normal(np, angle)),
                cut.push_vertex(p, wall_normal(n, angle)),
            )
        };
        self.arena[e].vertices = (vertices.0 as i32, vertices.1 as i32);
        vertices
    }

    /// Start vertex of `e` on its own wall.
    #[inline]
    fn own(&mut self, e: EdgeId, cut: &mut MeshBuild) -> u32 {
        self.realize(e, cut).1
    }

    /// Start vertex of `e` on its predecessor's wall.
    #[inline]
    fn prev_side(&mut self, e: EdgeId, cut: &mut MeshBuild) -> u32 {
        self.realize(e, cut).0
    }

    fn require_active(&self, e: EdgeId) -> Result<(), TopologyError> {
        if self.arena.is_active(e) {
            Ok(())
        } else {
            Err(TopologyError::OpenLoop(e.0))
        }
    }

    /// Retires a loop that has shrunk to two edges.
    fn retire_if_pair(&mut self, e: EdgeId) -> bool {
        let next = self.arena[e].next;
        if self.arena.is_active(e) && self.arena[next].next == e {
            self.arena.retire(e);
            self.arena.retire(next);
            return true;
        }
        false
    }

    /// Edge `b` reaches zero length; its neighbours `a` and `c` meet at the collapse point.
    /// Returns the merged edge unless the loop is gone.
    fn close_event(
        &mut self,
        b: EdgeId,
        distance: f32,
        cut: &mut MeshBuild,
    ) -> Result<Option<EdgeId>, TopologyError> {
        let a = self.arena[b].prev;
        let c = self.arena[b].next;
        self.require_active(a)?;
        self.require_active(c)?;
        if a == c {
            self.arena.retire(a);
            self.arena.retire(b);
            return Ok(None);
        }
        let cn = self.arena[c].next;
        self.require_active(cn)?;
        let h = self.height_at(distance);
        let p = (self.arena[b].position_at(distance) + self.arena[c].position_at(distance)) * 0.5;

        let own_a = self.own(a, cut);
        let side_b = self.prev_side(b, cut);
        let own_b = self.own(b, cut);
        let side_c = self.prev_side(c, cut);
        let own_c = self.own(c, cut);
        let side_cn = self.prev_side(cn, cut);
        let apex = cut.push_vertex(
            p.extend(h),
            wall_normal(self.arena[b].normal, self.next_angle),
        );

        let tangent = self.arena[c].tangent;
        self.arena.retire(b);
        self.arena.retire(c);
        let d = self.arena.push(p, tangent, distance, h);
        self.arena.link(a, d);
        self.arena.link(d, cn);
        self.arena.activate(d);
        let (d0, d1) = self.realize(d, cut);

        cut.push_triangle(own_a, side_b, d0);
        cut.push_triangle(own_b, side_c, apex);
        cut.push_triangle(own_c, side_cn, d1);

        self.update_velocity(d);
        self.update_max_distance(d);
        self.update_max_distance(a);
        if self.retire_if_pair(d) {
            return Ok(None);
        }
        Ok(Some(d))
    }

    /// The reflex start vertex of `e` runs into edge `o` at `at`, cutting the loop in two
    /// (or joining two loops).
    fn split_event(
        &mut self,
        e: EdgeId,
        o: EdgeId,
        distance: f32,
        at: Vec2,
        cut: &mut MeshBuild,
    ) -> Result<(EdgeId, EdgeId), TopologyError> {
        let pe = self.arena[e].prev;
        let en = self.arena[e].next;
        let on = self.arena[o].next;
        for x in [pe, en, on] {
            self.require_active(x)?;
        }
        let h = self.height_at(distance);

        let own_pe = self.own(pe, cut);
        let side_e = self.prev_side(e, cut);
        let own_e = self.own(e, cut);
        let side_en = self.prev_side(en, cut);
        let own_o = self.own(o, cut);
        let side_on = self.prev_side(on, cut);

        let (o_tangent, e_tangent) = (self.arena[o].tangent, self.arena[e].tangent);
        self.arena.retire(e);
        let o2 = self.arena.push(at, o_tangent, distance, h);
        let e2 = self.arena.push(at, e_tangent, distance, h);
        self.arena.link(pe, o2);
        self.arena.link(o2, on);
        self.arena.link(o, e2);
        self.arena.link(e2, en);
        self.arena.activate(o2);
        self.arena.activate(e2);
        let (o2_prev, o2_own) = self.realize(o2, cut);
        let e2_own = self.own(e2, cut);

        cut.push_triangle(own_pe, side_e, o2_prev);
        cut.push_triangle(own_e, side_en, e2_own);
        cut.push_triangle(own_o, side_on, o2_own);

        self.update_velocity(o2);
        self.update_velocity(e2);
        for x in [pe, o, o2, e2] {
            self.update_max_distance(x);
        }
        self.retire_if_pair(o2);
        self.retire_if_pair(e2);
        Ok((o2, e2))
    }

    /// Moves every active edge to the step target, bridging the old ring to the new one.
    fn advance(&mut self, cut: &mut MeshBuild) -> Result<(), TopologyError> {
        let target = self.next_distance;
        let h = self.next_height;
        self.ring.clear();
        self.ring.extend_from_slice(self.arena.active());
        self.next_slot.clear();
        for i in 0..self.ring.len() {
            let next = self.arena[self.ring[i]].next;
            let slot = self
                .arena
                .slot(next)
                .ok_or(TopologyError::OpenLoop(self.ring[i].0))?;
            self.next_slot.push(slot as u32);
        }

        let base = self.arena.len() as u32;
        for i in 0..self.ring.len() {
            let old = &self.arena[self.ring[i]];
            let (p, t, v) = (old.position_at(target), old.tangent, old.velocity);
            let id = self.arena.push(p, t, target, h);
            self.arena[id].velocity = v;
        }
        for i in 0..self.ring.len() {
            let j = self.next_slot[i];
            self.arena.link(EdgeId(base + i as u32), EdgeId(base + j));
        }

        for i in 0..self.ring.len() {
            let e = self.ring[i];
            let en = self.arena[e].next;
            let j = self.next_slot[i];
            let own_e = self.own(e, cut);
            let side_en = self.prev_side(en, cut);
            let new_own = self.own(EdgeId(base + i as u32), cut);
            let new_side = self.prev_side(EdgeId(base + j), cut);
            cut.push_triangle(own_e, side_en, new_side);
            cut.push_triangle(own_e, new_side, new_own);
        }

        self.arena.retire_all();
        for i in 0..self.ring.len() {
            self.arena.activate(EdgeId(base + i as u32));
        }
        for i in 0..self.ring.len() {
            self.update_max_distance(EdgeId(base + i as u32));
        }
        self.arena.record(Op::Advance {
            distance: target,
            edges: self.ring.len(),
        });
        self.distance = target;
        self.settle_all(cut)
    }

    /// Distance under which two points of one loop are the same point.
    fn merge_eps(&self) -> f32 {
        let size = self.bounds.size();
        let extent = if self.bounds.is_empty() {
            1.0
        } else {
            size.x.max(size.y).max(1.0)
        };
        (MERGE_EPSILON * extent).max(4.0 * EVENT_EPSILON * self.scale)
    }

    fn settle_all(&mut self, cut: &mut MeshBuild) -> Result<(), TopologyError> {
        self.collect_heads()?;
        let heads = std::mem::take(&mut self.heads);
        let result = heads.iter().try_for_each(|&head| self.settle_loop(head, cut));
        self.heads = heads;
        result
    }

    /// Rebuilds the loop through `head` if it collapsed, pinched or folded onto itself at the
    /// cursor. Its walls end at the current positions and the cleaned outline restarts there.
    fn settle_loop(&mut self, head: EdgeId, cut: &mut MeshBuild) -> Result<(), TopologyError> {
        if !self.arena.is_active(head) {
            return Ok(());
        }
        let d = self.distance;
        self.ring.clear();
        self.points.clear();
        let mut e = head;
        loop {
            self.require_active(e)?;
            self.ring.push(e);
            self.points.push(self.arena[e].position_at(d));
            e = self.arena[e].next;
            if e == head {
                break;
            }
            if self.ring.len() > self.arena.active().len() {
                return Err(TopologyError::OpenLoop(head.0));
            }
        }
        let eps = self.merge_eps();
        if !self.outline.is_degenerate(&self.points, eps) {
            return Ok(());
        }

        let h = self.height_at(d);
        let n = self.ring.len();
        for i in 0..n {
            let j = (i + 1) % n;
            let (e, en) = (self.ring[i], self.ring[j]);
            if self.arena[e].distance >= d && self.arena[en].distance >= d {
                continue;
            }
            let own_e = self.own(e, cut);
            let side_en = self.prev_side(en, cut);
            let (n_e, n_en) = (cut.normal(own_e), cut.normal(side_en));
            let top_en = cut.push_vertex(self.points[j].extend(h), n_en);
            let top_e = cut.push_vertex(self.points[i].extend(h), n_e);
            cut.push_triangle(own_e, side_en, top_en);
            cut.push_triangle(own_e, top_en, top_e);
        }
        for i in 0..n {
            self.arena.retire(self.ring[i]);
        }

        self.pieces.clear();
        self.outline.clean(&self.points, eps, &mut self.pieces);
        self.arena.record(Op::Rebuild {
            distance: d,
            edges: n,
            loops: self.pieces.len(),
        });
        log::trace!(
            "rebuilt a {n}-edge loop at distance {d} into {} loops",
            self.pieces.len()
        );
        let pieces = std::mem::take(&mut self.pieces);
        for piece in &pieces {
            self.start_loop(piece, d, h);
        }
        self.pieces = pieces;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<Vec2> {
        vec![
            Vec2::new(x0, y0),
            Vec2::new(x1, y0),
            Vec2::new(x1, y1),
            Vec2::new(x0, y1),
        ]
    }

    fn regular(n: usize, r: f32) -> Vec<Vec2> {
        (0..n)
            .map(|i| {
                let a = i as f32 / n as f32 * std::f32::consts::TAU;
                Vec2::new(r * a.cos(), r * a.sin())
            })
            .collect()
    }

    fn area(mesh: &MeshBuild) -> f32 {
        mesh.idx
            .chunks_exact(3)
            .map(|t| {
                let (a, b, c) = (mesh.position(t[0]), mesh.position(t[1]), mesh.position(t[2]));
                0.5 * (b.xy() - a.xy()).cross(c.xy() - a.xy())
            })
            .sum()
    }

    #[test]
    fn close_square_gives_two_triangles() {
        let mut engine = BevelEngine::default();
        let (mut front, mut cut) = (MeshBuild::default(), MeshBuild::default());
        engine.add_loop(&rect(0.0, 0.0, 3.0, 3.0)).unwrap();
        engine.close(false, &mut front, &mut cut).unwrap();
        assert!(engine.is_closed());
        assert_eq!(engine.active_len(), 0);
        assert_eq!(front.triangle_count(), 2);
        assert!((area(&front) - 9.0).abs() < 1e-4);
        assert!(cut.is_empty());
    }

    #[test]
    fn straight_step_bridges_each_edge() {
        let mut engine = BevelEngine::default();
        let (mut front, mut cut) = (MeshBuild::default(), MeshBuild::default());
        engine.add_loop(&rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        engine.bevel(1.0, 1.0, false, &mut front, &mut cut).unwrap();
        assert_eq!(engine.active_len(), 4);
        assert_eq!(cut.triangle_count(), 8);
        assert!((engine.distance() - 1.0).abs() < 1e-6);
        // 90° corners are hard: two vertices per corner on each ring.
        assert_eq!(cut.vertex_count(), 16);
        for i in 0..cut.vertex_count() as u32 {
            let n = cut.normal(i);
            assert!(n.z > 0.7 && n.z < 0.71, "{n:?}");
        }
        let loops = engine.ring_loops();
        assert_eq!(loops.len(), 1);
        for p in &loops[0] {
            assert!((p.x - 1.0).abs() < 1e-4 || (p.x - 9.0).abs() < 1e-4);
            assert!((p.y - 1.0).abs() < 1e-4 || (p.y - 9.0).abs() < 1e-4);
        }
        engine.close(false, &mut front, &mut cut).unwrap();
        assert!((area(&front) - 64.0).abs() < 1e-3);
        assert!((front.position(0).z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn vertical_step_faces_outward() {
        let mut engine = BevelEngine::default();
        let (mut front, mut cut) = (MeshBuild::default(), MeshBuild::default());
        engine.add_loop(&rect(0.0, 0.0, 4.0, 4.0)).unwrap();
        engine.bevel(0.0, 2.0, false, &mut front, &mut cut).unwrap();
        assert_eq!(cut.triangle_count(), 8);
        for t in cut.idx.chunks_exact(3) {
            let (a, b, c) = (cut.position(t[0]), cut.position(t[1]), cut.position(t[2]));
            let face = (b - a).cross(c - a);
            let centre = (a + b + c) / 3.0;
            let outward = Vec3::new(centre.x - 2.0, centre.y - 2.0, 0.0);
            assert!(face.dot(outward) > 0.0);
            assert!(face.z.abs() < 1e-5);
        }
    }

    #[test]
    fn zero_step_is_a_no_op() {
        let mut engine = BevelEngine::default();
        let (mut front, mut cut) = (MeshBuild::default(), MeshBuild::default());
        engine.add_loop(&rect(0.0, 0.0, 4.0, 4.0)).unwrap();
        engine.bevel(0.0, 0.0, true, &mut front, &mut cut).unwrap();
        assert!(cut.is_empty());
        assert_eq!(engine.active_len(), 4);
    }

    #[test]
    fn offset_is_uniform_on_regular_polygon() {
        let pts = regular(6, 5.0);
        let mut engine = BevelEngine::default();
        let (mut front, mut cut) = (MeshBuild::default(), MeshBuild::default());
        engine.add_loop(&pts).unwrap();
        engine.bevel(0.5, 0.0, false, &mut front, &mut cut).unwrap();
        let loops = engine.ring_loops();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 6);
        for &p in &loops[0] {
            let inset = (0..pts.len())
                .map(|i| {
                    let (a, b) = (pts[i], pts[(i + 1) % pts.len()]);
                    (p - a).dot((b - a).normalized().perp())
                })
                .fold(f32::INFINITY, f32::min);
            assert!((inset - 0.5).abs() < 1e-4, "inset {inset}");
        }
    }

    #[test]
    fn thin_rectangle_collapses() {
        let mut engine = BevelEngine::default();
        let (mut front, mut cut) = (MeshBuild::default(), MeshBuild::default());
        engine.add_loop(&rect(0.0, 0.0, 10.0, 1.0)).unwrap();
        engine.bevel(1.0, 0.5, false, &mut front, &mut cut).unwrap();
        assert_eq!(engine.active_len(), 0);
        assert!(!cut.is_empty());
        engine.close(false, &mut front, &mut cut).unwrap();
        assert!(front.is_empty());
    }

    #[test]
    fn reflex_corners_split_the_loop() {
        // A U shape whose bar is thinner than its legs.
        let pts = [
            Vec2::new(0.0, 0.0),
            Vec2::new(16.0, 0.0),
            Vec2::new(16.0, 12.0),
            Vec2::new(10.0, 12.0),
            Vec2::new(10.0, 3.0),
            Vec2::new(6.0, 3.0),
            Vec2::new(6.0, 12.0),
            Vec2::new(0.0, 12.0),
        ];
        let mut engine = BevelEngine::default();
        let (mut front, mut cut) = (MeshBuild::default(), MeshBuild::default());
        engine.add_loop(&pts).unwrap();
        engine.bevel(2.0, 1.0, false, &mut front, &mut cut).unwrap();
        let loops = engine.ring_loops();
        assert_eq!(loops.len(), 2);
        assert!(loops.iter().all(|l| l.len() == 4));
        assert!(
            engine
                .arena()
                .ops()
                .iter()
                .any(|op| matches!(op, Op::SplitEvent { .. }))
        );
        engine.close(false, &mut front, &mut cut).unwrap();
        assert_eq!(front.triangle_count(), 4);
        // Each leg keeps a 2 x 8 cap.
        assert!((area(&front) - 32.0).abs() < 1e-2);
    }

    #[test]
    fn chevron_arms_collapse_together() {
        // Both arms are 1/sqrt(2) thick, so the notch vertex meets the tip vertex just as the
        // arm ends close.
        let pts = [
            (-0.5, 13.0),
            (0.0, 12.5),
            (1.5, 14.0),
            (0.0, 15.5),
            (-0.5, 15.0),
            (0.5, 14.0),
        ]
        .map(|(x, y)| Vec2::new(x, y));
        let mut engine = BevelEngine::default();
        let (mut front, mut cut) = (MeshBuild::default(), MeshBuild::default());
        engine.add_loop(&pts).unwrap();
        engine.bevel(0.6, 0.1, false, &mut front, &mut cut).unwrap();
        assert_eq!(engine.active_len(), 0);
        engine.close(false, &mut front, &mut cut).unwrap();
        assert!(front.is_empty());
        let walls = area(&cut);
        assert!((walls - 2.5).abs() < 1e-3, "walls cover {walls}");
        for i in 0..cut.vertex_count() as u32 {
            assert!(cut.position(i).z <= 0.1 + 1e-5);
        }
    }

    #[test]
    fn smooth_corners_share_vertices() {
        let pts = regular(12, 6.0);
        let (mut front, mut cut) = (MeshBuild::default(), MeshBuild::default());
        let mut engine = BevelEngine::new(40f32.to_radians().cos());
        engine.add_loop(&pts).unwrap();
        engine.bevel(0.5, 0.5, false, &mut front, &mut cut).unwrap();
        assert_eq!(cut.vertex_count(), 24);

        let mut hard = MeshBuild::default();
        let mut engine = BevelEngine::new(1.5);
        engine.add_loop(&pts).unwrap();
        engine.bevel(0.5, 0.5, false, &mut front, &mut hard).unwrap();
        assert_eq!(hard.vertex_count(), 48);
    }

    #[test]
    fn short_loops_are_not_added() {
        let mut engine = BevelEngine::default();
        let (mut front, mut cut) = (MeshBuild::default(), MeshBuild::default());
        assert!(engine.add_loop(&[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)]).is_none());
        assert_eq!(engine.active_len(), 0);
        engine.add_loop(&rect(0.0, 0.0, 2.0, 2.0)).unwrap();
        assert_eq!(engine.active_len(), 4);
        engine.close(false, &mut front, &mut cut).unwrap();
        assert!((area(&front) - 4.0).abs() < 1e-4);
    }

    #[test]
    fn invalid_steps_are_rejected() {
        let mut engine = BevelEngine::default();
        let (mut front, mut cut) = (MeshBuild::default(), MeshBuild::default());
        engine.add_loop(&rect(0.0, 0.0, 4.0, 4.0)).unwrap();
        assert!(matches!(
            engine.bevel(-1.0, 0.0, false, &mut front, &mut cut),
            Err(BevelError::InvalidWidth(_))
        ));
        assert!(matches!(
            engine.bevel(f32::NAN, 0.0, false, &mut front, &mut cut),
            Err(BevelError::InvalidWidth(_))
        ));
        assert!(matches!(
            engine.bevel(1.0, f32::INFINITY, false, &mut front, &mut cut),
            Err(BevelError::InvalidHeight(_))
        ));
        assert!(matches!(
            engine.bevel(f32::INFINITY, 1.0, false, &mut front, &mut cut),
            Err(BevelError::InvalidHeight(_))
        ));
        engine
            .bevel(f32::INFINITY, 0.0, false, &mut front, &mut cut)
            .unwrap();
        assert!(engine.is_closed());
        assert!(matches!(
            engine.bevel(1.0, 0.0, false, &mut front, &mut cut),
            Err(BevelError::Closed)
        ));
        assert!(matches!(
            engine.close(false, &mut front, &mut cut),
            Err(BevelError::Closed)
        ));
    }
}
