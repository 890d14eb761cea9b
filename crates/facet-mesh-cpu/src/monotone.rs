//! Sweep-line decomposition into x-monotone pieces and stack triangulation of each piece.
//!
//! Loops are copied into fresh arena edges first; diagonals are inserted into the copies with
//! [`EdgeArena::connect_two_way`], so the caller's edges are left untouched.

use std::cmp::Ordering;

use facet_geom::Vec2;

use crate::arena::{EdgeArena, EdgeId};
use crate::constants::{MIN_EDGE_LENGTH, TURN_EPSILON};
use crate::error::TopologyError;

/// Receives the output of [`Triangulator::triangulate`].
pub trait TriangleSink {
    /// Emits a vertex and returns its index.
    fn vertex(&mut self, p: Vec2) -> u32;
    /// Emits a counter-clockwise triangle.
    fn triangle(&mut self, a: u32, b: u32, c: u32);
}

/// Vertex of the monotone piece being triangulated.
#[derive(Clone, Copy, Debug)]
pub struct CloseVertex {
    pub position: Vec2,
    /// Offset from the previous vertex in sweep order.
    pub delta: Vec2,
    pub index: u32,
    pub is_upper: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VertexClass {
    Start,
    End,
    Split,
    Merge,
    Upper,
    Lower,
}

/// Sweep status entry: an edge with the interior below it, and its helper vertex.
#[derive(Clone, Copy, Debug)]
struct StatusEdge {
    edge: EdgeId,
    helper: EdgeId,
    merge: bool,
}

#[derive(Default, Debug)]
pub struct Triangulator {
    base: u32,
    /// Original vertex of every edge from `base` on.
    vertex_of: Vec<EdgeId>,
    /// Sink index of every original vertex.
    index_of: Vec<u32>,
    order: Vec<EdgeId>,
    status: Vec<StatusEdge>,
    /// Diagonals by the vertex they leave.
    fan: Vec<(EdgeId, EdgeId)>,
    visited: Vec<bool>,
    points: Vec<Vec2>,
    piece: Vec<EdgeId>,
    chain: Vec<CloseVertex>,
    stack: Vec<CloseVertex>,
}

#[inline]
fn sweep_cmp(a: (Vec2, EdgeId), b: (Vec2, EdgeId)) -> Ordering {
    a.0.x
        .total_cmp(&b.0.x)
        .then(a.0.y.total_cmp(&b.0.y))
        .then(a.1.cmp(&b.1))
}

fn classify(p: Vec2, v: Vec2, n: Vec2) -> VertexClass {
    let p_after = v.sweep_less(p);
    let n_after = v.sweep_less(n);
    let convex = (v - p).cross(n - v) > 0.0;
    match (p_after, n_after) {
        (true, true) if convex => VertexClass::Start,
        (true, true) => VertexClass::Split,
        (false, false) if convex => VertexClass::End,
        (false, false) => VertexClass::Merge,
        (true, false) => VertexClass::Upper,
        (false, true) => VertexClass::Lower,
    }
}

/// Whether direction `t` leaves `o` into the interior wedge of the corner `a → o → b`.
fn in_wedge(a: Vec2, o: Vec2, b: Vec2, t: Vec2) -> bool {
    let d_in = o - a;
    let d_out = b - o;
    let left_of_in = d_in.cross(t) > 0.0;
    let left_of_out = d_out.cross(t) > 0.0;
    let turn = d_in.cross(d_out);
    if turn > 0.0 {
        left_of_in && left_of_out
    } else if turn < 0.0 {
        left_of_in || left_of_out
    } else if d_in.dot(d_out) > 0.0 {
        left_of_out
    } else {
        true
    }
}

impl Triangulator {
    pub fn clear(&mut self) {
        self.base = 0;
        self.vertex_of.clear();
        self.index_of.clear();
        self.order.clear();
        self.status.clear();
        self.fan.clear();
        self.visited.clear();
        self.points.clear();
        self.piece.clear();
        self.chain.clear();
        self.stack.clear();
    }

    /// Triangulates the region bounded by the loops through `heads` (an outer loop and its
    /// holes, or several disjoint loops). Returns the number of triangles emitted.
    pub fn triangulate<K: TriangleSink + ?Sized>(
        &mut self,
        arena: &mut EdgeArena,
        heads: &[EdgeId],
        sink: &mut K,
    ) -> Result<usize, TopologyError> {
        self.clear();
        self.base = arena.len() as u32;
        for &head in heads {
            self.copy_loop(arena, head)?;
        }
        let end = arena.len() as u32;
        for i in self.base..end {
            let id = EdgeId(i);
            self.vertex_of.push(id);
            self.index_of.push(sink.vertex(arena[id].origin));
            self.order.push(id);
        }
        self.order
            .sort_by(|&a, &b| sweep_cmp((arena[a].origin, a), (arena[b].origin, b)));

        for k in 0..self.order.len() {
            let v = self.order[k];
            self.sweep_vertex(arena, v)?;
        }
        if !self.status.is_empty() {
            log::trace!("{} sweep edges left after the last vertex", self.status.len());
        }

        let end = arena.len() as u32;
        self.visited.clear();
        self.visited.resize((end - self.base) as usize, false);
        let mut triangles = 0;
        for i in self.base..end {
            if self.visited[(i - self.base) as usize] {
                continue;
            }
            self.piece.clear();
            let mut e = EdgeId(i);
            loop {
                if e.0 < self.base || self.piece.len() > self.visited.len() {
                    return Err(TopologyError::OpenLoop(i));
                }
                self.visited[(e.0 - self.base) as usize] = true;
                self.piece.push(e);
                e = arena[e].next;
                if e.0 == i {
                    break;
                }
            }
            triangles += self.triangulate_piece(arena, sink)?;
        }
        Ok(triangles)
    }

    /// Copies one loop, skipping repeated points.
    fn copy_loop(&mut self, arena: &mut EdgeArena, head: EdgeId) -> Result<(), TopologyError> {
        self.points.clear();
        let min_sq = MIN_EDGE_LENGTH * MIN_EDGE_LENGTH * 1e-2;
        let mut e = head;
        loop {
            let p = arena[e].origin;
            if self
                .points
                .last()
                .is_none_or(|&q| (p - q).length_squared() > min_sq)
            {
                self.points.push(p);
            }
            e = arena[e].next;
            if e == head {
                break;
            }
            if self.points.len() > arena.len() {
                return Err(TopologyError::OpenLoop(head.0));
            }
        }
        while self.points.len() > 1 {
            let (first, last) = (self.points[0], self.points[self.points.len() - 1]);
            if (first - last).length_squared() > min_sq {
                break;
            }
            self.points.pop();
        }
        if self.points.len() < 3 {
            log::trace!("skipping loop at {head} with {} distinct points", self.points.len());
            return Ok(());
        }
        let points = std::mem::take(&mut self.points);
        arena.push_loop(&points, 0.0, 0.0);
        self.points = points;
        Ok(())
    }

    #[inline]
    fn vertex(&self, e: EdgeId) -> EdgeId {
        self.vertex_of[(e.0 - self.base) as usize]
    }

    #[inline]
    fn index(&self, e: EdgeId) -> u32 {
        self.index_of[(self.vertex(e).0 - self.base) as usize]
    }

    fn sweep_vertex(&mut self, arena: &mut EdgeArena, v: EdgeId) -> Result<(), TopologyError> {
        let pos = arena[v].origin;
        let prev_edge = arena[v].prev;
        let class = classify(arena[prev_edge].origin, pos, arena.end_of(v));
        match class {
            VertexClass::Start => self.status.push(StatusEdge {
                edge: prev_edge,
                helper: v,
                merge: false,
            }),
            VertexClass::End => {
                let s = self.take_status(v, pos)?;
                if s.merge {
                    self.diagonal(arena, v, s.helper)?;
                }
            }
            VertexClass::Split => {
                let i = self.edge_above(arena, pos)?;
                let helper = self.status[i].helper;
                self.diagonal(arena, v, helper)?;
                self.status[i].helper = v;
                self.status[i].merge = false;
                self.status.push(StatusEdge {
                    edge: prev_edge,
                    helper: v,
                    merge: false,
                });
            }
            VertexClass::Merge => {
                let s = self.take_status(v, pos)?;
                if s.merge {
                    self.diagonal(arena, v, s.helper)?;
                }
                let i = self.edge_above(arena, pos)?;
                if self.status[i].merge {
                    let helper = self.status[i].helper;
                    self.diagonal(arena, v, helper)?;
                }
                self.status[i].helper = v;
                self.status[i].merge = true;
            }
            VertexClass::Upper => {
                let s = self.take_status(v, pos)?;
                if s.merge {
                    self.diagonal(arena, v, s.helper)?;
                }
                self.status.push(StatusEdge {
                    edge: prev_edge,
                    helper: v,
                    merge: false,
                });
            }
            VertexClass::Lower => {
                let i = self.edge_above(arena, pos)?;
                if self.status[i].merge {
                    let helper = self.status[i].helper;
                    self.diagonal(arena, v, helper)?;
                }
                self.status[i].helper = v;
                self.status[i].merge = false;
            }
        }
        Ok(())
    }

    fn take_status(&mut self, edge: EdgeId, pos: Vec2) -> Result<StatusEdge, TopologyError> {
        let i = self
            .status
            .iter()
            .position(|s| s.edge == edge)
            .ok_or(TopologyError::MissingStatusEdge(pos))?;
        Ok(self.status.swap_remove(i))
    }

    /// Status entry of the nearest edge above `pos`.
    fn edge_above(&self, arena: &EdgeArena, pos: Vec2) -> Result<usize, TopologyError> {
        let tol = TURN_EPSILON * (1.0 + pos.magnitude_hint());
        let mut best: Option<(f32, usize)> = None;
        for (i, s) in self.status.iter().enumerate() {
            let a = arena[s.edge].origin;
            let b = arena.end_of(s.edge);
            let y = if (a.x - b.x).abs() <= tol {
                a.y.max(b.y)
            } else {
                a.y + (pos.x - a.x) * (b.y - a.y) / (b.x - a.x)
            };
            if y >= pos.y - tol && best.is_none_or(|(by, _)| y < by) {
                best = Some((y, i));
            }
        }
        best.map(|(_, i)| i).ok_or(TopologyError::NoEdgeAbove(pos))
    }

    /// Outgoing edge of vertex `v` whose interior wedge contains `dir`.
    fn outgoing_towards(
        &self,
        arena: &EdgeArena,
        v: EdgeId,
        dir: Vec2,
    ) -> Result<EdgeId, TopologyError> {
        if !self.fan.iter().any(|&(w, _)| w == v) {
            return Ok(v);
        }
        let candidates = std::iter::once(v).chain(
            self.fan
                .iter()
                .filter(move |&&(w, _)| w == v)
                .map(|&(_, d)| d),
        );
        for c in candidates {
            let a = arena[arena[c].prev].origin;
            let o = arena[c].origin;
            let b = arena.end_of(c);
            if in_wedge(a, o, b, dir) {
                return Ok(c);
            }
        }
        Err(TopologyError::NoWedge(arena[v].origin))
    }

    fn diagonal(&mut self, arena: &mut EdgeArena, v: EdgeId, h: EdgeId) -> Result<(), TopologyError> {
        let (pv, ph) = (arena[v].origin, arena[h].origin);
        let out_v = self.outgoing_towards(arena, v, ph - pv)?;
        let out_h = self.outgoing_towards(arena, h, pv - ph)?;
        let (d1, d2) = arena.connect_two_way(out_v, out_h);
        self.vertex_of.push(v);
        self.vertex_of.push(h);
        self.fan.push((v, d1));
        self.fan.push((h, d2));
        Ok(())
    }

    fn triangulate_piece<K: TriangleSink + ?Sized>(
        &mut self,
        arena: &EdgeArena,
        sink: &mut K,
    ) -> Result<usize, TopologyError> {
        let n = self.piece.len();
        if n < 3 {
            return Err(TopologyError::DegenerateLoop(self.piece[0].0));
        }
        let key = |e: EdgeId| (arena[e].origin, self.vertex(e));
        let mut lo = 0;
        let mut hi = 0;
        for k in 1..n {
            if sweep_cmp(key(self.piece[k]), key(self.piece[lo])) == Ordering::Less {
                lo = k;
            }
            if sweep_cmp(key(self.piece[k]), key(self.piece[hi])) == Ordering::Greater {
                hi = k;
            }
        }

        self.chain.clear();
        let mut k = lo;
        // Walking forward from the leftmost vertex follows the lower chain.
        while k != hi {
            let e = self.piece[k];
            self.chain.push(self.close_vertex(arena, e, false));
            k = (k + 1) % n;
        }
        while k != lo {
            let e = self.piece[k];
            self.chain.push(self.close_vertex(arena, e, true));
            k = (k + 1) % n;
        }
        self.chain.sort_by(|a, b| {
            a.position
                .x
                .total_cmp(&b.position.x)
                .then(a.position.y.total_cmp(&b.position.y))
                .then(a.index.cmp(&b.index))
        });
        for i in 1..n {
            self.chain[i].delta = self.chain[i].position - self.chain[i - 1].position;
        }

        let mut count = 0;
        let mut emit = |a: CloseVertex, b: CloseVertex, c: CloseVertex| {
            if (b.position - a.position).cross(c.position - a.position) < 0.0 {
                sink.triangle(a.index, c.index, b.index);
            } else {
                sink.triangle(a.index, b.index, c.index);
            }
            count += 1;
        };

        self.stack.clear();
        self.stack.push(self.chain[0]);
        self.stack.push(self.chain[1]);
        for j in 2..n - 1 {
            let u = self.chain[j];
            let top = self.stack[self.stack.len() - 1];
            if u.is_upper != top.is_upper {
                for w in self.stack.windows(2) {
                    emit(u, w[0], w[1]);
                }
                self.stack.clear();
                self.stack.push(top);
                self.stack.push(u);
            } else {
                let mut last = top;
                let mut to_last = u.delta;
                self.stack.pop();
                while let Some(&t) = self.stack.last() {
                    let arm = last.position - t.position;
                    let turn = arm.cross(to_last);
                    let tol = TURN_EPSILON * arm.length_squared().max(to_last.length_squared());
                    let inside = if u.is_upper { turn < -tol } else { turn > tol };
                    if !inside {
                        break;
                    }
                    emit(u, last, t);
                    last = t;
                    to_last = u.position - last.position;
                    self.stack.pop();
                }
                self.stack.push(last);
                self.stack.push(u);
            }
        }
        let u = self.chain[n - 1];
        for w in self.stack.windows(2) {
            emit(u, w[0], w[1]);
        }
        Ok(count)
    }

    fn close_vertex(&self, arena: &EdgeArena, e: EdgeId, is_upper: bool) -> CloseVertex {
        CloseVertex {
            position: arena[e].origin,
            delta: Vec2::ZERO,
            index: self.index(e),
            is_upper,
        }
    }
}
