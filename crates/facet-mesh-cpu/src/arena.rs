//! Index-addressed storage for the directed boundary edges shared by the wavefront and the
//! monotone sweep.

use std::fmt;
use std::ops::{Index, IndexMut};

use facet_geom::Vec2;

/// Stable handle of an edge; valid until the arena is cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u32);

impl EdgeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// One directed edge of a loop. It starts at `origin` (its position at `distance`) and ends at
/// the start of `next`; the solid lies on its left.
#[derive(Clone, Debug)]
pub struct Edge {
    pub index: EdgeId,
    pub origin: Vec2,
    pub tangent: Vec2,
    /// Tangent rotated +90°, pointing into the solid.
    pub normal: Vec2,
    pub distance: f32,
    pub height: f32,
    /// Motion of the start vertex per unit of offset distance.
    pub velocity: Vec2,
    pub max_distance: f32,
    pub prev: EdgeId,
    pub next: EdgeId,
    /// Output vertices at the start: `.0` on the predecessor's wall, `.1` on this edge's wall.
    pub vertices: (i32, i32),
}

impl Edge {
    /// Start vertex position at offset distance `d`.
    #[inline]
    pub fn position_at(&self, d: f32) -> Vec2 {
        self.origin + self.velocity * (d - self.distance)
    }

    #[inline]
    pub fn is_realized(&self) -> bool {
        self.vertices.0 >= 0
    }
}

/// Operation record kept for reproducing topology failures.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Loop { first: EdgeId, count: usize },
    Bevel { width: f32, height: f32, smooth: bool },
    Close { smooth: bool },
    CloseEvent { edge: EdgeId, distance: f32 },
    SplitEvent { edge: EdgeId, other: EdgeId, distance: f32 },
    Advance { distance: f32, edges: usize },
    Rebuild { distance: f32, edges: usize, loops: usize },
    Connect { from: EdgeId, to: EdgeId },
}

const INACTIVE: u32 = u32::MAX;

/// Growing edge storage plus the active set (a dense list with a slot table for O(1) removal).
#[derive(Default, Debug)]
pub struct EdgeArena {
    edges: Vec<Edge>,
    active: Vec<EdgeId>,
    slots: Vec<u32>,
    ops: Vec<Op>,
}

impl EdgeArena {
    pub fn clear(&mut self) {
        self.edges.clear();
        self.active.clear();
        self.slots.clear();
        self.ops.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Allocates an unlinked, inactive edge pointing at itself.
    pub fn push(&mut self, origin: Vec2, tangent: Vec2, distance: f32, height: f32) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge {
            index: id,
            origin,
            tangent,
            normal: tangent.perp(),
            distance,
            height,
            velocity: Vec2::ZERO,
            max_distance: f32::INFINITY,
            prev: id,
            next: id,
            vertices: (-1, -1),
        });
        self.slots.push(INACTIVE);
        id
    }

    /// Adds a closed loop through `points` (at least three); returns its first edge.
    pub fn push_loop(&mut self, points: &[Vec2], distance: f32, height: f32) -> Option<EdgeId> {
        if points.len() < 3 {
            return None;
        }
        let first = self.edges.len() as u32;
        let n = points.len() as u32;
        for (i, &p) in points.iter().enumerate() {
            let q = points[(i + 1) % points.len()];
            self.push(p, (q - p).normalized(), distance, height);
        }
        for i in 0..n {
            self.link(EdgeId(first + i), EdgeId(first + (i + 1) % n));
        }
        self.record(Op::Loop {
            first: EdgeId(first),
            count: points.len(),
        });
        Some(EdgeId(first))
    }

    #[inline]
    pub fn link(&mut self, a: EdgeId, b: EdgeId) {
        self[a].next = b;
        self[b].prev = a;
    }

    /// Start position of the edge after `id`, i.e. the end of `id`.
    #[inline]
    pub fn end_of(&self, id: EdgeId) -> Vec2 {
        self[self[id].next].origin
    }

    pub fn activate(&mut self, id: EdgeId) {
        if self.slots[id.index()] == INACTIVE {
            self.slots[id.index()] = self.active.len() as u32;
            self.active.push(id);
        }
    }

    pub fn retire(&mut self, id: EdgeId) {
        let slot = self.slots[id.index()];
        if slot == INACTIVE {
            return;
        }
        self.active.swap_remove(slot as usize);
        if let Some(&moved) = self.active.get(slot as usize) {
            self.slots[moved.index()] = slot;
        }
        self.slots[id.index()] = INACTIVE;
    }

    #[inline]
    pub fn is_active(&self, id: EdgeId) -> bool {
        self.slots[id.index()] != INACTIVE
    }

    /// Position of an active edge in [`EdgeArena::active`].
    #[inline]
    pub fn slot(&self, id: EdgeId) -> Option<usize> {
        match self.slots[id.index()] {
            INACTIVE => None,
            s => Some(s as usize),
        }
    }

    #[inline]
    pub fn active(&self) -> &[EdgeId] {
        &self.active
    }

    pub fn retire_all(&mut self) {
        for id in self.active.drain(..) {
            self.slots[id.index()] = INACTIVE;
        }
    }

    /// Splits a loop by a diagonal between the starts of `u` and `v` (both outgoing edges of
    /// their vertices). Returns the two new edges `(u→v, v→u)`.
    pub fn connect_two_way(&mut self, u: EdgeId, v: EdgeId) -> (EdgeId, EdgeId) {
        let (pu, pv) = (self[u].prev, self[v].prev);
        let (a, b) = (self[u].origin, self[v].origin);
        let (d, h) = (self[u].distance, self[u].height);
        let tangent = (b - a).normalized();
        let d1 = self.push(a, tangent, d, h);
        let d2 = self.push(b, -tangent, d, h);
        self.link(pu, d1);
        self.link(d1, v);
        self.link(pv, d2);
        self.link(d2, u);
        self.record(Op::Connect { from: u, to: v });
        (d1, d2)
    }

    #[inline]
    pub fn record(&mut self, op: Op) {
        self.ops.push(op);
    }

    #[inline]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Logs the operation history at error level.
    pub fn dump_ops(&self, reason: &dyn fmt::Display) {
        log::error!("{reason}; {} operations since the shape started:", self.ops.len());
        for (i, op) in self.ops.iter().enumerate() {
            log::error!("  #{i}: {op:?}");
        }
    }
}

impl Index<EdgeId> for EdgeArena {
    type Output = Edge;

    #[inline]
    fn index(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }
}

impl IndexMut<EdgeId> for EdgeArena {
    #[inline]
    fn index_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id.index()]
    }
}
