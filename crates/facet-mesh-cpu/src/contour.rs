//! Marching-squares extraction of boundary half-edges from a chunk's sample window.
//!
//! Cell corners: A bottom-left, B bottom-right, C top-left, D top-right. Cell edges are numbered
//! AB = 0 (bottom), BD = 1 (right), CD = 2 (top), AC = 3 (left). Every emitted half-edge keeps the
//! solid on its left.

use facet_field::{MARGIN, SAMPLE_ZERO, SampleSource};
use facet_geom::Vec2;

const EDGE_AB: u8 = 0;
const EDGE_BD: u8 = 1;
const EDGE_CD: u8 = 2;
const EDGE_AC: u8 = 3;

const BIT_A: u8 = 1;
const BIT_B: u8 = 2;
const BIT_C: u8 = 4;
const BIT_D: u8 = 8;

/// Which lattice feature a [`VertexKey`] names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexKind {
    /// The lattice point itself.
    Corner,
    /// Crossing on the horizontal lattice edge `(x, y)-(x + 1, y)`.
    EdgeAB,
    /// Crossing on the vertical lattice edge `(x, y)-(x, y + 1)`.
    EdgeAC,
}

/// Cell-independent name of a boundary vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexKey {
    pub x: i32,
    pub y: i32,
    pub kind: VertexKind,
}

impl VertexKey {
    #[inline]
    pub const fn new(x: i32, y: i32, kind: VertexKind) -> Self {
        Self { x, y, kind }
    }
}

/// Directed boundary half-edge, solid on its left.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceEdge {
    pub from: VertexKey,
    pub to: VertexKey,
}

/// Half-edges per case as `(exit, entry)` cell-edge pairs; saddles use [`SADDLE_CONNECTED`]
/// when the centre is inside.
const CASES: [&[(u8, u8)]; 16] = [
    &[],
    &[(EDGE_AB, EDGE_AC)],
    &[(EDGE_BD, EDGE_AB)],
    &[(EDGE_BD, EDGE_AC)],
    &[(EDGE_AC, EDGE_CD)],
    &[(EDGE_AB, EDGE_CD)],
    &[(EDGE_BD, EDGE_AB), (EDGE_AC, EDGE_CD)],
    &[(EDGE_BD, EDGE_CD)],
    &[(EDGE_CD, EDGE_BD)],
    &[(EDGE_AB, EDGE_AC), (EDGE_CD, EDGE_BD)],
    &[(EDGE_CD, EDGE_AB)],
    &[(EDGE_CD, EDGE_AC)],
    &[(EDGE_AC, EDGE_BD)],
    &[(EDGE_AB, EDGE_BD)],
    &[(EDGE_AC, EDGE_AB)],
    &[],
];

const SADDLE_BC: u8 = BIT_B | BIT_C;
const SADDLE_AD: u8 = BIT_A | BIT_D;

fn saddle_connected(mask: u8) -> &'static [(u8, u8)] {
    match mask {
        SADDLE_BC => &[(EDGE_BD, EDGE_CD), (EDGE_AC, EDGE_AB)],
        _ => &[(EDGE_AB, EDGE_BD), (EDGE_CD, EDGE_AC)],
    }
}

/// Sample accessor that reads the outermost ring of the window as outside so every contour
/// closes inside the window.
pub(crate) struct Window<'a, S: SampleSource + ?Sized> {
    src: &'a S,
    lo: i32,
    hi: i32,
}

impl<'a, S: SampleSource + ?Sized> Window<'a, S> {
    pub(crate) fn new(src: &'a S) -> Self {
        Self {
            src,
            lo: -MARGIN,
            hi: src.resolution() as i32 + MARGIN,
        }
    }

    #[inline]
    pub(crate) fn sample(&self, x: i32, y: i32) -> u8 {
        if x <= self.lo || y <= self.lo || x >= self.hi || y >= self.hi {
            u8::MAX
        } else {
            self.src.sample(x, y)
        }
    }

    #[inline]
    fn inside(&self, x: i32, y: i32) -> bool {
        self.sample(x, y) < SAMPLE_ZERO
    }

    /// Resolves a key to its position in sample units.
    pub(crate) fn position(&self, key: VertexKey) -> Vec2 {
        let (x, y) = (key.x as f32, key.y as f32);
        match key.kind {
            VertexKind::Corner => Vec2::new(x, y),
            VertexKind::EdgeAB => {
                let (s0, s1) = (self.sample(key.x, key.y), self.sample(key.x + 1, key.y));
                Vec2::new(x + crossing_offset(s0, s1), y)
            }
            VertexKind::EdgeAC => {
                let (s0, s1) = (self.sample(key.x, key.y), self.sample(key.x, key.y + 1));
                Vec2::new(x, y + crossing_offset(s0, s1))
            }
        }
    }
}

/// Parameter of the zero crossing from the inside sample toward the outside one.
#[inline]
fn crossing_t(inside: u8, outside: u8) -> f32 {
    let (vi, vo) = (f32::from(inside), f32::from(outside));
    if vo <= vi {
        return 0.5;
    }
    ((f32::from(SAMPLE_ZERO) - vi) / (vo - vi)).clamp(0.0, 1.0)
}

/// Offset of the crossing along a lattice edge from its lower endpoint `s0` toward `s1`.
#[inline]
fn crossing_offset(s0: u8, s1: u8) -> f32 {
    if s0 < SAMPLE_ZERO {
        crossing_t(s0, s1)
    } else {
        1.0 - crossing_t(s1, s0)
    }
}

/// Names the crossing on cell edge `edge` of cell `(x, y)` independently of the cell.
pub(crate) fn normalize<S: SampleSource + ?Sized>(
    win: &Window<'_, S>,
    x: i32,
    y: i32,
    edge: u8,
) -> VertexKey {
    // Lattice edge endpoints (lower, upper) and the key naming the edge.
    let (p0, p1, key) = match edge {
        EDGE_AB => ((x, y), (x + 1, y), VertexKey::new(x, y, VertexKind::EdgeAB)),
        EDGE_BD => (
            (x + 1, y),
            (x + 1, y + 1),
            VertexKey::new(x + 1, y, VertexKind::EdgeAC),
        ),
        EDGE_CD => (
            (x, y + 1),
            (x + 1, y + 1),
            VertexKey::new(x, y + 1, VertexKind::EdgeAB),
        ),
        _ => ((x, y), (x, y + 1), VertexKey::new(x, y, VertexKind::EdgeAC)),
    };
    // A crossing that lands on the outside endpoint is that lattice point.
    let outside = if win.inside(p0.0, p0.1) { p1 } else { p0 };
    if win.sample(outside.0, outside.1) == SAMPLE_ZERO {
        VertexKey::new(outside.0, outside.1, VertexKind::Corner)
    } else {
        key
    }
}

/// Bilinear saddle test `(a−128)(d−128) − (b−128)(c−128)`.
#[inline]
fn saddle(a: u8, b: u8, c: u8, d: u8) -> i32 {
    let z = i32::from(SAMPLE_ZERO);
    let (a, b, c, d) = (
        i32::from(a) - z,
        i32::from(b) - z,
        i32::from(c) - z,
        i32::from(d) - z,
    );
    a * d - b * c
}

/// Half-edges of one cell as `(exit, entry)` pairs.
pub(crate) fn cell_case(a: u8, b: u8, c: u8, d: u8) -> &'static [(u8, u8)] {
    let mut mask = 0u8;
    if a < SAMPLE_ZERO {
        mask |= BIT_A;
    }
    if b < SAMPLE_ZERO {
        mask |= BIT_B;
    }
    if c < SAMPLE_ZERO {
        mask |= BIT_C;
    }
    if d < SAMPLE_ZERO {
        mask |= BIT_D;
    }
    let s = saddle(a, b, c, d);
    match mask {
        SADDLE_AD if s > 0 => saddle_connected(mask),
        SADDLE_BC if s < 0 => saddle_connected(mask),
        _ => CASES[mask as usize],
    }
}

/// Appends every boundary half-edge of the window to `out` (which is cleared first).
pub fn extract<S: SampleSource + ?Sized>(src: &S, out: &mut Vec<SourceEdge>) {
    out.clear();
    let win = Window::new(src);
    for y in win.lo..win.hi {
        for x in win.lo..win.hi {
            let a = win.sample(x, y);
            let b = win.sample(x + 1, y);
            let c = win.sample(x, y + 1);
            let d = win.sample(x + 1, y + 1);
            for &(from, to) in cell_case(a, b, c, d) {
                let from = normalize(&win, x, y, from);
                let to = normalize(&win, x, y, to);
                if from == to {
                    log::trace!("dropping self-loop half-edge at {from:?}");
                    continue;
                }
                out.push(SourceEdge { from, to });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_field::SampleGrid;

    const IN: u8 = 0;
    const OUT: u8 = 255;

    fn cell_position(edge: u8) -> Vec2 {
        match edge {
            EDGE_AB => Vec2::new(0.5, 0.0),
            EDGE_BD => Vec2::new(1.0, 0.5),
            EDGE_CD => Vec2::new(0.5, 1.0),
            _ => Vec2::new(0.0, 0.5),
        }
    }

    fn corner_samples(mask: u8) -> [u8; 4] {
        let pick = |bit| if mask & bit != 0 { IN } else { OUT };
        [pick(BIT_A), pick(BIT_B), pick(BIT_C), pick(BIT_D)]
    }

    #[test]
    fn every_case_keeps_solid_on_the_left() {
        let corners = [
            (BIT_A, Vec2::new(0.0, 0.0)),
            (BIT_B, Vec2::new(1.0, 0.0)),
            (BIT_C, Vec2::new(0.0, 1.0)),
            (BIT_D, Vec2::new(1.0, 1.0)),
        ];
        for mask in 0u8..16 {
            let [a, b, c, d] = corner_samples(mask);
            for &(from, to) in cell_case(a, b, c, d) {
                let p = cell_position(from);
                let q = cell_position(to);
                let mid = (p + q) * 0.5;
                let left = (q - p).perp();
                // Every corner on the left side of the half-edge is inside.
                for (bit, corner) in corners {
                    let side = left.dot(corner - mid);
                    if side.abs() < 1e-6 {
                        continue;
                    }
                    let inside = mask & bit != 0;
                    let diagonal_saddle = mask == SADDLE_AD || mask == SADDLE_BC;
                    if !diagonal_saddle {
                        assert_eq!(side > 0.0, inside, "mask {mask} edge {from}->{to}");
                    } else if side > 0.0 && (corner - mid).length() < 0.75 {
                        assert!(inside, "mask {mask} edge {from}->{to}");
                    }
                }
            }
        }
    }

    #[test]
    fn saddles_follow_the_centre_value() {
        // AD inside, strongly: centre inside, connected.
        assert_eq!(
            cell_case(0, 200, 200, 0),
            &[(EDGE_AB, EDGE_BD), (EDGE_CD, EDGE_AC)]
        );
        // AD barely inside: centre outside, separated.
        assert_eq!(cell_case(120, 255, 255, 120), CASES[9]);
        // BC inside, strongly: connected.
        assert_eq!(
            cell_case(200, 0, 0, 200),
            &[(EDGE_BD, EDGE_CD), (EDGE_AC, EDGE_AB)]
        );
        assert_eq!(cell_case(255, 120, 120, 255), CASES[6]);
        // A zero saddle value separates.
        assert_eq!(cell_case(64, 130, 192, 126), CASES[9]);
    }

    #[test]
    fn shared_crossings_normalize_identically() {
        // Two horizontally adjacent cells share the lattice edge x = 1.
        let grid = SampleGrid::from_fn(4, |x, y| if x <= 1 && y <= 1 { 10 } else { 250 });
        let win = Window::new(&grid);
        assert_eq!(normalize(&win, 0, 1, EDGE_BD), normalize(&win, 1, 1, EDGE_AC));
        assert_eq!(normalize(&win, 1, 0, EDGE_CD), normalize(&win, 1, 1, EDGE_AB));
    }

    #[test]
    fn crossing_on_a_zero_sample_snaps_to_corner() {
        let grid = SampleGrid::from_fn(4, |x, _| if x <= 1 { 10 } else { SAMPLE_ZERO });
        let win = Window::new(&grid);
        let key = normalize(&win, 1, 1, EDGE_AB);
        assert_eq!(key, VertexKey::new(2, 1, VertexKind::Corner));
        assert_eq!(win.position(key), Vec2::new(2.0, 1.0));
    }

    #[test]
    fn crossing_position_interpolates_from_inside() {
        // Inside sample 64, outside 192: the zero sits halfway.
        let grid = SampleGrid::from_fn(4, |x, _| if x <= 1 { 64 } else { 192 });
        let win = Window::new(&grid);
        let p = win.position(VertexKey::new(1, 1, VertexKind::EdgeAB));
        assert!((p.x - 1.5).abs() < 1e-6);
        let grid = SampleGrid::from_fn(4, |x, _| if x <= 1 { 192 } else { 64 });
        let win = Window::new(&grid);
        let p = win.position(VertexKey::new(1, 1, VertexKind::EdgeAB));
        assert!((p.x - 1.5).abs() < 1e-6);
    }

    #[test]
    fn window_ring_closes_contours() {
        let grid = SampleGrid::from_fn(4, |_, _| 0);
        let mut out = Vec::new();
        extract(&grid, &mut out);
        assert!(!out.is_empty());
        // Every key has matching in and out degree.
        for e in &out {
            let ins = out.iter().filter(|o| o.to == e.from).count();
            let outs = out.iter().filter(|o| o.from == e.from).count();
            assert_eq!(ins, outs);
        }
    }
}
