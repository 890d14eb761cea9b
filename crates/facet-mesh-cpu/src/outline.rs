//! Cleanup of wavefront loops that collapsed or touched themselves between events.
//!
//! A loop is degenerate when it has coincident neighbours, a zero-width spike, no area left, or
//! a pinch: two non-adjacent vertices at the same point whose solid wedges overlap. Cleaning
//! strips the first two, re-pairs each overlapping pinch by cutting the loop there, and drops
//! pieces without area.

use std::f32::consts::TAU;

use facet_geom::Vec2;

use crate::constants::WEDGE_EPSILON;

/// Counter-clockwise angle from `a` to `b` in `[0, 2π)`.
fn ccw_angle(a: Vec2, b: Vec2) -> f32 {
    let t = a.cross(b).atan2(a.dot(b));
    if t < 0.0 { t + TAU } else { t }
}

/// A vertex's solid wedge runs counter-clockwise from its outgoing to its incoming direction.
fn wedges_overlap(in1: Vec2, out1: Vec2, in2: Vec2, out2: Vec2) -> bool {
    let same = |a: Vec2, b: Vec2| {
        let t = ccw_angle(a, b);
        t <= WEDGE_EPSILON || t >= TAU - WEDGE_EPSILON
    };
    let inside = |x: Vec2, out: Vec2, inc: Vec2| {
        let t = ccw_angle(out, x);
        t > WEDGE_EPSILON && t < ccw_angle(out, inc) - WEDGE_EPSILON
    };
    same(out1, out2) || same(in1, in2) || inside(out2, out1, in1) || inside(out1, out2, in2)
}

#[inline]
fn is_spike(u: Vec2, w: Vec2, eps: f32) -> bool {
    u.dot(w) < 0.0 && u.cross(w).abs() <= eps * u.length().max(w.length())
}

pub(crate) fn signed_area(pts: &[Vec2]) -> f32 {
    let n = pts.len();
    0.5 * (0..n).map(|i| pts[i].cross(pts[(i + 1) % n])).sum::<f32>()
}

fn perimeter(pts: &[Vec2]) -> f32 {
    let n = pts.len();
    (0..n).map(|i| (pts[(i + 1) % n] - pts[i]).length()).sum()
}

#[inline]
fn has_area(pts: &[Vec2], eps: f32) -> bool {
    signed_area(pts).abs() > 0.5 * eps * perimeter(pts)
}

/// Removes repeated points and zero-width spikes until none remain.
fn strip(pts: &mut Vec<Vec2>, eps: f32) {
    let mut i = 0;
    let mut clean_run = 0;
    while pts.len() >= 3 && clean_run < pts.len() {
        let n = pts.len();
        i %= n;
        let (a, b, c) = (pts[(i + n - 1) % n], pts[i], pts[(i + 1) % n]);
        if (b - a).length() <= eps || is_spike(b - a, c - b, eps) {
            pts.remove(i);
            clean_run = 0;
            i = i.saturating_sub(1);
        } else {
            i += 1;
            clean_run += 1;
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Outline {
    order: Vec<u32>,
}

impl Outline {
    pub fn is_degenerate(&mut self, pts: &[Vec2], eps: f32) -> bool {
        let n = pts.len();
        if n < 3 {
            return true;
        }
        for i in 0..n {
            let (a, b, c) = (pts[i], pts[(i + 1) % n], pts[(i + 2) % n]);
            if (b - a).length() <= eps || is_spike(b - a, c - b, eps) {
                return true;
            }
        }
        !has_area(pts, eps) || self.find_pinch(pts, eps).is_some()
    }

    /// Appends the loops left after cleaning `pts` to `out`.
    pub fn clean(&mut self, pts: &[Vec2], eps: f32, out: &mut Vec<Vec<Vec2>>) {
        let mut work = vec![pts.to_vec()];
        while let Some(mut piece) = work.pop() {
            strip(&mut piece, eps);
            if piece.len() < 3 {
                continue;
            }
            if let Some((i, j)) = self.find_pinch(&piece, eps) {
                let tail = piece.split_off(j);
                work.push(piece[i..].to_vec());
                piece.truncate(i);
                piece.extend(tail);
                work.push(piece);
                continue;
            }
            if has_area(&piece, eps) {
                out.push(piece);
            }
        }
    }

    /// First overlapping pinch as `(i, j)` with `i < j`.
    fn find_pinch(&mut self, pts: &[Vec2], eps: f32) -> Option<(usize, usize)> {
        let n = pts.len();
        self.order.clear();
        self.order.extend(0..n as u32);
        self.order
            .sort_unstable_by(|&a, &b| pts[a as usize].x.total_cmp(&pts[b as usize].x));
        let around = |v: usize| (pts[(v + n - 1) % n] - pts[v], pts[(v + 1) % n] - pts[v]);
        for k in 0..n {
            let i = self.order[k] as usize;
            for &j in &self.order[k + 1..] {
                let j = j as usize;
                if pts[j].x - pts[i].x > eps {
                    break;
                }
                let (lo, hi) = (i.min(j), i.max(j));
                if hi - lo < 2 || hi - lo > n - 2 || (pts[i] - pts[j]).length() > eps {
                    continue;
                }
                let ((in1, out1), (in2, out2)) = (around(lo), around(hi));
                if wedges_overlap(in1, out1, in2, out2) {
                    return Some((lo, hi));
                }
            }
        }
        None
    }
}
