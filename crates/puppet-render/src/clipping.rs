//! Clip-polygon masking
//!
//! A clipping attachment masks every following slot up to and including its
//! end slot. The polygon may be concave: it is triangulated by ear clipping
//! and the ears are merged back into convex pieces, then each subject
//! triangle is clipped against every piece with Sutherland-Hodgman.

use glam::Vec2;
use puppet_rig::ClippingAttachment;

const EPSILON: f32 = 1e-5;

/// Result of clipping a triangle list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOutcome {
    /// Every triangle lies inside the clip polygon; use the input as-is.
    Unchanged,
    /// New geometry is available from the clipper's accessors.
    Clipped,
}

#[derive(Debug, Default)]
pub struct SkeletonClipper {
    end_slot: Option<String>,
    active: bool,
    polygon: Vec<Vec2>,
    pieces: Vec<Vec<Vec2>>,
    positions: Vec<Vec2>,
    uvs: Vec<Vec2>,
    triangles: Vec<u16>,
}

impl SkeletonClipper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clipping(&self) -> bool {
        self.active
    }

    /// Begin masking with `clip`, whose world-space polygon is `world`.
    ///
    /// Returns the number of convex pieces. A second start while a clip is
    /// active is ignored and returns 0.
    pub fn clip_start(&mut self, clip: &ClippingAttachment, world: &[Vec2]) -> usize {
        if self.active {
            log::debug!("Ignoring nested clip '{}'", clip.name);
            return 0;
        }
        if world.len() < 3 {
            log::warn!("Clip '{}' has fewer than 3 vertices", clip.name);
            return 0;
        }
        self.polygon.clear();
        self.polygon.extend_from_slice(world);
        if signed_area(&self.polygon) < 0.0 {
            self.polygon.reverse();
        }
        self.pieces = convex_decompose(&self.polygon);
        self.end_slot = clip.end_slot.clone();
        self.active = true;
        self.pieces.len()
    }

    /// End the clip when `slot_name` is its end slot.
    pub fn clip_end_with_slot(&mut self, slot_name: &str) {
        if self.active && self.end_slot.as_deref() == Some(slot_name) {
            self.clip_end();
        }
    }

    pub fn clip_end(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.end_slot = None;
        self.polygon.clear();
        self.pieces.clear();
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn triangles(&self) -> &[u16] {
        &self.triangles
    }

    /// Clip an indexed triangle list against the active polygon.
    ///
    /// Triangles fully inside keep their original vertices and winding.
    /// When all of them are inside, nothing is copied.
    pub fn clip_triangles(&mut self, positions: &[Vec2], uvs: &[Vec2], triangles: &[u16]) -> ClipOutcome {
        self.positions.clear();
        self.uvs.clear();
        self.triangles.clear();
        if !self.active {
            return ClipOutcome::Unchanged;
        }

        let corners = |t: &[u16]| -> Option<[usize; 3]> {
            let idx = [t[0] as usize, t[1] as usize, t[2] as usize];
            idx.iter()
                .all(|&i| i < positions.len() && i < uvs.len())
                .then_some(idx)
        };

        let all_inside = triangles.chunks_exact(3).all(|t| {
            corners(t).is_some_and(|[a, b, c]| {
                triangle_inside(&self.polygon, [positions[a], positions[b], positions[c]])
            })
        });
        if all_inside {
            return ClipOutcome::Unchanged;
        }

        let mut scratch = Vec::new();
        let mut next = Vec::new();
        for t in triangles.chunks_exact(3) {
            let Some([a, b, c]) = corners(t) else {
                continue;
            };
            let tri = [positions[a], positions[b], positions[c]];
            let tri_uv = [uvs[a], uvs[b], uvs[c]];

            if triangle_inside(&self.polygon, tri) {
                let base = self.positions.len();
                self.positions.extend_from_slice(&tri);
                self.uvs.extend_from_slice(&tri_uv);
                self.triangles
                    .extend([base as u16, base as u16 + 1, base as u16 + 2]);
                continue;
            }

            for piece in &self.pieces {
                scratch.clear();
                scratch.extend_from_slice(&tri);
                clip_convex(&scratch, piece, &mut next);
                if next.len() < 3 {
                    continue;
                }
                let base = self.positions.len();
                if base + next.len() > u16::MAX as usize {
                    log::warn!("Clipped geometry exceeds 16-bit indices, truncating");
                    return ClipOutcome::Clipped;
                }
                for &p in &next {
                    self.positions.push(p);
                    self.uvs.push(barycentric_uv(p, tri, tri_uv));
                }
                for i in 1..next.len() - 1 {
                    if cross(next[0], next[i], next[i + 1]).abs() < EPSILON {
                        continue;
                    }
                    self.triangles
                        .extend([base as u16, (base + i) as u16, (base + i + 1) as u16]);
                }
            }
        }
        ClipOutcome::Clipped
    }
}

fn cross(o: Vec2, a: Vec2, b: Vec2) -> f32 {
    (a - o).perp_dot(b - o)
}

fn signed_area(poly: &[Vec2]) -> f32 {
    let n = poly.len();
    (0..n)
        .map(|i| poly[i].perp_dot(poly[(i + 1) % n]))
        .sum::<f32>()
        * 0.5
}

/// Even-odd point-in-polygon; points on the boundary count as inside.
fn point_in_polygon(poly: &[Vec2], p: Vec2) -> bool {
    let n = poly.len();
    let mut inside = false;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        if on_segment(a, b, p) {
            return true;
        }
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

fn on_segment(a: Vec2, b: Vec2, p: Vec2) -> bool {
    if cross(a, b, p).abs() > EPSILON * (b - a).length().max(1.0) {
        return false;
    }
    p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}

/// Strict crossing of two segments (touching does not count).
fn segments_cross(a: Vec2, b: Vec2, c: Vec2, d: Vec2) -> bool {
    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);
    ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
        && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
}

/// A triangle is inside when its corners are and no edges cross.
fn triangle_inside(poly: &[Vec2], tri: [Vec2; 3]) -> bool {
    if !tri.iter().all(|&p| point_in_polygon(poly, p)) {
        return false;
    }
    let n = poly.len();
    (0..3).all(|i| {
        let (a, b) = (tri[i], tri[(i + 1) % 3]);
        (0..n).all(|j| !segments_cross(a, b, poly[j], poly[(j + 1) % n]))
    })
}

/// Ear-clipping triangulation of a counter-clockwise polygon.
fn triangulate(poly: &[Vec2]) -> Vec<[usize; 3]> {
    let mut remaining: Vec<usize> = (0..poly.len()).collect();
    let mut out = Vec::with_capacity(poly.len().saturating_sub(2));

    while remaining.len() > 3 {
        let n = remaining.len();
        let ear = (0..n).find(|&i| {
            let prev = poly[remaining[(i + n - 1) % n]];
            let cur = poly[remaining[i]];
            let next = poly[remaining[(i + 1) % n]];
            if cross(prev, cur, next) <= 0.0 {
                return false;
            }
            remaining.iter().all(|&k| {
                let p = poly[k];
                p == prev || p == cur || p == next || !point_in_triangle(p, prev, cur, next)
            })
        });
        // Degenerate input: fall back to cutting the first vertex
        let i = ear.unwrap_or(0);
        out.push([
            remaining[(i + n - 1) % n],
            remaining[i],
            remaining[(i + 1) % n],
        ]);
        remaining.remove(i);
    }
    if remaining.len() == 3 {
        out.push([remaining[0], remaining[1], remaining[2]]);
    }
    out
}

fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    cross(a, b, p) >= 0.0 && cross(b, c, p) >= 0.0 && cross(c, a, p) >= 0.0
}

fn is_convex(poly: &[Vec2]) -> bool {
    let n = poly.len();
    (0..n).all(|i| cross(poly[i], poly[(i + 1) % n], poly[(i + 2) % n]) >= -EPSILON)
}

/// Triangulate, then greedily merge neighbouring ears while they stay convex.
fn convex_decompose(poly: &[Vec2]) -> Vec<Vec<Vec2>> {
    if is_convex(poly) {
        return vec![poly.to_vec()];
    }
    let mut pieces: Vec<Vec<usize>> = Vec::new();
    'tri: for tri in triangulate(poly) {
        for piece in pieces.iter_mut() {
            let n = piece.len();
            for e in 0..n {
                let (a, b) = (piece[e], piece[(e + 1) % n]);
                // Shared edge appears reversed in the triangle
                for k in 0..3 {
                    if tri[k] == b && tri[(k + 1) % 3] == a {
                        let apex = tri[(k + 2) % 3];
                        let mut merged = piece.clone();
                        merged.insert(e + 1, apex);
                        let pts: Vec<Vec2> = merged.iter().map(|&i| poly[i]).collect();
                        if is_convex(&pts) {
                            *piece = merged;
                            continue 'tri;
                        }
                    }
                }
            }
        }
        pieces.push(tri.to_vec());
    }
    pieces
        .into_iter()
        .map(|p| p.into_iter().map(|i| poly[i]).collect())
        .collect()
}

/// Sutherland-Hodgman against one convex counter-clockwise piece.
fn clip_convex(subject: &[Vec2], clip: &[Vec2], out: &mut Vec<Vec2>) {
    let mut input = subject.to_vec();
    let n = clip.len();
    for i in 0..n {
        let (a, b) = (clip[i], clip[(i + 1) % n]);
        out.clear();
        if input.is_empty() {
            break;
        }
        let inside = |p: Vec2| cross(a, b, p) >= -EPSILON;
        for j in 0..input.len() {
            let cur = input[j];
            let prev = input[(j + input.len() - 1) % input.len()];
            match (inside(prev), inside(cur)) {
                (true, true) => out.push(cur),
                (true, false) => out.push(intersect(prev, cur, a, b)),
                (false, true) => {
                    out.push(intersect(prev, cur, a, b));
                    out.push(cur);
                }
                (false, false) => {}
            }
        }
        dedup_ring(out);
        std::mem::swap(&mut input, out);
    }
    out.clear();
    out.extend(input);
}

/// Drop consecutive coincident points, including across the wrap.
fn dedup_ring(ring: &mut Vec<Vec2>) {
    ring.dedup_by(|a, b| a.distance_squared(*b) < EPSILON * EPSILON);
    while ring.len() > 1
        && ring[0].distance_squared(ring[ring.len() - 1]) < EPSILON * EPSILON
    {
        ring.pop();
    }
}

fn intersect(p: Vec2, q: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let d1 = cross(a, b, p);
    let d2 = cross(a, b, q);
    let denom = d1 - d2;
    if denom.abs() < f32::EPSILON {
        return q;
    }
    p + (q - p) * (d1 / denom)
}

fn barycentric_uv(p: Vec2, tri: [Vec2; 3], uv: [Vec2; 3]) -> Vec2 {
    let area = cross(tri[0], tri[1], tri[2]);
    if area.abs() < f32::EPSILON {
        return uv[0];
    }
    let w0 = cross(tri[1], tri[2], p) / area;
    let w1 = cross(tri[2], tri[0], p) / area;
    let w2 = 1.0 - w0 - w1;
    uv[0] * w0 + uv[1] * w1 + uv[2] * w2
}
