use thiserror::Error;

use super::{Point3, Tolerance, newell_normal};

// ─────────────────────────────────────────────────────────────────────────────
// Grid topology
// ─────────────────────────────────────────────────────────────────────────────

/// Two triangles per cell of a `u_count × v_count` vertex grid, row-major in u.
#[must_use]
pub fn grid_triangles(u_count: usize, v_count: usize) -> Vec<u32> {
    if u_count < 2 || v_count < 2 {
        return Vec::new();
    }
    let mut indices = Vec::with_capacity((u_count - 1) * (v_count - 1) * 6);
    for v in 0..v_count - 1 {
        for u in 0..u_count - 1 {
            let i0 = (v * u_count + u) as u32;
            let i1 = i0 + 1;
            let i2 = i0 + u_count as u32;
            let i3 = i2 + 1;
            indices.extend_from_slice(&[i0, i1, i2, i2, i1, i3]);
        }
    }
    indices
}

/// One triangle strip per row of cells; returns the concatenated indices and
/// the length of each strip. Winding matches [`grid_triangles`].
#[must_use]
pub fn grid_strips(u_count: usize, v_count: usize) -> (Vec<u32>, Vec<u32>) {
    if u_count < 2 || v_count < 2 {
        return (Vec::new(), Vec::new());
    }
    let mut indices = Vec::with_capacity((v_count - 1) * u_count * 2);
    let mut lengths = Vec::with_capacity(v_count - 1);
    for v in 0..v_count - 1 {
        for u in 0..u_count {
            indices.push(((v + 1) * u_count + u) as u32);
            indices.push((v * u_count + u) as u32);
        }
        lengths.push((u_count * 2) as u32);
    }
    (indices, lengths)
}

// ─────────────────────────────────────────────────────────────────────────────
// Ear clipping
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TriangulationError {
    #[error("loop {loop_index} has {count} vertices, at least 3 are required")]
    TooFewVertices { loop_index: usize, count: usize },
    #[error("loop sizes add up to {expected} vertices, {found} were given")]
    LoopMismatch { expected: usize, found: usize },
    #[error("polygon vertices must be finite")]
    NonFinite,
    #[error("polygon has no area")]
    Degenerate,
    #[error("hole {0} cannot be connected to the outer loop")]
    NoBridge(usize),
    #[error("no ear left with {0} vertices remaining")]
    NoEar(usize),
}

#[derive(Debug, Clone, Copy)]
struct Node {
    idx: u32,
    u: f64,
    v: f64,
    prev: usize,
    next: usize,
}

/// Triangulates a planar polygon given as consecutive loops: the first loop
/// is the outer boundary, the rest are holes. `loops` holds the vertex count
/// of each loop and must sum to `points.len()`.
///
/// Returns triangles indexing into `points`, wound like the outer loop.
/// A simple polygon without holes or repeated points yields `n - 2`
/// triangles.
pub fn triangulate_polygon(
    points: &[Point3],
    loops: &[usize],
    tol: Tolerance,
) -> Result<Vec<[u32; 3]>, TriangulationError> {
    let total: usize = loops.iter().sum();
    if total != points.len() {
        return Err(TriangulationError::LoopMismatch {
            expected: total,
            found: points.len(),
        });
    }
    if let Some((loop_index, &count)) = loops.iter().enumerate().find(|(_, n)| **n < 3) {
        return Err(TriangulationError::TooFewVertices { loop_index, count });
    }
    if loops.is_empty() {
        return Err(TriangulationError::TooFewVertices {
            loop_index: 0,
            count: 0,
        });
    }
    if points
        .iter()
        .any(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
    {
        return Err(TriangulationError::NonFinite);
    }

    let normal = newell_normal(&points[..loops[0]]);
    if normal.length() <= tol.eps {
        return Err(TriangulationError::Degenerate);
    }
    let axis = normal.dominant_axis();
    // Mirror the projection so the outer loop runs counter-clockwise; the
    // emitted triangles then keep the winding of the input loop.
    let mirror = normal.to_array()[axis] < 0.0;
    let project = |p: &Point3| {
        let (u, v) = match axis {
            0 => (p.y, p.z),
            1 => (p.z, p.x),
            _ => (p.x, p.y),
        };
        if mirror { (-u, v) } else { (u, v) }
    };

    let mut nodes = Vec::with_capacity(points.len() + 2 * loops.len());
    let mut rings = Vec::with_capacity(loops.len());
    let mut offset = 0;
    for &count in loops {
        let start = nodes.len();
        for (i, p) in points[offset..offset + count].iter().enumerate() {
            let (u, v) = project(p);
            nodes.push(Node {
                idx: (offset + i) as u32,
                u,
                v,
                prev: start + (i + count - 1) % count,
                next: start + (i + 1) % count,
            });
        }
        rings.push(start);
        offset += count;
    }

    let mut outer = remove_duplicates(rings[0], &mut nodes, tol).ok_or(TriangulationError::Degenerate)?;
    if signed_area(outer, &nodes) <= tol.eps {
        return Err(TriangulationError::Degenerate);
    }

    let mut holes = Vec::with_capacity(rings.len() - 1);
    for (hole_index, &start) in rings.iter().enumerate().skip(1) {
        let Some(start) = remove_duplicates(start, &mut nodes, tol) else {
            log::debug!("hole {hole_index} collapsed, ignored");
            continue;
        };
        let area = signed_area(start, &nodes);
        if area.abs() <= tol.eps {
            log::debug!("hole {hole_index} has no area, ignored");
            continue;
        }
        if area > 0.0 {
            reverse_ring(start, &mut nodes);
        }
        holes.push((hole_index, leftmost(start, &nodes)));
    }
    holes.sort_by(|&(_, a), &(_, b)| {
        nodes[a]
            .u
            .total_cmp(&nodes[b].u)
            .then_with(|| nodes[a].v.total_cmp(&nodes[b].v))
    });

    for (hole_index, hole) in holes {
        let bridge = find_bridge(hole, outer, &nodes, tol).ok_or(TriangulationError::NoBridge(hole_index))?;
        split_ring(bridge, hole, &mut nodes);
        outer = bridge;
    }

    clip_ears(outer, &mut nodes, tol)
}

fn ring_len(start: usize, nodes: &[Node]) -> usize {
    let mut count = 1;
    let mut cur = nodes[start].next;
    while cur != start && count <= nodes.len() {
        count += 1;
        cur = nodes[cur].next;
    }
    count
}

fn unlink(node: usize, nodes: &mut [Node]) {
    let Node { prev, next, .. } = nodes[node];
    nodes[prev].next = next;
    nodes[next].prev = prev;
}

/// Drops points equal to their successor; collinear points stay.
fn remove_duplicates(start: usize, nodes: &mut [Node], tol: Tolerance) -> Option<usize> {
    let mut start = start;
    let mut remaining = ring_len(start, nodes);
    let mut cur = start;
    let mut checked = 0;
    while checked < remaining {
        let next = nodes[cur].next;
        if remaining > 1 && same_point(&nodes[cur], &nodes[next], tol) {
            if next == start {
                start = cur;
            }
            unlink(next, nodes);
            remaining -= 1;
        } else {
            cur = next;
            checked += 1;
        }
    }
    (remaining >= 3).then_some(start)
}

fn reverse_ring(start: usize, nodes: &mut [Node]) {
    let mut cur = start;
    loop {
        let Node { prev, next, .. } = nodes[cur];
        nodes[cur].prev = next;
        nodes[cur].next = prev;
        cur = next;
        if cur == start {
            break;
        }
    }
}

fn signed_area(start: usize, nodes: &[Node]) -> f64 {
    let mut area = 0.0;
    let mut p = start;
    loop {
        let q = nodes[p].next;
        area += nodes[p].u * nodes[q].v - nodes[q].u * nodes[p].v;
        p = q;
        if p == start {
            break;
        }
    }
    0.5 * area
}

fn leftmost(start: usize, nodes: &[Node]) -> usize {
    let mut best = start;
    let mut cur = nodes[start].next;
    while cur != start {
        let (a, b) = (&nodes[cur], &nodes[best]);
        if a.u < b.u || (a.u == b.u && a.v < b.v) {
            best = cur;
        }
        cur = nodes[cur].next;
    }
    best
}

/// Finds an outer vertex visible from `hole`, preferring the endpoints of
/// the nearest edge hit by a ray cast towards -u.
fn find_bridge(hole: usize, outer: usize, nodes: &[Node], tol: Tolerance) -> Option<usize> {
    let h = nodes[hole];
    let mut best_u = f64::NEG_INFINITY;
    let mut best_edge = None;
    let mut p = outer;
    loop {
        let q = nodes[p].next;
        let (a, b) = (&nodes[p], &nodes[q]);
        if (a.v > h.v) != (b.v > h.v) {
            let t = (h.v - a.v) / (b.v - a.v);
            let u = a.u + t * (b.u - a.u);
            if u <= h.u + tol.eps && u > best_u {
                best_u = u;
                best_edge = Some((p, q));
            }
        }
        p = q;
        if p == outer {
            break;
        }
    }

    let dist2 = |n: usize| (nodes[n].u - h.u).powi(2) + (nodes[n].v - h.v).powi(2);
    if let Some((a, b)) = best_edge {
        let mut candidates = [a, b];
        candidates.sort_by(|&x, &y| dist2(x).total_cmp(&dist2(y)));
        if let Some(&found) = candidates
            .iter()
            .find(|&&c| nodes[c].u <= h.u + tol.eps && is_visible(&h, c, outer, nodes, tol))
        {
            return Some(found);
        }
    }

    let mut best = None;
    let mut best_d2 = f64::INFINITY;
    let mut v = outer;
    loop {
        let d2 = dist2(v);
        if d2 < best_d2 && is_visible(&h, v, outer, nodes, tol) {
            best_d2 = d2;
            best = Some(v);
        }
        v = nodes[v].next;
        if v == outer {
            break;
        }
    }
    best
}

fn is_visible(from: &Node, target: usize, ring: usize, nodes: &[Node], tol: Tolerance) -> bool {
    let to = &nodes[target];
    let mut e = ring;
    loop {
        let n = nodes[e].next;
        let (c, d) = (&nodes[e], &nodes[n]);
        let touches_target = same_point(c, to, tol) || same_point(d, to, tol);
        if !touches_target && segments_intersect(from, to, c, d, tol) {
            return false;
        }
        e = n;
        if e == ring {
            break;
        }
    }
    true
}

/// Joins the hole ring at `b` into the outer ring at `a` through a pair of
/// coincident bridge edges.
fn split_ring(a: usize, b: usize, nodes: &mut Vec<Node>) {
    let a_next = nodes[a].next;
    let b_prev = nodes[b].prev;
    let (na, nb) = (nodes[a], nodes[b]);
    let a2 = nodes.len();
    let b2 = a2 + 1;
    nodes.push(Node { prev: b2, next: a_next, ..na });
    nodes.push(Node { prev: b_prev, next: a2, ..nb });

    nodes[a].next = b;
    nodes[b].prev = a;
    nodes[a_next].prev = a2;
    nodes[b_prev].next = b2;
}

fn clip_ears(start: usize, nodes: &mut [Node], tol: Tolerance) -> Result<Vec<[u32; 3]>, TriangulationError> {
    let mut start = start;
    let mut remaining = ring_len(start, nodes);
    let mut triangles = Vec::with_capacity(remaining.saturating_sub(2));

    while remaining > 3 {
        let clipped = match best_ear(start, nodes, tol) {
            Some(ear) => {
                let Node { prev, next, idx, .. } = nodes[ear];
                triangles.push([nodes[prev].idx, idx, nodes[next].idx]);
                ear
            }
            // Only flat or coincident vertices are left to remove.
            None => flat_vertex(start, nodes, tol).ok_or(TriangulationError::NoEar(remaining))?,
        };
        if clipped == start {
            start = nodes[clipped].next;
        }
        unlink(clipped, nodes);
        remaining -= 1;
    }

    let Node { prev, next, idx, .. } = nodes[start];
    if orient(&nodes[prev], &nodes[start], &nodes[next]) > tol.eps {
        triangles.push([nodes[prev].idx, idx, nodes[next].idx]);
    }
    if triangles.is_empty() {
        return Err(TriangulationError::Degenerate);
    }
    Ok(triangles)
}

/// The valid ear with the smallest interior angle.
fn best_ear(start: usize, nodes: &[Node], tol: Tolerance) -> Option<usize> {
    let mut best = None;
    let mut best_angle = f64::INFINITY;
    let mut cur = start;
    loop {
        let Node { prev, next, .. } = nodes[cur];
        let (a, b, c) = (&nodes[prev], &nodes[cur], &nodes[next]);
        let cross = orient(a, b, c);
        if cross > tol.eps {
            let dot = (a.u - b.u) * (c.u - b.u) + (a.v - b.v) * (c.v - b.v);
            let angle = cross.atan2(dot);
            if angle < best_angle && is_ear(prev, cur, next, nodes, tol) {
                best_angle = angle;
                best = Some(cur);
            }
        }
        cur = next;
        if cur == start {
            break;
        }
    }
    best
}

fn is_ear(prev: usize, ear: usize, next: usize, nodes: &[Node], tol: Tolerance) -> bool {
    let (a, b, c) = (&nodes[prev], &nodes[ear], &nodes[next]);
    let mut p = nodes[next].next;
    while p != prev {
        let n = &nodes[p];
        // Bridge copies share coordinates with ring vertices.
        let coincident = same_point(n, a, tol) || same_point(n, b, tol) || same_point(n, c, tol);
        if !coincident && point_in_triangle(a, b, c, n, tol) {
            let reflex = orient(&nodes[n.prev], n, &nodes[n.next]) <= tol.eps;
            if reflex {
                return false;
            }
        }
        p = n.next;
    }
    true
}

fn flat_vertex(start: usize, nodes: &[Node], tol: Tolerance) -> Option<usize> {
    let mut cur = start;
    loop {
        let Node { prev, next, .. } = nodes[cur];
        if orient(&nodes[prev], &nodes[cur], &nodes[next]).abs() <= tol.eps {
            return Some(cur);
        }
        cur = next;
        if cur == start {
            return None;
        }
    }
}

fn same_point(a: &Node, b: &Node, tol: Tolerance) -> bool {
    (a.u - b.u).abs() <= tol.eps && (a.v - b.v).abs() <= tol.eps
}

fn orient(a: &Node, b: &Node, c: &Node) -> f64 {
    (b.u - a.u) * (c.v - a.v) - (b.v - a.v) * (c.u - a.u)
}

fn point_in_triangle(a: &Node, b: &Node, c: &Node, p: &Node, tol: Tolerance) -> bool {
    orient(a, b, p) >= -tol.eps && orient(b, c, p) >= -tol.eps && orient(c, a, p) >= -tol.eps
}

fn segments_intersect(a: &Node, b: &Node, c: &Node, d: &Node, tol: Tolerance) -> bool {
    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);
    if (o1.abs() <= tol.eps && on_segment(a, c, b, tol))
        || (o2.abs() <= tol.eps && on_segment(a, d, b, tol))
        || (o3.abs() <= tol.eps && on_segment(c, a, d, tol))
        || (o4.abs() <= tol.eps && on_segment(c, b, d, tol))
    {
        return true;
    }
    let straddles = |x: f64, y: f64| (x > tol.eps && y < -tol.eps) || (x < -tol.eps && y > tol.eps);
    straddles(o1, o2) && straddles(o3, o4)
}

fn on_segment(a: &Node, p: &Node, b: &Node, tol: Tolerance) -> bool {
    p.u >= a.u.min(b.u) - tol.eps
        && p.u <= a.u.max(b.u) + tol.eps
        && p.v >= a.v.min(b.v) - tol.eps
        && p.v <= a.v.max(b.v) + tol.eps
}
