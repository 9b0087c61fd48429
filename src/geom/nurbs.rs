//! Rational B-spline patches evaluated one knot-span pair at a time.

use thiserror::Error;

use super::surface::SampleGrid;
use super::{Point3, Vec3};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NurbsError {
    #[error("{axis} order {order} needs at least {order} control points, found {count}")]
    Order { axis: char, order: usize, count: usize },
    #[error("{axis} knot vector needs {expected} values, found {found}")]
    KnotCount { axis: char, expected: usize, found: usize },
    #[error("{axis} knot vector decreases at index {index}")]
    NonMonotonic { axis: char, index: usize },
    #[error("{axis} parameter range {min}..{max} is empty or inverted")]
    Range { axis: char, min: f64, max: f64 },
    #[error("expected {expected} control points, found {found}")]
    ControlCount { expected: usize, found: usize },
    #[error("control point {0} has a zero or non-finite weight")]
    Weight(usize),
    #[error("tessellation resolution must be at least 1x1")]
    Resolution,
    #[error("tessellation grid {0}x{1} is too large to index")]
    TooLarge(usize, usize),
}

/// One parametric direction of a patch.
#[derive(Debug, Clone, PartialEq)]
pub struct NurbsAxis {
    pub count: usize,
    pub order: usize,
    pub knots: Vec<f64>,
    pub min: f64,
    pub max: f64,
}

/// A non-degenerate knot span, clipped to the axis range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    /// Knot index `i` with `knots[i] < knots[i + 1]`.
    pub knot: usize,
    /// Position among the non-degenerate spans.
    pub ordinal: usize,
    pub lo: f64,
    pub hi: f64,
}

impl NurbsAxis {
    fn validate(&self, axis: char) -> Result<(), NurbsError> {
        let Self { count, order, .. } = *self;
        if order == 0 || count < order {
            return Err(NurbsError::Order { axis, order, count });
        }
        if self.knots.len() != count + order {
            return Err(NurbsError::KnotCount {
                axis,
                expected: count + order,
                found: self.knots.len(),
            });
        }
        if let Some(index) = self
            .knots
            .windows(2)
            .position(|w| !(w[1] >= w[0]) || !w[1].is_finite())
        {
            return Err(NurbsError::NonMonotonic { axis, index: index + 1 });
        }
        if !(self.min < self.max) {
            return Err(NurbsError::Range {
                axis,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    fn degree(&self) -> usize {
        self.order - 1
    }

    /// Every span with non-zero length, in knot order; the ordinal counts
    /// all of them, the bounds are clipped to `min..max`.
    #[must_use]
    pub fn spans(&self) -> Vec<Span> {
        let lo = self.min.max(self.knots[self.degree()]);
        let hi = self.max.min(self.knots[self.count]);
        (self.degree()..self.count)
            .filter(|&i| self.knots[i + 1] > self.knots[i])
            .enumerate()
            .map(|(ordinal, knot)| Span {
                knot,
                ordinal,
                lo: self.knots[knot].max(lo),
                hi: self.knots[knot + 1].min(hi),
            })
            .collect()
    }

    /// Non-zero basis functions `N[span - p ..= span]` at `t` and their
    /// derivatives.
    fn basis(&self, span: usize, t: f64) -> (Vec<f64>, Vec<f64>) {
        let p = self.degree();
        let k = &self.knots;
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        // rows[j] holds the degree-j functions.
        let mut rows: Vec<Vec<f64>> = vec![vec![1.0]];
        for j in 1..=p {
            left[j] = t - k[span + 1 - j];
            right[j] = k[span + j] - t;
            let prev = &rows[j - 1];
            let mut row = vec![0.0; j + 1];
            let mut saved = 0.0;
            for r in 0..j {
                let denom = right[r + 1] + left[j - r];
                let temp = if denom == 0.0 { 0.0 } else { prev[r] / denom };
                row[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            row[j] = saved;
            rows.push(row);
        }
        let values = rows[p].clone();
        let mut ders = vec![0.0; p + 1];
        if p > 0 {
            let lower = &rows[p - 1];
            for (r, d) in ders.iter_mut().enumerate() {
                let i = span - p + r;
                let mut acc = 0.0;
                if r > 0 {
                    let denom = k[i + p] - k[i];
                    if denom != 0.0 {
                        acc += lower[r - 1] / denom;
                    }
                }
                if r < p {
                    let denom = k[i + p + 1] - k[i + 1];
                    if denom != 0.0 {
                        acc -= lower[r] / denom;
                    }
                }
                *d = p as f64 * acc;
            }
        }
        (values, ders)
    }
}

/// A pair of spans: one tessellated piece of the patch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub u: Span,
    pub v: Span,
    /// Index among all segments, for uniform and facevarying data.
    pub index: usize,
}

/// Contribution of one control point to a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Influence {
    /// Index into the `nu × nv` control grid.
    pub control: usize,
    /// Position within the segment's `uorder × vorder` block.
    pub local: usize,
    /// Rational weight; the weights of one sample sum to one.
    pub weight: f64,
}

/// Samples of one segment, with the control influences per sample for
/// blending vertex and facevertex data.
#[derive(Debug, Clone)]
pub struct SegmentGrid {
    pub grid: SampleGrid,
    pub influences: Vec<Vec<Influence>>,
    /// Bilinear parameters over the unclipped span, for varying data.
    pub span_params: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NuPatch {
    pub u: NurbsAxis,
    pub v: NurbsAxis,
    /// Homogeneous control points `(wx, wy, wz, w)`, row-major in u.
    pub points: Vec<[f64; 4]>,
}

impl NuPatch {
    pub fn new(u: NurbsAxis, v: NurbsAxis, points: Vec<[f64; 4]>) -> Result<Self, NurbsError> {
        u.validate('u')?;
        v.validate('v')?;
        let expected = u.count * v.count;
        if points.len() != expected {
            return Err(NurbsError::ControlCount {
                expected,
                found: points.len(),
            });
        }
        if let Some(bad) = points.iter().position(|p| p[3] == 0.0 || !p.iter().all(|c| c.is_finite())) {
            return Err(NurbsError::Weight(bad));
        }
        Ok(Self { u, v, points })
    }

    /// Segments inside the parameter range, skipping zero-length spans.
    #[must_use]
    pub fn segments(&self) -> Vec<Segment> {
        let u_spans = self.u.spans();
        let v_spans = self.v.spans();
        let mut out = Vec::new();
        for v in &v_spans {
            for u in &u_spans {
                let index = v.ordinal * u_spans.len() + u.ordinal;
                if u.lo < u.hi && v.lo < v.hi {
                    out.push(Segment { u: *u, v: *v, index });
                }
            }
        }
        out
    }

    /// Point, partial derivatives and control influences at `(s, t)` within
    /// `segment`.
    fn evaluate(&self, segment: &Segment, s: f64, t: f64) -> (Point3, Vec3, Vec3, Vec<Influence>) {
        let (p, q) = (self.u.degree(), self.v.degree());
        let (nu, dnu) = self.u.basis(segment.u.knot, s);
        let (nv, dnv) = self.v.basis(segment.v.knot, t);
        let mut h = [0.0; 4];
        let mut hu = [0.0; 4];
        let mut hv = [0.0; 4];
        for b in 0..=q {
            for a in 0..=p {
                let cp = self.points[(segment.v.knot - q + b) * self.u.count + segment.u.knot - p + a];
                for c in 0..4 {
                    h[c] += nu[a] * nv[b] * cp[c];
                    hu[c] += dnu[a] * nv[b] * cp[c];
                    hv[c] += nu[a] * dnv[b] * cp[c];
                }
            }
        }
        let w = h[3];
        let point = Point3::new(h[0] / w, h[1] / w, h[2] / w);
        // Quotient rule on the homogeneous sums.
        let derive = |d: [f64; 4]| {
            Vec3::new(
                (d[0] - d[3] * point.x) / w,
                (d[1] - d[3] * point.y) / w,
                (d[2] - d[3] * point.z) / w,
            )
        };
        let mut influences = Vec::with_capacity((p + 1) * (q + 1));
        for b in 0..=q {
            for a in 0..=p {
                let control = (segment.v.knot - q + b) * self.u.count + segment.u.knot - p + a;
                influences.push(Influence {
                    control,
                    local: b * (p + 1) + a,
                    weight: nu[a] * nv[b] * self.points[control][3] / w,
                });
            }
        }
        (point, derive(hu), derive(hv), influences)
    }

    /// `(tu + 1) × (tv + 1)` samples over one segment.
    pub fn segment_grid(&self, segment: &Segment, tu: usize, tv: usize) -> Result<SegmentGrid, NurbsError> {
        if tu == 0 || tv == 0 {
            return Err(NurbsError::Resolution);
        }
        let mut grid = SampleGrid::parameters(tu, tv).ok_or(NurbsError::TooLarge(tu, tv))?;
        let mut partials = Vec::with_capacity(grid.len());
        let mut influences = Vec::with_capacity(grid.len());
        let mut span_params = Vec::with_capacity(grid.len());
        let (ku0, ku1) = (self.u.knots[segment.u.knot], self.u.knots[segment.u.knot + 1]);
        let (kv0, kv1) = (self.v.knots[segment.v.knot], self.v.knots[segment.v.knot + 1]);
        for &[a, b] in &grid.params {
            let s = segment.u.lo + a * (segment.u.hi - segment.u.lo);
            let t = segment.v.lo + b * (segment.v.hi - segment.v.lo);
            let (point, du, dv, infl) = self.evaluate(segment, s, t);
            grid.points.push(point);
            partials.push((du, dv));
            influences.push(infl);
            span_params.push([(s - ku0) / (ku1 - ku0), (t - kv0) / (kv1 - kv0)]);
        }
        grid.set_normals(&partials, Vec3::Z);
        Ok(SegmentGrid {
            grid,
            influences,
            span_params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bilinear_axis(knots: Vec<f64>) -> NurbsAxis {
        NurbsAxis {
            count: knots.len() - 2,
            order: 2,
            min: knots[1],
            max: knots[knots.len() - 2],
            knots,
        }
    }

    #[test]
    fn zero_length_spans_are_skipped() {
        let axis = bilinear_axis(vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0]);
        let spans = axis.spans();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].knot, 3);
    }

    #[test]
    fn decreasing_knots_are_rejected() {
        let axis = NurbsAxis {
            count: 2,
            order: 2,
            knots: vec![0.0, 1.0, 0.5, 1.0],
            min: 0.0,
            max: 1.0,
        };
        let err = NuPatch::new(axis.clone(), axis, vec![[0.0, 0.0, 0.0, 1.0]; 4]).unwrap_err();
        assert_eq!(err, NurbsError::NonMonotonic { axis: 'u', index: 2 });
    }

    #[test]
    fn bilinear_nurbs_matches_plane() {
        let axis = bilinear_axis(vec![0.0, 0.0, 1.0, 1.0]);
        let points = vec![
            [0.0, 0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0, 1.0],
            [1.0, 1.0, 0.0, 1.0],
        ];
        let patch = NuPatch::new(axis.clone(), axis, points).unwrap();
        let segments = patch.segments();
        assert_eq!(segments.len(), 1);
        let sampled = patch.segment_grid(&segments[0], 2, 2).unwrap();
        let mid = sampled.grid.points[4];
        assert!((mid.x - 0.5).abs() < 1e-12 && (mid.y - 0.5).abs() < 1e-12);
        assert!((sampled.grid.normals[4].z - 1.0).abs() < 1e-12);
        let total: f64 = sampled.influences[4].iter().map(|i| i.weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }
}
