use crate::geom::{Basis, NuPatch, NurbsAxis, NurbsError, Point3, bicubic_grid};

fn cubic_axis() -> NurbsAxis {
    NurbsAxis {
        count: 4,
        order: 4,
        knots: vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
        min: 0.0,
        max: 1.0,
    }
}

fn control() -> Vec<Point3> {
    (0..16)
        .map(|i| {
            let (col, row) = (i % 4, i / 4);
            Point3::new(col as f64, row as f64, ((col * row) % 3) as f64)
        })
        .collect()
}

#[test]
fn single_span_cubic_matches_bezier_patch() {
    let control = control();
    let homogeneous = control.iter().map(|p| [p.x, p.y, p.z, 1.0]).collect();
    let patch = NuPatch::new(cubic_axis(), cubic_axis(), homogeneous).unwrap();
    let segments = patch.segments();
    assert_eq!(segments.len(), 1);
    let sampled = patch.segment_grid(&segments[0], 4, 4).unwrap();
    let bezier = bicubic_grid(&control, &Basis::BEZIER, &Basis::BEZIER, 4, 4).unwrap();
    for (a, b) in sampled.grid.points.iter().zip(&bezier.points) {
        assert!((*a - *b).length() < 1e-9);
    }
    for (a, b) in sampled.grid.normals.iter().zip(&bezier.normals) {
        assert!((*a - *b).length() < 1e-6);
    }
}

#[test]
fn weights_pull_the_surface() {
    let mut homogeneous: Vec<[f64; 4]> = control().iter().map(|p| [p.x, p.y, p.z, 1.0]).collect();
    // Weight 4 at control point (1, 1), stored premultiplied.
    homogeneous[5] = [4.0, 4.0, 4.0, 4.0];
    let patch = NuPatch::new(cubic_axis(), cubic_axis(), homogeneous).unwrap();
    let segment = patch.segments()[0];
    let sampled = patch.segment_grid(&segment, 3, 3).unwrap();
    let near = sampled.grid.points[5];
    let target = Point3::new(1.0, 1.0, 1.0);
    let plain = bicubic_grid(&control(), &Basis::BEZIER, &Basis::BEZIER, 3, 3).unwrap();
    assert!((near - target).length() < (plain.points[5] - target).length());
    let total: f64 = sampled.influences[5].iter().map(|i| i.weight).sum();
    assert!((total - 1.0).abs() < 1e-12);
}

#[test]
fn inverted_range_is_rejected() {
    let mut u = cubic_axis();
    u.min = 0.8;
    u.max = 0.2;
    let points = vec![[0.0, 0.0, 0.0, 1.0]; 16];
    assert_eq!(
        NuPatch::new(u, cubic_axis(), points).unwrap_err(),
        NurbsError::Range { axis: 'u', min: 0.8, max: 0.2 }
    );
}

#[test]
fn range_clips_the_segments() {
    let axis = NurbsAxis {
        count: 4,
        order: 2,
        knots: vec![0.0, 0.0, 1.0, 2.0, 3.0, 3.0],
        min: 0.5,
        max: 1.5,
    };
    let line = NurbsAxis {
        count: 2,
        order: 2,
        knots: vec![0.0, 0.0, 1.0, 1.0],
        min: 0.0,
        max: 1.0,
    };
    let points = (0..8).map(|i| [(i % 4) as f64, (i / 4) as f64, 0.0, 1.0]).collect();
    let patch = NuPatch::new(axis, line, points).unwrap();
    let segments = patch.segments();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].u.lo, 0.5);
    assert_eq!(segments[1].u.hi, 1.5);
    assert_eq!(segments[1].index, 1);
}
