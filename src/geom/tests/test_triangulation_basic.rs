use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom::{Point3, Tolerance, TriangulationError, triangulate_polygon};

fn signed_area_xy(points: &[Point3], tri: [u32; 3]) -> f64 {
    let [a, b, c] = tri.map(|i| points[i as usize]);
    0.5 * ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x))
}

fn loop_area_xy(points: &[Point3]) -> f64 {
    let mut area = 0.0;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        area += a.x * b.y - b.x * a.y;
    }
    0.5 * area
}

fn square(x0: f64, y0: f64, size: f64, ccw: bool) -> Vec<Point3> {
    let mut pts = vec![
        Point3::new(x0, y0, 0.0),
        Point3::new(x0 + size, y0, 0.0),
        Point3::new(x0 + size, y0 + size, 0.0),
        Point3::new(x0, y0 + size, 0.0),
    ];
    if !ccw {
        pts.reverse();
    }
    pts
}

#[test]
fn random_star_polygons_yield_n_minus_two_triangles() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..50 {
        let n = rng.random_range(3..40);
        let points: Vec<Point3> = (0..n)
            .map(|k| {
                let angle = std::f64::consts::TAU * k as f64 / n as f64;
                let r = rng.random_range(0.3..1.5);
                Point3::new(r * angle.cos(), r * angle.sin(), 0.0)
            })
            .collect();
        let tris = triangulate_polygon(&points, &[n], Tolerance::DEFAULT).unwrap();
        assert_eq!(tris.len(), n - 2);
        let total: f64 = tris.iter().map(|t| signed_area_xy(&points, *t)).sum();
        assert!((total - loop_area_xy(&points)).abs() < 1e-9);
        assert!(tris.iter().all(|t| signed_area_xy(&points, *t) > 0.0));
    }
}

#[test]
fn clockwise_input_keeps_its_winding() {
    let points = square(0.0, 0.0, 1.0, false);
    let tris = triangulate_polygon(&points, &[4], Tolerance::DEFAULT).unwrap();
    assert_eq!(tris.len(), 2);
    assert!(tris.iter().all(|t| signed_area_xy(&points, *t) < 0.0));
}

#[test]
fn square_with_hole_covers_the_ring() {
    let mut points = square(0.0, 0.0, 2.0, true);
    points.extend(square(0.75, 0.75, 0.5, true));
    let tris = triangulate_polygon(&points, &[4, 4], Tolerance::DEFAULT).unwrap();
    assert_eq!(tris.len(), 8);
    let total: f64 = tris.iter().map(|t| signed_area_xy(&points, *t)).sum();
    assert!((total - 3.75).abs() < 1e-9);
    assert!(tris.iter().all(|t| signed_area_xy(&points, *t) > 0.0));
}

#[test]
fn two_holes_are_bridged() {
    let mut points = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(4.0, 0.0, 0.0),
        Point3::new(4.0, 2.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
    ];
    points.extend(square(0.5, 0.5, 1.0, false));
    points.extend(square(2.5, 0.5, 1.0, true));
    let tris = triangulate_polygon(&points, &[4, 4, 4], Tolerance::DEFAULT).unwrap();
    assert_eq!(tris.len(), 14);
    let total: f64 = tris.iter().map(|t| signed_area_xy(&points, *t)).sum();
    assert!((total - 6.0).abs() < 1e-9);
}

#[test]
fn collinear_points_are_kept() {
    let points = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(2.0, 2.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
    ];
    let tris = triangulate_polygon(&points, &[5], Tolerance::DEFAULT).unwrap();
    assert_eq!(tris.len(), 3);
    assert!(tris.iter().flatten().any(|&i| i == 1));
}

#[test]
fn vertical_polygon_projects_onto_its_plane() {
    let points = vec![
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 1.0),
        Point3::new(1.0, 0.5, 0.4),
        Point3::new(1.0, 0.0, 1.0),
    ];
    let tris = triangulate_polygon(&points, &[5], Tolerance::DEFAULT).unwrap();
    assert_eq!(tris.len(), 3);
}

#[test]
fn degenerate_loops_are_rejected() {
    let points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
    assert_eq!(
        triangulate_polygon(&points, &[2], Tolerance::DEFAULT),
        Err(TriangulationError::TooFewVertices { loop_index: 0, count: 2 })
    );
    let line = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
    ];
    assert_eq!(
        triangulate_polygon(&line, &[3], Tolerance::DEFAULT),
        Err(TriangulationError::Degenerate)
    );
    assert!(matches!(
        triangulate_polygon(&line, &[4], Tolerance::DEFAULT),
        Err(TriangulationError::LoopMismatch { .. })
    ));
}
