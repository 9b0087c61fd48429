use crate::geom::{Basis, Point3, bicubic_blend, bicubic_grid, bilinear_blend, bilinear_grid};

fn bezier_control() -> Vec<Point3> {
    let mut control = Vec::with_capacity(16);
    for row in 0..4 {
        for col in 0..4 {
            let z = if (1..3).contains(&row) && (1..3).contains(&col) { 1.0 } else { 0.0 };
            control.push(Point3::new(col as f64, row as f64, z));
        }
    }
    control
}

#[test]
fn bilinear_unit_grid_returns_exact_corners() {
    let corners = [0.1, -7.25, 1e-8, 3.3, 0.7, 12.5, 1.0 / 3.0, -0.0];
    let out = bilinear_blend(&corners, 2, 1, 1).unwrap();
    assert_eq!(out, corners.to_vec());
}

#[test]
fn bilinear_grid_interpolates_interior() {
    let corners = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
        Point3::new(2.0, 2.0, 2.0),
    ];
    let grid = bilinear_grid(&corners, 2, 2).unwrap();
    let mid = grid.points[4];
    assert!((mid.x - 1.0).abs() < 1e-12 && (mid.y - 1.0).abs() < 1e-12);
    assert!((mid.z - 0.5).abs() < 1e-12);
    assert!(grid.normals.iter().all(|n| n.z > 0.0));
}

#[test]
fn bezier_patch_interpolates_its_corners() {
    let control = bezier_control();
    let grid = bicubic_grid(&control, &Basis::BEZIER, &Basis::BEZIER, 3, 3).unwrap();
    assert_eq!(grid.points[0], control[0]);
    assert_eq!(grid.points[3], control[3]);
    assert_eq!(grid.points[12], control[12]);
    assert_eq!(grid.points[15], control[15]);
    assert!(grid.points[5].z > 0.0);
    assert!(grid.normals[0].z > 0.0);
}

#[test]
fn bspline_reproduces_constant_data() {
    let control = vec![4.5; 16];
    let out = bicubic_blend(&control, 1, &Basis::B_SPLINE, &Basis::CATMULL_ROM, 4, 4).unwrap();
    assert_eq!(out.len(), 25);
    assert!(out.iter().all(|v| (v - 4.5).abs() < 1e-12));
}

#[test]
fn power_basis_evaluates_polynomial() {
    // x(u) = u³ along u; constant along v.
    let mut control = vec![0.0; 16];
    for row in 0..4 {
        control[row * 4] = if row == 3 { 1.0 } else { 0.0 };
    }
    let out = bicubic_blend(&control, 1, &Basis::POWER, &Basis::POWER, 2, 1).unwrap();
    assert!((out[1] - 0.125).abs() < 1e-12);
    assert!((out[2] - 1.0).abs() < 1e-12);
}
