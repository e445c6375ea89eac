//! Property-based tests for the decimation driver.
//!
//! Random single-chart grids with random height fields are decimated to
//! random targets; the structural invariants must hold regardless of how far
//! the greedy loop gets.
//!
//! Run with: cargo test -p uv-decimate -- proptest

use nalgebra::{Point2, Point3};
use proptest::prelude::*;
use uv_decimate::{DecimateParams, SeamAwareDegree, UvMesh, decimate};

/// A grid mesh whose height field is driven by the given parameters.
fn grid_mesh(nx: usize, ny: usize, bump: f64, phase: f64) -> UvMesh {
    let mut mesh = UvMesh::new();
    for y in 0..ny {
        for x in 0..nx {
            let (xf, yf) = (x as f64, y as f64);
            let z = bump * (xf * 1.1 + phase).sin() * (yf * 0.9 + phase).cos();
            mesh.positions.push(Point3::new(xf, yf, z));
            mesh.texcoords.push(Point2::new(
                xf / (nx - 1) as f64,
                yf / (ny - 1) as f64,
            ));
        }
    }
    for y in 0..ny - 1 {
        for x in 0..nx - 1 {
            let i = (y * nx + x) as u32;
            let nxu = nx as u32;
            mesh.faces.push([i, i + 1, i + nxu]);
            mesh.faces.push([i + nxu, i + 1, i + nxu + 1]);
        }
    }
    mesh.uv_faces = mesh.faces.clone();
    mesh
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn decimation_invariants_hold(
        nx in 3usize..9,
        ny in 3usize..9,
        bump in 0.0f64..0.5,
        phase in 0.0f64..3.0,
        target_fraction in 0.2f64..1.0,
    ) {
        let mesh = grid_mesh(nx, ny, bump, phase);
        let nv = mesh.vertex_count();
        let target = ((nv as f64 * target_fraction) as usize).max(3);

        let result = decimate(&mesh, &DecimateParams {
            target_num_vertices: target,
            seam_aware_degree: SeamAwareDegree::Seamless,
            preserve_boundaries: false,
            uv_weight: 1.0,
        }).unwrap();
        let out = &result.mesh;

        // Every live corner indexes a real vertex in both tables.
        out.validate().unwrap();

        // The output vertex count is bracketed by target and input.
        prop_assert!(out.vertex_count() >= target.min(nv));
        prop_assert!(out.vertex_count() <= nv);

        // Error is non-negative and finite.
        prop_assert!(result.max_error >= 0.0);
        prop_assert!(result.max_error.is_finite());

        // Face tables stay parallel.
        prop_assert_eq!(out.faces.len(), out.uv_faces.len());
    }

    #[test]
    fn decimation_is_deterministic(
        nx in 3usize..7,
        ny in 3usize..7,
        bump in 0.0f64..0.4,
    ) {
        let mesh = grid_mesh(nx, ny, bump, 0.7);
        let params = DecimateParams {
            target_num_vertices: 4,
            seam_aware_degree: SeamAwareDegree::Seamless,
            preserve_boundaries: false,
            uv_weight: 1.0,
        };
        let a = decimate(&mesh, &params).unwrap();
        let b = decimate(&mesh, &params).unwrap();
        prop_assert_eq!(a.mesh, b.mesh);
        prop_assert_eq!(a.max_error, b.max_error);
    }
}
