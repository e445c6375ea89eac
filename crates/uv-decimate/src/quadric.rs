//! Per-(position, texture) vertex quadrics over the 5D space (x, y, z, u, v).
//!
//! Each quadric is a symmetric 6x6 matrix Q such that `x^T Q x`, with
//! `x = (p, uv, 1)`, approximates the squared distance from the 5D point to
//! the planes of the faces accumulated into it. Because one position vertex
//! can carry several texture vertices at a seam, the store is keyed by the
//! (position index, texcoord index) pair.
//!
//! Per face three area-weighted planes are accumulated: the geometric plane
//! of the triangle and one gradient plane per UV channel, the latter encoding
//! the linear interpolation of that channel over the triangle so that
//! collapses which distort the parameterization pay for it. Positions are
//! pre-scaled by `pos_scale` and UVs by `uv_weight` inside this computation;
//! the stored mesh tables stay in the input's coordinate system.

use hashbrown::HashMap;
use nalgebra::{Matrix3, Matrix6, Point2, Point3, Vector2, Vector3, Vector6};

use crate::adjacency::EdgeFlaps;
use crate::types::{NULL_INDEX, UvMesh};

/// Determinant threshold below which a linear system counts as singular.
pub const SINGULAR_TOLERANCE: f64 = 1e-10;

/// Two-level map: position vertex -> texture vertex -> accumulated quadric.
#[derive(Debug, Default)]
pub struct QuadricStore {
    q: HashMap<u32, HashMap<u32, Matrix6<f64>>>,
}

impl QuadricStore {
    pub fn new() -> Self {
        Self { q: HashMap::new() }
    }

    /// The quadric for a (position, texcoord) pair; zero if never touched.
    pub fn get(&self, v: u32, t: u32) -> Matrix6<f64> {
        self.q
            .get(&v)
            .and_then(|m| m.get(&t))
            .copied()
            .unwrap_or_else(Matrix6::zeros)
    }

    /// Accumulate `m` into the quadric of `(v, t)`.
    pub fn add(&mut self, v: u32, t: u32, m: &Matrix6<f64>) {
        let entry = self
            .q
            .entry(v)
            .or_default()
            .entry(t)
            .or_insert_with(Matrix6::zeros);
        *entry += m;
    }

    /// Fold vertex `from` into `to` after a collapse.
    ///
    /// For each `(from_uv, to_uv)` pair in `uv_merges` the source quadric is
    /// added to the destination's. Any remaining texture vertices of `from`
    /// (charts untouched by the collapse) migrate to `to` keeping their own
    /// texcoord key, since their faces now reference `to`.
    pub fn merge_vertex(&mut self, from: u32, to: u32, uv_merges: &[(u32, u32)]) {
        let Some(src) = self.q.remove(&from) else {
            return;
        };
        // Sort for a deterministic accumulation order.
        let mut entries: Vec<(u32, Matrix6<f64>)> = src.into_iter().collect();
        entries.sort_unstable_by_key(|(t, _)| *t);
        for (t, m) in entries {
            let dest_t = uv_merges
                .iter()
                .find(|(from_uv, _)| *from_uv == t)
                .map(|(_, to_uv)| *to_uv)
                .unwrap_or(t);
            self.add(to, dest_t, &m);
        }
    }
}

/// Evaluate `x^T Q x` at `x = (p, uv, 1)`.
pub fn evaluate(q: &Matrix6<f64>, p: &Vector3<f64>, uv: &Vector2<f64>) -> f64 {
    let x = Vector6::new(p.x, p.y, p.z, uv.x, uv.y, 1.0);
    (x.transpose() * q * x)[(0, 0)]
}

/// Rank-1 plane quadric: `plane * plane^T`.
#[inline]
fn plane_quadric(plane: &Vector6<f64>) -> Matrix6<f64> {
    plane * plane.transpose()
}

fn scaled_position(p: &Point3<f64>, pos_scale: f64) -> Vector3<f64> {
    p.coords * pos_scale
}

fn scaled_texcoord(t: &Point2<f64>, uv_weight: f64) -> Vector2<f64> {
    t.coords * uv_weight
}

/// Build the initial quadric store from every face of the augmented mesh.
///
/// Real faces contribute their geometric and UV-gradient planes to all three
/// corners. Virtual infinity faces contribute a wall plane, perpendicular to
/// the real face across the boundary edge and weighted by its area, to the
/// two real corners; the infinity pair itself keeps a zero quadric.
pub fn build_store(
    mesh: &UvMesh,
    flaps: &EdgeFlaps,
    infinity_vertex: Option<u32>,
    pos_scale: f64,
    uv_weight: f64,
) -> QuadricStore {
    let mut store = QuadricStore::new();

    for f in 0..mesh.faces.len() {
        let face = mesh.faces[f];
        let uv_face = mesh.uv_faces[f];
        if face[0] == NULL_INDEX {
            continue;
        }
        let is_virtual = infinity_vertex.is_some_and(|inf| face.contains(&inf));
        if is_virtual {
            add_wall_plane(&mut store, mesh, flaps, f as u32, pos_scale);
            continue;
        }

        let p = [
            scaled_position(&mesh.positions[face[0] as usize], pos_scale),
            scaled_position(&mesh.positions[face[1] as usize], pos_scale),
            scaled_position(&mesh.positions[face[2] as usize], pos_scale),
        ];
        let t = [
            scaled_texcoord(&mesh.texcoords[uv_face[0] as usize], uv_weight),
            scaled_texcoord(&mesh.texcoords[uv_face[1] as usize], uv_weight),
            scaled_texcoord(&mesh.texcoords[uv_face[2] as usize], uv_weight),
        ];

        let cross = (p[1] - p[0]).cross(&(p[2] - p[0]));
        let double_area = cross.norm();
        if double_area < 1e-12 {
            continue;
        }
        let area = 0.5 * double_area;
        let n = cross / double_area;

        let geo = Vector6::new(n.x, n.y, n.z, 0.0, 0.0, -n.dot(&p[0]));
        let mut q_face = plane_quadric(&geo);

        // Gradient planes: for each channel s, the linear function
        // s(x) = g . x + d interpolating the corner values, constrained to
        // have no component along the face normal.
        let m = Matrix3::from_rows(&[
            (p[1] - p[0]).transpose(),
            (p[2] - p[0]).transpose(),
            n.transpose(),
        ]);
        if let Some(m_inv) = invert_checked(&m) {
            for channel in 0..2 {
                let rhs = Vector3::new(
                    t[1][channel] - t[0][channel],
                    t[2][channel] - t[0][channel],
                    0.0,
                );
                let g = m_inv * rhs;
                let d = t[0][channel] - g.dot(&p[0]);
                let mut plane = Vector6::new(g.x, g.y, g.z, 0.0, 0.0, d);
                plane[3 + channel] = -1.0;
                q_face += plane_quadric(&plane);
            }
        }

        q_face *= area;
        for i in 0..3 {
            store.add(face[i], uv_face[i], &q_face);
        }
    }

    if let Some(inf) = infinity_vertex {
        // A zero quadric for the infinity pair, so lookups stay total. The
        // infinity texcoord is the last one by construction.
        let inf_uv = mesh.texcoords.len() as u32 - 1;
        store.add(inf, inf_uv, &Matrix6::zeros());
    }

    store
}

/// Wall plane of a virtual boundary face: contains the boundary edge, is
/// perpendicular to the adjacent real face, and is weighted by its area.
fn add_wall_plane(
    store: &mut QuadricStore,
    mesh: &UvMesh,
    flaps: &EdgeFlaps,
    f: u32,
    pos_scale: f64,
) {
    // Virtual faces carry the infinity vertex at corner 2 by construction.
    let e = flaps.emap_at(f, 2);
    let opp = flaps.opposite_face(e, f);
    if opp == NULL_INDEX {
        return;
    }
    let face = mesh.faces[f as usize];
    let a = scaled_position(&mesh.positions[face[0] as usize], pos_scale);
    let b = scaled_position(&mesh.positions[face[1] as usize], pos_scale);

    let opp_face = mesh.faces[opp as usize];
    let p0 = scaled_position(&mesh.positions[opp_face[0] as usize], pos_scale);
    let p1 = scaled_position(&mesh.positions[opp_face[1] as usize], pos_scale);
    let p2 = scaled_position(&mesh.positions[opp_face[2] as usize], pos_scale);
    let opp_cross = (p1 - p0).cross(&(p2 - p0));
    let opp_double_area = opp_cross.norm();
    if opp_double_area < 1e-12 {
        return;
    }

    let wall = (b - a).cross(&(opp_cross / opp_double_area));
    let wall_norm = wall.norm();
    if wall_norm < 1e-12 {
        return;
    }
    let w = wall / wall_norm;
    let plane = Vector6::new(w.x, w.y, w.z, 0.0, 0.0, -w.dot(&a));
    let q = plane_quadric(&plane) * (0.5 * opp_double_area);

    let uv_face = mesh.uv_faces[f as usize];
    store.add(face[0], uv_face[0], &q);
    store.add(face[1], uv_face[1], &q);
}

/// Invert a 3x3 matrix, returning `None` when the determinant is below the
/// singularity tolerance.
pub fn invert_checked(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    if m.determinant().abs() < SINGULAR_TOLERANCE {
        return None;
    }
    m.try_inverse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometric_plane_zero_on_plane() {
        // Quadric of the z = 0 plane.
        let plane = Vector6::new(0.0, 0.0, 1.0, 0.0, 0.0, 0.0);
        let q = plane_quadric(&plane);
        let uv = Vector2::zeros();
        assert!(evaluate(&q, &Vector3::new(1.0, 2.0, 0.0), &uv).abs() < 1e-12);
        assert!((evaluate(&q, &Vector3::new(0.0, 0.0, 2.0), &uv) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_optimal_between_parallel_planes() {
        // Sum of quadrics of z = 0 and z = 2; minimum along z is at z = 1.
        let q0 = plane_quadric(&Vector6::new(0.0, 0.0, 1.0, 0.0, 0.0, 0.0));
        let q1 = plane_quadric(&Vector6::new(0.0, 0.0, 1.0, 0.0, 0.0, -2.0));
        let q = q0 + q1;
        let uv = Vector2::zeros();
        let at = |z: f64| evaluate(&q, &Vector3::new(0.0, 0.0, z), &uv);
        assert!(at(1.0) < at(0.9));
        assert!(at(1.0) < at(1.1));
        assert!((at(1.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_store_build_flat_square_zero_cost_on_surface() {
        use nalgebra::{Point2, Point3};
        // A flat unit square with an affine UV map: any point on the surface
        // with its interpolated UV must have (near) zero quadric error.
        let mesh = UvMesh {
            positions: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            texcoords: vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(0.0, 1.0),
                Point2::new(1.0, 1.0),
            ],
            faces: vec![[0, 1, 2], [2, 1, 3]],
            uv_faces: vec![[0, 1, 2], [2, 1, 3]],
        };
        let flaps = EdgeFlaps::build(&mesh.faces);
        let store = build_store(&mesh, &flaps, None, 1.0, 1.0);

        for v in 0..4u32 {
            let q = store.get(v, v);
            let p = mesh.positions[v as usize].coords;
            let uv = mesh.texcoords[v as usize].coords;
            assert!(
                evaluate(&q, &p, &uv).abs() < 1e-10,
                "vertex {v} off its own quadric"
            );
            // Lifting the vertex off the plane must cost.
            let lifted = Vector3::new(p.x, p.y, 1.0);
            assert!(evaluate(&q, &lifted, &uv) > 0.1);
            // Distorting the UV must cost too.
            let skewed = Vector2::new(uv.x + 1.0, uv.y);
            assert!(evaluate(&q, &p, &skewed) > 0.1);
        }
    }

    #[test]
    fn test_merge_vertex_sums_and_migrates() {
        let mut store = QuadricStore::new();
        let m1 = Matrix6::identity();
        let m2 = Matrix6::identity() * 2.0;
        store.add(0, 10, &m1);
        store.add(0, 11, &m2);
        store.add(5, 20, &m1);

        store.merge_vertex(0, 5, &[(10, 20)]);
        // 10 merged into 20, 11 migrated under vertex 5 unchanged.
        assert_eq!(store.get(5, 20), m1 * 2.0);
        assert_eq!(store.get(5, 11), m2);
        assert_eq!(store.get(0, 10), Matrix6::zeros());
    }
}
