//! Edge records, edge flaps, and the boundary-to-infinity augmentation.
//!
//! Edges are stored as unordered vertex pairs plus two "flap" tables: for each
//! edge the (at most two) incident faces and the corner opposite the edge in
//! each of them. `EMAP` inverts the flaps: for a face corner it yields the
//! edge opposite that corner. Edge collapse mutates these tables in place;
//! rows are tombstoned rather than removed so indices stay stable.

use hashbrown::HashMap;
use tracing::debug;

use crate::types::{NULL_INDEX, UvMesh};

/// Edge-flap tables built from a face list.
#[derive(Debug, Clone)]
pub struct EdgeFlaps {
    /// Edge endpoints, canonical `edges[e][0] < edges[e][1]`; `NULL_INDEX`
    /// pair once the edge is dead.
    pub edges: Vec<[u32; 2]>,
    /// Incident faces per edge; `NULL_INDEX` for a missing side.
    pub edge_faces: Vec<[u32; 2]>,
    /// Corner (0..3) opposite the edge within each incident face.
    pub edge_corners: Vec<[u32; 2]>,
    /// `emap[f + side * nf]` is the edge opposite corner `side` of face `f`.
    emap: Vec<u32>,
    nf: usize,
}

impl EdgeFlaps {
    /// Build edge records from a face table.
    ///
    /// A third face over the same vertex pair (non-manifold fin) opens a
    /// fresh parallel edge record rather than overflowing the flap slots.
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let nf = faces.len();
        let mut flaps = Self {
            edges: Vec::with_capacity(nf * 3 / 2),
            edge_faces: Vec::new(),
            edge_corners: Vec::new(),
            emap: vec![NULL_INDEX; nf * 3],
            nf,
        };
        let mut seen: HashMap<(u32, u32), u32> = HashMap::with_capacity(nf * 3 / 2);

        for (f, face) in faces.iter().enumerate() {
            for side in 0..3usize {
                let a = face[(side + 1) % 3];
                let b = face[(side + 2) % 3];
                let key = if a < b { (a, b) } else { (b, a) };
                let e = match seen.remove(&key) {
                    Some(e) => {
                        flaps.edge_faces[e as usize][1] = f as u32;
                        flaps.edge_corners[e as usize][1] = side as u32;
                        // Both slots taken; any further incidence starts a
                        // parallel record.
                        e
                    }
                    None => {
                        let e = flaps.edges.len() as u32;
                        flaps.edges.push([key.0, key.1]);
                        flaps.edge_faces.push([f as u32, NULL_INDEX]);
                        flaps.edge_corners.push([side as u32, NULL_INDEX]);
                        seen.insert(key, e);
                        e
                    }
                };
                flaps.emap[f + side * nf] = e;
            }
        }
        // Edges still in `seen` have one incident face: boundaries.
        flaps
    }

    /// Number of edge records (live and dead).
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edge opposite corner `side` of face `f`.
    #[inline]
    pub fn emap_at(&self, f: u32, side: u32) -> u32 {
        self.emap[f as usize + side as usize * self.nf]
    }

    #[inline]
    pub(crate) fn set_emap(&mut self, f: u32, side: u32, e: u32) {
        self.emap[f as usize + side as usize * self.nf] = e;
    }

    /// Whether edge `e` still participates in the mesh.
    #[inline]
    pub fn edge_is_live(&self, e: u32) -> bool {
        self.edges[e as usize][0] != NULL_INDEX
    }

    /// Whether edge `e` has exactly one incident face.
    #[inline]
    pub fn is_boundary_edge(&self, e: u32) -> bool {
        self.edge_faces[e as usize][1] == NULL_INDEX
    }

    /// The face on the other side of edge `e` from face `f`.
    #[inline]
    pub fn opposite_face(&self, e: u32, f: u32) -> u32 {
        let [f0, f1] = self.edge_faces[e as usize];
        if f0 == f { f1 } else { f0 }
    }

    /// Mark edge `e` dead.
    #[inline]
    pub(crate) fn kill_edge(&mut self, e: u32) {
        self.edges[e as usize] = [NULL_INDEX, NULL_INDEX];
        self.edge_faces[e as usize] = [NULL_INDEX, NULL_INDEX];
        self.edge_corners[e as usize] = [NULL_INDEX, NULL_INDEX];
    }
}

/// Faces around vertex `v` as `(face, corner_of_v)` pairs, walking the fan
/// from `f_start`. Returns `None` when the walk hits an inconsistency (dead
/// face, missing corner, or a fan longer than the face count), which callers
/// treat as "this vertex is not safely collapsible".
pub fn vertex_ring(
    faces: &[[u32; 3]],
    flaps: &EdgeFlaps,
    v: u32,
    f_start: u32,
) -> Option<Vec<(u32, u32)>> {
    let corner_of = |f: u32| -> Option<u32> {
        faces[f as usize].iter().position(|&x| x == v).map(|c| c as u32)
    };

    let mut ring = Vec::new();
    let mut f = f_start;
    let mut closed = false;
    loop {
        let c = corner_of(f)?;
        ring.push((f, c));
        if ring.len() > faces.len() {
            return None;
        }
        let e_next = flaps.emap_at(f, (c + 1) % 3);
        let f_next = flaps.opposite_face(e_next, f);
        if f_next == NULL_INDEX {
            break;
        }
        if f_next == f_start {
            closed = true;
            break;
        }
        f = f_next;
    }

    if !closed {
        // Open fan: walk the other way from the start and prepend.
        let mut back = Vec::new();
        let mut f = f_start;
        loop {
            let c = corner_of(f)?;
            let e_prev = flaps.emap_at(f, (c + 2) % 3);
            let f_prev = flaps.opposite_face(e_prev, f);
            if f_prev == NULL_INDEX || f_prev == f_start {
                break;
            }
            let c_prev = corner_of(f_prev)?;
            back.push((f_prev, c_prev));
            if back.len() + ring.len() > faces.len() {
                return None;
            }
            f = f_prev;
        }
        back.reverse();
        back.extend(ring);
        ring = back;
    }
    Some(ring)
}

/// Connect every boundary edge to a single vertex at infinity.
///
/// For each boundary edge a virtual triangle is appended with the infinity
/// vertex at corner 2, so that after augmentation every real edge has two
/// flaps and boundary vertices carry wall quadrics. Matching UV rows are
/// built from the real face across each boundary edge, referencing a single
/// texture vertex at infinity. Returns the edge flaps of the augmented mesh
/// and the infinity vertex index, if any boundary existed.
pub fn connect_boundary_to_infinity(mesh: &mut UvMesh) -> (EdgeFlaps, Option<u32>) {
    let flaps0 = EdgeFlaps::build(&mesh.faces);
    let mut boundary = Vec::new();
    for e in 0..flaps0.edge_count() as u32 {
        if flaps0.is_boundary_edge(e) {
            boundary.push(e);
        }
    }
    if boundary.is_empty() {
        return (flaps0, None);
    }

    let nf0 = mesh.faces.len();
    let inf_vertex = mesh.positions.len() as u32;
    let inf_texcoord = mesh.texcoords.len() as u32;
    mesh.positions
        .push(nalgebra::Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY));
    mesh.texcoords
        .push(nalgebra::Point2::new(f64::INFINITY, f64::INFINITY));

    for &e in &boundary {
        let f = flaps0.edge_faces[e as usize][0];
        let side = flaps0.edge_corners[e as usize][0];
        // Directed boundary edge in its one real face runs u -> v; the
        // virtual face reverses it so the shared edge is manifold.
        let u = mesh.faces[f as usize][(side as usize + 1) % 3];
        let v = mesh.faces[f as usize][(side as usize + 2) % 3];
        mesh.faces.push([v, u, inf_vertex]);
        mesh.uv_faces.push([NULL_INDEX, NULL_INDEX, NULL_INDEX]);
    }

    let flaps = EdgeFlaps::build(&mesh.faces);

    // Fill in the UV rows of the virtual faces from the real face across the
    // boundary edge: same texture vertices at the shared corners, the
    // infinity texture vertex at corner 2.
    for fi in nf0..mesh.faces.len() {
        let e = flaps.emap_at(fi as u32, 2);
        let opp = flaps.opposite_face(e, fi as u32);
        debug_assert_ne!(opp, NULL_INDEX);
        let v0 = mesh.faces[fi][0];
        let c1 = mesh.faces[opp as usize]
            .iter()
            .position(|&x| x == v0)
            .expect("boundary flap face must share the edge vertices");
        let c2 = (c1 + 2) % 3;
        mesh.uv_faces[fi] = [
            mesh.uv_faces[opp as usize][c1],
            mesh.uv_faces[opp as usize][c2],
            inf_texcoord,
        ];
    }

    debug!(
        boundary_edges = boundary.len(),
        "connected boundary to infinity"
    );
    (flaps, Some(inf_vertex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point2, Point3};

    fn strip() -> Vec<[u32; 3]> {
        vec![[0, 1, 2], [2, 1, 3]]
    }

    #[test]
    fn test_build_edge_tables() {
        let faces = strip();
        let flaps = EdgeFlaps::build(&faces);
        assert_eq!(flaps.edge_count(), 5);

        // The shared edge (1, 2) has two flaps, all others one.
        let shared = (0..5u32)
            .filter(|&e| flaps.edges[e as usize] == [1, 2])
            .collect::<Vec<_>>();
        assert_eq!(shared.len(), 1);
        let e = shared[0];
        assert!(!flaps.is_boundary_edge(e));
        assert_eq!((0..5u32).filter(|&e| flaps.is_boundary_edge(e)).count(), 4);

        // EMAP and the flap tables must agree with each other.
        for (f, face) in faces.iter().enumerate() {
            for side in 0..3u32 {
                let e = flaps.emap_at(f as u32, side);
                let slot = flaps.edge_faces[e as usize]
                    .iter()
                    .position(|&x| x == f as u32)
                    .expect("EMAP edge must list the face");
                assert_eq!(flaps.edge_corners[e as usize][slot], side);
                let a = face[(side as usize + 1) % 3];
                let b = face[(side as usize + 2) % 3];
                let key = if a < b { [a, b] } else { [b, a] };
                assert_eq!(flaps.edges[e as usize], key);
            }
        }
    }

    #[test]
    fn test_vertex_ring_tetrahedron() {
        let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        let flaps = EdgeFlaps::build(&faces);
        let ring = vertex_ring(&faces, &flaps, 3, 1).expect("closed fan");
        assert_eq!(ring.len(), 3);
        for (f, c) in ring {
            assert_eq!(faces[f as usize][c as usize], 3);
        }
    }

    #[test]
    fn test_vertex_ring_open_fan() {
        let faces = strip();
        let flaps = EdgeFlaps::build(&faces);
        let ring = vertex_ring(&faces, &flaps, 1, 0).expect("open fan");
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_connect_boundary_to_infinity() {
        let mut mesh = UvMesh {
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
        let (flaps, inf) = connect_boundary_to_infinity(&mut mesh);
        let inf = inf.expect("strip has a boundary");
        assert_eq!(inf, 4);
        assert_eq!(mesh.faces.len(), 6);
        assert_eq!(mesh.uv_faces.len(), 6);

        for fi in 2..6 {
            // Infinity vertex sits at corner 2, with the matching UV row
            // borrowed from the real face across the edge.
            assert_eq!(mesh.faces[fi][2], inf);
            assert_eq!(mesh.uv_faces[fi][2], 4);
            let opp_uvs = [
                mesh.uv_faces[fi][0],
                mesh.uv_faces[fi][1],
            ];
            for uv in opp_uvs {
                assert!(uv < 4, "virtual face must reference real texcoords");
            }
        }
        // After augmentation there are no boundary edges left.
        for e in 0..flaps.edge_count() as u32 {
            assert!(!flaps.is_boundary_edge(e), "edge {e} still boundary");
        }
    }
}
