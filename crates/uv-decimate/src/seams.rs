//! Seam, boundary, and foldover classification.
//!
//! A seam edge is one whose two incident face-corners reference different
//! texture vertices for the same position endpoints; a boundary edge has a
//! single incident face; a foldover is a repeated or reversed incidence
//! (non-manifold or orientation-flipping). The decimation driver flattens all
//! three into one set of unordered position-vertex pairs: membership alone
//! decides how the cost oracle treats a candidate collapse.

use hashbrown::{HashMap, HashSet};
use tracing::debug;

use crate::types::UvMesh;

/// Raw classification output, as (face, corner) incidences.
///
/// A row `[fa, ca, fb, cb]` describes the edge running from corner `ca` to
/// corner `(ca + 1) % 3` of face `fa`, matched with the opposite traversal in
/// face `fb`; boundary rows carry their single `(face, corner)`.
#[derive(Debug, Default)]
pub struct SeamTables {
    pub seams: Vec<[u32; 4]>,
    pub boundaries: Vec<[u32; 2]>,
    pub foldovers: Vec<[u32; 4]>,
}

/// Classify every edge of the mesh into seams, boundaries, and foldovers.
pub fn seam_edges(mesh: &UvMesh) -> SeamTables {
    // Directed half-edge -> (face, start corner) incidences.
    let mut directed: HashMap<(u32, u32), Vec<(u32, u32)>> = HashMap::new();
    for (f, face) in mesh.faces.iter().enumerate() {
        for k in 0..3usize {
            let u = face[k];
            let v = face[(k + 1) % 3];
            directed
                .entry((u, v))
                .or_default()
                .push((f as u32, k as u32));
        }
    }

    let mut tables = SeamTables::default();
    let mut visited: HashSet<(u32, u32)> = HashSet::new();

    // Iterate in face order so the output rows are deterministic.
    for (f, face) in mesh.faces.iter().enumerate() {
        for k in 0..3usize {
            let u = face[k];
            let v = face[(k + 1) % 3];
            let key = if u < v { (u, v) } else { (v, u) };
            if !visited.insert(key) {
                continue;
            }
            let fwd = directed.get(&(u, v)).map_or(&[][..], |l| l.as_slice());
            let bwd = directed.get(&(v, u)).map_or(&[][..], |l| l.as_slice());

            match (fwd.len(), bwd.len()) {
                (1, 0) => tables.boundaries.push([fwd[0].0, fwd[0].1]),
                (0, 1) => tables.boundaries.push([bwd[0].0, bwd[0].1]),
                (1, 1) => {
                    let (fa, ca) = fwd[0];
                    let (fb, cb) = bwd[0];
                    let uv_a = &mesh.uv_faces[fa as usize];
                    let uv_b = &mesh.uv_faces[fb as usize];
                    let matches = uv_a[ca as usize] == uv_b[(cb as usize + 1) % 3]
                        && uv_a[(ca as usize + 1) % 3] == uv_b[cb as usize];
                    if !matches {
                        tables.seams.push([fa, ca, fb, cb]);
                    }
                }
                _ => {
                    // Same-direction duplicates or >2 incidences: foldovers.
                    let all: Vec<(u32, u32)> = fwd.iter().chain(bwd.iter()).copied().collect();
                    for pair in all.windows(2) {
                        tables
                            .foldovers
                            .push([pair[0].0, pair[0].1, pair[1].0, pair[1].1]);
                    }
                }
            }
        }
    }

    debug!(
        seams = tables.seams.len(),
        boundaries = tables.boundaries.len(),
        foldovers = tables.foldovers.len(),
        "classified edges"
    );
    tables
}

/// Flat set of unordered position-vertex pairs marked as seam edges, with the
/// vertex adjacency needed to answer seam-degree queries.
#[derive(Debug, Default, Clone)]
pub struct SeamSet {
    adj: HashMap<u32, HashSet<u32>>,
    edges: usize,
}

impl SeamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the unordered edge {u, v}. Returns true if it was new.
    pub fn insert(&mut self, u: u32, v: u32) -> bool {
        let new = self.adj.entry(u).or_default().insert(v);
        self.adj.entry(v).or_default().insert(u);
        if new {
            self.edges += 1;
        }
        new
    }

    /// Remove the unordered edge {u, v}. Returns true if it was present.
    pub fn remove(&mut self, u: u32, v: u32) -> bool {
        let had = self.adj.get_mut(&u).is_some_and(|s| s.remove(&v));
        if let Some(s) = self.adj.get_mut(&v) {
            s.remove(&u);
        }
        if had {
            self.edges -= 1;
        }
        had
    }

    /// Whether the unordered edge {u, v} is in the set.
    pub fn contains(&self, u: u32, v: u32) -> bool {
        self.adj.get(&u).is_some_and(|s| s.contains(&v))
    }

    /// Whether `v` is an endpoint of any seam edge.
    pub fn is_seam_vertex(&self, v: u32) -> bool {
        self.adj.get(&v).is_some_and(|s| !s.is_empty())
    }

    /// Number of seam edges incident to `v`.
    pub fn seam_degree(&self, v: u32) -> usize {
        self.adj.get(&v).map_or(0, |s| s.len())
    }

    /// For a vertex of seam degree 2, the seam neighbor that is not `other`.
    pub fn other_neighbor(&self, v: u32, other: u32) -> Option<u32> {
        let s = self.adj.get(&v)?;
        if s.len() != 2 || !s.contains(&other) {
            return None;
        }
        s.iter().copied().find(|&w| w != other)
    }

    /// Rewire every seam edge of `from` onto `to`, preserving the seam
    /// topology through a collapse. The edge {from, to} itself, if present,
    /// is dropped rather than becoming a self-loop.
    pub fn move_vertex(&mut self, from: u32, to: u32) {
        let Some(neighbors) = self.adj.get(&from) else {
            return;
        };
        let mut neighbors: Vec<u32> = neighbors.iter().copied().collect();
        neighbors.sort_unstable();
        for w in neighbors {
            self.remove(from, w);
            if w != to {
                self.insert(to, w);
            }
        }
    }

    /// Number of seam edges in the set.
    pub fn edge_count(&self) -> usize {
        self.edges
    }
}

/// Flatten classifier output into the seam set the oracle consumes.
pub fn collect_seam_set(mesh: &UvMesh, tables: &SeamTables) -> SeamSet {
    let mut set = SeamSet::new();
    let mut push = |set: &mut SeamSet, f: u32, c: u32| {
        let v1 = mesh.faces[f as usize][c as usize];
        let v2 = mesh.faces[f as usize][(c as usize + 1) % 3];
        set.insert(v1, v2);
    };
    for row in &tables.seams {
        push(&mut set, row[0], row[1]);
    }
    for row in &tables.boundaries {
        push(&mut set, row[0], row[1]);
    }
    for row in &tables.foldovers {
        push(&mut set, row[0], row[1]);
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point2, Point3};

    fn seam_quad() -> UvMesh {
        UvMesh {
            positions: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            texcoords: vec![
                Point2::new(0.0, 0.0),
                Point2::new(0.5, 0.0),
                Point2::new(0.0, 0.5),
                Point2::new(0.6, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(0.6, 0.5),
            ],
            faces: vec![[0, 1, 2], [2, 1, 3]],
            uv_faces: vec![[0, 1, 2], [3, 4, 5]],
        }
    }

    #[test]
    fn test_classifies_seam_and_boundaries() {
        let mesh = seam_quad();
        let tables = seam_edges(&mesh);
        assert_eq!(tables.seams.len(), 1);
        assert_eq!(tables.boundaries.len(), 4);
        assert!(tables.foldovers.is_empty());

        // The seam is the shared diagonal {1, 2}.
        let [fa, ca, _, _] = tables.seams[0];
        let v1 = mesh.faces[fa as usize][ca as usize];
        let v2 = mesh.faces[fa as usize][(ca as usize + 1) % 3];
        let mut pair = [v1, v2];
        pair.sort_unstable();
        assert_eq!(pair, [1, 2]);
    }

    #[test]
    fn test_shared_chart_diagonal_is_not_seam() {
        let mut mesh = seam_quad();
        // One chart for both triangles: no seam left, only boundary.
        mesh.texcoords = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 1.0),
        ];
        mesh.uv_faces = vec![[0, 1, 2], [2, 1, 3]];
        let tables = seam_edges(&mesh);
        assert!(tables.seams.is_empty());
        assert_eq!(tables.boundaries.len(), 4);
    }

    #[test]
    fn test_same_orientation_incidence_is_foldover() {
        let mut mesh = seam_quad();
        // Duplicate the first face verbatim: its edges now traverse the same
        // direction twice.
        mesh.faces.push(mesh.faces[0]);
        mesh.uv_faces.push(mesh.uv_faces[0]);
        let tables = seam_edges(&mesh);
        assert!(!tables.foldovers.is_empty());
    }

    #[test]
    fn test_seam_set_ops() {
        let mesh = seam_quad();
        let set = collect_seam_set(&mesh, &seam_edges(&mesh));
        // 1 seam + 4 boundary edges.
        assert_eq!(set.edge_count(), 5);
        assert!(set.contains(1, 2));
        assert!(set.contains(2, 1));
        assert!(set.is_seam_vertex(0));
        assert_eq!(set.seam_degree(1), 3);

        let mut set = set;
        set.remove(1, 2);
        assert!(!set.contains(1, 2));
        assert_eq!(set.edge_count(), 4);
    }

    #[test]
    fn test_move_vertex_preserves_topology() {
        let mut set = SeamSet::new();
        set.insert(0, 1);
        set.insert(1, 2);
        // Collapse 1 into 2: {0,1} becomes {0,2}; {1,2} disappears.
        set.move_vertex(1, 2);
        assert!(set.contains(0, 2));
        assert!(!set.is_seam_vertex(1));
        assert_eq!(set.edge_count(), 1);
        assert_eq!(set.other_neighbor(2, 99), None);
    }
}
