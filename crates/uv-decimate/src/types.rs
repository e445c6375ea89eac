//! Core mesh data types.
//!
//! A textured mesh is a pair of coupled meshes sharing one triangle topology:
//! the position mesh (3D vertices, `faces`) and the texture mesh (2D vertices,
//! `uv_faces`). Corner `i` of `faces[f]` corresponds to corner `i` of
//! `uv_faces[f]`. Along atlas seams a single position vertex is referenced by
//! several texture vertices, which is exactly what decimation must preserve.

use crate::error::{MeshError, MeshResult};
use nalgebra::{Point2, Point3, Vector3};

/// Sentinel written into all three corners of a collapsed (tombstone) face.
pub const NULL_INDEX: u32 = u32::MAX;

/// A triangle mesh with per-corner texture coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct UvMesh {
    /// 3D vertex positions.
    pub positions: Vec<Point3<f64>>,

    /// 2D texture vertices. Several of these may map to one position vertex.
    pub texcoords: Vec<Point2<f64>>,

    /// Triangles as indices into `positions`, counter-clockwise winding.
    pub faces: Vec<[u32; 3]>,

    /// Triangles as indices into `texcoords`, parallel to `faces`.
    pub uv_faces: Vec<[u32; 3]>,
}

impl UvMesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            texcoords: Vec::new(),
            faces: Vec::new(),
            uv_faces: Vec::new(),
        }
    }

    /// Number of position vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of texture vertices.
    #[inline]
    pub fn texcoord_count(&self) -> usize {
        self.texcoords.len()
    }

    /// Number of faces (triangles).
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if mesh is empty (no vertices or faces).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.faces.is_empty()
    }

    /// Whether face `f` has been collapsed into a tombstone.
    #[inline]
    pub fn is_tombstone(&self, f: usize) -> bool {
        self.faces[f][0] == NULL_INDEX
            && self.faces[f][1] == NULL_INDEX
            && self.faces[f][2] == NULL_INDEX
    }

    /// Unnormalized face normal via the cross product of two edges.
    #[inline]
    pub fn face_normal_unnormalized(&self, f: usize) -> Vector3<f64> {
        let [i0, i1, i2] = self.faces[f];
        let p0 = self.positions[i0 as usize];
        let e1 = self.positions[i1 as usize] - p0;
        let e2 = self.positions[i2 as usize] - p0;
        e1.cross(&e2)
    }

    /// Area of face `f`.
    #[inline]
    pub fn face_area(&self, f: usize) -> f64 {
        self.face_normal_unnormalized(f).norm() * 0.5
    }

    /// Mean face area over all live faces, or `None` for an empty mesh.
    pub fn mean_face_area(&self) -> Option<f64> {
        if self.faces.is_empty() {
            return None;
        }
        let total: f64 = (0..self.faces.len())
            .filter(|&f| !self.is_tombstone(f))
            .map(|f| self.face_area(f))
            .sum();
        Some(total / self.faces.len() as f64)
    }

    /// Check index validity and shape of the two parallel face tables.
    pub fn validate(&self) -> MeshResult<()> {
        if self.faces.len() != self.uv_faces.len() {
            return Err(MeshError::InvalidTopology {
                details: format!(
                    "position faces ({}) and UV faces ({}) differ in count",
                    self.faces.len(),
                    self.uv_faces.len()
                ),
            });
        }
        if self.is_empty() {
            return Err(MeshError::EmptyMesh {
                details: "mesh has no vertices or faces".to_string(),
            });
        }
        for (f, (face, uv_face)) in self.faces.iter().zip(self.uv_faces.iter()).enumerate() {
            for i in 0..3 {
                if face[i] as usize >= self.positions.len() {
                    return Err(MeshError::InvalidVertexIndex {
                        face_index: f,
                        vertex_index: face[i],
                        vertex_count: self.positions.len(),
                    });
                }
                if uv_face[i] as usize >= self.texcoords.len() {
                    return Err(MeshError::InvalidTexcoordIndex {
                        face_index: f,
                        texcoord_index: uv_face[i],
                        texcoord_count: self.texcoords.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for UvMesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy live rows into fresh tables, dropping vertices no face references.
///
/// Returns the compacted vertex data and faces along with the old-to-new
/// index map (`NULL_INDEX` for dropped vertices).
pub fn remove_unreferenced<T: Clone>(
    data: &[T],
    faces: &[[u32; 3]],
) -> (Vec<T>, Vec<[u32; 3]>, Vec<u32>) {
    let mut remap = vec![NULL_INDEX; data.len()];
    let mut out_data = Vec::new();
    for face in faces {
        for &idx in face {
            if remap[idx as usize] == NULL_INDEX {
                remap[idx as usize] = out_data.len() as u32;
                out_data.push(data[idx as usize].clone());
            }
        }
    }
    let out_faces = faces
        .iter()
        .map(|face| [remap[face[0] as usize], remap[face[1] as usize], remap[face[2] as usize]])
        .collect();
    (out_data, out_faces, remap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangle_strip() -> UvMesh {
        UvMesh {
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
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(two_triangle_strip().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_vertex_index() {
        let mut mesh = two_triangle_strip();
        mesh.faces[1][2] = 9;
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::InvalidVertexIndex { face_index: 1, .. })
        ));
    }

    #[test]
    fn test_validate_shape_mismatch() {
        let mut mesh = two_triangle_strip();
        mesh.uv_faces.pop();
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::InvalidTopology { .. })
        ));
    }

    #[test]
    fn test_face_area() {
        let mesh = two_triangle_strip();
        assert!((mesh.face_area(0) - 0.5).abs() < 1e-12);
        assert!((mesh.mean_face_area().unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_remove_unreferenced_drops_isolated() {
        let mesh = two_triangle_strip();
        // Only reference the first triangle; vertex 3 must disappear.
        let (verts, faces, remap) = remove_unreferenced(&mesh.positions, &mesh.faces[..1]);
        assert_eq!(verts.len(), 3);
        assert_eq!(faces, vec![[0, 1, 2]]);
        assert_eq!(remap[3], NULL_INDEX);
    }
}
