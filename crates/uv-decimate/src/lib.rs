//! Seam-aware decimation of textured triangle meshes.
//!
//! This crate reduces the vertex count of a mesh carrying a UV atlas while
//! keeping the parameterization intact across seams, boundaries, and
//! foldovers. A textured surface is really two coupled meshes sharing one
//! triangle topology: positions in 3-space and texture vertices in 2-space.
//! Along atlas cuts a single position vertex owns several texture vertices,
//! so a naive edge collapse tears the atlas or drifts the UVs. Decimation
//! here runs a greedy half-edge collapse guided by a 5D (position + UV)
//! quadric error metric, classifying every candidate against the seam set
//! and rejecting those that would break the atlas or flip triangles.
//!
//! # Quick Start
//!
//! ```no_run
//! use uv_decimate::{DecimateParams, UvMesh, decimate};
//!
//! let mesh = UvMesh::load("model.obj").unwrap();
//! let result = decimate(&mesh, &DecimateParams::with_target(1000)).unwrap();
//! println!(
//!     "{} -> {} vertices, max error {:.6}",
//!     mesh.vertex_count(),
//!     result.mesh.vertex_count(),
//!     result.max_error
//! );
//! result.mesh.save("model-decimated.obj").unwrap();
//! ```
//!
//! # Seam awareness
//!
//! [`SeamAwareDegree`] controls how strictly the atlas constrains the
//! collapse sequence:
//!
//! - `Seamless` (default): seams may only lose vertices where both charts
//!   agree the vertex is redundant; the cross-seam correspondence survives
//!   exactly.
//! - `UvShapePreserving`: seams keep their UV shape, but the two sides may
//!   drift apart parametrically.
//! - `NoUvShapePreserving`: the atlas does not constrain collapses at all
//!   and may tear; only topology and triangle orientation are protected.
//!
//! # Determinism
//!
//! Two runs over the same input and configuration produce identical output:
//! queue ties break by edge index and every iteration order that feeds
//! floating-point accumulation is fixed.
//!
//! # Error Handling
//!
//! Operations return [`MeshResult`], which is `Result<T, MeshError>`.
//! Decimation itself reports an unreachable target through
//! [`DecimateResult::reached_target`] rather than an error, matching the
//! "warn but still write output" contract of the CLI.

mod error;
mod types;

pub mod adjacency;
pub mod collapse;
pub mod decimate;
pub mod io;
pub mod placement;
pub mod quadric;
pub mod queue;
pub mod seams;
pub mod tracing_ext;

pub use decimate::{DecimateParams, DecimateResult, decimate};
pub use error::{MeshError, MeshResult};
pub use io::{load_obj, save_obj};
pub use placement::{Placement, SeamAwareDegree, UvMerge};
pub use seams::{SeamSet, SeamTables, seam_edges};
pub use types::{NULL_INDEX, UvMesh};

impl UvMesh {
    /// Load a textured mesh from an OBJ file.
    pub fn load(path: impl AsRef<std::path::Path>) -> MeshResult<Self> {
        io::load_obj(path.as_ref())
    }

    /// Save the mesh to an OBJ file.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> MeshResult<()> {
        io::save_obj(self, path.as_ref())
    }

    /// Decimate down to `target_num_vertices` with default parameters.
    pub fn decimate_to_count(&self, target_num_vertices: usize) -> MeshResult<DecimateResult> {
        decimate::decimate(self, &DecimateParams::with_target(target_num_vertices))
    }
}
