//! Error types for mesh loading and decimation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Errors that can occur while loading, validating, or decimating a mesh.
#[derive(Debug, Error)]
pub enum MeshError {
    /// Error reading from a file.
    #[error("failed to read mesh from {path}: {source}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file.
    #[error("failed to write mesh to {path}: {source}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing an OBJ file.
    #[error("failed to parse mesh from {path}: {details}")]
    ParseError { path: PathBuf, details: String },

    /// The mesh has no texture coordinates, so there is no atlas to preserve.
    #[error("mesh from {path} has no texture coordinates")]
    MissingTexcoords { path: PathBuf },

    /// Empty mesh (no vertices or faces).
    #[error("mesh is empty: {details}")]
    EmptyMesh { details: String },

    /// Invalid position index in face data.
    #[error("invalid vertex index: face {face_index} references vertex {vertex_index}, but mesh only has {vertex_count} vertices")]
    InvalidVertexIndex {
        face_index: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    /// Invalid texture-coordinate index in face data.
    #[error("invalid texcoord index: face {face_index} references texcoord {texcoord_index}, but mesh only has {texcoord_count} texcoords")]
    InvalidTexcoordIndex {
        face_index: usize,
        texcoord_index: u32,
        texcoord_count: usize,
    },

    /// The position and UV face tables disagree in shape.
    #[error("invalid mesh topology: {details}")]
    InvalidTopology { details: String },
}
