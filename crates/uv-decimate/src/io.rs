//! OBJ loading and saving.
//!
//! Decimation needs position indices and texture-coordinate indices kept
//! separate (`f v/vt` with `v != vt`), so loading never collapses them into a
//! single index buffer. The writer emits plain ASCII `v`, `vt`, and `f v/vt`
//! records; normals are not carried through decimation and are not written.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{MeshError, MeshResult};
use crate::types::UvMesh;
use nalgebra::{Point2, Point3};

/// Load a textured mesh from an OBJ file.
///
/// Faces are triangulated on load. A mesh without texture coordinates (or
/// without `vt` indices on its faces) is rejected, since there is no atlas to
/// preserve.
pub fn load_obj(path: &Path) -> MeshResult<UvMesh> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: false,
            ..Default::default()
        },
    )
    .map_err(|e| MeshError::ParseError {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;

    if models.is_empty() {
        return Err(MeshError::EmptyMesh {
            details: "OBJ file contains no models".to_string(),
        });
    }

    // Merge all models into a single mesh, offsetting indices per model.
    let mut mesh = UvMesh::new();
    for model in &models {
        debug!("OBJ model '{}': loading", model.name);
        let m = &model.mesh;

        let vertex_offset = mesh.positions.len() as u32;
        let texcoord_offset = mesh.texcoords.len() as u32;

        for chunk in m.positions.chunks(3) {
            if chunk.len() == 3 {
                mesh.positions
                    .push(Point3::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64));
            }
        }
        for chunk in m.texcoords.chunks(2) {
            if chunk.len() == 2 {
                mesh.texcoords
                    .push(Point2::new(chunk[0] as f64, chunk[1] as f64));
            }
        }

        if m.texcoord_indices.len() != m.indices.len() {
            return Err(MeshError::MissingTexcoords {
                path: path.to_path_buf(),
            });
        }

        for (chunk, uv_chunk) in m.indices.chunks(3).zip(m.texcoord_indices.chunks(3)) {
            if chunk.len() == 3 {
                mesh.faces.push([
                    chunk[0] + vertex_offset,
                    chunk[1] + vertex_offset,
                    chunk[2] + vertex_offset,
                ]);
                mesh.uv_faces.push([
                    uv_chunk[0] + texcoord_offset,
                    uv_chunk[1] + texcoord_offset,
                    uv_chunk[2] + texcoord_offset,
                ]);
            }
        }
    }

    if mesh.texcoords.is_empty() {
        return Err(MeshError::MissingTexcoords {
            path: path.to_path_buf(),
        });
    }
    mesh.validate()?;

    debug!(
        vertices = mesh.vertex_count(),
        texcoords = mesh.texcoord_count(),
        faces = mesh.face_count(),
        "OBJ loaded"
    );
    Ok(mesh)
}

/// Save a textured mesh to an OBJ file.
///
/// Vertex order and the `f v/vt` index pairing are preserved exactly, which
/// is what keeps the atlas intact across a save/load cycle.
pub fn save_obj(mesh: &UvMesh, path: &Path) -> MeshResult<()> {
    info!("Saving mesh to {:?} (OBJ format)", path);

    let file = File::create(path).map_err(|e| MeshError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);
    write_obj(mesh, &mut writer).map_err(|e| MeshError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_obj(mesh: &UvMesh, writer: &mut impl Write) -> std::io::Result<()> {
    writeln!(writer, "# OBJ file exported by uv-decimate")?;
    writeln!(writer, "# Vertices: {}", mesh.positions.len())?;
    writeln!(writer, "# Texture vertices: {}", mesh.texcoords.len())?;
    writeln!(writer, "# Faces: {}", mesh.faces.len())?;
    writeln!(writer)?;

    for p in &mesh.positions {
        writeln!(writer, "v {:.6} {:.6} {:.6}", p.x, p.y, p.z)?;
    }
    for t in &mesh.texcoords {
        writeln!(writer, "vt {:.6} {:.6}", t.x, t.y)?;
    }
    for (face, uv_face) in mesh.faces.iter().zip(mesh.uv_faces.iter()) {
        // OBJ indices are 1-based.
        writeln!(
            writer,
            "f {}/{} {}/{} {}/{}",
            face[0] + 1,
            uv_face[0] + 1,
            face[1] + 1,
            uv_face[1] + 1,
            face[2] + 1,
            uv_face[2] + 1,
        )?;
    }
    writer.flush()
}
