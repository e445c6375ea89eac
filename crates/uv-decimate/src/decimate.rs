//! Seam-aware mesh decimation driver.
//!
//! Prepares the working tables (boundary-to-infinity augmentation, seam set,
//! quadric store, seeded priority queue), then repeatedly collapses the
//! cheapest legal half-edge until the target vertex count is reached or no
//! finite-cost edge remains, and finally compacts tombstoned faces and
//! unreferenced vertices into a clean output mesh.

use hashbrown::HashSet;
use tracing::{debug, info, warn};

use crate::adjacency::{EdgeFlaps, connect_boundary_to_infinity};
use crate::collapse::collapse_edge;
use crate::error::MeshResult;
use crate::placement::{
    OracleConfig, OracleCtx, Placement, SeamAwareDegree, cost_and_placement,
};
use crate::quadric::build_store;
use crate::queue::CostQueue;
use crate::seams::{collect_seam_set, seam_edges};
use crate::tracing_ext::OperationTimer;
use crate::types::{UvMesh, remove_unreferenced};

/// Faces are rescaled so their mean area hits this value before quadric
/// construction, putting position and UV error on comparable footing.
const TARGET_AVG_AREA: f64 = 1.0;

/// Slack allowed between a queued cost and its re-evaluation before the
/// entry is considered stale and re-keyed.
const COST_TOLERANCE: f64 = 1e-10;

/// Parameters for seam-aware decimation.
#[derive(Debug, Clone)]
pub struct DecimateParams {
    /// Number of vertices to decimate down to. The output never has fewer
    /// vertices than this, and may have more when no legal collapse remains.
    pub target_num_vertices: usize,
    /// How strictly the UV atlas constrains collapses. Default: `Seamless`.
    pub seam_aware_degree: SeamAwareDegree,
    /// Treat every boundary edge as an unmovable seam, keeping all input
    /// boundary vertices in the output. Default: false.
    pub preserve_boundaries: bool,
    /// Relative weight of UV error against position error. Default: 1.0.
    pub uv_weight: f64,
}

impl DecimateParams {
    /// Create params targeting a specific vertex count.
    pub fn with_target(target_num_vertices: usize) -> Self {
        Self {
            target_num_vertices,
            seam_aware_degree: SeamAwareDegree::Seamless,
            preserve_boundaries: false,
            uv_weight: 1.0,
        }
    }
}

/// Result of a decimation run.
#[derive(Debug)]
pub struct DecimateResult {
    /// The decimated mesh, compacted and with unreferenced vertices removed.
    pub mesh: UvMesh,
    /// Whether the target vertex count was reached. When false, every
    /// remaining edge had infinite cost before the target was met.
    pub reached_target: bool,
    /// Number of half-edge collapses performed.
    pub collapses_performed: usize,
    /// Largest per-collapse geometric error, in input coordinates.
    pub max_error: f64,
}

/// Decimate `input` down to `params.target_num_vertices` vertices while
/// preserving the UV parameterization.
///
/// A target at or above the input vertex count is a no-op returning a copy
/// of the input. The run is fully deterministic: identical input and
/// parameters produce an identical output mesh.
pub fn decimate(input: &UvMesh, params: &DecimateParams) -> MeshResult<DecimateResult> {
    input.validate()?;
    let nv_in = input.vertex_count();
    if params.target_num_vertices >= nv_in {
        return Ok(DecimateResult {
            mesh: input.clone(),
            reached_target: true,
            collapses_performed: 0,
            max_error: 0.0,
        });
    }

    let _timer = OperationTimer::with_context("decimate", input.face_count(), nv_in);

    let mean_area = input.mean_face_area().unwrap_or(0.0);
    let pos_scale = if mean_area > 1e-12 {
        (TARGET_AVG_AREA / mean_area).sqrt()
    } else {
        1.0
    };

    // One flat seam set out of the classifier's three tables.
    let tables = seam_edges(input);
    let mut seams = collect_seam_set(input, &tables);
    info!(
        seam_rows = tables.seams.len(),
        boundary_rows = tables.boundaries.len(),
        foldover_rows = tables.foldovers.len(),
        seam_edges = seams.edge_count(),
        "seam classification"
    );

    let mut pinned_vertices = HashSet::new();
    if params.preserve_boundaries {
        let flaps0 = EdgeFlaps::build(&input.faces);
        let mut added = 0usize;
        for e in 0..flaps0.edge_count() as u32 {
            if flaps0.is_boundary_edge(e) {
                let [a, b] = flaps0.edges[e as usize];
                seams.insert(a, b);
                pinned_vertices.insert(a);
                pinned_vertices.insert(b);
                added += 1;
            }
        }
        info!(
            boundary_edges = added,
            seam_edges = seams.edge_count(),
            "boundaries preserved as seams"
        );
    }

    // Working copies; the boundary is walled off by virtual triangles to a
    // vertex at infinity, which also counts toward the working target.
    let mut mesh = input.clone();
    let (mut flaps, infinity_vertex) = connect_boundary_to_infinity(&mut mesh);
    let mut target = params.target_num_vertices;
    if infinity_vertex.is_some() {
        target += 1;
    }

    let cfg = OracleConfig {
        degree: params.seam_aware_degree,
        pinned_vertices,
        infinity_vertex,
        pos_scale,
        uv_weight: params.uv_weight,
    };
    let mut store = build_store(&mesh, &flaps, infinity_vertex, pos_scale, params.uv_weight);

    let mut queue = CostQueue::new(flaps.edge_count());
    let mut placements: Vec<Option<Placement>> = vec![None; flaps.edge_count()];
    {
        let ctx = OracleCtx {
            mesh: &mesh,
            flaps: &flaps,
            seams: &seams,
            store: &store,
            cfg: &cfg,
        };
        for e in 0..flaps.edge_count() as u32 {
            let (cost, pl) = cost_and_placement(&ctx, e);
            queue.insert(e, cost);
            placements[e as usize] = pl;
        }
    }
    debug!(edges = queue.len(), target, "queue seeded");

    let mut remaining = mesh.vertex_count();
    let mut collapses = 0usize;
    let mut max_error = 0.0f64;
    let mut prev_popped: Option<u32> = None;

    while remaining > target {
        let Some((queued_cost, e)) = queue.peek() else {
            break;
        };
        if queued_cost.is_infinite() {
            // Every remaining collapse is forbidden.
            break;
        }

        // Lazy re-check: topology around e may have drifted since queueing.
        let (cost, pl) = {
            let ctx = OracleCtx {
                mesh: &mesh,
                flaps: &flaps,
                seams: &seams,
                store: &store,
                cfg: &cfg,
            };
            cost_and_placement(&ctx, e)
        };

        if pl.is_none() {
            assert!(
                prev_popped != Some(e),
                "edge {e} popped twice with no progress; bad stopping condition"
            );
            queue.update(e, f64::INFINITY);
            placements[e as usize] = None;
            prev_popped = Some(e);
            continue;
        }
        if cost > queued_cost + COST_TOLERANCE {
            assert!(
                prev_popped != Some(e),
                "edge {e} popped twice with no progress; bad stopping condition"
            );
            queue.update(e, cost);
            placements[e as usize] = pl;
            prev_popped = Some(e);
            continue;
        }

        let placement = pl.expect("checked above");
        if collapse_edge(
            e,
            &placement,
            &mut mesh,
            &mut flaps,
            &mut seams,
            &mut store,
            &mut queue,
            &mut placements,
            &cfg,
        ) {
            remaining -= 1;
            collapses += 1;
            max_error = max_error.max(cost.max(0.0).sqrt() / pos_scale);
        } else {
            assert!(
                prev_popped != Some(e),
                "edge {e} popped twice with no progress; bad stopping condition"
            );
            queue.update(e, f64::INFINITY);
            placements[e as usize] = None;
        }
        prev_popped = Some(e);
    }

    let reached_target = remaining <= target;
    if !reached_target {
        warn!(
            remaining,
            target, "no legal collapse left before reaching target"
        );
    }

    let out = compact(&mesh, input.face_count());
    info!(
        vertices_out = out.vertex_count(),
        faces_out = out.face_count(),
        collapses,
        max_error,
        "decimation finished"
    );
    Ok(DecimateResult {
        mesh: out,
        reached_target,
        collapses_performed: collapses,
        max_error,
    })
}

/// Copy live faces among the first `nf_original` rows into fresh tables and
/// drop unreferenced vertices. Virtual infinity faces sit past
/// `nf_original`, so they and the infinity vertex fall away here.
fn compact(mesh: &UvMesh, nf_original: usize) -> UvMesh {
    let mut faces = Vec::with_capacity(nf_original);
    let mut uv_faces = Vec::with_capacity(nf_original);
    for f in 0..nf_original {
        if mesh.is_tombstone(f) {
            continue;
        }
        debug_assert!(mesh.uv_faces[f].iter().all(|&t| t != crate::types::NULL_INDEX));
        faces.push(mesh.faces[f]);
        uv_faces.push(mesh.uv_faces[f]);
    }
    let (positions, faces, _) = remove_unreferenced(&mesh.positions, &faces);
    let (texcoords, uv_faces, _) = remove_unreferenced(&mesh.texcoords, &uv_faces);
    UvMesh {
        positions,
        texcoords,
        faces,
        uv_faces,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point2, Point3};

    /// Unit cube with one UV chart per face: 8 position vertices, 24 texture
    /// vertices, 12 triangles. Every quad edge is an atlas seam.
    pub(crate) fn chartered_cube() -> UvMesh {
        let mut mesh = UvMesh::new();
        for &(x, y, z) in &[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (1.0, 1.0, 0.0),
            (0.0, 1.0, 0.0),
            (0.0, 0.0, 1.0),
            (1.0, 0.0, 1.0),
            (1.0, 1.0, 1.0),
            (0.0, 1.0, 1.0),
        ] {
            mesh.positions.push(Point3::new(x, y, z));
        }
        let quads: [[u32; 4]; 6] = [
            [0, 3, 2, 1], // bottom
            [4, 5, 6, 7], // top
            [0, 1, 5, 4], // front
            [2, 3, 7, 6], // back
            [0, 4, 7, 3], // left
            [1, 2, 6, 5], // right
        ];
        for (i, quad) in quads.iter().enumerate() {
            let base = (i * 4) as u32;
            for &(u, v) in &[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                mesh.texcoords.push(Point2::new(u, v));
            }
            mesh.faces.push([quad[0], quad[1], quad[2]]);
            mesh.faces.push([quad[0], quad[2], quad[3]]);
            mesh.uv_faces.push([base, base + 1, base + 2]);
            mesh.uv_faces.push([base, base + 2, base + 3]);
        }
        mesh
    }

    #[test]
    fn test_target_at_or_above_input_is_noop() {
        let mesh = chartered_cube();
        let result = decimate(&mesh, &DecimateParams::with_target(8)).unwrap();
        assert!(result.reached_target);
        assert_eq!(result.collapses_performed, 0);
        assert_eq!(result.mesh, mesh);

        let result = decimate(&mesh, &DecimateParams::with_target(10_000)).unwrap();
        assert_eq!(result.mesh, mesh);
    }

    #[test]
    fn test_chartered_cube_cannot_decimate_at_seamless() {
        // Every edge either runs along a seam between junction vertices or
        // crosses between two seams, so nothing may collapse.
        let mesh = chartered_cube();
        let result = decimate(&mesh, &DecimateParams::with_target(7)).unwrap();
        assert!(!result.reached_target);
        assert_eq!(result.collapses_performed, 0);
        assert_eq!(result.mesh.vertex_count(), 8);
        assert_eq!(result.max_error, 0.0);
    }

    #[test]
    fn test_chartered_cube_decimates_when_unaware() {
        let mesh = chartered_cube();
        let mut params = DecimateParams::with_target(4);
        params.seam_aware_degree = SeamAwareDegree::NoUvShapePreserving;
        let result = decimate(&mesh, &params).unwrap();
        assert!(result.collapses_performed > 0);
        assert!(result.mesh.vertex_count() < 8);
        assert!(result.mesh.vertex_count() >= 4);
        // The output must still be index-valid even if the atlas tore.
        result.mesh.validate().unwrap();
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let mesh = UvMesh::new();
        assert!(decimate(&mesh, &DecimateParams::with_target(1)).is_err());
    }
}
