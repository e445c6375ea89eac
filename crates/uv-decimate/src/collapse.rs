//! Half-edge collapse execution.
//!
//! Performs a single collapse on both the position and texture meshes,
//! tombstoning the two flap faces, rerouting the edge tables around the
//! vanished vertex, carrying seam membership and quadrics over to the
//! survivor, and re-keying every incident edge in the queue. All updates are
//! in place; face and edge indices stay stable for the whole run.

use crate::adjacency::{EdgeFlaps, vertex_ring};
use crate::placement::{OracleConfig, OracleCtx, Placement, cost_and_placement};
use crate::quadric::QuadricStore;
use crate::queue::CostQueue;
use crate::seams::SeamSet;
use crate::types::{NULL_INDEX, UvMesh};

struct FlapSurgery {
    face: u32,
    /// Edge from the vanishing vertex to the flap's opposite corner; dies.
    dead_edge: u32,
    /// Edge from the survivor to the opposite corner; inherits the neighbor.
    kept_edge: u32,
    /// Face and corner across `dead_edge`, to be reattached to `kept_edge`.
    neighbor: (u32, u32),
}

/// Collapse edge `e` according to `placement`. Returns `false` (leaving the
/// mesh untouched) when the local topology no longer admits the collapse.
#[allow(clippy::too_many_arguments)]
pub fn collapse_edge(
    e: u32,
    placement: &Placement,
    mesh: &mut UvMesh,
    flaps: &mut EdgeFlaps,
    seams: &mut SeamSet,
    store: &mut QuadricStore,
    queue: &mut CostQueue,
    placements: &mut [Option<Placement>],
    cfg: &OracleConfig,
) -> bool {
    let (from, to) = (placement.from, placement.to);
    let key = if from < to { [from, to] } else { [to, from] };
    if !flaps.edge_is_live(e) || flaps.edges[e as usize] != key {
        return false;
    }

    let f_start = {
        let [f0, f1] = flaps.edge_faces[e as usize];
        if f0 != NULL_INDEX { f0 } else { f1 }
    };
    let Some(ring_from) = vertex_ring(&mesh.faces, flaps, from, f_start) else {
        return false;
    };
    let Some(ring_to) = vertex_ring(&mesh.faces, flaps, to, f_start) else {
        return false;
    };

    // Edges incident to each endpoint, gathered before any mutation.
    let incident_edges = |ring: &[(u32, u32)]| -> Vec<u32> {
        let mut edges: Vec<u32> = ring
            .iter()
            .flat_map(|&(f, c)| [flaps.emap_at(f, (c + 1) % 3), flaps.emap_at(f, (c + 2) % 3)])
            .collect();
        edges.sort_unstable();
        edges.dedup();
        edges
    };
    let from_edges = incident_edges(&ring_from);
    let to_edges = incident_edges(&ring_to);

    // Plan the flap surgery before mutating anything.
    let mut surgeries: Vec<FlapSurgery> = Vec::with_capacity(2);
    for slot in 0..2 {
        let f = flaps.edge_faces[e as usize][slot];
        if f == NULL_INDEX {
            continue;
        }
        let face = mesh.faces[f as usize];
        let Some(cf) = face.iter().position(|&x| x == from) else {
            return false;
        };
        let Some(ct) = face.iter().position(|&x| x == to) else {
            return false;
        };
        let dead_edge = flaps.emap_at(f, ct as u32);
        let kept_edge = flaps.emap_at(f, cf as u32);
        let j = flaps.edge_faces[dead_edge as usize]
            .iter()
            .position(|&x| x != f)
            .expect("flap edge lists its face");
        let neighbor = (
            flaps.edge_faces[dead_edge as usize][j],
            flaps.edge_corners[dead_edge as usize][j],
        );
        surgeries.push(FlapSurgery {
            face: f,
            dead_edge,
            kept_edge,
            neighbor,
        });
    }
    if surgeries.len() == 2
        && (surgeries[0].dead_edge == surgeries[1].dead_edge
            || surgeries[0].kept_edge == surgeries[1].kept_edge)
    {
        // Doubled flap faces over the same corners; not collapsible.
        return false;
    }

    // 1. Tombstone the flap faces and merge their edge pairs.
    for s in &surgeries {
        let (g, gc) = s.neighbor;
        let k = flaps.edge_faces[s.kept_edge as usize]
            .iter()
            .position(|&x| x == s.face)
            .expect("kept edge lists the tombstoned face");
        flaps.edge_faces[s.kept_edge as usize][k] = g;
        flaps.edge_corners[s.kept_edge as usize][k] = gc;
        if g != NULL_INDEX {
            flaps.set_emap(g, gc, s.kept_edge);
        }
        flaps.kill_edge(s.dead_edge);
        queue.remove(s.dead_edge);
        placements[s.dead_edge as usize] = None;

        mesh.faces[s.face as usize] = [NULL_INDEX; 3];
        mesh.uv_faces[s.face as usize] = [NULL_INDEX; 3];
    }
    flaps.kill_edge(e);
    queue.remove(e);
    placements[e as usize] = None;

    // 2. Rewrite the surviving ring of the vanished vertex, position corner
    // to the survivor and texture corner through the side's UV merge.
    for &(f, c) in &ring_from {
        if mesh.faces[f as usize][0] == NULL_INDEX {
            continue;
        }
        mesh.faces[f as usize][c as usize] = to;
        let uv = mesh.uv_faces[f as usize][c as usize];
        if let Some(m) = placement.merges.iter().find(|m| m.from_uv == uv) {
            mesh.uv_faces[f as usize][c as usize] = m.to_uv;
        }
    }
    for &ee in &from_edges {
        if !flaps.edge_is_live(ee) {
            continue;
        }
        let [a, b] = flaps.edges[ee as usize];
        if a == from || b == from {
            let other = if a == from { b } else { a };
            flaps.edges[ee as usize] = if to < other { [to, other] } else { [other, to] };
        }
    }

    // 3. Carry seam membership and quadrics over to the survivor.
    seams.remove(from, to);
    seams.move_vertex(from, to);
    let uv_pairs: Vec<(u32, u32)> = placement
        .merges
        .iter()
        .map(|m| (m.from_uv, m.to_uv))
        .collect();
    store.merge_vertex(from, to, &uv_pairs);

    // 4. Apply the placement.
    mesh.positions[to as usize] = placement.position;
    for m in &placement.merges {
        mesh.texcoords[m.to_uv as usize] = m.uv;
    }

    // 5. Refresh every edge now incident to the survivor.
    let mut refresh: Vec<u32> = from_edges
        .into_iter()
        .chain(to_edges)
        .filter(|&ee| flaps.edge_is_live(ee))
        .collect();
    refresh.sort_unstable();
    refresh.dedup();
    let ctx = OracleCtx {
        mesh,
        flaps,
        seams,
        store,
        cfg,
    };
    for ee in refresh {
        let (cost, pl) = cost_and_placement(&ctx, ee);
        queue.update(ee, cost);
        placements[ee as usize] = pl;
    }

    true
}
