//! Cost and placement oracle for directed half-edge collapses.
//!
//! For a candidate edge the oracle classifies the collapse with respect to
//! seams, computes the optimal (or constrained) merged position and texture
//! coordinates, evaluates the summed quadric form there, and vetoes any
//! collapse that would flip or degenerate a surviving triangle. Both directed
//! orientations of the edge are evaluated and the cheaper one wins; a
//! forbidden collapse reports infinite cost.

use hashbrown::HashSet;
use nalgebra::{Matrix2, Matrix3, Matrix6, Point2, Point3, Vector2, Vector3};

use crate::adjacency::{EdgeFlaps, vertex_ring};
use crate::quadric::{QuadricStore, SINGULAR_TOLERANCE, evaluate, invert_checked};
use crate::seams::SeamSet;
use crate::types::{NULL_INDEX, UvMesh};

/// How strictly seams constrain the collapse sequence.
///
/// Ordered from loosest to strictest: at degree 0 only topology-breaking
/// collapses are rejected and the atlas may tear; at degree 1 a seam may lose
/// vertices only where its local UV shape is unchanged; at degree 2 (the
/// default) the parametric correspondence across the seam must also survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeamAwareDegree {
    NoUvShapePreserving,
    UvShapePreserving,
    Seamless,
}

impl SeamAwareDegree {
    /// Map the CLI's `--strict <0|1|2>` level.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::NoUvShapePreserving),
            1 => Some(Self::UvShapePreserving),
            2 => Some(Self::Seamless),
            _ => None,
        }
    }
}

/// One texture-vertex merge implied by a collapse: `from_uv` folds into
/// `to_uv`, which moves to `uv`.
#[derive(Debug, Clone, PartialEq)]
pub struct UvMerge {
    pub from_uv: u32,
    pub to_uv: u32,
    pub uv: Point2<f64>,
}

/// The proposed outcome of collapsing `from` into `to`.
///
/// Non-seam collapses carry one merge; along-seam collapses carry two, one
/// per side of the seam.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub from: u32,
    pub to: u32,
    pub position: Point3<f64>,
    pub merges: Vec<UvMerge>,
}

/// Configuration shared by every oracle evaluation of a run.
#[derive(Debug)]
pub struct OracleConfig {
    pub degree: SeamAwareDegree,
    /// Vertices that must survive; populated from the input boundary when
    /// boundary preservation is requested.
    pub pinned_vertices: HashSet<u32>,
    pub infinity_vertex: Option<u32>,
    pub pos_scale: f64,
    pub uv_weight: f64,
}

/// Borrowed view of the decimation state the oracle reads.
pub struct OracleCtx<'a> {
    pub mesh: &'a UvMesh,
    pub flaps: &'a EdgeFlaps,
    pub seams: &'a SeamSet,
    pub store: &'a QuadricStore,
    pub cfg: &'a OracleConfig,
}

/// Relative tolerance for the UV collinearity test along seams.
const COLLINEAR_TOLERANCE: f64 = 1e-9;
/// Tolerance on the parametric split ratio agreement across a seam.
const SPLIT_RATIO_TOLERANCE: f64 = 1e-6;
/// Threshold below which a simulated face normal counts as degenerate.
const DEGENERATE_NORMAL: f64 = 1e-10;

/// Evaluate edge `e` in both directions and return the cheaper collapse.
///
/// Infinite cost with no placement means no legal collapse exists for this
/// edge in the current topology.
pub fn cost_and_placement(ctx: &OracleCtx, e: u32) -> (f64, Option<Placement>) {
    if !ctx.flaps.edge_is_live(e) {
        return (f64::INFINITY, None);
    }
    let [a, b] = ctx.flaps.edges[e as usize];
    if ctx
        .cfg
        .infinity_vertex
        .is_some_and(|inf| a == inf || b == inf)
    {
        return (f64::INFINITY, None);
    }

    let forward = directed_cost(ctx, e, a, b);
    let backward = directed_cost(ctx, e, b, a);
    match (forward, backward) {
        (None, None) => (f64::INFINITY, None),
        (Some((c, p)), None) | (None, Some((c, p))) => (c, Some(p)),
        (Some((ca, pa)), Some((cb, pb))) => {
            if cb < ca {
                (cb, Some(pb))
            } else {
                (ca, Some(pa))
            }
        }
    }
}

/// Cost of collapsing `from` into `to` across edge `e`, or `None` when the
/// collapse is forbidden.
fn directed_cost(ctx: &OracleCtx, e: u32, from: u32, to: u32) -> Option<(f64, Placement)> {
    let mesh = ctx.mesh;
    let flaps = ctx.flaps;

    if ctx.cfg.pinned_vertices.contains(&from) {
        return None;
    }

    // The UV pair merged on each side of the edge, read off the flap faces.
    let mut sides: Vec<(u32, u32)> = Vec::with_capacity(2);
    let mut flap_faces = [NULL_INDEX; 2];
    let mut flap_opposites = [NULL_INDEX; 2];
    for slot in 0..2 {
        let f = flaps.edge_faces[e as usize][slot];
        if f == NULL_INDEX {
            continue;
        }
        flap_faces[slot] = f;
        let face = mesh.faces[f as usize];
        let uv_face = mesh.uv_faces[f as usize];
        let cf = face.iter().position(|&x| x == from)?;
        let ct = face.iter().position(|&x| x == to)?;
        flap_opposites[slot] = face[flaps.edge_corners[e as usize][slot] as usize];
        let pair = (uv_face[cf], uv_face[ct]);
        if !sides.contains(&pair) {
            sides.push(pair);
        }
    }
    if sides.is_empty() {
        return None;
    }
    // Two flaps sharing their opposite corner form a pillow; collapsing it
    // would leave degenerate connectivity.
    if flap_opposites[0] != NULL_INDEX && flap_opposites[0] == flap_opposites[1] {
        return None;
    }

    let f_start = if flap_faces[0] != NULL_INDEX {
        flap_faces[0]
    } else {
        flap_faces[1]
    };
    let ring_from = vertex_ring(&mesh.faces, flaps, from, f_start)?;
    let ring_to = vertex_ring(&mesh.faces, flaps, to, f_start)?;

    // Link condition: any vertex adjacent to both endpoints must be one of
    // the two corners opposite the edge, otherwise the collapse pinches the
    // surface into a non-manifold configuration.
    let neighbors = |ring: &[(u32, u32)]| -> HashSet<u32> {
        let mut set = HashSet::new();
        for &(f, _) in ring {
            for &v in &mesh.faces[f as usize] {
                if v != from && v != to {
                    set.insert(v);
                }
            }
        }
        set
    };
    let n_from = neighbors(&ring_from);
    let n_to = neighbors(&ring_to);
    for v in n_from.intersection(&n_to) {
        if !flap_opposites.contains(v) {
            return None;
        }
    }

    // Seam legality.
    let degree = ctx.cfg.degree;
    if degree != SeamAwareDegree::NoUvShapePreserving {
        let from_seam = ctx.seams.is_seam_vertex(from);
        let to_seam = ctx.seams.is_seam_vertex(to);
        match (from_seam, to_seam) {
            (false, _) => {}
            (true, false) => return None,
            (true, true) => {
                if !ctx.seams.contains(from, to) {
                    return None;
                }
                if !along_seam_allowed(ctx, &ring_from, from, to, &sides) {
                    return None;
                }
            }
        }
        // Every face around the vanishing vertex must sit in one of the two
        // merged charts, or the collapse would orphan a texture vertex.
        for &(f, c) in &ring_from {
            let uv = mesh.uv_faces[f as usize][c as usize];
            if !sides.iter().any(|&(fu, _)| fu == uv) {
                return None;
            }
        }
    }

    // Quadric sums per surviving chart.
    let quadrics: Vec<Matrix6<f64>> = sides
        .iter()
        .map(|&(fu, tu)| ctx.store.get(from, fu) + ctx.store.get(to, tu))
        .collect();

    let pos_scale = ctx.cfg.pos_scale;
    let uv_weight = ctx.cfg.uv_weight;

    // Destination-seam collapses keep the destination exactly where it is;
    // interior collapses solve for the 5D minimizer, falling back to the
    // destination when the system is singular. The destination path copies
    // the stored coordinates verbatim so pinned vertices never drift.
    let solved = if ctx.seams.is_seam_vertex(to) {
        None
    } else {
        optimal_placement(&quadrics)
    };
    let (p, uvs, p_out, uvs_out) = match solved {
        Some((p, uvs)) => {
            let p_out = Point3::from(p / pos_scale);
            let uvs_out: Vec<Point2<f64>> =
                uvs.iter().map(|uv| Point2::from(uv / uv_weight)).collect();
            (p, uvs, p_out, uvs_out)
        }
        None => {
            let p_out = mesh.positions[to as usize];
            let uvs_out: Vec<Point2<f64>> = sides
                .iter()
                .map(|&(_, tu)| mesh.texcoords[tu as usize])
                .collect();
            let p = p_out.coords * pos_scale;
            let uvs = uvs_out.iter().map(|t| t.coords * uv_weight).collect();
            (p, uvs, p_out, uvs_out)
        }
    };

    let mut cost = 0.0;
    for (q, uv) in quadrics.iter().zip(uvs.iter()) {
        cost += evaluate(q, &p, uv);
    }
    let cost = cost.max(0.0);

    // Geometric validity: no surviving triangle around either endpoint may
    // flip or degenerate when both endpoints move to the merged position.
    for &(f, _) in ring_from.iter().chain(ring_to.iter()) {
        if flap_faces.contains(&f) {
            continue;
        }
        let face = mesh.faces[f as usize];
        if ctx.cfg.infinity_vertex.is_some_and(|inf| face.contains(&inf)) {
            continue;
        }
        if would_flip(mesh, &face, from, to, &p_out) {
            return None;
        }
    }

    let merges = sides
        .iter()
        .zip(uvs_out.iter())
        .map(|(&(fu, tu), &uv)| UvMerge {
            from_uv: fu,
            to_uv: tu,
            uv,
        })
        .collect();
    Some((
        cost,
        Placement {
            from,
            to,
            position: p_out,
            merges,
        },
    ))
}

/// Whether collapsing the seam vertex `from` along its seam into `to` keeps
/// the seam intact under the configured strictness.
fn along_seam_allowed(
    ctx: &OracleCtx,
    ring_from: &[(u32, u32)],
    from: u32,
    to: u32,
    sides: &[(u32, u32)],
) -> bool {
    // Only interior seam vertices may slide away; junctions and endpoints
    // define the seam network and must survive.
    if ctx.seams.seam_degree(from) != 2 {
        return false;
    }
    let Some(w) = ctx.seams.other_neighbor(from, to) else {
        return false;
    };

    let mesh = ctx.mesh;
    let mut ratios: Vec<f64> = Vec::with_capacity(2);
    for &(uv_from, uv_to) in sides {
        // The UV image of w in the same chart as this side of the seam.
        let Some(uv_w) = ring_from.iter().find_map(|&(f, c)| {
            let face = mesh.faces[f as usize];
            if mesh.uv_faces[f as usize][c as usize] != uv_from {
                return None;
            }
            face.iter()
                .position(|&x| x == w)
                .map(|cw| mesh.uv_faces[f as usize][cw])
        }) else {
            return false;
        };

        let pf = mesh.texcoords[uv_from as usize];
        let a = mesh.texcoords[uv_w as usize] - pf;
        let b = mesh.texcoords[uv_to as usize] - pf;
        let scale = a.norm() * b.norm();
        if scale < 1e-18 {
            return false;
        }
        // The vanishing vertex must lie strictly between its seam neighbors
        // in UV, or removing it changes the seam's shape.
        let cross = a.x * b.y - a.y * b.x;
        if cross.abs() > COLLINEAR_TOLERANCE * scale || a.dot(&b) > 0.0 {
            return false;
        }
        ratios.push(a.norm() / (a.norm() + b.norm()));
    }

    // Seamless additionally requires the two sides to agree on where along
    // the seam the vertex sits, so the cross-seam correspondence survives.
    if ctx.cfg.degree == SeamAwareDegree::Seamless
        && ratios.len() == 2
        && (ratios[0] - ratios[1]).abs() > SPLIT_RATIO_TOLERANCE
    {
        return false;
    }
    true
}

/// Minimize the summed quadric form over (position, per-side UVs).
///
/// Each side's UV block is eliminated by Schur complement, the reduced 3x3
/// system is solved for position, and the UVs are back-substituted. Returns
/// `None` when any block is singular below the rank tolerance.
fn optimal_placement(quadrics: &[Matrix6<f64>]) -> Option<(Vector3<f64>, Vec<Vector2<f64>>)> {
    let mut reduced = Matrix3::<f64>::zeros();
    let mut rhs = Vector3::<f64>::zeros();
    let mut back: Vec<(Matrix2<f64>, nalgebra::Matrix3x2<f64>, Vector2<f64>)> = Vec::new();

    for q in quadrics {
        let app = q.fixed_view::<3, 3>(0, 0).into_owned();
        let apu = q.fixed_view::<3, 2>(0, 3).into_owned();
        let auu = q.fixed_view::<2, 2>(3, 3).into_owned();
        let bp: Vector3<f64> = q.fixed_view::<3, 1>(0, 5).into_owned();
        let bu: Vector2<f64> = q.fixed_view::<2, 1>(3, 5).into_owned();

        if auu.determinant().abs() < SINGULAR_TOLERANCE {
            return None;
        }
        let auu_inv = auu.try_inverse()?;
        reduced += app - apu * auu_inv * apu.transpose();
        rhs += bp - apu * auu_inv * bu;
        back.push((auu_inv, apu, bu));
    }

    let reduced_inv = invert_checked(&reduced)?;
    let p = -(reduced_inv * rhs);
    let uvs = back
        .iter()
        .map(|(auu_inv, apu, bu)| -(auu_inv * (apu.transpose() * p + bu)))
        .collect();
    Some((p, uvs))
}

/// Whether face `face` flips or degenerates when both collapse endpoints are
/// moved to `p_new`.
fn would_flip(mesh: &UvMesh, face: &[u32; 3], from: u32, to: u32, p_new: &Point3<f64>) -> bool {
    let at = |v: u32| -> Point3<f64> {
        if v == from || v == to {
            *p_new
        } else {
            mesh.positions[v as usize]
        }
    };
    let old_p0 = mesh.positions[face[0] as usize];
    let old_n = (mesh.positions[face[1] as usize] - old_p0)
        .cross(&(mesh.positions[face[2] as usize] - old_p0));
    if old_n.norm() < DEGENERATE_NORMAL {
        return false;
    }
    let new_p0 = at(face[0]);
    let new_n = (at(face[1]) - new_p0).cross(&(at(face[2]) - new_p0));
    new_n.norm() < DEGENERATE_NORMAL || new_n.dot(&old_n) <= 0.0
}
