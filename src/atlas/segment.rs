//! Chart segmentation: cost-guided greedy region growing.
//!
//! Every manifold face is partitioned into charts. Growth is best-first over
//! a global priority queue: each entry is a candidate (chart, boundary face)
//! pair scored by a weighted multi-metric cost; the cheapest candidate across
//! all charts is absorbed next. Stale queue entries are detected through a
//! per-chart version counter and lazily recomputed, which keeps growth
//! efficient and exactly reproducible.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use nalgebra::Vector3;

use super::progress::Progress;
use crate::mesh::{FaceId, HalfEdgeMesh, MeshIndex, VertexId};

/// Immutable per-run segmentation configuration.
///
/// The five weights scale the cost terms of candidate absorption; the two
/// limits are hard gates that defer a face to a later seed instead.
#[derive(Debug, Clone)]
pub struct SegmentationSettings {
    /// Penalizes growth away from the chart's running best-fit normal.
    pub proxy_fit_metric_weight: f64,
    /// Penalizes charts whose boundary elongates relative to enclosed area.
    pub roundness_metric_weight: f64,
    /// Rewards absorptions that shorten the chart boundary.
    pub straightness_metric_weight: f64,
    /// Penalizes absorbing across sharp dihedral creases, so visible seams
    /// coincide with geometric creases.
    pub normal_seam_metric_weight: f64,
    /// Penalizes absorbing across pre-existing input-UV discontinuities.
    pub texture_seam_metric_weight: f64,
    /// Hard limit on chart area.
    pub max_chart_area: f64,
    /// Hard limit on chart boundary length.
    pub max_boundary_length: f64,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self {
            proxy_fit_metric_weight: 2.0,
            roundness_metric_weight: 0.01,
            straightness_metric_weight: 6.0,
            normal_seam_metric_weight: 4.0,
            texture_seam_metric_weight: 0.5,
            max_chart_area: f64::INFINITY,
            max_boundary_length: f64::INFINITY,
        }
    }
}

/// Candidate absorption of `face` into `chart`.
///
/// Ordered so that popping a `BinaryHeap` yields the lowest cost first, with
/// ties broken by lowest face index, then lowest chart index, keeping chart
/// membership reproducible across runs.
struct Candidate<I: MeshIndex> {
    cost: f64,
    face: FaceId<I>,
    chart: usize,
    version: u64,
}

impl<I: MeshIndex> PartialEq for Candidate<I> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<I: MeshIndex> Eq for Candidate<I> {}

impl<I: MeshIndex> PartialOrd for Candidate<I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I: MeshIndex> Ord for Candidate<I> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we pop the cheapest candidate.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.face.index().cmp(&self.face.index()))
            .then_with(|| other.chart.cmp(&self.chart))
    }
}

/// Growth state of one chart.
struct ChartGrowth<I: MeshIndex> {
    faces: Vec<FaceId<I>>,
    area: f64,
    boundary_length: f64,
    /// Area-weighted normal sum; the proxy normal is its direction.
    normal_accum: Vector3<f64>,
    /// Canonical vertex ids in the chart, for the Euler gate.
    vertices: HashSet<VertexId<I>>,
    /// Canonical undirected edges in the chart, for the Euler gate.
    edges: HashSet<(VertexId<I>, VertexId<I>)>,
    /// Bumped on every absorption; queue entries with an older version are
    /// stale and get recomputed when popped.
    version: u64,
}

/// Partition all faces of `mesh` into charts.
///
/// Returns the per-chart face lists, in chart creation order; every face of
/// the mesh appears in exactly one list.
pub(crate) fn compute_charts<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
    settings: &SegmentationSettings,
    progress: &Progress,
) -> Vec<Vec<FaceId<I>>> {
    let num_faces = mesh.num_faces();
    let mut face_chart: Vec<usize> = vec![usize::MAX; num_faces];
    let mut charts: Vec<ChartGrowth<I>> = Vec::new();
    let mut heap: BinaryHeap<Candidate<I>> = BinaryHeap::new();
    let mut assigned = 0usize;
    let mut next_seed = 0usize;

    while assigned < num_faces {
        // Growth stalled (or just started): seed a new chart from the
        // lowest-index unassigned face.
        while face_chart[next_seed] != usize::MAX {
            next_seed += 1;
        }
        let seed = FaceId::new(next_seed);
        let chart_idx = charts.len();
        charts.push(seed_chart(mesh, seed));
        face_chart[next_seed] = chart_idx;
        assigned += 1;
        progress.report(assigned, num_faces, "growing charts");

        push_neighbor_candidates(mesh, &charts, &face_chart, &mut heap, chart_idx, seed, settings);

        // Best-first growth across all charts until no chart can legally
        // absorb any adjacent face.
        while let Some(cand) = heap.pop() {
            if face_chart[cand.face.index()] != usize::MAX {
                continue; // Claimed by some chart already.
            }

            let chart = &charts[cand.chart];
            if cand.version != chart.version {
                // Stale: the chart changed since this entry was scored.
                let cost = evaluate_cost(mesh, chart, cand.face, settings);
                heap.push(Candidate {
                    cost,
                    face: cand.face,
                    chart: cand.chart,
                    version: chart.version,
                });
                continue;
            }

            if !gates_admit(mesh, chart, cand.face, settings) {
                // Deferred: the face can still be absorbed elsewhere or seed
                // a new chart once growth stalls.
                continue;
            }

            absorb(mesh, &mut charts[cand.chart], cand.face);
            face_chart[cand.face.index()] = cand.chart;
            assigned += 1;
            progress.report(assigned, num_faces, "growing charts");

            push_neighbor_candidates(
                mesh,
                &charts,
                &face_chart,
                &mut heap,
                cand.chart,
                cand.face,
                settings,
            );
        }
    }

    charts.into_iter().map(|c| c.faces).collect()
}

fn seed_chart<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, face: FaceId<I>) -> ChartGrowth<I> {
    let area = mesh.face_area(face);
    let normal = mesh.face_normal(face);

    let mut vertices = HashSet::new();
    let mut edges = HashSet::new();
    let mut boundary_length = 0.0;
    for he in mesh.face_halfedges(face) {
        boundary_length += mesh.edge_length(he);
        let (a, b) = canonical_edge(mesh, he);
        vertices.insert(a);
        vertices.insert(b);
        edges.insert((a, b));
    }

    ChartGrowth {
        faces: vec![face],
        area,
        boundary_length,
        normal_accum: normal * area,
        vertices,
        edges,
        version: 0,
    }
}

/// Canonical undirected edge key for a half-edge.
fn canonical_edge<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
    he: crate::mesh::HalfEdgeId<I>,
) -> (VertexId<I>, VertexId<I>) {
    let a = mesh.canonical(mesh.origin(he));
    let b = mesh.canonical(mesh.dest(he));
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Push candidates for the unassigned edge-neighbors of `face`.
fn push_neighbor_candidates<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
    charts: &[ChartGrowth<I>],
    face_chart: &[usize],
    heap: &mut BinaryHeap<Candidate<I>>,
    chart_idx: usize,
    face: FaceId<I>,
    settings: &SegmentationSettings,
) {
    let chart = &charts[chart_idx];
    for he in mesh.face_halfedges(face) {
        let twin = mesh.twin(he);
        if !twin.is_valid() || mesh.is_boundary_halfedge(twin) {
            continue;
        }
        let neighbor = mesh.face_of(twin);
        if face_chart[neighbor.index()] != usize::MAX {
            continue;
        }
        let cost = evaluate_cost(mesh, chart, neighbor, settings);
        heap.push(Candidate {
            cost,
            face: neighbor,
            chart: chart_idx,
            version: chart.version,
        });
    }
}

/// Shared/added boundary breakdown for a candidate absorption.
struct BoundaryDelta {
    shared_length: f64,
    added_length: f64,
    /// Averaged crease factor over shared edges, in [0, 1].
    normal_seam: f64,
    /// Length fraction of shared edges that are input texture seams.
    texture_seam: f64,
}

fn boundary_delta<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
    chart: &ChartGrowth<I>,
    face: FaceId<I>,
) -> BoundaryDelta {
    let face_normal = mesh.face_normal(face);

    let mut shared_length = 0.0;
    let mut added_length = 0.0;
    let mut normal_seam = 0.0;
    let mut texture_seam = 0.0;

    for he in mesh.face_halfedges(face) {
        let len = mesh.edge_length(he);
        let twin = mesh.twin(he);
        // The mesh is manifold: if this canonical edge is in the chart, the
        // face on the other side of it is the chart face that put it there.
        let neighbor_in_chart = twin.is_valid()
            && !mesh.is_boundary_halfedge(twin)
            && chart.edges.contains(&canonical_edge(mesh, he));

        if neighbor_in_chart {
            shared_length += len;

            let crease = if mesh.is_normal_seam(he) {
                1.0
            } else {
                let nf = mesh.face_of(twin);
                let d = face_normal.dot(&mesh.face_normal(nf)).clamp(-1.0, 1.0);
                (1.0 - d) * 0.5
            };
            normal_seam += len * crease;

            if mesh.is_texture_seam(he) {
                texture_seam += len;
            }
        } else {
            added_length += len;
        }
    }

    if shared_length > 0.0 {
        normal_seam /= shared_length;
        texture_seam /= shared_length;
    }

    BoundaryDelta {
        shared_length,
        added_length,
        normal_seam,
        texture_seam,
    }
}

/// Evaluate the weighted absorption cost of `face` into `chart`.
fn evaluate_cost<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
    chart: &ChartGrowth<I>,
    face: FaceId<I>,
    settings: &SegmentationSettings,
) -> f64 {
    let delta = boundary_delta(mesh, chart, face);
    let face_area = mesh.face_area(face);
    let face_normal = mesh.face_normal(face);

    // Proxy fit: deviation of the face normal from the chart's best-fit
    // normal, in [0, 1].
    let proxy_fit = match chart.normal_accum.try_normalize(1e-12) {
        Some(proxy) => (1.0 - proxy.dot(&face_normal).clamp(-1.0, 1.0)) * 0.5,
        None => 0.5,
    };

    // Roundness: growth of the isoperimetric ratio p^2 / (4*pi*a).
    let area_after = chart.area + face_area;
    let boundary_after = chart.boundary_length - delta.shared_length + delta.added_length;
    let iso = |p: f64, a: f64| p * p / (4.0 * std::f64::consts::PI * a.max(1e-30));
    let roundness =
        (iso(boundary_after, area_after) - iso(chart.boundary_length, chart.area)).max(0.0);

    // Straightness: net boundary churn, in [-1, 1]; negative when the
    // absorption shortens the boundary.
    let total = delta.shared_length + delta.added_length;
    let straightness = if total > 0.0 {
        (delta.added_length - delta.shared_length) / total
    } else {
        0.0
    };

    settings.proxy_fit_metric_weight * proxy_fit
        + settings.roundness_metric_weight * roundness
        + settings.straightness_metric_weight * straightness
        + settings.normal_seam_metric_weight * delta.normal_seam
        + settings.texture_seam_metric_weight * delta.texture_seam
}

/// Check the hard gates: area and boundary limits, plus the requirement that
/// the chart remains a topological disk (no closed surfaces, no handles).
fn gates_admit<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
    chart: &ChartGrowth<I>,
    face: FaceId<I>,
    settings: &SegmentationSettings,
) -> bool {
    let delta = boundary_delta(mesh, chart, face);
    let face_area = mesh.face_area(face);

    if chart.area + face_area > settings.max_chart_area {
        return false;
    }
    let boundary_after = chart.boundary_length - delta.shared_length + delta.added_length;
    if boundary_after > settings.max_boundary_length {
        return false;
    }

    // Euler gate: V - E + F must stay 1 (disk). Absorbing the closing face
    // of a sphere gives 2, pinching a handle or annulus gives <= 0.
    let mut new_vertices = 0usize;
    let mut new_edges = 0usize;
    let mut seen = [None::<VertexId<I>>; 3];
    let mut n_seen = 0;
    for he in mesh.face_halfedges(face) {
        let (a, b) = canonical_edge(mesh, he);
        if !chart.edges.contains(&(a, b)) {
            new_edges += 1;
        }
        let v = mesh.canonical(mesh.origin(he));
        if !chart.vertices.contains(&v) && !seen[..n_seen].contains(&Some(v)) {
            seen[n_seen] = Some(v);
            n_seen += 1;
            new_vertices += 1;
        }
    }

    let v = chart.vertices.len() + new_vertices;
    let e = chart.edges.len() + new_edges;
    let f = chart.faces.len() + 1;
    v as i64 - e as i64 + f as i64 == 1
}

/// Commit an absorption.
fn absorb<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, chart: &mut ChartGrowth<I>, face: FaceId<I>) {
    let delta = boundary_delta(mesh, chart, face);
    let face_area = mesh.face_area(face);

    chart.area += face_area;
    chart.boundary_length += delta.added_length - delta.shared_length;
    chart.normal_accum += mesh.face_normal(face) * face_area;

    for he in mesh.face_halfedges(face) {
        let (a, b) = canonical_edge(mesh, he);
        chart.vertices.insert(a);
        chart.vertices.insert(b);
        chart.edges.insert((a, b));
    }

    chart.faces.push(face);
    chart.version += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_triangles;
    use nalgebra::Point3;

    fn grid_mesh(n: usize) -> HalfEdgeMesh<u32> {
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                vertices.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        for j in 0..n {
            for i in 0..n {
                let v00 = j * (n + 1) + i;
                let v10 = v00 + 1;
                let v01 = v00 + (n + 1);
                let v11 = v01 + 1;
                faces.push([v00, v10, v11]);
                faces.push([v00, v11, v01]);
            }
        }
        build_from_triangles(&vertices, &faces).unwrap().mesh
    }

    fn cube_mesh() -> HalfEdgeMesh<u32> {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let faces = vec![
            [0, 2, 1],
            [0, 3, 2], // bottom
            [4, 5, 6],
            [4, 6, 7], // top
            [0, 1, 5],
            [0, 5, 4], // front
            [1, 2, 6],
            [1, 6, 5], // right
            [2, 3, 7],
            [2, 7, 6], // back
            [3, 0, 4],
            [3, 4, 7], // left
        ];
        build_from_triangles(&vertices, &faces).unwrap().mesh
    }

    fn run(mesh: &HalfEdgeMesh<u32>, settings: &SegmentationSettings) -> Vec<Vec<FaceId<u32>>> {
        compute_charts(mesh, settings, &Progress::none())
    }

    #[test]
    fn test_flat_grid_single_chart() {
        let mesh = grid_mesh(4);
        let charts = run(&mesh, &SegmentationSettings::default());
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].len(), mesh.num_faces());
    }

    #[test]
    fn test_every_face_in_exactly_one_chart() {
        let mesh = cube_mesh();
        let charts = run(&mesh, &SegmentationSettings::default());

        let mut counts = vec![0usize; mesh.num_faces()];
        for chart in &charts {
            for f in chart {
                counts[f.index()] += 1;
            }
        }
        assert!(counts.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_closed_cube_splits() {
        let mesh = cube_mesh();
        let charts = run(&mesh, &SegmentationSettings::default());
        // A closed surface can never be a single disk chart.
        assert!(charts.len() >= 2);
        assert!(charts.len() <= 6);
    }

    #[test]
    fn test_deterministic() {
        let mesh = cube_mesh();
        let settings = SegmentationSettings::default();
        let a = run(&mesh, &settings);
        let b = run(&mesh, &settings);
        assert_eq!(a.len(), b.len());
        for (ca, cb) in a.iter().zip(b.iter()) {
            assert_eq!(ca, cb);
        }
    }

    #[test]
    fn test_max_area_gate() {
        let mesh = grid_mesh(4); // 32 faces of area 0.5 each
        let settings = SegmentationSettings {
            max_chart_area: 4.0,
            ..Default::default()
        };
        let charts = run(&mesh, &settings);
        assert!(charts.len() >= 4);
        for chart in &charts {
            let area: f64 = chart.iter().map(|&f| mesh.face_area(f)).sum();
            assert!(area <= 4.0 + 1e-9);
        }
    }

    #[test]
    fn test_chart_connected() {
        // Each chart must be edge-connected.
        let mesh = cube_mesh();
        let charts = run(&mesh, &SegmentationSettings::default());
        for chart in &charts {
            let members: std::collections::HashSet<usize> =
                chart.iter().map(|f| f.index()).collect();
            let mut reached = std::collections::HashSet::new();
            let mut stack = vec![chart[0]];
            reached.insert(chart[0].index());
            while let Some(f) = stack.pop() {
                for he in mesh.face_halfedges(f) {
                    let t = mesh.twin(he);
                    if !t.is_valid() || mesh.is_boundary_halfedge(t) {
                        continue;
                    }
                    let nf = mesh.face_of(t);
                    if members.contains(&nf.index()) && reached.insert(nf.index()) {
                        stack.push(nf);
                    }
                }
            }
            assert_eq!(reached.len(), chart.len());
        }
    }
}
