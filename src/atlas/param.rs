//! Least-squares conformal parameterization of charts.
//!
//! Each chart receives one 2D coordinate per chart vertex minimizing
//! conformal (angle) distortion, following the least squares conformal maps
//! formulation: the conformal energy is assembled into its normal equations
//! over the chart mesh, two boundary vertices are pinned to remove the
//! similarity degrees of freedom, and the sparse system is solved with
//! preconditioned conjugate gradient.
//!
//! Degenerate charts (a single face, fewer than three vertices, no boundary,
//! or a singular system) bypass the solver and receive a trivial planar
//! projection instead; parameterization never aborts the pipeline.
//!
//! # References
//!
//! - Lévy, B., Petitjean, S., Ray, N., & Maillot, J. (2002). "Least squares
//!   conformal maps for automatic texture atlas generation." ACM SIGGRAPH.

use nalgebra::{DVector, Point2, Point3, Vector3};
use rayon::prelude::*;

use super::chart::Chart;
use super::sparse::{conjugate_gradient, CsrMatrix};
use crate::mesh::{HalfEdgeMesh, MeshIndex, VertexId};

/// Maximum iterations for the conjugate gradient solver.
const MAX_SOLVER_ITERATIONS: usize = 4000;

/// Convergence tolerance (relative residual) for the solver.
const SOLVER_TOLERANCE: f64 = 1e-9;

/// Penalty factor pinning the two fixed vertices.
const PIN_PENALTY: f64 = 1e8;

/// Assign UVs to every chart, in place. Charts are independent, so the work
/// fans out across threads; results are deterministic per chart.
pub(crate) fn parameterize_charts<I: MeshIndex>(charts: &mut [Chart<I>]) {
    charts.par_iter_mut().for_each(parameterize_chart);
}

/// Compute the 2D parameterization of a single chart.
pub(crate) fn parameterize_chart<I: MeshIndex>(chart: &mut Chart<I>) {
    let n = chart.vertex_count();

    if chart.face_count() <= 1 || n < 3 {
        project_trivial(chart);
        return;
    }

    let boundary: Vec<usize> = (0..n)
        .filter(|&v| chart.chart_mesh().is_boundary_vertex(VertexId::new(v)))
        .collect();
    if boundary.len() < 2 {
        // No usable boundary to pin; segmentation should not produce this,
        // but a flat projection is still well-defined.
        project_trivial(chart);
        return;
    }

    let (pin0, pin1) = select_farthest_boundary_pair(chart.chart_mesh(), &boundary);

    let (matrix, rhs) = build_lscm_system(chart.chart_mesh(), n, pin0, pin1);

    let solution = match conjugate_gradient(&matrix, &rhs, MAX_SOLVER_ITERATIONS, SOLVER_TOLERANCE)
    {
        Ok(x) => x,
        Err(_) => {
            // Singular or non-converging system (e.g. collinear chart).
            project_trivial(chart);
            return;
        }
    };

    if solution.iter().any(|x| !x.is_finite()) {
        project_trivial(chart);
        return;
    }

    let mesh = chart.chart_mesh_mut();
    for v in 0..n {
        mesh.vertices[v].tex = Point2::new(solution[v], solution[n + v]);
    }
    // Pinned vertices take their prescribed positions exactly.
    mesh.vertices[pin0].tex = Point2::new(0.0, 0.0);
    mesh.vertices[pin1].tex = Point2::new(1.0, 0.0);
}

/// Trivial direct mapping: project every vertex onto the plane of the
/// chart's first face. Exact (isometric) for single-face charts, and a safe
/// fallback for degenerate ones. Never produces NaN.
fn project_trivial<I: MeshIndex>(chart: &mut Chart<I>) {
    let mesh = chart.chart_mesh_mut();
    if mesh.num_faces() == 0 || mesh.num_vertices() == 0 {
        return;
    }

    let [p0, p1, p2] = mesh.face_positions(crate::mesh::FaceId::new(0));
    let e1 = p1 - p0;
    let e2 = p2 - p0;

    let x_axis = e1
        .try_normalize(1e-12)
        .unwrap_or_else(|| Vector3::new(1.0, 0.0, 0.0));
    let normal = e1.cross(&e2);
    let y_axis = normal
        .cross(&e1)
        .try_normalize(1e-12)
        .unwrap_or_else(|| orthogonal_to(&x_axis));

    for v in 0..mesh.num_vertices() {
        let d = mesh.vertices[v].position - p0;
        mesh.vertices[v].tex = Point2::new(d.dot(&x_axis), d.dot(&y_axis));
    }
}

/// Any unit vector orthogonal to `v`.
fn orthogonal_to(v: &Vector3<f64>) -> Vector3<f64> {
    let candidate = if v.x.abs() < 0.9 {
        Vector3::new(1.0, 0.0, 0.0)
    } else {
        Vector3::new(0.0, 1.0, 0.0)
    };
    v.cross(&candidate)
        .try_normalize(1e-12)
        .unwrap_or_else(|| Vector3::new(0.0, 0.0, 1.0))
}

/// Select the two most distant boundary vertices, which maximizes the
/// conditioning of the pinned system.
fn select_farthest_boundary_pair<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
    boundary: &[usize],
) -> (usize, usize) {
    let mut best = (boundary[0], boundary[0]);
    let mut max_dist = -1.0;
    for (i, &v0) in boundary.iter().enumerate() {
        let p0 = mesh.vertices[v0].position;
        for &v1 in boundary.iter().skip(i + 1) {
            let dist = (mesh.vertices[v1].position - p0).norm_squared();
            if dist > max_dist {
                max_dist = dist;
                best = (v0, v1);
            }
        }
    }
    best
}

/// Assemble the normal equations of the conformal energy.
///
/// For each triangle, projected into a local 2D frame, a linear UV function
/// has gradients expressed through per-vertex coefficients; the conformal
/// energy `(du/dx - dv/dy)^2 + (du/dy + dv/dx)^2`, area-weighted and summed,
/// is quadratic in the 2n unknowns `[u_0..u_n, v_0..v_n]`. The two pins are
/// enforced with penalty terms on the diagonal.
fn build_lscm_system<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
    n: usize,
    pin0: usize,
    pin1: usize,
) -> (CsrMatrix, DVector<f64>) {
    let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(mesh.num_faces() * 36 + 4);
    let mut rhs = DVector::zeros(2 * n);

    for f in mesh.face_ids() {
        let [vi, vj, vk] = mesh.face_triangle(f).map(|v| v.index());
        let [pi, pj, pk] = mesh.face_positions(f);

        if let Some(coeffs) = gradient_coefficients(&pi, &pj, &pk) {
            let (area, grads) = coeffs;
            let verts = [(vi, grads[0]), (vj, grads[1]), (vk, grads[2])];

            for &(a, (ax, ay)) in &verts {
                for &(b, (bx, by)) in &verts {
                    let uu = (ax * bx + ay * by) * area;
                    let uv = (ay * bx - ax * by) * area;

                    triplets.push((a, b, uu)); // u-u block
                    triplets.push((n + a, n + b, uu)); // v-v block
                    triplets.push((a, n + b, uv)); // u-v block
                    triplets.push((n + a, b, -uv)); // v-u block
                }
            }
        }
    }

    // Pin 0 at (0, 0), pin 1 at (1, 0).
    triplets.push((pin0, pin0, PIN_PENALTY));
    triplets.push((n + pin0, n + pin0, PIN_PENALTY));
    triplets.push((pin1, pin1, PIN_PENALTY));
    triplets.push((n + pin1, n + pin1, PIN_PENALTY));
    rhs[pin1] = PIN_PENALTY;

    (CsrMatrix::from_triplets(2 * n, 2 * n, triplets), rhs)
}

/// Per-vertex gradient coefficients of a linear function over the triangle,
/// in the triangle's local 2D frame. Returns `None` for degenerate
/// triangles, which contribute no energy.
#[allow(clippy::type_complexity)]
fn gradient_coefficients(
    pi: &Point3<f64>,
    pj: &Point3<f64>,
    pk: &Point3<f64>,
) -> Option<(f64, [(f64, f64); 3])> {
    let e1 = pj - pi;
    let e2 = pk - pi;

    let e1_len = e1.norm();
    if e1_len < 1e-12 {
        return None;
    }
    let normal = e1.cross(&e2);
    let area = normal.norm() * 0.5;
    if area < 1e-12 {
        return None;
    }

    let x_axis = e1 / e1_len;
    let y_axis = normal.cross(&e1).normalize();

    // Local coordinates: qi = (0, 0), qj = (|e1|, 0), qk = (e2.x, e2.y).
    let qjx = e1_len;
    let qkx = e2.dot(&x_axis);
    let qky = e2.dot(&y_axis);

    // d/dx coefficient of vertex m is (y_next - y_prev) / 2A (cyclic);
    // d/dy coefficient is (x_prev - x_next) / 2A.
    let inv_2a = 1.0 / (2.0 * area);
    let grads = [
        ((0.0 - qky) * inv_2a, (qkx - qjx) * inv_2a),
        ((qky - 0.0) * inv_2a, (0.0 - qkx) * inv_2a),
        ((0.0 - 0.0) * inv_2a, (qjx - 0.0) * inv_2a),
    ];

    Some((area, grads))
}

/// Area-weighted conformal energy of the chart's current UVs.
///
/// Zero for a perfectly conformal (angle-preserving) parameterization; used
/// as the distortion diagnostic. Invariant under rigid transformation of the
/// chart's 3D geometry.
pub(crate) fn conformal_residual<I: MeshIndex>(chart: &Chart<I>) -> f64 {
    let mesh = chart.chart_mesh();
    let mut energy = 0.0;

    for f in mesh.face_ids() {
        let [vi, vj, vk] = mesh.face_triangle(f).map(|v| v.index());
        let [pi, pj, pk] = mesh.face_positions(f);

        if let Some((area, grads)) = gradient_coefficients(&pi, &pj, &pk) {
            let uvs = [
                mesh.vertices[vi].tex,
                mesh.vertices[vj].tex,
                mesh.vertices[vk].tex,
            ];

            let mut du = (0.0, 0.0);
            let mut dv = (0.0, 0.0);
            for m in 0..3 {
                du.0 += grads[m].0 * uvs[m].x;
                du.1 += grads[m].1 * uvs[m].x;
                dv.0 += grads[m].0 * uvs[m].y;
                dv.1 += grads[m].1 * uvs[m].y;
            }

            energy += ((du.0 - dv.1).powi(2) + (du.1 + dv.0).powi(2)) * area;
        }
    }

    energy
}
