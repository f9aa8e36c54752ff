//! Chart: a connected, low-distortion region of the mesh surface with its
//! own 2D parameterization.
//!
//! A chart owns a small "chart mesh": a sub-mesh of the input with local
//! vertex numbering, plus the cross-reference from chart-local vertex index
//! back to the original mesh vertex. Parameterization writes parametric UVs
//! into the chart mesh's vertex `tex` fields; packing rescales and
//! repositions them into texel space, never reshaping them.

use std::collections::HashMap;

use nalgebra::Point2;

use crate::mesh::{FaceId, HalfEdgeMesh, MeshIndex, VertexId};

/// A chart: an owned subset of faces forming a connected region.
#[derive(Debug, Clone)]
pub struct Chart<I: MeshIndex = u32> {
    /// Original mesh faces belonging to this chart, in absorption order.
    faces: Vec<FaceId<I>>,
    /// The chart's sub-mesh with local vertex numbering.
    chart_mesh: HalfEdgeMesh<I>,
    /// Chart-local vertex index to original mesh vertex (canonical colocal
    /// representative). This is the seam-duplication cross-reference.
    chart_to_original: Vec<VertexId<I>>,
    /// 3D surface area, cached at build time for the packer's scaling.
    surface_area: f64,
}

impl<I: MeshIndex> Chart<I> {
    /// Extract a chart from the original mesh and a face subset.
    ///
    /// Chart-mesh connectivity is built over canonical colocal
    /// representatives, so input seam duplicates collapse to one chart
    /// vertex. The face subset must be edge-connected and manifold, which
    /// segmentation guarantees.
    pub(crate) fn build(mesh: &HalfEdgeMesh<I>, faces: Vec<FaceId<I>>) -> Self {
        let mut chart_mesh = HalfEdgeMesh::with_capacity(faces.len() * 3, faces.len());
        let mut chart_to_original: Vec<VertexId<I>> = Vec::new();
        let mut local: HashMap<VertexId<I>, VertexId<I>> = HashMap::new();

        let mut surface_area = 0.0;
        for &f in &faces {
            surface_area += mesh.face_area(f);

            let corners = mesh.face_triangle(f).map(|v| {
                let canonical = mesh.canonical(v);
                *local.entry(canonical).or_insert_with(|| {
                    let original = mesh.vertex(canonical);
                    let lv = chart_mesh.add_vertex(original.position);
                    chart_mesh.vertex_mut(lv).normal = original.normal;
                    chart_mesh.vertex_mut(lv).tex = original.tex;
                    chart_to_original.push(canonical);
                    lv
                })
            });

            let added = chart_mesh.add_face(corners[0], corners[1], corners[2]);
            debug_assert!(added.is_some(), "chart face subset must stay manifold");
        }
        chart_mesh.link_boundary();

        Self {
            faces,
            chart_mesh,
            chart_to_original,
            surface_area,
        }
    }

    /// Number of faces in this chart.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Number of chart-local vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.chart_to_original.len()
    }

    /// The original mesh face at chart-local face index `i`.
    #[inline]
    pub fn face_at(&self, i: usize) -> FaceId<I> {
        self.faces[i]
    }

    /// Map a chart-local vertex index back to the original mesh vertex.
    #[inline]
    pub fn map_chart_vertex_to_original_vertex(&self, v: usize) -> VertexId<I> {
        self.chart_to_original[v]
    }

    /// The chart's sub-mesh.
    #[inline]
    pub fn chart_mesh(&self) -> &HalfEdgeMesh<I> {
        &self.chart_mesh
    }

    /// Mutable access for the parameterizer and packer.
    #[inline]
    pub(crate) fn chart_mesh_mut(&mut self) -> &mut HalfEdgeMesh<I> {
        &mut self.chart_mesh
    }

    /// 3D surface area of the chart.
    #[inline]
    pub fn surface_area(&self) -> f64 {
        self.surface_area
    }

    /// The UV assigned to a chart-local vertex.
    #[inline]
    pub fn uv(&self, v: usize) -> Point2<f64> {
        self.chart_mesh.vertices[v].tex
    }

    /// Total area of the chart's triangles in UV space.
    pub fn parametric_area(&self) -> f64 {
        let mut total = 0.0;
        for f in self.chart_mesh.face_ids() {
            let [v0, v1, v2] = self.chart_mesh.face_triangle(f);
            let p0 = self.chart_mesh.vertex(v0).tex;
            let p1 = self.chart_mesh.vertex(v1).tex;
            let p2 = self.chart_mesh.vertex(v2).tex;
            total +=
                0.5 * ((p1.x - p0.x) * (p2.y - p0.y) - (p2.x - p0.x) * (p1.y - p0.y)).abs();
        }
        total
    }

    /// Bounding box of the chart's UVs.
    pub fn uv_bounds(&self) -> (Point2<f64>, Point2<f64>) {
        let mut min = Point2::new(f64::MAX, f64::MAX);
        let mut max = Point2::new(f64::MIN, f64::MIN);
        for v in &self.chart_mesh.vertices {
            min.x = min.x.min(v.tex.x);
            min.y = min.y.min(v.tex.y);
            max.x = max.x.max(v.tex.x);
            max.y = max.y.max(v.tex.y);
        }
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_triangles;
    use nalgebra::Point3;

    fn quad_mesh() -> HalfEdgeMesh<u32> {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let faces = vec![[0, 1, 2], [0, 2, 3]];
        build_from_triangles(&vertices, &faces).unwrap().mesh
    }

    #[test]
    fn test_chart_extraction() {
        let mesh = quad_mesh();
        let chart = Chart::build(&mesh, vec![FaceId::new(0), FaceId::new(1)]);

        assert_eq!(chart.face_count(), 2);
        assert_eq!(chart.vertex_count(), 4);
        assert!((chart.surface_area() - 1.0).abs() < 1e-12);
        assert!(chart.chart_mesh().is_valid());

        // Every chart vertex maps back to a distinct original vertex.
        let mut originals: Vec<usize> = (0..chart.vertex_count())
            .map(|v| chart.map_chart_vertex_to_original_vertex(v).index())
            .collect();
        originals.sort_unstable();
        originals.dedup();
        assert_eq!(originals.len(), 4);
    }

    #[test]
    fn test_single_face_chart() {
        let mesh = quad_mesh();
        let chart = Chart::build(&mesh, vec![FaceId::new(1)]);
        assert_eq!(chart.face_count(), 1);
        assert_eq!(chart.vertex_count(), 3);
        assert!((chart.surface_area() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_parametric_area_from_seed_uvs() {
        let mesh = quad_mesh();
        let mut chart = Chart::build(&mesh, vec![FaceId::new(0), FaceId::new(1)]);
        // Assign the planar positions as UVs directly.
        for i in 0..chart.vertex_count() {
            let p = chart.chart_mesh().vertices[i].position;
            chart.chart_mesh_mut().vertices[i].tex = Point2::new(p.x, p.y);
        }
        assert!((chart.parametric_area() - 1.0).abs() < 1e-12);
        let (min, max) = chart.uv_bounds();
        assert_eq!(min, Point2::new(0.0, 0.0));
        assert_eq!(max, Point2::new(1.0, 1.0));
    }
}
