//! Mesh construction utilities.
//!
//! This module provides a convenience constructor that builds a half-edge
//! mesh from a plain face-vertex list, deriving the colocal canonical map
//! from exact positions and counting non-manifold rejections.

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};

use super::halfedge::HalfEdgeMesh;
use super::index::{MeshIndex, VertexId};
use crate::error::{AtlasError, Result};

/// Result of building a half-edge mesh from input arrays.
#[derive(Debug)]
pub struct MeshBuildResult<I: MeshIndex = u32> {
    /// The constructed mesh, containing only the accepted (manifold) faces.
    pub mesh: HalfEdgeMesh<I>,
    /// Number of input faces rejected because they would have created a
    /// non-manifold edge. Construction continues with the manifold subset;
    /// this count is the caller's diagnostic.
    pub non_manifold_faces: usize,
}

/// Build a half-edge mesh from vertices and triangle faces.
///
/// Colocal vertices (exactly equal positions) are linked automatically, and
/// vertex normals are derived from the accepted faces so the normal-seam
/// metric has data to work with.
///
/// # Errors
///
/// Returns [`AtlasError::InvalidVertexIndex`] if any face references a vertex
/// index out of range (checked before any construction), and
/// [`AtlasError::EmptyMesh`] if no face is accepted.
///
/// # Example
/// ```
/// use uvatlas::mesh::build_from_triangles;
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let built = build_from_triangles::<u32>(&vertices, &faces).unwrap();
/// assert_eq!(built.mesh.num_faces(), 1);
/// assert_eq!(built.non_manifold_faces, 0);
/// ```
pub fn build_from_triangles<I: MeshIndex>(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> Result<MeshBuildResult<I>> {
    for (fi, face) in faces.iter().enumerate() {
        for &vi in face {
            if vi >= vertices.len() {
                return Err(AtlasError::InvalidVertexIndex {
                    face: fi,
                    vertex: vi,
                });
            }
        }
    }

    let mut mesh = HalfEdgeMesh::with_capacity(vertices.len(), faces.len());
    let vertex_ids: Vec<VertexId<I>> = vertices.iter().map(|&p| mesh.add_vertex(p)).collect();

    let canonical = derive_canonical_map(vertices);
    mesh.link_colocals_with_canonical_map(&canonical);

    let mut non_manifold_faces = 0;
    for face in faces {
        let added = mesh.add_face(
            vertex_ids[face[0]],
            vertex_ids[face[1]],
            vertex_ids[face[2]],
        );
        if added.is_none() {
            non_manifold_faces += 1;
        }
    }

    if mesh.num_faces() == 0 {
        return Err(AtlasError::EmptyMesh);
    }

    mesh.link_boundary();
    compute_vertex_normals(&mut mesh);

    Ok(MeshBuildResult {
        mesh,
        non_manifold_faces,
    })
}

/// Derive a colocal canonical map from exact position equality.
///
/// `result[i]` is the lowest vertex index whose position bit-pattern equals
/// vertex `i`'s.
pub(crate) fn derive_canonical_map(vertices: &[Point3<f64>]) -> Vec<usize> {
    let mut first_seen: HashMap<[u64; 3], usize> = HashMap::with_capacity(vertices.len());
    let mut map = Vec::with_capacity(vertices.len());
    for (i, p) in vertices.iter().enumerate() {
        let key = [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
        let canonical = *first_seen.entry(key).or_insert(i);
        map.push(canonical);
    }
    map
}

/// Set each vertex normal to the area-weighted average of its incident face
/// normals. Colocal duplicates share the accumulated normal of their group,
/// so derived normals never introduce spurious normal seams.
pub(crate) fn compute_vertex_normals<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>) {
    let n = mesh.num_vertices();
    let mut accum = vec![Vector3::zeros(); n];

    for f in mesh.face_ids().collect::<Vec<_>>() {
        let [p0, p1, p2] = mesh.face_positions(f);
        let weighted = (p1 - p0).cross(&(p2 - p0)); // area-weighted, unnormalized
        for v in mesh.face_triangle(f) {
            accum[mesh.canonical(v).index()] += weighted;
        }
    }

    for i in 0..n {
        let c = mesh.canonical(VertexId::new(i)).index();
        let normal = accum[c]
            .try_normalize(1e-12)
            .unwrap_or_else(Vector3::zeros);
        mesh.vertex_mut(VertexId::new(i)).normal = normal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
        ];
        let faces = vec![[0, 1, 2], [1, 0, 3]];
        (vertices, faces)
    }

    #[test]
    fn test_build_two_triangles() {
        let (vertices, faces) = two_triangles();
        let built = build_from_triangles::<u32>(&vertices, &faces).unwrap();

        assert_eq!(built.mesh.num_vertices(), 4);
        assert_eq!(built.mesh.num_faces(), 2);
        assert_eq!(built.non_manifold_faces, 0);
        assert!(built.mesh.is_valid());
    }

    #[test]
    fn test_invalid_vertex_index() {
        let vertices = vec![Point3::new(0.0, 0.0, 0.0)];
        let faces = vec![[0, 1, 2]];

        match build_from_triangles::<u32>(&vertices, &faces) {
            Err(AtlasError::InvalidVertexIndex { face: 0, vertex: 1 }) => {}
            other => panic!("expected InvalidVertexIndex, got {:?}", other),
        }
    }

    #[test]
    fn test_non_manifold_counted() {
        let (mut vertices, mut faces) = two_triangles();
        vertices.push(Point3::new(0.5, 0.5, 1.0));
        faces.push([0, 1, 4]); // third face on the shared edge

        let built = build_from_triangles::<u32>(&vertices, &faces).unwrap();
        assert_eq!(built.mesh.num_faces(), 2);
        assert_eq!(built.non_manifold_faces, 1);
    }

    #[test]
    fn test_all_faces_rejected() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ];
        let faces = vec![[0, 0, 1]];
        assert!(matches!(
            build_from_triangles::<u32>(&vertices, &faces),
            Err(AtlasError::EmptyMesh)
        ));
    }

    #[test]
    fn test_derive_canonical_map() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0), // colocal with 0
        ];
        assert_eq!(derive_canonical_map(&vertices), vec![0, 1, 0]);
    }

    #[test]
    fn test_vertex_normals_flat() {
        let (vertices, faces) = two_triangles();
        let built = build_from_triangles::<u32>(&vertices, &faces).unwrap();
        for (_, v) in built.mesh.vertices() {
            assert!((v.normal.z.abs() - 1.0).abs() < 1e-12);
        }
    }
}
