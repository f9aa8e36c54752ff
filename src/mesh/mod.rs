//! Core mesh data structures.
//!
//! This module provides the half-edge mesh representation used as the
//! connectivity substrate for atlas generation.
//!
//! # Overview
//!
//! The primary type is [`HalfEdgeMesh`], a half-edge (doubly-connected edge
//! list) structure with O(1) adjacency queries. Vertices carry the attributes
//! the pipeline needs (position, normal, seed UV) plus a colocal-group
//! identifier so that seam-duplicated vertices are treated as one point
//! topologically.
//!
//! # Index Types
//!
//! Mesh elements are identified by type-safe index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`HalfEdgeId`] - Identifies a half-edge
//! - [`FaceId`] - Identifies a face
//! - [`ChartId`] - Identifies a chart in the atlas
//!
//! These indices are generic over the underlying integer type ([`MeshIndex`]
//! trait), allowing `u32` (default) or `u64` based on mesh size.
//!
//! # Construction
//!
//! ```
//! use uvatlas::mesh::build_from_triangles;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2]];
//!
//! let built = build_from_triangles::<u32>(&vertices, &faces).unwrap();
//! assert_eq!(built.mesh.num_faces(), 1);
//! ```

mod builder;
mod halfedge;
mod index;

pub use builder::{build_from_triangles, MeshBuildResult};
pub use halfedge::{Face, HalfEdge, HalfEdgeMesh, Vertex};
pub use index::{ChartId, FaceId, HalfEdgeId, MeshIndex, VertexId};

pub(crate) use builder::{compute_vertex_normals, derive_canonical_map};
