//! # uvatlas
//!
//! UV texture atlas generation for arbitrary triangulated surfaces.
//!
//! The pipeline partitions a mesh into charts (locally near-flat,
//! low-distortion regions), computes a conformal 2D parameterization for
//! each chart, and packs all charts into one shared texture domain without
//! overlap. The output is a re-indexed mesh — vertices are duplicated along
//! chart seams — carrying per-vertex UVs in texel coordinates plus the atlas
//! pixel dimensions. Typical consumers are offline content tools baking
//! per-texel data (lighting, ambient occlusion, displacement) onto geometry
//! that lacks authored UVs.
//!
//! ## Features
//!
//! - **Half-edge connectivity**: O(1) adjacency queries with type-safe
//!   indices, colocal-vertex linking, and non-manifold face rejection
//! - **Chart segmentation**: cost-guided greedy growth with proxy-fit,
//!   roundness, straightness, and seam metrics
//! - **Conformal parameterization**: least squares conformal maps with a
//!   sparse preconditioned CG solver and a robust degenerate-chart fallback
//! - **Atlas packing**: occupancy-bitmap placement with configurable texel
//!   density, padding, and quality/time trade-off
//!
//! ## Quick Start
//!
//! ```
//! use uvatlas::generate::{generate, AtlasOptions, InputMesh};
//! use nalgebra::Point3;
//!
//! // A unit quad split into two triangles.
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2], [0, 2, 3]];
//!
//! let input = InputMesh::new(&positions, &faces);
//! let output = generate(&input, &AtlasOptions::default()).unwrap();
//!
//! assert_eq!(output.indices.len(), 6);
//! for vertex in &output.vertices {
//!     // Each output vertex references the input vertex it came from and
//!     // carries a texel-space UV.
//!     assert!(vertex.xref < positions.len());
//!     assert!(vertex.uv.x <= output.atlas_width as f64);
//! }
//! ```
//!
//! ## Staged use
//!
//! The stages can also be driven individually over a built mesh:
//!
//! ```
//! use uvatlas::atlas::{Atlas, SegmentationSettings};
//! use uvatlas::mesh::build_from_triangles;
//! use nalgebra::Point3;
//!
//! # let positions = vec![
//! #     Point3::new(0.0, 0.0, 0.0),
//! #     Point3::new(1.0, 0.0, 0.0),
//! #     Point3::new(0.5, 1.0, 0.0),
//! # ];
//! # let faces = vec![[0, 1, 2]];
//! let built = build_from_triangles::<u32>(&positions, &faces).unwrap();
//!
//! let mut atlas = Atlas::new(&built.mesh).unwrap();
//! atlas.compute_charts(&SegmentationSettings::default()).unwrap();
//! atlas.parameterize_charts().unwrap();
//! let utilization = atlas.pack_charts(1, 8.0, 1).unwrap();
//! assert!(utilization > 0.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod atlas;
pub mod error;
pub mod generate;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// ```
/// use uvatlas::prelude::*;
/// ```
pub mod prelude {
    pub use crate::atlas::{Atlas, Chart, SegmentationSettings};
    pub use crate::error::{AtlasError, Result};
    pub use crate::generate::{generate, AtlasOptions, InputMesh, OutputMesh};
    pub use crate::mesh::{
        build_from_triangles, ChartId, FaceId, HalfEdgeId, HalfEdgeMesh, MeshIndex, VertexId,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    #[test]
    fn test_tetrahedron_pipeline() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];
        let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];

        let input = InputMesh::new(&positions, &faces);
        let output = generate(&input, &AtlasOptions::default()).unwrap();

        assert_eq!(output.non_manifold_faces, 0);
        assert_eq!(output.indices.len(), 12);
        assert!(output.atlas_width > 0 && output.atlas_height > 0);

        // A closed surface needs at least two charts, so seams duplicate
        // some of the 4 input vertices.
        assert!(output.vertices.len() > 4);
    }
}
