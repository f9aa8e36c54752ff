//! One-call atlas generation over caller-supplied arrays.
//!
//! This module marshals plain vertex/face arrays into the half-edge mesh,
//! drives the three pipeline stages, and assembles the re-indexed output
//! mesh. Vertices are duplicated along chart seams; every output vertex
//! carries a cross-reference (`xref`) back to the input vertex it was split
//! from, and UVs are absolute texel coordinates in the packed atlas.
//!
//! ```
//! use uvatlas::generate::{generate, AtlasOptions, InputMesh};
//! use nalgebra::Point3;
//!
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2]];
//!
//! let input = InputMesh::new(&positions, &faces);
//! let output = generate(&input, &AtlasOptions::default()).unwrap();
//! assert_eq!(output.indices.len(), 3);
//! assert!(output.atlas_width > 0 && output.atlas_height > 0);
//! ```

use nalgebra::{Point2, Point3, Vector3};

use crate::atlas::{Atlas, SegmentationSettings};
use crate::error::{AtlasError, Result};
use crate::mesh::{
    compute_vertex_normals, derive_canonical_map, FaceId, HalfEdgeMesh, VertexId,
};

/// Caller-supplied mesh arrays.
///
/// Only positions and faces are required. Normals and UVs are seed data for
/// the seam metrics; the canonical map links colocal vertices (derived from
/// exact position equality when absent); materials are carried through to the
/// half-edge faces.
#[derive(Debug, Clone, Copy)]
pub struct InputMesh<'a> {
    /// Vertex positions.
    pub positions: &'a [Point3<f64>],
    /// Per-vertex normals; derived from face geometry when `None`.
    pub normals: Option<&'a [Vector3<f64>]>,
    /// Per-vertex input UVs; zero when `None`.
    pub uvs: Option<&'a [Point2<f64>]>,
    /// `canonical[i]` is the lowest vertex index colocal with vertex `i`.
    pub canonical: Option<&'a [usize]>,
    /// Triangles as vertex index triples.
    pub faces: &'a [[usize; 3]],
    /// Per-face material tags; zero when `None`.
    pub materials: Option<&'a [i32]>,
}

impl<'a> InputMesh<'a> {
    /// An input mesh with positions and faces only.
    pub fn new(positions: &'a [Point3<f64>], faces: &'a [[usize; 3]]) -> Self {
        Self {
            positions,
            normals: None,
            uvs: None,
            canonical: None,
            faces,
            materials: None,
        }
    }
}

/// Chart segmentation algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charter {
    /// Cost-guided greedy region growing (the implemented default).
    Witness,
    /// Use charts extracted from the input UVs. Advertised but not
    /// implemented; requesting it reports [`AtlasError::NotImplemented`].
    Extract,
}

/// Parameterization algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapper {
    /// Least squares conformal maps (the implemented default).
    Lscm,
}

/// Packing algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packer {
    /// Occupancy-bitmap first-fit packing (the implemented default).
    Witness,
}

/// Packer configuration.
#[derive(Debug, Clone)]
pub struct PackerSettings {
    /// Placement search effort; higher values try more candidate positions
    /// and orientations per chart.
    pub packing_quality: u32,
    /// Texels per unit of 3D surface area.
    pub texel_area: f64,
    /// Minimum texel gap between any two charts' rasterized footprints.
    pub texel_padding: u32,
}

/// Options for one atlas generation call.
#[derive(Debug, Clone)]
pub struct AtlasOptions {
    /// Charter selection.
    pub charter: Charter,
    /// Segmentation weights and limits.
    pub segmentation: SegmentationSettings,
    /// Mapper selection.
    pub mapper: Mapper,
    /// Packer selection.
    pub packer: Packer,
    /// Packer configuration.
    pub packing: PackerSettings,
}

impl Default for AtlasOptions {
    fn default() -> Self {
        Self {
            charter: Charter::Witness,
            segmentation: SegmentationSettings::default(),
            mapper: Mapper::Lscm,
            packer: Packer::Witness,
            packing: PackerSettings {
                packing_quality: 1,
                texel_area: 8.0,
                texel_padding: 1,
            },
        }
    }
}

/// One output vertex: a UV in absolute texel coordinates plus the input
/// vertex it cross-references.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputVertex {
    /// UV in texel units within the packed atlas.
    pub uv: Point2<f64>,
    /// Index of the input vertex this output vertex was duplicated from.
    pub xref: usize,
}

/// The re-indexed output mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputMesh {
    /// Output vertices, chart by chart.
    pub vertices: Vec<OutputVertex>,
    /// Flattened triangle indices into `vertices` (3 per accepted face).
    pub indices: Vec<u32>,
    /// Atlas width in texels.
    pub atlas_width: u32,
    /// Atlas height in texels.
    pub atlas_height: u32,
    /// Number of input faces rejected as non-manifold. The output covers the
    /// manifold subset; a nonzero count is the caller's diagnostic.
    pub non_manifold_faces: usize,
    /// Fraction of the atlas covered by chart texels, in [0, 1].
    pub utilization: f64,
}

/// Generate a UV atlas for the input mesh.
///
/// Validates options and face indices, builds the half-edge mesh (counting
/// non-manifold rejections), and runs segmentation, parameterization, and
/// packing in sequence.
///
/// # Errors
///
/// - [`AtlasError::InvalidParameter`] for out-of-range settings or
///   mismatched attribute array lengths,
/// - [`AtlasError::NotImplemented`] for advertised but unimplemented
///   algorithm selections,
/// - [`AtlasError::InvalidVertexIndex`] if a face references a vertex out of
///   range (no mesh is built),
/// - [`AtlasError::EmptyMesh`] if there are no faces or every face was
///   rejected,
/// - [`AtlasError::CanvasLimitExceeded`] if packing outgrows the supported
///   canvas.
pub fn generate(input: &InputMesh<'_>, options: &AtlasOptions) -> Result<OutputMesh> {
    validate_options(options)?;
    validate_input(input)?;

    let (mesh, non_manifold_faces) = input_to_mesh(input);
    if mesh.num_faces() == 0 {
        return Err(AtlasError::EmptyMesh);
    }

    let mut atlas = Atlas::new(&mesh)?;
    atlas.compute_charts(&options.segmentation)?;
    atlas.parameterize_charts()?;
    let utilization = atlas.pack_charts(
        options.packing.packing_quality,
        options.packing.texel_area,
        options.packing.texel_padding,
    )?;

    Ok(assemble_output(
        &mesh,
        &atlas,
        non_manifold_faces,
        utilization,
    ))
}

fn validate_options(options: &AtlasOptions) -> Result<()> {
    if options.charter != Charter::Witness {
        return Err(AtlasError::NotImplemented {
            feature: "extract charter",
        });
    }

    let s = &options.segmentation;
    let weights = [
        ("proxy_fit_metric_weight", s.proxy_fit_metric_weight),
        ("roundness_metric_weight", s.roundness_metric_weight),
        ("straightness_metric_weight", s.straightness_metric_weight),
        ("normal_seam_metric_weight", s.normal_seam_metric_weight),
        ("texture_seam_metric_weight", s.texture_seam_metric_weight),
    ];
    for (name, w) in weights {
        if !(w.is_finite() && w >= 0.0) {
            return Err(AtlasError::invalid_param(name, w, "must be finite and >= 0"));
        }
    }
    if !(s.max_chart_area > 0.0) {
        return Err(AtlasError::invalid_param(
            "max_chart_area",
            s.max_chart_area,
            "must be > 0",
        ));
    }
    if !(s.max_boundary_length > 0.0) {
        return Err(AtlasError::invalid_param(
            "max_boundary_length",
            s.max_boundary_length,
            "must be > 0",
        ));
    }

    let p = &options.packing;
    if !(p.texel_area.is_finite() && p.texel_area > 0.0) {
        return Err(AtlasError::invalid_param(
            "texel_area",
            p.texel_area,
            "must be finite and > 0",
        ));
    }

    Ok(())
}

fn validate_input(input: &InputMesh<'_>) -> Result<()> {
    let n = input.positions.len();
    if let Some(normals) = input.normals {
        if normals.len() != n {
            return Err(AtlasError::invalid_param(
                "normals",
                normals.len(),
                "length must match positions",
            ));
        }
    }
    if let Some(uvs) = input.uvs {
        if uvs.len() != n {
            return Err(AtlasError::invalid_param(
                "uvs",
                uvs.len(),
                "length must match positions",
            ));
        }
    }
    if let Some(canonical) = input.canonical {
        if canonical.len() != n {
            return Err(AtlasError::invalid_param(
                "canonical",
                canonical.len(),
                "length must match positions",
            ));
        }
    }
    if let Some(materials) = input.materials {
        if materials.len() != input.faces.len() {
            return Err(AtlasError::invalid_param(
                "materials",
                materials.len(),
                "length must match faces",
            ));
        }
    }

    // Structural validation is fatal and happens before any mesh is built.
    for (fi, face) in input.faces.iter().enumerate() {
        for &vi in face {
            if vi >= n {
                return Err(AtlasError::InvalidVertexIndex {
                    face: fi,
                    vertex: vi,
                });
            }
        }
    }

    Ok(())
}

/// Marshal the input arrays into a half-edge mesh. Returns the mesh and the
/// count of faces rejected as non-manifold.
fn input_to_mesh(input: &InputMesh<'_>) -> (HalfEdgeMesh<u32>, usize) {
    let mut mesh = HalfEdgeMesh::with_capacity(input.positions.len(), input.faces.len());

    let vertex_ids: Vec<VertexId<u32>> = input
        .positions
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let v = mesh.add_vertex(p);
            if let Some(normals) = input.normals {
                mesh.vertex_mut(v).normal = normals[i];
            }
            if let Some(uvs) = input.uvs {
                mesh.vertex_mut(v).tex = uvs[i];
            }
            v
        })
        .collect();

    match input.canonical {
        Some(map) => mesh.link_colocals_with_canonical_map(map),
        None => {
            let derived = derive_canonical_map(input.positions);
            mesh.link_colocals_with_canonical_map(&derived);
        }
    }

    let mut non_manifold_faces = 0;
    for (fi, face) in input.faces.iter().enumerate() {
        match mesh.add_face(
            vertex_ids[face[0]],
            vertex_ids[face[1]],
            vertex_ids[face[2]],
        ) {
            Some(f) => {
                if let Some(materials) = input.materials {
                    mesh.face_mut(f).material = materials[fi];
                }
            }
            None => non_manifold_faces += 1,
        }
    }

    mesh.link_boundary();

    if input.normals.is_none() {
        compute_vertex_normals(&mut mesh);
    }

    (mesh, non_manifold_faces)
}

/// Assemble the output mesh from a completed atlas.
///
/// A pure function of the atlas state: calling it twice yields identical
/// arrays. Atlas dimensions are always valid here — packing either succeeded
/// completely or the run already failed.
fn assemble_output(
    mesh: &HalfEdgeMesh<u32>,
    atlas: &Atlas<'_, u32>,
    non_manifold_faces: usize,
    utilization: f64,
) -> OutputMesh {
    let mut vertices = Vec::with_capacity(atlas.vertex_count());
    for ci in 0..atlas.chart_count() {
        let chart = atlas.chart_at(ci);
        for v in 0..chart.vertex_count() {
            vertices.push(OutputVertex {
                uv: chart.uv(v),
                xref: chart.map_chart_vertex_to_original_vertex(v).index(),
            });
        }
    }

    let mut indices = Vec::with_capacity(mesh.num_faces() * 3);
    for f in mesh.face_ids() {
        let c = atlas.face_chart_at(f);
        let i = atlas.face_index_within_chart_at(f);
        let offset = atlas.vertex_count_before_chart_at(c.index());

        let chart = atlas.chart_at(c.index());
        debug_assert_eq!(chart.face_at(i), f);

        let chart_face = FaceId::<u32>::new(i);
        for v in chart.chart_mesh().face_triangle(chart_face) {
            indices.push((offset + v.index()) as u32);
        }
    }

    OutputMesh {
        vertices,
        indices,
        atlas_width: atlas.width(),
        atlas_height: atlas.height(),
        non_manifold_faces,
        utilization,
    }
}
