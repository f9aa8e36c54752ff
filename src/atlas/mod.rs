//! The atlas pipeline: chart segmentation, conformal parameterization, and
//! packing, plus the aggregate query surface consumed by output assembly.
//!
//! # Stages
//!
//! [`Atlas`] owns the ordered chart list and drives the three stages in
//! sequence, exactly once each per instance:
//!
//! 1. [`Atlas::compute_charts`] partitions every face into charts,
//! 2. [`Atlas::parameterize_charts`] assigns each chart a 2D
//!    parameterization,
//! 3. [`Atlas::pack_charts`] places all charts into one shared texel grid
//!    and reports the achieved utilization.
//!
//! Data flows strictly forward; packing rescales and repositions chart UVs
//! but never reshapes them. The orchestrator performs no geometric
//! computation itself.

mod chart;
mod pack;
mod param;
mod progress;
mod raster;
mod segment;
mod sparse;

pub use chart::Chart;
pub use pack::MAX_CANVAS_SIZE;
pub use progress::Progress;
pub use raster::draw_triangle;
pub use segment::SegmentationSettings;

use crate::error::{AtlasError, Result};
use crate::mesh::{ChartId, FaceId, HalfEdgeMesh, MeshIndex};

/// The atlas aggregate: ordered chart list, derived per-chart offsets, and
/// the final packed dimensions.
///
/// Created once per generation call around a built mesh; the query surface
/// becomes fully populated as the stages run.
#[derive(Debug)]
pub struct Atlas<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    charts: Vec<Chart<I>>,
    /// Prefix sums of chart vertex counts; `vertex_offsets[i]` is the number
    /// of output vertices before chart `i`.
    vertex_offsets: Vec<usize>,
    face_chart: Vec<ChartId<I>>,
    face_index_in_chart: Vec<usize>,
    parameterized: bool,
    width: u32,
    height: u32,
}

impl<'a, I: MeshIndex> Atlas<'a, I> {
    /// Create an atlas over a built mesh.
    ///
    /// # Errors
    /// [`AtlasError::EmptyMesh`] if the mesh has zero faces; no partial chart
    /// state is observable afterwards.
    pub fn new(mesh: &'a HalfEdgeMesh<I>) -> Result<Self> {
        if mesh.num_faces() == 0 {
            return Err(AtlasError::EmptyMesh);
        }
        Ok(Self {
            mesh,
            charts: Vec::new(),
            vertex_offsets: vec![0],
            face_chart: Vec::new(),
            face_index_in_chart: Vec::new(),
            parameterized: false,
            width: 0,
            height: 0,
        })
    }

    /// Partition all faces into charts under the given settings.
    ///
    /// Must be called exactly once per instance.
    pub fn compute_charts(&mut self, settings: &SegmentationSettings) -> Result<()> {
        self.compute_charts_with_progress(settings, &Progress::none())
    }

    /// [`compute_charts`](Self::compute_charts) with progress reporting.
    pub fn compute_charts_with_progress(
        &mut self,
        settings: &SegmentationSettings,
        progress: &Progress,
    ) -> Result<()> {
        if !self.charts.is_empty() {
            return Err(AtlasError::InvalidState("charts already computed"));
        }

        let mesh = self.mesh;
        let face_lists = segment::compute_charts(mesh, settings, progress);

        self.face_chart = vec![ChartId::invalid(); mesh.num_faces()];
        self.face_index_in_chart = vec![0; mesh.num_faces()];
        for (ci, faces) in face_lists.iter().enumerate() {
            for (fi, f) in faces.iter().enumerate() {
                self.face_chart[f.index()] = ChartId::new(ci);
                self.face_index_in_chart[f.index()] = fi;
            }
        }

        self.charts = face_lists
            .into_iter()
            .map(|faces| Chart::build(mesh, faces))
            .collect();

        self.vertex_offsets = Vec::with_capacity(self.charts.len() + 1);
        self.vertex_offsets.push(0);
        for chart in &self.charts {
            let last = *self.vertex_offsets.last().unwrap();
            self.vertex_offsets.push(last + chart.vertex_count());
        }

        Ok(())
    }

    /// Assign a 2D parameterization to every chart, in place.
    ///
    /// Requires charts to exist.
    pub fn parameterize_charts(&mut self) -> Result<()> {
        if self.charts.is_empty() {
            return Err(AtlasError::InvalidState(
                "parameterize_charts requires computed charts",
            ));
        }
        param::parameterize_charts(&mut self.charts);
        self.parameterized = true;
        Ok(())
    }

    /// Pack all parameterized charts into a shared texel grid.
    ///
    /// Rewrites chart UVs into absolute texel coordinates, sets the atlas
    /// dimensions, and returns the achieved utilization in [0, 1] as a
    /// diagnostic. The canvas grows until every chart fits, up to
    /// [`MAX_CANVAS_SIZE`] texels per side.
    pub fn pack_charts(&mut self, quality: u32, texel_area: f64, padding: u32) -> Result<f64> {
        self.pack_charts_with_progress(quality, texel_area, padding, &Progress::none())
    }

    /// [`pack_charts`](Self::pack_charts) with progress reporting.
    pub fn pack_charts_with_progress(
        &mut self,
        quality: u32,
        texel_area: f64,
        padding: u32,
        progress: &Progress,
    ) -> Result<f64> {
        if !self.parameterized {
            return Err(AtlasError::InvalidState(
                "pack_charts requires parameterized charts",
            ));
        }

        let result = pack::pack_charts(&mut self.charts, quality, texel_area, padding, progress)?;
        self.width = result.width;
        self.height = result.height;
        Ok(result.utilization)
    }

    // ==================== Query surface ====================

    /// Number of charts.
    #[inline]
    pub fn chart_count(&self) -> usize {
        self.charts.len()
    }

    /// The chart at the given index.
    #[inline]
    pub fn chart_at(&self, i: usize) -> &Chart<I> {
        &self.charts[i]
    }

    /// Total output vertex count across all charts (seam duplicates
    /// included).
    #[inline]
    pub fn vertex_count(&self) -> usize {
        *self.vertex_offsets.last().unwrap()
    }

    /// Number of output vertices belonging to charts before chart `i`: the
    /// offset of chart `i`'s vertices in the flattened output array.
    #[inline]
    pub fn vertex_count_before_chart_at(&self, i: usize) -> usize {
        self.vertex_offsets[i]
    }

    /// The chart containing a mesh face.
    #[inline]
    pub fn face_chart_at(&self, f: FaceId<I>) -> ChartId<I> {
        self.face_chart[f.index()]
    }

    /// The face's index within its chart.
    #[inline]
    pub fn face_index_within_chart_at(&self, f: FaceId<I>) -> usize {
        self.face_index_in_chart[f.index()]
    }

    /// Final atlas width in texels (valid after packing).
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Final atlas height in texels (valid after packing).
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }
}
