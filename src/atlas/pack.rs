//! Atlas packing: placement of chart parameterizations into one shared,
//! non-overlapping texel grid.
//!
//! Each chart's UVs are first rescaled so its parametric area matches
//! `texel_area` texels per unit of 3D surface area, then rasterized into a
//! per-chart occupancy bitmap dilated by the texel padding. Charts are placed
//! largest-first with a bottom-left first-fit scan over a growing canvas
//! bitmap; the packing quality level controls the scan granularity and how
//! many discrete rotations are tried per chart. Packing cannot fail to place
//! a chart — the canvas doubles until everything fits — up to the documented
//! [`MAX_CANVAS_SIZE`] cap.

use nalgebra::{Point2, Vector2};

use super::chart::Chart;
use super::progress::Progress;
use super::raster::draw_triangle;
use crate::error::{AtlasError, Result};
use crate::mesh::MeshIndex;

/// Maximum supported canvas extent, in texels per side.
///
/// Growing past this aborts packing with
/// [`AtlasError::CanvasLimitExceeded`]; it is the packer's only failure mode.
pub const MAX_CANVAS_SIZE: usize = 16384;

/// Result of packing: final atlas dimensions and achieved utilization.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PackResult {
    pub width: u32,
    pub height: u32,
    /// Fraction of the atlas covered by chart texels, in [0, 1].
    pub utilization: f64,
}

/// A row-major occupancy bitmap.
#[derive(Debug, Clone)]
struct BitGrid {
    width: usize,
    height: usize,
    words: Vec<u64>,
}

impl BitGrid {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            words: vec![0; (width * height + 63) / 64],
        }
    }

    #[inline]
    fn get(&self, x: usize, y: usize) -> bool {
        let bit = y * self.width + x;
        self.words[bit / 64] >> (bit % 64) & 1 != 0
    }

    #[inline]
    fn set(&mut self, x: usize, y: usize) {
        let bit = y * self.width + x;
        self.words[bit / 64] |= 1 << (bit % 64);
    }

    fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Copy into a larger grid, preserving coordinates.
    fn grown_to(&self, width: usize, height: usize) -> Self {
        let mut out = Self::new(width, height);
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    out.set(x, y);
                }
            }
        }
        out
    }

    /// One step of 8-neighborhood dilation.
    fn dilated(&self) -> Self {
        let mut out = self.clone();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    continue;
                }
                let x0 = x.saturating_sub(1);
                let y0 = y.saturating_sub(1);
                let x1 = (x + 1).min(self.width - 1);
                let y1 = (y + 1).min(self.height - 1);
                'scan: for ny in y0..=y1 {
                    for nx in x0..=x1 {
                        if self.get(nx, ny) {
                            out.set(x, y);
                            break 'scan;
                        }
                    }
                }
            }
        }
        out
    }
}

/// A chart's rasterized, padding-dilated placement mask for one rotation.
struct Footprint {
    width: usize,
    height: usize,
    grid: BitGrid,
    /// Content texels before dilation, for the utilization metric.
    content_texels: usize,
}

/// Rotate a content-space UV by `rotation` quarter turns within a content box
/// of pre-rotation extents `(w, h)`.
fn rotate_uv(uv: Point2<f64>, rotation: usize, w: f64, h: f64) -> Point2<f64> {
    match rotation {
        0 => uv,
        1 => Point2::new(h - uv.y, uv.x),
        2 => Point2::new(w - uv.x, h - uv.y),
        _ => Point2::new(uv.y, w - uv.x),
    }
}

/// Rotated content extents.
fn rotated_extents(rotation: usize, w: usize, h: usize) -> (usize, usize) {
    if rotation % 2 == 0 {
        (w, h)
    } else {
        (h, w)
    }
}

/// Number of quarter-turn orientations tried at a quality level.
fn rotation_trials(quality: u32) -> usize {
    match quality {
        0 | 1 => 1,
        2 | 3 => 2,
        _ => 4,
    }
}

/// Placement scan granularity at a quality level.
fn scan_step(quality: u32) -> usize {
    (4usize).saturating_sub(quality as usize).max(1)
}

fn next_pow2(v: usize) -> usize {
    v.max(1).next_power_of_two()
}

/// Place every chart into a shared texel grid and rewrite its UVs into
/// absolute texel coordinates.
///
/// `quality` controls the placement search effort, `texel_area` the texels
/// allocated per unit of 3D surface area, and `padding` the minimum texel gap
/// between any two charts' rasterized footprints.
pub(crate) fn pack_charts<I: MeshIndex>(
    charts: &mut [Chart<I>],
    quality: u32,
    texel_area: f64,
    padding: u32,
    progress: &Progress,
) -> Result<PackResult> {
    let padding = padding as usize;

    // Rescale each chart from parametric units to texel units and move its
    // UV origin to zero. This fixes the rasterization scale before placement;
    // placement itself only translates and rotates.
    let mut content_dims: Vec<(usize, usize)> = Vec::with_capacity(charts.len());
    for chart in charts.iter_mut() {
        let parametric = chart.parametric_area();
        let scale = if parametric > 1e-12 {
            (texel_area * chart.surface_area() / parametric).sqrt()
        } else {
            1.0
        };

        let (min, _) = chart.uv_bounds();
        let mesh = chart.chart_mesh_mut();
        for v in 0..mesh.num_vertices() {
            let uv = mesh.vertices[v].tex;
            mesh.vertices[v].tex = Point2::new((uv.x - min.x) * scale, (uv.y - min.y) * scale);
        }

        let (_, max) = chart.uv_bounds();
        content_dims.push((
            (max.x.ceil() as usize).max(1),
            (max.y.ceil() as usize).max(1),
        ));
    }

    // Largest bounding area first reduces fragmentation; ties keep chart
    // order for reproducibility.
    let mut order: Vec<usize> = (0..charts.len()).collect();
    order.sort_by_key(|&i| (std::cmp::Reverse(content_dims[i].0 * content_dims[i].1), i));

    let max_side = content_dims
        .iter()
        .map(|&(w, h)| (w.max(h)) + 2 * padding)
        .max()
        .unwrap_or(1);
    let total_area: usize = content_dims
        .iter()
        .map(|&(w, h)| (w + 2 * padding) * (h + 2 * padding))
        .sum();
    let initial = next_pow2(max_side.max((total_area as f64).sqrt().ceil() as usize));
    if initial > MAX_CANVAS_SIZE {
        return Err(AtlasError::CanvasLimitExceeded {
            required: initial,
            max: MAX_CANVAS_SIZE,
        });
    }

    let mut canvas = BitGrid::new(initial, initial);
    let mut used_w = 0usize;
    let mut used_h = 0usize;
    let mut content_total = 0usize;

    let rotations = rotation_trials(quality);
    let step = scan_step(quality);

    for (placed, &ci) in order.iter().enumerate() {
        let (cw, ch) = content_dims[ci];
        let footprints: Vec<Footprint> = (0..rotations)
            .map(|r| rasterize_footprint(&charts[ci], r, cw, ch, padding))
            .collect();

        let placement = loop {
            match scan_first_fit(&canvas, &footprints, step) {
                Some(p) => break p,
                None => {
                    let grown = canvas.width * 2;
                    if grown > MAX_CANVAS_SIZE {
                        return Err(AtlasError::CanvasLimitExceeded {
                            required: grown,
                            max: MAX_CANVAS_SIZE,
                        });
                    }
                    canvas = canvas.grown_to(grown, grown);
                }
            }
        };

        let (px, py, rotation) = placement;
        let fp = &footprints[rotation];
        for y in 0..fp.height {
            for x in 0..fp.width {
                if fp.grid.get(x, y) {
                    canvas.set(px + x, py + y);
                }
            }
        }
        used_w = used_w.max(px + fp.width);
        used_h = used_h.max(py + fp.height);
        content_total += fp.content_texels;

        // Rewrite the chart's UVs into absolute texel coordinates.
        let offset = Vector2::new((px + padding) as f64, (py + padding) as f64);
        let (w, h) = (cw as f64, ch as f64);
        let mesh = charts[ci].chart_mesh_mut();
        for v in 0..mesh.num_vertices() {
            let uv = mesh.vertices[v].tex;
            mesh.vertices[v].tex = rotate_uv(uv, rotation, w, h) + offset;
        }

        progress.report(placed + 1, charts.len(), "packing charts");
    }

    let width = used_w.max(1);
    let height = used_h.max(1);
    Ok(PackResult {
        width: width as u32,
        height: height as u32,
        utilization: content_total as f64 / (width * height) as f64,
    })
}

/// Rasterize a chart's triangles (under `rotation` quarter turns) into a
/// footprint bitmap with a dilation border of `padding` texels.
fn rasterize_footprint<I: MeshIndex>(
    chart: &Chart<I>,
    rotation: usize,
    content_w: usize,
    content_h: usize,
    padding: usize,
) -> Footprint {
    let (rw, rh) = rotated_extents(rotation, content_w, content_h);
    let width = rw + 2 * padding;
    let height = rh + 2 * padding;
    let mut grid = BitGrid::new(width, height);

    let mesh = chart.chart_mesh();
    let offset = Vector2::new(padding as f64, padding as f64);
    let (w, h) = (content_w as f64, content_h as f64);
    for f in mesh.face_ids() {
        let verts = mesh
            .face_triangle(f)
            .map(|v| rotate_uv(mesh.vertices[v.index()].tex, rotation, w, h) + offset);
        draw_triangle(width, height, &verts, |x, y, _, _, _, _| {
            grid.set(x, y);
            true
        });
    }

    let content_texels = grid.count_ones();
    for _ in 0..padding {
        grid = grid.dilated();
    }

    Footprint {
        width,
        height,
        grid,
        content_texels,
    }
}

/// Bottom-left first-fit: scan positions in (y, x) order with the given
/// step; at each position try the rotation variants in order and accept the
/// first collision-free combination.
fn scan_first_fit(
    canvas: &BitGrid,
    footprints: &[Footprint],
    step: usize,
) -> Option<(usize, usize, usize)> {
    for y in (0..canvas.height).step_by(step) {
        for x in (0..canvas.width).step_by(step) {
            for (r, fp) in footprints.iter().enumerate() {
                if x + fp.width > canvas.width || y + fp.height > canvas.height {
                    continue;
                }
                if fits(canvas, fp, x, y) {
                    return Some((x, y, r));
                }
            }
        }
    }
    None
}

fn fits(canvas: &BitGrid, fp: &Footprint, px: usize, py: usize) -> bool {
    for y in 0..fp.height {
        for x in 0..fp.width {
            if fp.grid.get(x, y) && canvas.get(px + x, py + y) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::param::parameterize_chart;
    use crate::mesh::{build_from_triangles, FaceId};
    use nalgebra::Point3;

    fn triangle_chart(scale: f64) -> Chart<u32> {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(scale, 0.0, 0.0),
            Point3::new(0.0, scale, 0.0),
        ];
        let faces = vec![[0, 1, 2]];
        let built = build_from_triangles(&vertices, &faces).unwrap();
        let mut chart = Chart::build(&built.mesh, vec![FaceId::new(0)]);
        parameterize_chart(&mut chart);
        chart
    }

    /// Content texel set of a chart from its final (texel-space) UVs.
    fn content_texels(chart: &Chart<u32>, w: usize, h: usize) -> Vec<(usize, usize)> {
        let mesh = chart.chart_mesh();
        let mut texels = std::collections::BTreeSet::new();
        for f in mesh.face_ids() {
            let verts = mesh.face_triangle(f).map(|v| mesh.vertices[v.index()].tex);
            draw_triangle(w, h, &verts, |x, y, _, _, _, _| {
                texels.insert((x, y));
                true
            });
        }
        texels.into_iter().collect()
    }

    #[test]
    fn test_pack_single_chart() {
        let mut charts = vec![triangle_chart(2.0)];
        let result = pack_charts(&mut charts, 1, 8.0, 1, &Progress::none()).unwrap();

        assert!(result.width > 0 && result.height > 0);
        assert!(result.utilization > 0.0 && result.utilization <= 1.0);

        // Final UVs are absolute texel coordinates inside the atlas.
        for v in 0..charts[0].vertex_count() {
            let uv = charts[0].uv(v);
            assert!(uv.x >= 0.0 && uv.x <= result.width as f64);
            assert!(uv.y >= 0.0 && uv.y <= result.height as f64);
        }
    }

    #[test]
    fn test_pack_respects_padding() {
        let padding = 2usize;
        let mut charts = vec![triangle_chart(2.0), triangle_chart(1.5), triangle_chart(1.0)];
        let result =
            pack_charts(&mut charts, 1, 32.0, padding as u32, &Progress::none()).unwrap();

        let w = result.width as usize;
        let h = result.height as usize;
        let sets: Vec<Vec<(usize, usize)>> =
            charts.iter().map(|c| content_texels(c, w, h)).collect();

        for i in 0..sets.len() {
            for j in (i + 1)..sets.len() {
                let mut min_dist = usize::MAX;
                for &(ax, ay) in &sets[i] {
                    for &(bx, by) in &sets[j] {
                        let d = ax.abs_diff(bx).max(ay.abs_diff(by));
                        min_dist = min_dist.min(d);
                    }
                }
                assert!(
                    min_dist >= padding,
                    "charts {} and {} only {} texels apart",
                    i,
                    j,
                    min_dist
                );
            }
        }
    }

    #[test]
    fn test_pack_no_overlap() {
        let mut charts = vec![triangle_chart(2.0), triangle_chart(2.0)];
        let result = pack_charts(&mut charts, 1, 16.0, 0, &Progress::none()).unwrap();

        let w = result.width as usize;
        let h = result.height as usize;
        let a: std::collections::BTreeSet<_> =
            content_texels(&charts[0], w, h).into_iter().collect();
        let b: std::collections::BTreeSet<_> =
            content_texels(&charts[1], w, h).into_iter().collect();
        assert!(a.is_disjoint(&b));
    }

    #[test]
    fn test_pack_deterministic() {
        let run = || {
            let mut charts = vec![triangle_chart(2.0), triangle_chart(1.0)];
            let result = pack_charts(&mut charts, 1, 8.0, 1, &Progress::none()).unwrap();
            let uvs: Vec<_> = (0..charts[0].vertex_count())
                .map(|v| charts[0].uv(v))
                .chain((0..charts[1].vertex_count()).map(|v| charts[1].uv(v)))
                .collect();
            (result.width, result.height, uvs)
        };
        let (w1, h1, uv1) = run();
        let (w2, h2, uv2) = run();
        assert_eq!(w1, w2);
        assert_eq!(h1, h2);
        assert_eq!(uv1, uv2);
    }

    #[test]
    fn test_pack_with_rotations() {
        let mut charts = vec![triangle_chart(3.0), triangle_chart(2.0)];
        let result = pack_charts(&mut charts, 4, 8.0, 1, &Progress::none()).unwrap();
        assert!(result.width > 0 && result.height > 0);
        for chart in &charts {
            for v in 0..chart.vertex_count() {
                let uv = chart.uv(v);
                assert!(uv.x.is_finite() && uv.y.is_finite());
                assert!(uv.x >= -1e-9 && uv.y >= -1e-9);
            }
        }
    }

    #[test]
    fn test_texel_density_scaling() {
        // Quadrupling texel_area should roughly double linear chart size.
        let mut low = vec![triangle_chart(2.0)];
        let mut high = vec![triangle_chart(2.0)];
        pack_charts(&mut low, 1, 8.0, 0, &Progress::none()).unwrap();
        pack_charts(&mut high, 1, 32.0, 0, &Progress::none()).unwrap();

        let extent = |charts: &[Chart<u32>]| {
            let (min, max) = charts[0].uv_bounds();
            (max - min).norm()
        };
        let ratio = extent(&high) / extent(&low);
        assert!((ratio - 2.0).abs() < 0.2, "ratio {}", ratio);
    }

    #[test]
    fn test_bitgrid() {
        let mut g = BitGrid::new(70, 3);
        assert!(!g.get(65, 2));
        g.set(65, 2);
        assert!(g.get(65, 2));
        assert_eq!(g.count_ones(), 1);

        let grown = g.grown_to(128, 8);
        assert!(grown.get(65, 2));
        assert_eq!(grown.count_ones(), 1);

        let dilated = g.dilated();
        assert!(dilated.get(64, 1));
        assert!(dilated.get(66, 2));
        // 3x3 neighborhood clipped at the bottom edge of the 3-row grid.
        assert_eq!(dilated.count_ones(), 6);
    }
}
