//! Tiled inference with feathered blending.
//!
//! Inference models are trained on fixed-size inputs. Large frames are cut
//! into overlapping tiles, each tile is stylized on its own, and the results
//! are blended back with per-tile weights that fall off towards the tile
//! edges. Overlapping contributions are normalized by the accumulated
//! weight. This suppresses seams but is not multi-resolution blending, so
//! models whose output depends on global context can still show tile
//! boundaries.

use image::{Rgb, RgbImage};
use ndarray::{Array2, Array3};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::trace;

use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;
use crate::image_ops::to_u8;
use crate::styles::Stylizer;

/// Weight sums are floored at this value before normalizing.
const WEIGHT_EPSILON: f32 = 1e-6;

/// Feathering weights for a tile of a given extent.
#[derive(Debug, Clone)]
pub struct TileWeightMap {
    weights: Array2<f32>,
}

impl TileWeightMap {
    /// Build weights for a `height` x `width` tile.
    ///
    /// Each axis ramps up linearly over `overlap` pixels from each edge and
    /// is 1 in the interior; the map is the product of both axes. The ramp
    /// starts at `1 / (overlap + 1)` rather than 0 so pixels on the frame
    /// border, covered by a single tile, keep a usable weight.
    pub fn new(height: u32, width: u32, overlap: u32) -> Self {
        let ys: Vec<f32> = (0..height).map(|i| ramp(i, height, overlap)).collect();
        let xs: Vec<f32> = (0..width).map(|i| ramp(i, width, overlap)).collect();
        let weights = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            ys[y] * xs[x]
        });
        Self { weights }
    }

    #[inline]
    pub fn at(&self, y: u32, x: u32) -> f32 {
        self.weights[[y as usize, x as usize]]
    }

    pub fn dims(&self) -> (u32, u32) {
        let (h, w) = self.weights.dim();
        (h as u32, w as u32)
    }
}

fn ramp(i: u32, len: u32, overlap: u32) -> f32 {
    if overlap == 0 {
        return 1.0;
    }
    let dist = i.min(len - 1 - i) as f32;
    ((dist + 1.0) / (overlap as f32 + 1.0)).min(1.0)
}

/// Runs a stylizer over a frame tile by tile.
#[derive(Debug, Default)]
pub struct TiledInferenceRunner {
    weight_cache: Mutex<HashMap<(u32, u32, u32), Arc<TileWeightMap>>>,
}

impl TiledInferenceRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stylize `frame`, tiling it when it exceeds `tile_size` on either axis.
    pub fn run(
        &self,
        frame: &Frame,
        stylizer: &dyn Stylizer,
        tile_size: u32,
        overlap: u32,
    ) -> MediaResult<Frame> {
        if tile_size == 0 {
            return Err(MediaError::invalid_argument("tile size must be positive"));
        }

        let (width, height) = frame.dimensions();
        if width <= tile_size && height <= tile_size {
            return stylizer.process(frame);
        }

        if overlap >= tile_size {
            return Err(MediaError::invalid_argument(format!(
                "overlap {} must be smaller than tile size {}",
                overlap, tile_size
            )));
        }
        let stride = tile_size - overlap;

        let mut acc = Array3::<f32>::zeros((height as usize, width as usize, 3));
        let mut weight_sum = Array2::<f32>::zeros((height as usize, width as usize));

        let columns = tile_origins(width, tile_size, stride);
        for y in tile_origins(height, tile_size, stride) {
            for &x in &columns {
                let tile_h = tile_size.min(height - y);
                let tile_w = tile_size.min(width - x);

                let tile = extract_padded(frame, x, y, tile_w, tile_h, tile_size);
                let styled = stylizer.process(&tile)?;
                if styled.dimensions() != (tile_size, tile_size) {
                    return Err(MediaError::stylizer_failed(format!(
                        "{} returned a {}x{} tile for a {}x{} input",
                        stylizer.name(),
                        styled.width(),
                        styled.height(),
                        tile_size,
                        tile_size
                    )));
                }

                let weights = self.weight_map(tile_h, tile_w, overlap);
                for ty in 0..tile_h {
                    for tx in 0..tile_w {
                        let w = weights.at(ty, tx);
                        let p = styled.get_pixel(tx, ty);
                        let (fy, fx) = ((y + ty) as usize, (x + tx) as usize);
                        for c in 0..3 {
                            acc[[fy, fx, c]] += p[c] as f32 * w;
                        }
                        weight_sum[[fy, fx]] += w;
                    }
                }
                trace!("Blended tile at ({}, {}) size {}x{}", x, y, tile_w, tile_h);
            }
        }

        Ok(RgbImage::from_fn(width, height, |x, y| {
            let (fy, fx) = (y as usize, x as usize);
            let w = weight_sum[[fy, fx]].max(WEIGHT_EPSILON);
            Rgb([
                to_u8(acc[[fy, fx, 0]] / w),
                to_u8(acc[[fy, fx, 1]] / w),
                to_u8(acc[[fy, fx, 2]] / w),
            ])
        }))
    }

    /// Cached weight map for a tile extent.
    pub fn weight_map(&self, height: u32, width: u32, overlap: u32) -> Arc<TileWeightMap> {
        let key = (height, width, overlap);
        let mut cache = match self.weight_cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            cache
                .entry(key)
                .or_insert_with(|| Arc::new(TileWeightMap::new(height, width, overlap))),
        )
    }

    /// Number of distinct weight maps built so far.
    pub fn cached_weight_maps(&self) -> usize {
        match self.weight_cache.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Tile start offsets along one axis. Stepping stops at the first tile
/// that reaches the far edge.
fn tile_origins(len: u32, tile_size: u32, stride: u32) -> Vec<u32> {
    let mut origins = vec![0];
    let mut pos = 0;
    while pos + tile_size < len {
        pos += stride;
        origins.push(pos);
    }
    origins
}

/// Copy a `w` x `h` region at (`x0`, `y0`) into a `size` x `size` tile,
/// mirroring the region (without repeating its edge pixel) to fill the rest.
fn extract_padded(frame: &Frame, x0: u32, y0: u32, w: u32, h: u32, size: u32) -> Frame {
    RgbImage::from_fn(size, size, |tx, ty| {
        let sx = reflect(tx, w);
        let sy = reflect(ty, h);
        *frame.get_pixel(x0 + sx, y0 + sy)
    })
}

/// Map an index onto `[0, len)` by repeated mirroring.
fn reflect(i: u32, len: u32) -> u32 {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let m = i % period;
    if m < len {
        m
    } else {
        period - m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::styles::IdentityStylizer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Inverts colors and counts calls.
    struct CountingInvert {
        calls: AtomicUsize,
    }

    impl Stylizer for CountingInvert {
        fn name(&self) -> &str {
            "counting-invert"
        }

        fn process(&self, frame: &Frame) -> MediaResult<Frame> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut out = frame.clone();
            for p in out.pixels_mut() {
                p.0 = [255 - p[0], 255 - p[1], 255 - p[2]];
            }
            Ok(out)
        }
    }

    fn gradient(width: u32, height: u32) -> Frame {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_small_frame_bypasses_tiling() {
        let runner = TiledInferenceRunner::new();
        let stylizer = CountingInvert {
            calls: AtomicUsize::new(0),
        };
        let frame = gradient(64, 48);

        let tiled = runner.run(&frame, &stylizer, 64, 8).unwrap();
        let direct = stylizer.process(&frame).unwrap();

        assert_eq!(tiled, direct);
        assert_eq!(stylizer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(runner.cached_weight_maps(), 0);
    }

    #[test]
    fn test_identity_is_preserved_across_tiles() {
        let runner = TiledInferenceRunner::new();
        let frame = gradient(150, 97);

        let out = runner.run(&frame, &IdentityStylizer, 64, 16).unwrap();

        assert_eq!(out.dimensions(), frame.dimensions());
        assert_eq!(out, frame);
    }

    #[test]
    fn test_pointwise_stylizer_matches_direct_application() {
        let runner = TiledInferenceRunner::new();
        let stylizer = CountingInvert {
            calls: AtomicUsize::new(0),
        };
        let frame = gradient(130, 70);

        let tiled = runner.run(&frame, &stylizer, 48, 8).unwrap();
        let direct = stylizer.process(&frame).unwrap();
        assert_eq!(tiled, direct);
        // stride 40: x starts 0,40,80,120; y starts 0,40
        assert_eq!(stylizer.calls.load(Ordering::SeqCst), 1 + 8);
    }

    #[test]
    fn test_no_tile_past_the_edge() {
        assert_eq!(tile_origins(992, 512, 480), vec![0, 480]);
        assert_eq!(tile_origins(1000, 512, 480), vec![0, 480, 960]);
        assert_eq!(tile_origins(512, 512, 480), vec![0]);
        assert_eq!(tile_origins(513, 512, 512), vec![0, 512]);
    }

    #[test]
    fn test_edge_aligned_frame_runs_no_extra_tiles() {
        let runner = TiledInferenceRunner::new();
        let stylizer = CountingInvert {
            calls: AtomicUsize::new(0),
        };
        // stride 12: a tile at 12 already ends on the right edge
        let frame = gradient(28, 28);

        let tiled = runner.run(&frame, &stylizer, 16, 4).unwrap();
        assert_eq!(stylizer.calls.load(Ordering::SeqCst), 4);
        assert_eq!(tiled, stylizer.process(&frame).unwrap());
    }

    #[test]
    fn test_weight_maps_are_cached_by_extent() {
        let runner = TiledInferenceRunner::new();
        let a = runner.weight_map(32, 32, 8);
        let b = runner.weight_map(32, 32, 8);
        assert!(Arc::ptr_eq(&a, &b));
        runner.weight_map(32, 16, 8);
        assert_eq!(runner.cached_weight_maps(), 2);
    }

    #[test]
    fn test_weight_map_feathers_edges() {
        let map = TileWeightMap::new(32, 32, 8);
        assert_eq!(map.dims(), (32, 32));
        assert!(map.at(0, 16) > 0.0);
        assert!(map.at(0, 16) < map.at(4, 16));
        assert_eq!(map.at(16, 16), 1.0);
        assert_eq!(map.at(31, 16), map.at(0, 16));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_tile() {
        let runner = TiledInferenceRunner::new();
        let err = runner
            .run(&gradient(100, 100), &IdentityStylizer, 32, 32)
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidArgument(_)));
    }

    #[test]
    fn test_reflect() {
        assert_eq!(reflect(0, 4), 0);
        assert_eq!(reflect(3, 4), 3);
        assert_eq!(reflect(4, 4), 2);
        assert_eq!(reflect(6, 4), 0);
        assert_eq!(reflect(7, 4), 1);
        assert_eq!(reflect(9, 1), 0);
    }
}
