//! Cinematic grade: highlight bloom, teal/orange split tone, film grain, vignette.

use image::RgbImage;
use rand::Rng;
use rayon::prelude::*;

use vstyle_models::StyleParams;

use crate::error::MediaResult;
use crate::frame::Frame;
use crate::image_ops::{luma_of, to_u8};
use crate::styles::Stylizer;

/// Luma (0-1) above which highlights bloom.
const BLOOM_KNEE: f32 = 0.7;
/// Split-tone shift in 0-255 units at full shadow/highlight.
const TONE_SHIFT: f32 = 12.0;

#[derive(Debug, Clone)]
pub struct CinematicStylizer {
    bloom: f32,
    grain: f32,
    vignette: f32,
}

impl CinematicStylizer {
    pub fn new(bloom: f32, grain: f32, vignette: f32) -> Self {
        Self {
            bloom: bloom.max(0.0),
            grain: grain.max(0.0),
            vignette: vignette.clamp(0.0, 1.0),
        }
    }

    pub fn from_params(params: &StyleParams) -> Self {
        Self::new(
            params.f64_or("bloom_strength", 0.3) as f32,
            params.f64_or("grain_strength", 0.02) as f32,
            params.f64_or("vignette_strength", 0.4) as f32,
        )
    }

    fn grade_pixel(&self, rgb: [u8; 3], falloff: f32, noise: f32) -> [u8; 3] {
        let l = luma_of(rgb[0], rgb[1], rgb[2]) / 255.0;
        let bloom = self.bloom * ((l - BLOOM_KNEE).max(0.0) / (1.0 - BLOOM_KNEE)) * 255.0 * 0.5;
        // Warm highlights, cool shadows.
        let tone = (l - 0.5) * 2.0 * TONE_SHIFT;
        let shifts = [tone, 0.0, -tone];
        let grain = noise * self.grain * 255.0;

        let mut out = [0u8; 3];
        for c in 0..3 {
            let v = (rgb[c] as f32 + bloom + shifts[c]) * falloff + grain;
            out[c] = to_u8(v);
        }
        out
    }
}

impl Stylizer for CinematicStylizer {
    fn name(&self) -> &str {
        "cinematic"
    }

    fn process(&self, frame: &Frame) -> MediaResult<Frame> {
        let (width, height) = frame.dimensions();
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        let max_dist_sq = (cx * cx + cy * cy).max(1.0);
        let row_len = width as usize * 3;

        let mut out = frame.as_raw().clone();
        if row_len == 0 {
            return Ok(frame.clone());
        }
        out.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| {
                let mut rng = rand::rng();
                let dy = y as f32 + 0.5 - cy;
                for (x, px) in row.chunks_exact_mut(3).enumerate() {
                    let dx = x as f32 + 0.5 - cx;
                    let falloff = 1.0 - self.vignette * (dx * dx + dy * dy) / max_dist_sq;
                    let noise = if self.grain > 0.0 {
                        rng.random_range(-1.0f32..1.0)
                    } else {
                        0.0
                    };
                    let graded = self.grade_pixel([px[0], px[1], px[2]], falloff, noise);
                    px.copy_from_slice(&graded);
                }
            });

        Ok(RgbImage::from_raw(width, height, out).unwrap_or_else(|| frame.clone()))
    }
}
