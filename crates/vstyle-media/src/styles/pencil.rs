//! Pencil sketch: grayscale color-dodge of the image over its blurred negative.

use image::{imageops, GrayImage, Luma, Rgb, RgbImage};

use vstyle_models::StyleParams;

use crate::error::MediaResult;
use crate::frame::Frame;
use crate::image_ops::{luma_of, to_u8};
use crate::styles::Stylizer;

#[derive(Debug, Clone)]
pub struct PencilStylizer {
    blur_sigma: f32,
    use_texture: bool,
}

impl PencilStylizer {
    pub fn new(blur_sigma: f32, use_texture: bool) -> Self {
        Self {
            blur_sigma: blur_sigma.max(0.1),
            use_texture,
        }
    }

    pub fn from_params(params: &StyleParams) -> Self {
        Self::new(
            params.f64_or("blur_sigma", 21.0) as f32,
            params.bool_or("use_texture", false),
        )
    }
}

impl Stylizer for PencilStylizer {
    fn name(&self) -> &str {
        "pencil_sketch"
    }

    fn process(&self, frame: &Frame) -> MediaResult<Frame> {
        let gray = GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
            let p = frame.get_pixel(x, y);
            Luma([to_u8(luma_of(p[0], p[1], p[2]))])
        });
        let mut inverted = gray.clone();
        imageops::invert(&mut inverted);
        let blurred = imageops::blur(&inverted, self.blur_sigma);

        Ok(RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
            let base = gray.get_pixel(x, y)[0] as f32;
            let blend = blurred.get_pixel(x, y)[0] as f32;
            let mut v = if blend >= 255.0 {
                255.0
            } else {
                (base * 255.0 / (255.0 - blend)).min(255.0)
            };
            if self.use_texture {
                v *= paper_grain(x, y);
            }
            let v = to_u8(v);
            Rgb([v, v, v])
        }))
    }
}

/// Deterministic paper texture in `[0.9, 1.0]`.
fn paper_grain(x: u32, y: u32) -> f32 {
    let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2C1B_3C6D);
    h ^= h >> 12;
    0.9 + 0.1 * (h & 0xFF) as f32 / 255.0
}
