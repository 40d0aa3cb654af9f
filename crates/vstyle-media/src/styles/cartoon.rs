//! Cartoon: smoothed, posterized colors with dark outlines.

use image::{imageops, Rgb, RgbImage};

use vstyle_models::StyleParams;

use crate::error::MediaResult;
use crate::frame::Frame;
use crate::image_ops::{luma, sobel_magnitude};
use crate::styles::Stylizer;

/// Sobel L1 responses are roughly four times a gradient-threshold scale.
const SOBEL_SCALE: f32 = 4.0;

#[derive(Debug, Clone)]
pub struct CartoonStylizer {
    num_colors: u32,
    edge_low: f32,
    edge_high: f32,
    smooth_sigma: f32,
}

impl CartoonStylizer {
    pub fn from_params(params: &StyleParams) -> Self {
        let diameter = params.f64_or("bilateral_d", 9.0) as f32;
        let sigma_color = params.f64_or("bilateral_sigma_color", 75.0) as f32;
        Self {
            num_colors: params.i64_or("num_colors", 8).clamp(2, 256) as u32,
            edge_low: params.f64_or("edge_threshold1", 50.0) as f32 * SOBEL_SCALE,
            edge_high: params.f64_or("edge_threshold2", 150.0) as f32 * SOBEL_SCALE,
            smooth_sigma: (diameter / 3.0) * (sigma_color / 75.0),
        }
    }

    fn quantize(&self, v: u8) -> u8 {
        let levels = self.num_colors as f32;
        let step = 255.0 / (levels - 1.0);
        ((v as f32 / step).round() * step).round().clamp(0.0, 255.0) as u8
    }
}

impl Stylizer for CartoonStylizer {
    fn name(&self) -> &str {
        "cartoon"
    }

    fn process(&self, frame: &Frame) -> MediaResult<Frame> {
        let smoothed = if self.smooth_sigma > 0.05 {
            imageops::blur(frame, self.smooth_sigma)
        } else {
            frame.clone()
        };
        let edges = sobel_magnitude(&luma(frame));

        Ok(RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
            let p = smoothed.get_pixel(x, y);
            let mut out = [self.quantize(p[0]), self.quantize(p[1]), self.quantize(p[2])];
            let e = edges.at(x, y);
            let darken = if e >= self.edge_high {
                0.0
            } else if e >= self.edge_low {
                0.5
            } else {
                1.0
            };
            for c in out.iter_mut() {
                *c = (*c as f32 * darken) as u8;
            }
            Rgb(out)
        }))
    }
}
