//! Comic: halftone dots on paper with inked edges.

use image::{Rgb, RgbImage};

use vstyle_models::StyleParams;

use crate::error::MediaResult;
use crate::frame::Frame;
use crate::image_ops::{luma, luma_of, sobel_magnitude};
use crate::styles::Stylizer;

const PAPER: Rgb<u8> = Rgb([250, 246, 235]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);
/// Sobel L1 magnitude treated as a drawn line.
const EDGE_THRESHOLD: f32 = 600.0;

#[derive(Debug, Clone)]
pub struct ComicStylizer {
    dot_size: u32,
    edge_thickness: u32,
}

impl ComicStylizer {
    pub fn from_params(params: &StyleParams) -> Self {
        Self {
            dot_size: params.i64_or("dot_size", 3).clamp(1, 64) as u32,
            edge_thickness: params.i64_or("edge_thickness", 2).clamp(0, 16) as u32,
        }
    }

    /// Average color of the cell containing (x, y).
    fn cell_color(frame: &Frame, cx: u32, cy: u32, cell: u32) -> [f32; 3] {
        let x1 = (cx + cell).min(frame.width());
        let y1 = (cy + cell).min(frame.height());
        let mut sum = [0f32; 3];
        let mut n = 0f32;
        for y in cy..y1 {
            for x in cx..x1 {
                let p = frame.get_pixel(x, y);
                for c in 0..3 {
                    sum[c] += p[c] as f32;
                }
                n += 1.0;
            }
        }
        sum.map(|s| s / n.max(1.0))
    }
}

impl Stylizer for ComicStylizer {
    fn name(&self) -> &str {
        "comic"
    }

    fn process(&self, frame: &Frame) -> MediaResult<Frame> {
        let (width, height) = frame.dimensions();
        let cell = self.dot_size * 2;
        let edges = sobel_magnitude(&luma(frame));

        let cols = width.div_ceil(cell);
        let rows = height.div_ceil(cell);
        let mut cells = Vec::with_capacity((cols * rows) as usize);
        for row in 0..rows {
            for col in 0..cols {
                cells.push(Self::cell_color(frame, col * cell, row * cell, cell));
            }
        }

        let reach = self.edge_thickness / 2;
        let is_edge = |x: u32, y: u32| -> bool {
            let x0 = x.saturating_sub(reach);
            let y0 = y.saturating_sub(reach);
            let x1 = (x + reach).min(width - 1);
            let y1 = (y + reach).min(height - 1);
            (y0..=y1).any(|yy| (x0..=x1).any(|xx| edges.at(xx, yy) >= EDGE_THRESHOLD))
        };

        Ok(RgbImage::from_fn(width, height, |x, y| {
            if self.edge_thickness > 0 && is_edge(x, y) {
                return INK;
            }
            let (col, row) = (x / cell, y / cell);
            let color = cells[(row * cols + col) as usize];
            let darkness = (1.0 - luma_of(color[0] as u8, color[1] as u8, color[2] as u8) / 255.0).max(0.0);

            // Dot area tracks darkness; radius reaches the cell corner at full ink.
            let half = cell as f32 / 2.0;
            let radius = half * std::f32::consts::SQRT_2 * darkness.sqrt();
            let dx = (x % cell) as f32 + 0.5 - half;
            let dy = (y % cell) as f32 + 0.5 - half;
            if (dx * dx + dy * dy).sqrt() <= radius {
                // Deepen the dot color so flat areas still read as printed ink.
                Rgb(color.map(|c| (c * 0.8) as u8))
            } else {
                PAPER
            }
        }))
    }
}
