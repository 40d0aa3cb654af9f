//! Small image kernels shared by the analyzer and the stylizers.

use image::RgbImage;
use rayon::prelude::*;

/// Single-channel float plane in row-major order.
#[derive(Debug, Clone)]
pub struct Plane {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl Plane {
    #[inline]
    pub fn at(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }

    /// Value with coordinates clamped to the border.
    #[inline]
    fn at_clamped(&self, x: i64, y: i64) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.at(x, y)
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|v| *v as f64).sum::<f64>() / self.data.len() as f64
    }

    pub fn std_dev(&self) -> f64 {
        variance(&self.data).sqrt()
    }
}

/// BT.601 luma, 0-255.
#[inline]
pub fn luma_of(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// Luma plane of an RGB frame.
pub fn luma(frame: &RgbImage) -> Plane {
    let data = frame
        .as_raw()
        .par_chunks_exact(3)
        .map(|p| luma_of(p[0], p[1], p[2]))
        .collect();
    Plane {
        width: frame.width(),
        height: frame.height(),
        data,
    }
}

/// One color channel as a plane.
pub fn channel(frame: &RgbImage, index: usize) -> Plane {
    let data = frame
        .as_raw()
        .chunks_exact(3)
        .map(|p| p[index] as f32)
        .collect();
    Plane {
        width: frame.width(),
        height: frame.height(),
        data,
    }
}

/// Sobel gradient magnitude (L1 norm of the two responses).
pub fn sobel_magnitude(plane: &Plane) -> Plane {
    let w = plane.width;
    let data = (0..plane.data.len())
        .into_par_iter()
        .map(|i| {
            let x = (i as u32 % w) as i64;
            let y = (i as u32 / w) as i64;
            let p = |dx: i64, dy: i64| plane.at_clamped(x + dx, y + dy);
            let gx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
            let gy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
            gx.abs() + gy.abs()
        })
        .collect();
    Plane {
        width: plane.width,
        height: plane.height,
        data,
    }
}

/// 4-neighbour Laplacian response.
pub fn laplacian(plane: &Plane) -> Plane {
    let w = plane.width;
    let data = (0..plane.data.len())
        .into_par_iter()
        .map(|i| {
            let x = (i as u32 % w) as i64;
            let y = (i as u32 / w) as i64;
            let p = |dx: i64, dy: i64| plane.at_clamped(x + dx, y + dy);
            p(-1, 0) + p(1, 0) + p(0, -1) + p(0, 1) - 4.0 * p(0, 0)
        })
        .collect();
    Plane {
        width: plane.width,
        height: plane.height,
        data,
    }
}

/// Population variance.
pub fn variance(data: &[f32]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let n = data.len() as f64;
    let mean = data.iter().map(|v| *v as f64).sum::<f64>() / n;
    data.iter()
        .map(|v| {
            let d = *v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

#[inline]
pub fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
