//! Temporal smoothing between consecutive stylized frames.

use image::RgbImage;

use crate::frame::Frame;
use crate::image_ops::to_u8;

/// Default blend factor for the newest frame.
pub const DEFAULT_ALPHA: f32 = 0.3;

/// Exponential moving average over frames to reduce stylization flicker.
///
/// Holds the previous output; call [`TemporalSmoother::reset`] whenever the
/// frame sequence is not contiguous (new chunk, new style).
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    alpha: f32,
    previous: Option<(u32, u32, Vec<f32>)>,
}

impl Default for TemporalSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

impl TemporalSmoother {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            previous: None,
        }
    }

    /// Blend `frame` with the running average and return the result.
    pub fn smooth(&mut self, frame: &Frame) -> Frame {
        let (width, height) = frame.dimensions();
        let current = frame.as_raw();

        let blended: Vec<f32> = match &self.previous {
            Some((w, h, prev)) if *w == width && *h == height => current
                .iter()
                .zip(prev)
                .map(|(c, p)| self.alpha * *c as f32 + (1.0 - self.alpha) * p)
                .collect(),
            _ => current.iter().map(|c| *c as f32).collect(),
        };

        let bytes: Vec<u8> = blended.iter().map(|v| to_u8(*v)).collect();
        self.previous = Some((width, height, blended));

        // Length always matches width * height * 3.
        RgbImage::from_raw(width, height, bytes).unwrap_or_else(|| frame.clone())
    }

    /// Forget the previous frame.
    pub fn reset(&mut self) {
        self.previous = None;
    }
}
