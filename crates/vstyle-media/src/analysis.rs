//! Scene characteristics from sampled frames.

use tracing::{debug, warn};

use vstyle_models::{SceneCharacteristics, StyleKind, VideoMetadata};

use crate::frame::{Frame, FrameSource};
use crate::image_ops::{self, Plane};
use crate::params::{optimize_all, OptimizedParams};

/// Default number of frames sampled per video.
pub const DEFAULT_SAMPLE_COUNT: usize = 10;

/// Sobel L1 magnitude at or above which a pixel counts as an edge.
const EDGE_THRESHOLD: f32 = 150.0;
/// Divisor normalizing Laplacian variance into `[0, 1]`.
const NOISE_SCALE: f64 = 10_000.0;

/// Samples evenly spaced frames and summarizes them.
#[derive(Debug, Clone)]
pub struct FrameCharacteristicsAnalyzer {
    sample_count: usize,
}

impl Default for FrameCharacteristicsAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_COUNT)
    }
}

impl FrameCharacteristicsAnalyzer {
    pub fn new(sample_count: usize) -> Self {
        Self {
            sample_count: sample_count.max(1),
        }
    }

    /// Evenly spaced frame indices over `[0, total_frames)`, first and last included.
    pub fn sample_indices(&self, total_frames: u64) -> Vec<u64> {
        if total_frames == 0 {
            return Vec::new();
        }
        let n = self.sample_count as u64;
        if n == 1 {
            return vec![0];
        }
        let last = total_frames - 1;
        let mut indices: Vec<u64> = (0..n).map(|i| i * last / (n - 1)).collect();
        indices.dedup();
        indices
    }

    /// Read the sampled frames from `source`.
    ///
    /// Frames that fail to decode are skipped with a warning.
    pub fn sample_frames(&self, source: &dyn FrameSource, metadata: &VideoMetadata) -> Vec<Frame> {
        let mut frames = Vec::new();
        for index in self.sample_indices(metadata.total_frames) {
            let frame = source
                .open(index)
                .and_then(|mut stream| stream.next().transpose());
            match frame {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => debug!("No frame at sample index {}", index),
                Err(e) => warn!("Failed to sample frame {}: {}", index, e),
            }
        }
        frames
    }

    /// Characteristics of a video; neutral defaults when nothing can be sampled.
    pub fn analyze_source(
        &self,
        source: &dyn FrameSource,
        metadata: &VideoMetadata,
    ) -> SceneCharacteristics {
        let frames = self.sample_frames(source, metadata);
        if frames.is_empty() {
            warn!("No frames could be sampled, using neutral scene characteristics");
        }
        self.analyze_frames(&frames)
    }

    /// Average per-frame statistics, each clipped to `[0, 1]`.
    pub fn analyze_frames(&self, frames: &[Frame]) -> SceneCharacteristics {
        if frames.is_empty() {
            return SceneCharacteristics::neutral();
        }

        let mut sum = FrameStats::default();
        let mut lumas: Vec<Plane> = Vec::with_capacity(frames.len());
        for frame in frames {
            let luma = image_ops::luma(frame);
            sum.add(&FrameStats::measure(frame, &luma));
            lumas.push(luma);
        }

        let n = frames.len() as f64;
        SceneCharacteristics {
            brightness: sum.brightness / n,
            contrast: sum.contrast / n,
            edge_density: sum.edge_density / n,
            color_richness: sum.color_richness / n,
            noise_level: sum.noise_level / n,
            motion_estimate: motion_between(&lumas),
        }
        .clamped()
    }

    /// Analyze and derive parameters for every requested style.
    pub fn derive_params(
        &self,
        scene: &SceneCharacteristics,
        styles: &[StyleKind],
        intensity: f64,
    ) -> OptimizedParams {
        optimize_all(styles, scene, intensity)
    }
}

#[derive(Debug, Default)]
struct FrameStats {
    brightness: f64,
    contrast: f64,
    edge_density: f64,
    color_richness: f64,
    noise_level: f64,
}

impl FrameStats {
    fn measure(frame: &Frame, luma: &Plane) -> Self {
        let pixels = luma.data.len().max(1) as f64;

        let edges = image_ops::sobel_magnitude(luma);
        let edge_pixels = edges.data.iter().filter(|v| **v >= EDGE_THRESHOLD).count();

        let channel_std = (0..3)
            .map(|c| image_ops::channel(frame, c).std_dev())
            .sum::<f64>()
            / 3.0;

        let lap = image_ops::laplacian(luma);

        Self {
            brightness: luma.mean() / 255.0,
            contrast: luma.std_dev() / 128.0,
            edge_density: edge_pixels as f64 / pixels,
            color_richness: channel_std / 128.0,
            noise_level: image_ops::variance(&lap.data) / NOISE_SCALE,
        }
    }

    fn add(&mut self, other: &FrameStats) {
        self.brightness += other.brightness;
        self.contrast += other.contrast;
        self.edge_density += other.edge_density;
        self.color_richness += other.color_richness;
        self.noise_level += other.noise_level;
    }
}

/// Mean absolute luma change between consecutive samples, in `[0, 1]`.
fn motion_between(lumas: &[Plane]) -> f64 {
    let diffs: Vec<f64> = lumas
        .windows(2)
        .filter(|pair| pair[0].data.len() == pair[1].data.len() && !pair[0].data.is_empty())
        .map(|pair| {
            let total: f64 = pair[0]
                .data
                .iter()
                .zip(&pair[1].data)
                .map(|(a, b)| (a - b).abs() as f64)
                .sum();
            total / pair[0].data.len() as f64 / 255.0
        })
        .collect();
    if diffs.is_empty() {
        0.0
    } else {
        diffs.iter().sum::<f64>() / diffs.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_no_frames_returns_neutral_defaults() {
        let analyzer = FrameCharacteristicsAnalyzer::default();
        let c = analyzer.analyze_frames(&[]);
        assert_eq!(c.brightness, 0.5);
        assert_eq!(c.contrast, 0.5);
        assert_eq!(c.edge_density, 0.3);
        assert_eq!(c.color_richness, 0.5);
        assert_eq!(c.noise_level, 0.2);
        assert_eq!(c.motion_estimate, 0.5);
    }

    #[test]
    fn test_sample_indices() {
        let analyzer = FrameCharacteristicsAnalyzer::new(10);
        assert!(analyzer.sample_indices(0).is_empty());
        assert_eq!(analyzer.sample_indices(1), vec![0]);
        let idx = analyzer.sample_indices(300);
        assert_eq!(idx.len(), 10);
        assert_eq!(idx[0], 0);
        assert_eq!(idx[9], 299);
        assert!(idx.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(analyzer.sample_indices(4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_flat_gray_frame() {
        let analyzer = FrameCharacteristicsAnalyzer::default();
        let frame = RgbImage::from_pixel(16, 16, Rgb([255, 255, 255]));
        let c = analyzer.analyze_frames(&[frame.clone(), frame]);
        assert!((c.brightness - 1.0).abs() < 1e-6);
        assert_eq!(c.contrast, 0.0);
        assert_eq!(c.edge_density, 0.0);
        assert_eq!(c.noise_level, 0.0);
        assert_eq!(c.motion_estimate, 0.0);
    }

    #[test]
    fn test_motion_between_black_and_white() {
        let analyzer = FrameCharacteristicsAnalyzer::default();
        let black = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        let white = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        let c = analyzer.analyze_frames(&[black, white]);
        assert!((c.motion_estimate - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_stripes_are_edgy_and_contrasty() {
        let analyzer = FrameCharacteristicsAnalyzer::default();
        let frame = RgbImage::from_fn(16, 16, |x, _| {
            if (x / 2) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let c = analyzer.analyze_frames(&[frame]);
        assert!(c.contrast > 0.9);
        assert!(c.edge_density > 0.5);
        assert_eq!(c.noise_level, 1.0);
        assert_eq!(c.motion_estimate, 0.0);
    }
}
