//! Worker configuration.

use std::path::PathBuf;

use vstyle_media::analysis::DEFAULT_SAMPLE_COUNT;
use vstyle_media::params::{DEFAULT_TILE_OVERLAP, DEFAULT_TILE_SIZE};

/// Worker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Directory holding resume checkpoints
    pub checkpoint_dir: PathBuf,
    /// Directory holding custom `<name>.json` presets
    pub presets_dir: PathBuf,
    /// Frames sampled for scene analysis
    pub sample_frames: usize,
    /// Tile edge for inference-based styles
    pub tile_size: u32,
    /// Overlap between neighbouring tiles
    pub tile_overlap: u32,
    /// Port for the Prometheus exporter, disabled when unset
    pub metrics_port: Option<u16>,
    /// ONNX model for the neural style. Without one a blur stands in.
    pub model_path: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from(".checkpoints"),
            presets_dir: PathBuf::from("presets"),
            sample_frames: DEFAULT_SAMPLE_COUNT,
            tile_size: DEFAULT_TILE_SIZE as u32,
            tile_overlap: DEFAULT_TILE_OVERLAP as u32,
            metrics_port: None,
            model_path: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let tile_size = lookup("VSTYLE_TILE_SIZE")
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.tile_size);
        // Overlap must leave a positive stride.
        let tile_overlap = lookup("VSTYLE_TILE_OVERLAP")
            .and_then(|s| s.parse().ok())
            .filter(|o| *o < tile_size)
            .unwrap_or_else(|| defaults.tile_overlap.min(tile_size / 4));

        Self {
            checkpoint_dir: lookup("VSTYLE_CHECKPOINT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.checkpoint_dir),
            presets_dir: lookup("VSTYLE_PRESETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.presets_dir),
            sample_frames: lookup("VSTYLE_SAMPLE_FRAMES")
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.sample_frames),
            tile_size,
            tile_overlap,
            metrics_port: lookup("VSTYLE_METRICS_PORT").and_then(|s| s.parse().ok()),
            model_path: lookup("VSTYLE_MODEL_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = WorkerConfig::from_lookup(lookup(&[]));
        assert_eq!(config, WorkerConfig::default());
        assert_eq!(config.tile_size, 512);
        assert_eq!(config.tile_overlap, 32);
        assert_eq!(config.sample_frames, 10);
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("VSTYLE_CHECKPOINT_DIR", "/var/ckpt"),
            ("VSTYLE_TILE_SIZE", "256"),
            ("VSTYLE_SAMPLE_FRAMES", "0"),
            ("VSTYLE_METRICS_PORT", "9100"),
            ("VSTYLE_TILE_OVERLAP", "lots"),
        ]));
        assert_eq!(config.checkpoint_dir, PathBuf::from("/var/ckpt"));
        assert_eq!(config.tile_size, 256);
        assert_eq!(config.sample_frames, 10);
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.tile_overlap, 32);
    }

    #[test]
    fn test_overlap_must_be_below_tile_size() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("VSTYLE_TILE_SIZE", "64"),
            ("VSTYLE_TILE_OVERLAP", "64"),
        ]));
        assert_eq!(config.tile_overlap, 16);

        let config = WorkerConfig::from_lookup(lookup(&[
            ("VSTYLE_TILE_SIZE", "256"),
            ("VSTYLE_TILE_OVERLAP", "900"),
        ]));
        assert_eq!(config.tile_overlap, 32);

        let config = WorkerConfig::from_lookup(lookup(&[
            ("VSTYLE_TILE_SIZE", "2"),
            ("VSTYLE_TILE_OVERLAP", "5"),
        ]));
        assert_eq!(config.tile_overlap, 0);

        let config = WorkerConfig::from_lookup(lookup(&[
            ("VSTYLE_TILE_SIZE", "64"),
            ("VSTYLE_TILE_OVERLAP", "63"),
        ]));
        assert_eq!(config.tile_overlap, 63);
    }

    #[test]
    fn test_model_path() {
        let config =
            WorkerConfig::from_lookup(lookup(&[("VSTYLE_MODEL_PATH", "/models/udnie.onnx")]));
        assert_eq!(config.model_path, Some(PathBuf::from("/models/udnie.onnx")));
        let config = WorkerConfig::from_lookup(lookup(&[("VSTYLE_MODEL_PATH", " ")]));
        assert_eq!(config.model_path, None);
    }
}
