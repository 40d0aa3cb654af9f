//! Stylizers.
//!
//! Each [`StyleKind`] maps to one stylizer implementing the [`Stylizer`]
//! trait. Stylizers are stateless per call; temporal smoothing is layered
//! on top by the pipeline.

use std::sync::Arc;
use tracing::warn;

use vstyle_models::{StyleKind, StyleParams};

use crate::error::MediaResult;
use crate::frame::Frame;
use crate::params::{DEFAULT_TILE_OVERLAP, DEFAULT_TILE_SIZE};
use crate::tiling::TiledInferenceRunner;

pub mod cartoon;
pub mod cinematic;
pub mod comic;
pub mod neural;
pub mod onnx;
pub mod pencil;

pub use cartoon::CartoonStylizer;
pub use cinematic::CinematicStylizer;
pub use comic::ComicStylizer;
pub use neural::{BlurFallbackModel, InferenceStylizer};
pub use onnx::OnnxStyleModel;
pub use pencil::PencilStylizer;

/// Per-frame pixel transform.
///
/// Output must have the input's dimensions.
pub trait Stylizer: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Transform one frame.
    fn process(&self, frame: &Frame) -> MediaResult<Frame>;
}

/// Returns frames unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityStylizer;

impl Stylizer for IdentityStylizer {
    fn name(&self) -> &str {
        "identity"
    }

    fn process(&self, frame: &Frame) -> MediaResult<Frame> {
        Ok(frame.clone())
    }
}

/// Factory for creating stylizers from a style and its parameters.
#[derive(Clone)]
pub struct StylizerFactory {
    runner: Arc<TiledInferenceRunner>,
    inference_model: Option<Arc<dyn Stylizer>>,
}

impl Default for StylizerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl StylizerFactory {
    /// Create a new factory without an inference model.
    pub fn new() -> Self {
        Self {
            runner: Arc::new(TiledInferenceRunner::new()),
            inference_model: None,
        }
    }

    /// Use `model` for [`StyleKind::Neural`].
    pub fn with_inference_model(mut self, model: Arc<dyn Stylizer>) -> Self {
        self.inference_model = Some(model);
        self
    }

    /// Shared tiling runner (weight maps are cached across jobs).
    pub fn runner(&self) -> &Arc<TiledInferenceRunner> {
        &self.runner
    }

    /// Create a stylizer for `style`.
    pub fn create(&self, style: StyleKind, params: &StyleParams) -> Box<dyn Stylizer> {
        match style {
            StyleKind::Pencil => Box::new(PencilStylizer::from_params(params)),
            StyleKind::Cartoon => Box::new(CartoonStylizer::from_params(params)),
            StyleKind::Comic => Box::new(ComicStylizer::from_params(params)),
            StyleKind::Cinematic => Box::new(CinematicStylizer::from_params(params)),
            StyleKind::Neural => {
                let model = match &self.inference_model {
                    Some(model) => Arc::clone(model),
                    None => {
                        warn!("No inference model configured, neural style degrades to blur");
                        Arc::new(BlurFallbackModel::default()) as Arc<dyn Stylizer>
                    }
                };
                let tile_size = params.i64_or("tile_size", DEFAULT_TILE_SIZE).max(1) as u32;
                let overlap = params.i64_or("overlap", DEFAULT_TILE_OVERLAP).max(0) as u32;
                Box::new(InferenceStylizer::new(
                    model,
                    Arc::clone(&self.runner),
                    tile_size,
                    overlap,
                ))
            }
        }
    }
}
