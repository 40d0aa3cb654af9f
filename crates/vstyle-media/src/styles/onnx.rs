//! ONNX style transfer model.
//!
//! Expects one NCHW float input in `[0, 1]` and one NCHW float output of the
//! same spatial size, scaled back to bytes by 255. Frames larger than a tile
//! reach this model through [`crate::tiling::TiledInferenceRunner`].

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;
use crate::styles::Stylizer;

pub struct OnnxStyleModel {
    session: Mutex<Session>,
    output_name: String,
    name: String,
    path: PathBuf,
}

impl OnnxStyleModel {
    /// Load a model file.
    ///
    /// Returns error if the file doesn't exist or ONNX Runtime rejects it.
    pub fn load(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MediaError::model_not_found(path));
        }

        let session = create_session(path)?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| MediaError::internal("Model declares no outputs"))?;
        let name = path
            .file_stem()
            .map(|s| format!("onnx:{}", s.to_string_lossy()))
            .unwrap_or_else(|| "onnx".to_string());

        info!(model_path = %path.display(), output = %output_name, "Style model loaded");
        Ok(Self {
            session: Mutex::new(session),
            output_name,
            name,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn run_inference(&self, input: Value) -> MediaResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::stylizer_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            MediaError::stylizer_failed(format!("Missing {} tensor", self.output_name))
        })?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::stylizer_failed(format!("Failed to extract tensor: {}", e)))?;

        Ok(tensor.1.iter().copied().collect())
    }
}

impl Stylizer for OnnxStyleModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, frame: &Frame) -> MediaResult<Frame> {
        let (width, height) = frame.dimensions();
        let shape = vec![1usize, 3, height as usize, width as usize];
        let input = Tensor::from_array((shape, to_nchw(frame).into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::internal(format!("Failed to create tensor: {}", e)))?;

        let output = self.run_inference(input)?;
        from_nchw(&output, width, height)
    }
}

/// HWC bytes to planar floats in `[0, 1]`.
fn to_nchw(frame: &Frame) -> Vec<f32> {
    let (w, h) = frame.dimensions();
    let plane = (w * h) as usize;
    let mut data = vec![0f32; 3 * plane];
    for (i, pixel) in frame.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = pixel[c] as f32 / 255.0;
        }
    }
    data
}

/// Planar floats back to an image, clipped to the byte range.
fn from_nchw(data: &[f32], width: u32, height: u32) -> MediaResult<Frame> {
    let plane = (width * height) as usize;
    if data.len() != 3 * plane {
        return Err(MediaError::stylizer_failed(format!(
            "Model output has {} values, expected {} for {}x{}",
            data.len(),
            3 * plane,
            width,
            height
        )));
    }

    let mut out = RgbImage::new(width, height);
    for (i, pixel) in out.pixels_mut().enumerate() {
        for c in 0..3 {
            pixel[c] = (data[c * plane + i] * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(out)
}

fn create_session(model_path: &Path) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::internal(format!("Failed to read model file: {}", e)))?;

    let builder = Session::builder()
        .map_err(|e| MediaError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::internal(format!("Failed to set optimization level: {}", e)))?;

    debug!("Using CPU execution provider for style model");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::internal(format!("Failed to load ONNX model: {}", e)))
}
