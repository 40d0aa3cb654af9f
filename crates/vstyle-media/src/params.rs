//! Per-style parameter derivation from scene characteristics.
//!
//! Each style starts from fixed defaults, takes overrides from a threshold
//! rule table keyed on [`SceneCharacteristics`], then is scaled by the job's
//! effect intensity according to each parameter's class.

use std::collections::BTreeMap;

use vstyle_models::{ParamValue, SceneCharacteristics, StyleKind, StyleParams};

/// Parameters resolved for every style of one job.
pub type OptimizedParams = BTreeMap<StyleKind, StyleParams>;

/// Default neural tile edge in pixels.
pub const DEFAULT_TILE_SIZE: i64 = 512;
/// Default neural tile overlap in pixels.
pub const DEFAULT_TILE_OVERLAP: i64 = 32;

/// Palette sizes never drop below this after intensity scaling.
const MIN_PALETTE: i64 = 2;
/// Palette size the count rule scales away from.
const MAX_PALETTE: i64 = 16;

/// How a parameter reacts to effect intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamClass {
    /// Multiplied by the intensity
    Strength,
    /// Discrete level count; higher intensity gives fewer levels
    Count,
    /// Left unchanged
    Fixed,
}

impl ParamClass {
    pub fn of(key: &str) -> Self {
        match key {
            "blur_sigma" | "bilateral_sigma_color" | "bilateral_sigma_space" => {
                ParamClass::Strength
            }
            k if k.ends_with("_strength") => ParamClass::Strength,
            "num_colors" => ParamClass::Count,
            _ => ParamClass::Fixed,
        }
    }
}

/// Built-in defaults for a style.
pub fn default_params(style: StyleKind) -> StyleParams {
    match style {
        StyleKind::Pencil => StyleParams::new()
            .with("blur_sigma", ParamValue::Float(21.0))
            .with("use_texture", ParamValue::Bool(false)),
        StyleKind::Cartoon => StyleParams::new()
            .with("num_colors", ParamValue::Int(8))
            .with("edge_threshold1", ParamValue::Int(50))
            .with("edge_threshold2", ParamValue::Int(150))
            .with("bilateral_d", ParamValue::Int(9))
            .with("bilateral_sigma_color", ParamValue::Float(75.0))
            .with("bilateral_sigma_space", ParamValue::Float(75.0)),
        StyleKind::Comic => StyleParams::new()
            .with("dot_size", ParamValue::Int(3))
            .with("edge_thickness", ParamValue::Int(2)),
        StyleKind::Cinematic => StyleParams::new()
            .with("bloom_strength", ParamValue::Float(0.3))
            .with("grain_strength", ParamValue::Float(0.02))
            .with("vignette_strength", ParamValue::Float(0.4)),
        StyleKind::Neural => StyleParams::new()
            .with("tile_size", ParamValue::Int(DEFAULT_TILE_SIZE))
            .with("overlap", ParamValue::Int(DEFAULT_TILE_OVERLAP)),
    }
}

/// Threshold rules mapping scene statistics to parameter overrides.
pub fn derive_overrides(style: StyleKind, scene: &SceneCharacteristics) -> StyleParams {
    match style {
        StyleKind::Pencil => {
            let mut blur = 21.0;
            if scene.contrast > 0.7 {
                blur *= 0.7;
            } else if scene.contrast < 0.3 {
                blur *= 1.3;
            }
            StyleParams::new()
                .with("blur_sigma", ParamValue::Float(blur))
                .with("use_texture", ParamValue::Bool(scene.noise_level < 0.3))
        }
        StyleKind::Cartoon => {
            let num_colors = if scene.color_richness > 0.7 {
                12
            } else if scene.color_richness > 0.4 {
                8
            } else {
                6
            };
            let (t1, t2) = if scene.edge_density < 0.2 {
                (30, 120)
            } else {
                (50, 150)
            };
            StyleParams::new()
                .with("num_colors", ParamValue::Int(num_colors))
                .with("edge_threshold1", ParamValue::Int(t1))
                .with("edge_threshold2", ParamValue::Int(t2))
        }
        StyleKind::Comic => {
            let dot_size = if scene.edge_density > 0.5 {
                2
            } else if scene.edge_density > 0.3 {
                3
            } else {
                4
            };
            StyleParams::new()
                .with("dot_size", ParamValue::Int(dot_size))
                .with("edge_thickness", ParamValue::Int(2))
        }
        StyleKind::Cinematic => {
            let bloom = if scene.brightness > 0.7 {
                0.4
            } else if scene.brightness < 0.3 {
                0.2
            } else {
                0.3
            };
            let grain = if scene.noise_level < 0.2 { 0.03 } else { 0.01 };
            StyleParams::new()
                .with("bloom_strength", ParamValue::Float(bloom))
                .with("grain_strength", ParamValue::Float(grain))
                .with("vignette_strength", ParamValue::Float(0.4))
        }
        StyleKind::Neural => StyleParams::new(),
    }
}

/// Scale parameters by effect intensity.
pub fn scale_for_intensity(params: &StyleParams, intensity: f64) -> StyleParams {
    let mut scaled = StyleParams::new();
    for (key, value) in params.iter() {
        let value = match (ParamClass::of(key), *value) {
            (ParamClass::Strength, v) => ParamValue::Float(v.as_f64() * intensity),
            (ParamClass::Count, v) => {
                let levels = MAX_PALETTE as f64 - (MAX_PALETTE as f64 - v.as_f64()) * intensity;
                ParamValue::Int((levels as i64).max(MIN_PALETTE))
            }
            (ParamClass::Fixed, v) => v,
        };
        scaled.set(key, value);
    }
    scaled
}

/// Defaults, then rule overrides, then intensity scaling.
pub fn optimize(style: StyleKind, scene: &SceneCharacteristics, intensity: f64) -> StyleParams {
    let merged = default_params(style).merged(&derive_overrides(style, scene));
    scale_for_intensity(&merged, intensity)
}

/// Resolve parameters for each style of a job.
pub fn optimize_all(
    styles: &[StyleKind],
    scene: &SceneCharacteristics,
    intensity: f64,
) -> OptimizedParams {
    styles
        .iter()
        .map(|style| (*style, optimize(*style, scene, intensity)))
        .collect()
}
