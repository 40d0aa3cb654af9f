//! Scene characteristics and derived style parameters.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Normalized per-video statistics, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneCharacteristics {
    pub brightness: f64,
    pub contrast: f64,
    pub edge_density: f64,
    pub color_richness: f64,
    pub noise_level: f64,
    pub motion_estimate: f64,
}

impl SceneCharacteristics {
    /// Values used when no frame could be sampled.
    pub fn neutral() -> Self {
        Self {
            brightness: 0.5,
            contrast: 0.5,
            edge_density: 0.3,
            color_richness: 0.5,
            noise_level: 0.2,
            motion_estimate: 0.5,
        }
    }

    /// Clip every field into `[0, 1]`.
    pub fn clamped(self) -> Self {
        let clip = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            brightness: clip(self.brightness),
            contrast: clip(self.contrast),
            edge_density: clip(self.edge_density),
            color_richness: clip(self.color_richness),
            noise_level: clip(self.noise_level),
            motion_estimate: clip(self.motion_estimate),
        }
    }
}

impl Default for SceneCharacteristics {
    fn default() -> Self {
        Self::neutral()
    }
}

/// A single tunable parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl ParamValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            ParamValue::Bool(b) => f64::from(u8::from(*b)),
            ParamValue::Int(i) => *i as f64,
            ParamValue::Float(f) => *f,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{:.3}", v),
        }
    }
}

/// Parameter mapping for one style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(transparent)]
pub struct StyleParams(pub BTreeMap<String, ParamValue>);

impl StyleParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: ParamValue) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn set(&mut self, key: &str, value: ParamValue) {
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<ParamValue> {
        self.0.get(key).copied()
    }

    /// Numeric value or a fallback.
    pub fn f64_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).map(|v| v.as_f64()).unwrap_or(default)
    }

    /// Integer value or a fallback. Floats are truncated.
    pub fn i64_or(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(ParamValue::Int(i)) => i,
            Some(ParamValue::Float(f)) => f as i64,
            Some(ParamValue::Bool(b)) => i64::from(b),
            None => default,
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(ParamValue::Bool(b)) => b,
            Some(other) => other.as_f64() != 0.0,
            None => default,
        }
    }

    /// Overlay `other` on top of `self`.
    pub fn merged(mut self, other: &StyleParams) -> Self {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), *v);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }
}

impl fmt::Display for StyleParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_defaults() {
        let n = SceneCharacteristics::neutral();
        assert_eq!(n.brightness, 0.5);
        assert_eq!(n.edge_density, 0.3);
        assert_eq!(n.noise_level, 0.2);
        assert_eq!(n.motion_estimate, 0.5);
    }

    #[test]
    fn test_clamped() {
        let c = SceneCharacteristics {
            brightness: 1.4,
            contrast: -0.2,
            noise_level: f64::NAN,
            ..SceneCharacteristics::neutral()
        }
        .clamped();
        assert_eq!(c.brightness, 1.0);
        assert_eq!(c.contrast, 0.0);
        assert_eq!(c.noise_level, 0.0);
    }

    #[test]
    fn test_params_merge_and_getters() {
        let defaults = StyleParams::new()
            .with("num_colors", ParamValue::Int(8))
            .with("bilateral_d", ParamValue::Int(9));
        let overrides = StyleParams::new().with("num_colors", ParamValue::Int(12));
        let merged = defaults.merged(&overrides);
        assert_eq!(merged.i64_or("num_colors", 0), 12);
        assert_eq!(merged.i64_or("bilateral_d", 0), 9);
        assert_eq!(merged.f64_or("missing", 1.5), 1.5);
    }

    #[test]
    fn test_untagged_json() {
        let params: StyleParams =
            serde_json::from_str(r#"{"use_texture":true,"dot_size":3,"bloom_strength":0.3}"#)
                .unwrap();
        assert_eq!(params.get("use_texture"), Some(ParamValue::Bool(true)));
        assert_eq!(params.get("dot_size"), Some(ParamValue::Int(3)));
        assert_eq!(params.get("bloom_strength"), Some(ParamValue::Float(0.3)));
    }
}
