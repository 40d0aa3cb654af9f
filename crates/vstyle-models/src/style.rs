//! Style kind definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Available stylization effects.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum StyleKind {
    /// Graphite sketch look (grayscale dodge blend)
    Pencil,
    /// Flat posterized colors with dark outlines
    Cartoon,
    /// Halftone dots with inked edges
    Comic,
    /// Film grade: bloom, grain and vignette
    Cinematic,
    /// Learned style transfer through an inference model
    Neural,
}

impl StyleKind {
    /// All available styles, in display order.
    pub const ALL: &'static [StyleKind] = &[
        StyleKind::Pencil,
        StyleKind::Cartoon,
        StyleKind::Comic,
        StyleKind::Cinematic,
        StyleKind::Neural,
    ];

    /// Human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            StyleKind::Pencil => "Pencil Sketch",
            StyleKind::Cartoon => "Cartoon",
            StyleKind::Comic => "Comic",
            StyleKind::Cinematic => "Cinematic",
            StyleKind::Neural => "Neural Style",
        }
    }

    /// Returns the style name as used in filenames and checkpoint keys.
    pub fn as_filename_part(&self) -> &'static str {
        match self {
            StyleKind::Pencil => "pencil_sketch",
            StyleKind::Cartoon => "cartoon",
            StyleKind::Comic => "comic",
            StyleKind::Cinematic => "cinematic",
            StyleKind::Neural => "neural_style",
        }
    }

    /// Whether this style runs through the tiled inference path.
    pub fn is_inference_based(&self) -> bool {
        matches!(self, StyleKind::Neural)
    }

    /// Parse a list of style names, keeping first-seen order and dropping duplicates.
    ///
    /// `"all"` expands to every style. Unknown names are an error.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<StyleKind>, StyleParseError> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();

        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if name.eq_ignore_ascii_case("all") {
                for style in Self::ALL {
                    if seen.insert(*style) {
                        result.push(*style);
                    }
                }
                continue;
            }
            let style: StyleKind = name.parse()?;
            if seen.insert(style) {
                result.push(style);
            }
        }

        Ok(result)
    }
}

impl fmt::Display for StyleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for StyleKind {
    type Err = StyleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "pencil" | "pencil_sketch" | "sketch" => Ok(StyleKind::Pencil),
            "cartoon" => Ok(StyleKind::Cartoon),
            "comic" | "halftone" | "comic_halftone" => Ok(StyleKind::Comic),
            "cinematic" => Ok(StyleKind::Cinematic),
            "neural" | "neural_style" | "fast_neural_style" => Ok(StyleKind::Neural),
            _ => Err(StyleParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown style: {0}")]
pub struct StyleParseError(String);
