//! Editor configuration
//!
//! TOML-backed thresholds for the overlay engine, drawing parameters for the
//! compositor and the persistence policy. Every field has a default, so an
//! empty file is a valid configuration.

use crate::error::AnnotateError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub compositor: CompositorConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl EditorConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or the TOML is malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AnnotateError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AnnotateError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// ```
    /// use annotate_core::config::EditorConfig;
    ///
    /// let config = EditorConfig::from_str("[overlay]\nhandle_size = 12.0").unwrap();
    /// assert_eq!(config.overlay.handle_size, 12.0);
    /// assert_eq!(config.overlay.resize_floor, 4.0);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, AnnotateError> {
        toml::from_str(s).map_err(|e| AnnotateError::ConfigError(e.to_string()))
    }
}

/// Interaction thresholds, all in screen pixels at the current zoom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Rectangle drafts must exceed this in both axes to be committed.
    pub min_draft_size: f64,
    /// Width and height never shrink below this while resizing.
    pub resize_floor: f64,
    /// Side of the square hotspot centered on each corner.
    pub handle_size: f64,
    /// Bounding-box padding for the pen stroke pre-check.
    pub pen_hit_padding: f64,
    /// Added to half the stroke width for pen hits.
    pub pen_hit_tolerance: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            min_draft_size: 4.0,
            resize_floor: 4.0,
            handle_size: 10.0,
            pen_hit_padding: 6.0,
            pen_hit_tolerance: 4.0,
        }
    }
}

/// Padding around a replaced text run's box, in PDF units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverPadding {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

impl Default for CoverPadding {
    fn default() -> Self {
        Self {
            left: 1.0,
            right: 1.0,
            bottom: 2.0,
            top: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    pub text_cover: CoverPadding,
    /// Fill opacity for highlights without an explicit alpha.
    pub highlight_opacity: f64,
    /// Thickness of underline and strikeout bars.
    pub markup_bar_thickness: f64,
    pub arrow_head_length: f64,
    /// Baseline-to-baseline distance as a multiple of the font size.
    pub line_height: f64,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            text_cover: CoverPadding::default(),
            highlight_opacity: 0.4,
            markup_bar_thickness: 1.5,
            arrow_head_length: 15.0,
            line_height: 1.2,
        }
    }
}

/// Whether edits outlive the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistencePolicy {
    /// Kept in memory only.
    Session,
    /// Every kind is written to device storage after each change.
    #[default]
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub policy: PersistencePolicy,
    pub key_prefix: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            policy: PersistencePolicy::Local,
            key_prefix: "annotate-edits:".to_string(),
        }
    }
}

impl PersistenceConfig {
    pub fn storage_key(&self, doc_id: &str) -> String {
        format!("{}{}", self.key_prefix, doc_id)
    }
}
