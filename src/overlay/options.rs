//! Highlight options.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::identifiers::NodeId;
use crate::session::ScreenshotOptions;

// ============================================================================
// Constants
// ============================================================================

/// Default auto-hide delay.
pub const DEFAULT_DURATION_MS: i64 = 120_000;

// ============================================================================
// Rgba
// ============================================================================

/// An RGBA color as the overlay agent expects it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgba {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha, 0.0 to 1.0.
    pub a: f64,
}

impl Rgba {
    /// Creates a color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the CSS `rgba(...)` form.
    #[must_use]
    pub fn to_css(&self) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

// ============================================================================
// HighlightColors
// ============================================================================

/// Box-model colors of a highlight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightColors {
    /// Border box.
    pub border: Rgba,
    /// Content box fill.
    pub content: Rgba,
    /// Padding box fill.
    pub padding: Rgba,
    /// Margin box fill.
    pub margin: Rgba,
}

impl Default for HighlightColors {
    fn default() -> Self {
        Self {
            border: Rgba::new(255, 69, 0, 1.0),
            content: Rgba::new(255, 69, 0, 0.25),
            padding: Rgba::new(255, 165, 0, 0.35),
            margin: Rgba::new(255, 215, 0, 0.35),
        }
    }
}

// ============================================================================
// HighlightOptions
// ============================================================================

/// What to highlight and how.
///
/// A node id takes precedence over a selector.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightOptions {
    /// CSS selector; the first match is highlighted.
    pub selector: Option<String>,
    /// Node to highlight.
    pub node_id: Option<NodeId>,
    /// Auto-hide delay; zero or negative disables auto-hide.
    pub duration_ms: i64,
    /// Box-model colors.
    pub colors: HighlightColors,
    /// Fill the margin box.
    pub show_margin: bool,
    /// Fill the padding box.
    pub show_padding: bool,
    /// Show the element info tooltip.
    pub show_info: bool,
    /// Show rulers.
    pub show_rulers: bool,
    /// Capture a screenshot once the highlight is applied.
    pub return_screenshot: bool,
    /// Settings for that screenshot.
    pub screenshot: ScreenshotOptions,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            selector: None,
            node_id: None,
            duration_ms: DEFAULT_DURATION_MS,
            colors: HighlightColors::default(),
            show_margin: true,
            show_padding: true,
            show_info: true,
            show_rulers: false,
            return_screenshot: true,
            screenshot: ScreenshotOptions::default(),
        }
    }
}

impl HighlightOptions {
    /// Targets the first element matching `selector`.
    #[must_use]
    pub fn selector(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::default()
        }
    }

    /// Targets `node_id`.
    #[must_use]
    pub fn node(node_id: NodeId) -> Self {
        Self {
            node_id: Some(node_id),
            ..Self::default()
        }
    }

    /// Replaces the target with `node_id`.
    #[inline]
    #[must_use]
    pub fn with_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Sets the auto-hide delay.
    #[inline]
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Sets the colors.
    #[inline]
    #[must_use]
    pub fn with_colors(mut self, colors: HighlightColors) -> Self {
        self.colors = colors;
        self
    }

    /// Sets the margin, padding, info and ruler flags.
    #[inline]
    #[must_use]
    pub fn with_flags(mut self, margin: bool, padding: bool, info: bool, rulers: bool) -> Self {
        self.show_margin = margin;
        self.show_padding = padding;
        self.show_info = info;
        self.show_rulers = rulers;
        self
    }

    /// Sets screenshot capture.
    #[inline]
    #[must_use]
    pub fn with_screenshot(mut self, enabled: bool) -> Self {
        self.return_screenshot = enabled;
        self
    }

    /// Builds the `highlightConfig` object for `Overlay.highlightNode`.
    ///
    /// Margin and padding fills are left out when their flags are off.
    #[must_use]
    pub fn highlight_config(&self) -> Value {
        let mut config = Map::new();
        config.insert("showInfo".into(), json!(self.show_info));
        config.insert("showRulers".into(), json!(self.show_rulers));
        config.insert("showExtensionLines".into(), json!(self.show_rulers));
        config.insert("borderColor".into(), json!(self.colors.border));
        config.insert("contentColor".into(), json!(self.colors.content));
        if self.show_padding {
            config.insert("paddingColor".into(), json!(self.colors.padding));
        }
        if self.show_margin {
            config.insert("marginColor".into(), json!(self.colors.margin));
        }
        Value::Object(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HighlightOptions::default().highlight_config();

        assert_eq!(config["borderColor"], json!({"r": 255, "g": 69, "b": 0, "a": 1.0}));
        assert_eq!(config["contentColor"], json!({"r": 255, "g": 69, "b": 0, "a": 0.25}));
        assert_eq!(config["paddingColor"], json!({"r": 255, "g": 165, "b": 0, "a": 0.35}));
        assert_eq!(config["marginColor"], json!({"r": 255, "g": 215, "b": 0, "a": 0.35}));
        assert_eq!(config["showInfo"], true);
        assert_eq!(config["showRulers"], false);
    }

    #[test]
    fn test_flags_drop_fills() {
        let config = HighlightOptions::default()
            .with_flags(false, false, false, true)
            .highlight_config();

        assert!(config.get("marginColor").is_none());
        assert!(config.get("paddingColor").is_none());
        assert_eq!(config["showRulers"], true);
        assert_eq!(config["showInfo"], false);
    }

    #[test]
    fn test_css_form() {
        assert_eq!(HighlightColors::default().border.to_css(), "rgba(255, 69, 0, 1)");
    }
}
