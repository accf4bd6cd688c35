use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{CardreelError, CardreelResult};
use crate::layout::{FontMetrics, FontRole};

/// Environment override for the card font file.
pub const FONT_ENV_VAR: &str = "CARDREEL_FONT";

/// RGBA8 brush color used by Parley text layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Stateful helper for shaping and measuring text with a single registered font.
///
/// Owns the Parley contexts plus the `vello_cpu` font handle used when filling glyph
/// runs, and caches measurements keyed by role and content.
pub struct TextEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
    measure_cache: HashMap<(FontRole, String), (f32, f32)>,
}

impl std::fmt::Debug for TextEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextEngine")
            .field("family_name", &self.family_name)
            .finish_non_exhaustive()
    }
}

impl TextEngine {
    /// Register `font_bytes` and build an engine around that single family.
    pub fn from_font_bytes(font_bytes: Vec<u8>) -> CardreelResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            CardreelError::render("no font families registered from font bytes")
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| CardreelError::render("registered font family has no name"))?
            .to_string();

        let font = vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(font_bytes), 0);
        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font,
            measure_cache: HashMap::new(),
        })
    }

    /// Load the font from `override_path`, the `CARDREEL_FONT` environment variable,
    /// or a list of common system font locations, in that order.
    pub fn from_system_font(override_path: Option<&Path>) -> CardreelResult<Self> {
        let path = resolve_font_path(override_path)?;
        let bytes = std::fs::read(&path).map_err(|e| {
            CardreelError::render(format!("failed to read font '{}': {e}", path.display()))
        })?;
        Self::from_font_bytes(bytes)
    }

    /// Font handle for `vello_cpu` glyph runs.
    pub fn font(&self) -> &vello_cpu::peniko::FontData {
        &self.font
    }

    /// Shape and lay out plain text. `max_width_px` enables line breaking.
    pub fn layout_plain(
        &mut self,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
        max_width_px: Option<f32>,
    ) -> CardreelResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(CardreelError::render("text size_px must be finite and > 0"));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        if let Some(w) = max_width_px {
            layout.break_all_lines(Some(w));
            layout.align(
                Some(w),
                parley::Alignment::Start,
                parley::AlignmentOptions::default(),
            );
        } else {
            layout.break_all_lines(None);
        }

        Ok(layout)
    }

    fn measure(&mut self, role: FontRole, text: &str) -> (f32, f32) {
        if let Some(&cached) = self.measure_cache.get(&(role, text.to_string())) {
            return cached;
        }
        let out = self
            .layout_plain(text, role.size_px(), TextBrushRgba8::default(), None)
            .map(|l| (l.width(), l.height()))
            .unwrap_or((0.0, 0.0));
        self.measure_cache.insert((role, text.to_string()), out);
        out
    }
}

impl FontMetrics for TextEngine {
    fn text_width(&mut self, role: FontRole, text: &str) -> f64 {
        f64::from(self.measure(role, text).0)
    }

    fn text_height(&mut self, role: FontRole, text: &str) -> f64 {
        f64::from(self.measure(role, text).1)
    }
}

/// Well-known font locations tried when no explicit font is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn resolve_font_path(override_path: Option<&Path>) -> CardreelResult<PathBuf> {
    if let Some(p) = override_path {
        if p.is_file() {
            return Ok(p.to_path_buf());
        }
        return Err(CardreelError::render(format!(
            "configured font '{}' not found",
            p.display()
        )));
    }

    if let Ok(p) = std::env::var(FONT_ENV_VAR) {
        let p = PathBuf::from(p);
        if p.is_file() {
            return Ok(p);
        }
        return Err(CardreelError::render(format!(
            "font from {FONT_ENV_VAR} '{}' not found",
            p.display()
        )));
    }

    for candidate in FONT_CANDIDATES {
        let p = Path::new(candidate);
        if p.is_file() {
            return Ok(p.to_path_buf());
        }
    }

    Err(CardreelError::render(format!(
        "no usable font found; pass --font or set {FONT_ENV_VAR} to a TTF/OTF file"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_font_is_a_clear_error() {
        let err = TextEngine::from_system_font(Some(Path::new("/no/such/font.ttf"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn empty_font_bytes_are_rejected() {
        assert!(TextEngine::from_font_bytes(Vec::new()).is_err());
    }
}
