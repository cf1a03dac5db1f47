//! Glyph faces for the export rasterizer.
//!
//! Characters resolve against an ordered face list: the configured font
//! file, the bundled Noto Sans, then CJK-capable system faces. The first
//! face with a real glyph for a character draws it.

use ab_glyph::{point, Font, FontArc, FontVec, GlyphId, ScaleFont};
use std::collections::HashSet;
use std::path::Path;

/// Line box height as a multiple of the font size.
pub const LINE_HEIGHT: f32 = 1.25;

/// System families tried for glyphs the configured and bundled faces lack.
const FALLBACK_FAMILIES: [&str; 14] = [
    "Noto Sans CJK SC",
    "Noto Sans CJK TC",
    "Noto Sans SC",
    "Noto Sans TC",
    "Source Han Sans SC",
    "Source Han Sans TC",
    "WenQuanYi Micro Hei",
    "WenQuanYi Zen Hei",
    "Droid Sans Fallback",
    "Microsoft YaHei",
    "Microsoft JhengHei",
    "PingFang SC",
    "Hiragino Sans GB",
    "Arial Unicode MS",
];

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("failed to read font {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a usable TrueType/OpenType font")]
    Invalid(String),
}

#[derive(Clone)]
pub struct FontSet {
    faces: Vec<FontArc>,
}

impl std::fmt::Debug for FontSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontSet").field("faces", &self.faces.len()).finish()
    }
}

/// Device pixels between two baselines at `size_px`.
pub fn line_height(size_px: f32) -> u32 {
    (size_px * LINE_HEIGHT).ceil() as u32
}

fn bundled_face() -> Result<FontArc, FontError> {
    FontArc::try_from_slice(notosans::REGULAR_TTF).map_err(|_| FontError::Invalid("bundled Noto Sans".into()))
}

fn system_faces() -> Vec<FontArc> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    let mut seen = HashSet::new();
    let mut faces = Vec::new();
    for family in FALLBACK_FAMILIES {
        let query = fontdb::Query {
            families: &[fontdb::Family::Name(family)],
            ..fontdb::Query::default()
        };
        let Some(id) = db.query(&query) else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        let face = db
            .with_face_data(id, |data, index| FontVec::try_from_vec_and_index(data.to_vec(), index))
            .and_then(Result::ok);
        match face {
            Some(f) => faces.push(FontArc::new(f)),
            None => tracing::warn!(family, "system font could not be parsed"),
        }
    }
    faces
}

impl FontSet {
    /// Noto Sans only: Latin, Greek and Cyrillic.
    pub fn bundled() -> Result<Self, FontError> {
        Ok(Self {
            faces: vec![bundled_face()?],
        })
    }

    pub fn load(font_path: Option<&Path>, system_fallbacks: bool) -> Result<Self, FontError> {
        let mut faces = Vec::new();
        if let Some(path) = font_path {
            let shown = path.display().to_string();
            let data = std::fs::read(path).map_err(|source| FontError::Read {
                path: shown.clone(),
                source,
            })?;
            let face = FontVec::try_from_vec(data).map_err(|_| FontError::Invalid(shown))?;
            faces.push(FontArc::new(face));
        }
        faces.push(bundled_face()?);
        if system_fallbacks {
            faces.extend(system_faces());
        }
        tracing::debug!(faces = faces.len(), "export fonts loaded");
        Ok(Self { faces })
    }

    /// First face with a glyph for `c`, else the primary face's notdef.
    fn face_for(&self, c: char) -> Option<(&FontArc, GlyphId)> {
        self.faces
            .iter()
            .map(|f| (f, f.glyph_id(c)))
            .find(|(_, id)| id.0 != 0)
            .or_else(|| self.faces.first().map(|f| (f, f.glyph_id(c))))
    }

    pub fn covers(&self, c: char) -> bool {
        self.faces.iter().any(|f| f.glyph_id(c).0 != 0)
    }

    pub fn advance(&self, c: char, size_px: f32) -> f32 {
        match self.face_for(c) {
            Some((face, id)) => face.as_scaled(size_px).h_advance(id),
            None => 0.0,
        }
    }

    pub fn text_width(&self, text: &str, size_px: f32) -> f32 {
        text.chars().map(|c| self.advance(c, size_px)).sum()
    }

    /// Draws one line whose line box starts at `(x, top)`. `plot` receives
    /// device coordinates and coverage in `0.0..=1.0`.
    pub fn draw_line(&self, text: &str, x: f32, top: f32, size_px: f32, mut plot: impl FnMut(i64, i64, f32)) {
        let half_leading = (line_height(size_px) as f32 - size_px) / 2.0;
        let mut caret = x;
        for c in text.chars() {
            let Some((face, id)) = self.face_for(c) else {
                continue;
            };
            let scaled = face.as_scaled(size_px);
            let baseline = top + half_leading + scaled.ascent();
            let glyph = id.with_scale_and_position(size_px, point(caret, baseline));
            caret += scaled.h_advance(id);
            if let Some(outlined) = face.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    plot(
                        bounds.min.x as i64 + gx as i64,
                        bounds.min.y as i64 + gy as i64,
                        coverage,
                    )
                });
            }
        }
    }
}
