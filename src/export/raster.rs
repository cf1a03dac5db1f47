//! Lays out a sanitized [`StyledNode`] tree and paints it onto an RGBA canvas.

use image::RgbaImage;

use super::font::{self, FontSet};
use super::style::{parse_color, Align, ColorError, Layout, Rgba, StyledNode};

/// Both canvas dimensions stay below the JPEG limit with room to spare.
pub const MAX_DIMENSION: u32 = 30_000;
pub const NO_EXPORT_CLASS: &str = "no-export";

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("{property} on <{tag}>: {source}")]
    Color {
        tag: &'static str,
        property: &'static str,
        #[source]
        source: ColorError,
    },
    #[error("canvas {width}x{height} exceeds {MAX_DIMENSION}px")]
    TooLarge { width: u32, height: u32 },
}

impl RasterError {
    pub fn is_unsupported_color(&self) -> bool {
        matches!(
            self,
            RasterError::Color {
                source: ColorError::Unsupported(_),
                ..
            }
        )
    }
}

#[derive(Debug, Clone)]
pub struct RasterOptions {
    /// Logical width in CSS pixels.
    pub width: u32,
    pub scale: u32,
    pub background: String,
}

#[derive(Debug, Clone, Copy)]
struct Colors {
    text: Rgba,
    background: Rgba,
    border: Rgba,
    outline: Rgba,
}

#[derive(Debug)]
struct LaidOut {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    border: u32,
    inner_x: u32,
    inner_y: u32,
    inner_w: u32,
    size_px: f32,
    line_h: u32,
    align: Align,
    colors: Colors,
    lines: Vec<String>,
    children: Vec<LaidOut>,
}

fn color_of(
    node: &StyledNode,
    property: &'static str,
    value: &str,
    unset: Rgba,
) -> Result<Rgba, RasterError> {
    if value.trim().is_empty() {
        return Ok(unset);
    }
    parse_color(value).map_err(|source| RasterError::Color {
        tag: node.tag,
        property,
        source,
    })
}

fn resolve_colors(node: &StyledNode, inherited_text: Rgba) -> Result<Colors, RasterError> {
    let s = &node.style;
    Ok(Colors {
        text: color_of(node, "color", &s.color, inherited_text)?,
        background: color_of(node, "background-color", &s.background_color, Rgba::TRANSPARENT)?,
        border: color_of(node, "border-color", &s.border_color, Rgba::TRANSPARENT)?,
        outline: color_of(node, "outline-color", &s.outline_color, Rgba::TRANSPARENT)?,
    })
}

/// Greedy word wrap by measured width. A word wider than the line breaks
/// between characters, which is also how unspaced CJK runs wrap.
fn wrap(text: &str, max_width: f32, advance: impl Fn(char) -> f32) -> Vec<String> {
    let space = advance(' ');
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut line_w = 0.0;
        for word in paragraph.split_whitespace() {
            let word_w: f32 = word.chars().map(&advance).sum();
            if !line.is_empty() {
                if line_w + space + word_w <= max_width {
                    line.push(' ');
                    line.push_str(word);
                    line_w += space + word_w;
                    continue;
                }
                lines.push(std::mem::take(&mut line));
                line_w = 0.0;
            }
            for c in word.chars() {
                let w = advance(c);
                if !line.is_empty() && line_w + w > max_width {
                    lines.push(std::mem::take(&mut line));
                    line_w = 0.0;
                }
                line.push(c);
                line_w += w;
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

fn layout(
    node: &StyledNode,
    x: u32,
    y: u32,
    width: u32,
    scale: u32,
    fonts: &FontSet,
    inherited_text: Rgba,
) -> Result<LaidOut, RasterError> {
    let colors = resolve_colors(node, inherited_text)?;
    let s = &node.style;
    let border = s.border_width * scale;
    let pad = s.padding * scale;
    let gap = s.gap * scale;
    let inner_x = x + border + pad;
    let inner_y = y + border + pad;
    let inner_w = width.saturating_sub(2 * (border + pad));
    let size_px = (s.font_size * scale) as f32;
    let line_h = font::line_height(size_px);

    let lines = match &node.text {
        Some(t) => wrap(t, inner_w as f32, |c| fonts.advance(c, size_px)),
        None => Vec::new(),
    };
    let mut cursor = inner_y + lines.len() as u32 * line_h;

    let visible: Vec<(usize, &StyledNode)> = node
        .children
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.has_class(NO_EXPORT_CLASS))
        .collect();
    let mut children = Vec::with_capacity(visible.len());
    if !visible.is_empty() && !lines.is_empty() {
        cursor += gap;
    }

    match &node.layout {
        Layout::Column => {
            for (i, (_, child)) in visible.iter().enumerate() {
                if i > 0 {
                    cursor += gap;
                }
                let laid = layout(child, inner_x, cursor, inner_w, scale, fonts, colors.text)?;
                cursor += laid.h;
                children.push(laid);
            }
        }
        Layout::Row(weights) => {
            let weight = |idx: usize| weights.get(idx).copied().unwrap_or(1).max(1);
            let total: u32 = visible.iter().map(|(idx, _)| weight(*idx)).sum();
            let gaps = gap * visible.len().saturating_sub(1) as u32;
            let avail = inner_w.saturating_sub(gaps);
            let mut col_x = inner_x;
            let mut used = 0;
            for (i, (idx, child)) in visible.iter().enumerate() {
                let w = if i + 1 == visible.len() {
                    avail - used
                } else {
                    avail * weight(*idx) / total.max(1)
                };
                let laid = layout(child, col_x, cursor, w, scale, fonts, colors.text)?;
                used += w;
                col_x += w + gap;
                children.push(laid);
            }
            let row_h = children.iter().map(|c| c.h).max().unwrap_or(0);
            for c in &mut children {
                c.h = row_h;
            }
            cursor += row_h;
        }
    }

    Ok(LaidOut {
        x,
        y,
        w: width,
        h: cursor - y + pad + border,
        border,
        inner_x,
        inner_y,
        inner_w,
        size_px,
        line_h,
        align: s.align,
        colors,
        lines,
        children,
    })
}

fn blend(img: &mut RgbaImage, x: u32, y: u32, c: Rgba) {
    if c.a == 0 || x >= img.width() || y >= img.height() {
        return;
    }
    let px = img.get_pixel_mut(x, y);
    if c.a == 255 {
        px.0 = [c.r, c.g, c.b, 255];
        return;
    }
    let a = c.a as u32;
    let mix = |src: u8, dst: u8| ((src as u32 * a + dst as u32 * (255 - a) + 127) / 255) as u8;
    px.0 = [mix(c.r, px.0[0]), mix(c.g, px.0[1]), mix(c.b, px.0[2]), 255];
}

fn fill_rect(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, c: Rgba) {
    if c.a == 0 {
        return;
    }
    let x_end = (x + w).min(img.width());
    let y_end = (y + h).min(img.height());
    for py in y..y_end {
        for px in x..x_end {
            blend(img, px, py, c);
        }
    }
}

fn frame(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, t: u32, c: Rgba) {
    if t == 0 || c.a == 0 {
        return;
    }
    let t = t.min(w / 2).min(h / 2).max(1);
    fill_rect(img, x, y, w, t, c);
    fill_rect(img, x, (y + h).saturating_sub(t), w, t, c);
    fill_rect(img, x, y + t, t, h.saturating_sub(2 * t), c);
    fill_rect(img, (x + w).saturating_sub(t), y + t, t, h.saturating_sub(2 * t), c);
}

fn paint(img: &mut RgbaImage, b: &LaidOut, scale: u32, fonts: &FontSet) {
    if b.colors.outline.a > 0 {
        let o = scale;
        frame(
            img,
            b.x.saturating_sub(o),
            b.y.saturating_sub(o),
            b.w + 2 * o,
            b.h + 2 * o,
            o,
            b.colors.outline,
        );
    }
    fill_rect(img, b.x, b.y, b.w, b.h, b.colors.background);
    frame(img, b.x, b.y, b.w, b.h, b.border, b.colors.border);

    let text = b.colors.text;
    for (i, line) in b.lines.iter().enumerate() {
        let line_w = fonts.text_width(line, b.size_px).ceil() as u32;
        let start_x = match b.align {
            Align::Left => b.inner_x,
            Align::Center => b.inner_x + b.inner_w.saturating_sub(line_w) / 2,
            Align::Right => b.inner_x + b.inner_w.saturating_sub(line_w),
        };
        let top = b.inner_y + i as u32 * b.line_h;
        fonts.draw_line(line, start_x as f32, top as f32, b.size_px, |x, y, coverage| {
            if x < 0 || y < 0 || x > u32::MAX as i64 || y > u32::MAX as i64 {
                return;
            }
            let a = (text.a as f32 * coverage.clamp(0.0, 1.0)).round() as u8;
            blend(img, x as u32, y as u32, Rgba { a, ..text });
        });
    }

    for child in &b.children {
        paint(img, child, scale, fonts);
    }
}

/// Paints `root` at `options.scale` device pixels per CSS pixel. Any color
/// outside hex, `rgb()`/`rgba()` and a few keywords fails the whole render.
pub fn rasterize(root: &StyledNode, options: &RasterOptions, fonts: &FontSet) -> Result<RgbaImage, RasterError> {
    let scale = options.scale.max(1);
    let canvas = parse_color(&options.background).map_err(|source| RasterError::Color {
        tag: "canvas",
        property: "background",
        source,
    })?;
    let width = options.width * scale;
    let laid = layout(root, 0, 0, width, scale, fonts, Rgba::opaque(255, 255, 255))?;
    let height = laid.h.max(1);
    if width == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(RasterError::TooLarge { width, height });
    }

    let mut img = RgbaImage::from_pixel(width, height, image::Rgba([canvas.r, canvas.g, canvas.b, 255]));
    paint(&mut img, &laid, scale, fonts);
    tracing::debug!(width, height, "rasterized report");
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::font::tests::han_fixture;
    use crate::export::style::{sanitize, Style};

    fn opts() -> RasterOptions {
        RasterOptions {
            width: 120,
            scale: 2,
            background: "#0f1115".into(),
        }
    }

    fn bundled() -> FontSet {
        FontSet::bundled().expect("bundled font")
    }

    fn line(text: &str, text_color: &str) -> StyledNode {
        let body = StyledNode::text("p", text, Style {
            color: text_color.into(),
            font_size: 16,
            ..Style::default()
        });
        StyledNode::block("div", Style { padding: 4, ..Style::default() }, vec![body])
    }

    fn tree(text_color: &str) -> StyledNode {
        line("ROGER", text_color)
    }

    #[test]
    fn wide_gamut_color_fails_the_render() {
        let err = rasterize(&tree("oklch(72.3% 0.219 149.579)"), &opts(), &bundled()).expect_err("should fail");
        assert!(err.is_unsupported_color());
    }

    #[test]
    fn sanitized_tree_renders_at_scale() {
        let (clean, _) = sanitize(&tree("oklch(72.3% 0.219 149.579)"));
        let img = rasterize(&clean, &opts(), &bundled()).expect("render");
        assert_eq!(img.width(), 240);
        // padding 4 on both sides plus one 16px line at 1.25 line height, doubled
        assert_eq!(img.height(), 8 + 40 + 8);
        assert_eq!(img.get_pixel(0, 0).0, [0x0f, 0x11, 0x15, 255]);
        assert!(img.pixels().any(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn text_is_painted_in_its_color() {
        let img = rasterize(&tree("#ff0000"), &opts(), &bundled()).expect("render");
        assert!(img.pixels().any(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn different_han_text_paints_different_pixels() {
        let fonts = han_fixture();
        let a = rasterize(&line("當航機要求", "#ffffff"), &opts(), &fonts).expect("render");
        let b = rasterize(&line("直接飛往點", "#ffffff"), &opts(), &fonts).expect("render");
        assert_eq!(a.dimensions(), b.dimensions());
        assert!(a.pixels().any(|p| p.0 == [255, 255, 255, 255]));
        assert_ne!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn different_accented_text_paints_different_pixels() {
        let a = rasterize(&line("été", "#ffffff"), &opts(), &bundled()).expect("render");
        let b = rasterize(&line("ütö", "#ffffff"), &opts(), &bundled()).expect("render");
        assert_ne!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn han_text_uses_installed_system_faces() {
        let fonts = FontSet::load(None, true).expect("fonts");
        if !fonts.covers('當') {
            eprintln!("no CJK-capable system font installed");
            return;
        }
        let a = rasterize(&line("當航機要求", "#ffffff"), &opts(), &fonts).expect("render");
        let b = rasterize(&line("直接飛往點", "#ffffff"), &opts(), &fonts).expect("render");
        assert_ne!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn no_export_nodes_are_skipped() {
        let mut with_bar = tree("#ffffff");
        let bar = StyledNode::text("button", "GENERATE", Style {
            color: "oklch(1 0 0)".into(),
            ..Style::default()
        })
        .with_class(NO_EXPORT_CLASS);
        with_bar.children.insert(0, bar);

        let a = rasterize(&with_bar, &opts(), &bundled()).expect("render");
        let b = rasterize(&tree("#ffffff"), &opts(), &bundled()).expect("render");
        assert_eq!(a.dimensions(), b.dimensions());
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn bad_canvas_background_is_reported() {
        let mut o = opts();
        o.background = "lab(20% 0 0)".into();
        assert!(rasterize(&tree("#fff"), &o, &bundled()).expect_err("bad bg").is_unsupported_color());
    }

    #[test]
    fn wrap_splits_long_words_and_respects_width() {
        let unit = |_: char| 1.0;
        assert_eq!(wrap("CLEARED TO LAND", 8.0, unit), vec!["CLEARED", "TO LAND"]);
        assert_eq!(wrap("ABCDEFGHIJ", 4.0, unit), vec!["ABCD", "EFGH", "IJ"]);
        assert_eq!(wrap("當航機要求直接", 3.0, unit), vec!["當航機", "要求直", "接"]);
        assert!(wrap("   ", 4.0, unit).is_empty());
    }
}
