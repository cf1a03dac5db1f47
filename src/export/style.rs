//! Styled node tree for exported reports, CSS color parsing, and the
//! sanitation pass that strips color syntaxes the rasterizer can't read.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    /// Empty means inherit from the parent.
    pub color: String,
    /// Empty means none.
    pub background_color: String,
    pub border_color: String,
    pub outline_color: String,
    pub border_width: u32,
    pub padding: u32,
    pub gap: u32,
    pub font_size: u32,
    pub align: Align,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            color: String::new(),
            background_color: String::new(),
            border_color: String::new(),
            outline_color: String::new(),
            border_width: 0,
            padding: 0,
            gap: 0,
            font_size: 12,
            align: Align::Left,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    Column,
    /// Children side by side, widths proportional to the weights.
    Row(Vec<u32>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyledNode {
    pub tag: &'static str,
    pub classes: Vec<String>,
    pub style: Style,
    pub text: Option<String>,
    pub layout: Layout,
    pub children: Vec<StyledNode>,
}

impl StyledNode {
    pub fn block(tag: &'static str, style: Style, children: Vec<StyledNode>) -> Self {
        Self {
            tag,
            classes: Vec::new(),
            style,
            text: None,
            layout: Layout::Column,
            children,
        }
    }

    pub fn row(tag: &'static str, style: Style, weights: Vec<u32>, children: Vec<StyledNode>) -> Self {
        Self {
            layout: Layout::Row(weights),
            ..Self::block(tag, style, children)
        }
    }

    pub fn text(tag: &'static str, text: impl Into<String>, style: Style) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::block(tag, style, Vec::new())
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    #[cfg(test)]
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a StyledNode)) {
        f(self);
        for c in &self.children {
            c.walk(f);
        }
    }

    fn walk_mut(&mut self, f: &mut impl FnMut(&mut StyledNode)) {
        f(self);
        for c in &mut self.children {
            c.walk_mut(f);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba { r: 0, g: 0, b: 0, a: 0 };

    pub fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorError {
    #[error("unsupported color syntax: {0}")]
    Unsupported(String),
    #[error("invalid color: {0}")]
    Invalid(String),
}

const WIDE_GAMUT_FUNCTIONS: [&str; 5] = ["oklab(", "oklch(", "lab(", "lch(", "color("];

pub fn is_wide_gamut(value: &str) -> bool {
    let v = value.to_ascii_lowercase();
    WIDE_GAMUT_FUNCTIONS.iter().any(|f| v.contains(f))
}

fn hex_nibble(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

fn parse_hex(raw: &str, hex: &str) -> Result<Rgba, ColorError> {
    let b = hex.as_bytes();
    let digits: Option<Vec<u8>> = b.iter().map(|c| hex_nibble(*c)).collect();
    let d = digits.ok_or_else(|| ColorError::Invalid(raw.to_string()))?;
    match d.len() {
        3 | 4 => Ok(Rgba {
            r: d[0] * 17,
            g: d[1] * 17,
            b: d[2] * 17,
            a: d.get(3).map(|v| v * 17).unwrap_or(255),
        }),
        6 | 8 => Ok(Rgba {
            r: d[0] * 16 + d[1],
            g: d[2] * 16 + d[3],
            b: d[4] * 16 + d[5],
            a: if d.len() == 8 { d[6] * 16 + d[7] } else { 255 },
        }),
        _ => Err(ColorError::Invalid(raw.to_string())),
    }
}

fn parse_channel(raw: &str, part: &str) -> Result<u8, ColorError> {
    let part = part.trim();
    let value = if let Some(pct) = part.strip_suffix('%') {
        pct.trim().parse::<f64>().map(|p| p * 255.0 / 100.0)
    } else {
        part.parse::<f64>()
    }
    .map_err(|_| ColorError::Invalid(raw.to_string()))?;
    Ok(value.round().clamp(0.0, 255.0) as u8)
}

fn parse_alpha(raw: &str, part: &str) -> Result<u8, ColorError> {
    let part = part.trim();
    let value = if let Some(pct) = part.strip_suffix('%') {
        pct.trim().parse::<f64>().map(|p| p / 100.0)
    } else {
        part.parse::<f64>()
    }
    .map_err(|_| ColorError::Invalid(raw.to_string()))?;
    Ok((value.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// `rgb(1, 2, 3)`, `rgba(1, 2, 3, 0.5)` and `rgb(1 2 3 / 50%)`.
fn parse_rgb_function(raw: &str, args: &str) -> Result<Rgba, ColorError> {
    let (channels, alpha) = match args.split_once('/') {
        Some((c, a)) => (c, Some(a)),
        None => (args, None),
    };
    let mut parts: Vec<&str> = if channels.contains(',') {
        channels.split(',').collect()
    } else {
        channels.split_whitespace().collect()
    };
    let alpha = match (alpha, parts.len()) {
        (Some(a), 3) => Some(a),
        (None, 4) => parts.pop(),
        (None, 3) => None,
        _ => return Err(ColorError::Invalid(raw.to_string())),
    };
    Ok(Rgba {
        r: parse_channel(raw, parts[0])?,
        g: parse_channel(raw, parts[1])?,
        b: parse_channel(raw, parts[2])?,
        a: match alpha {
            Some(a) => parse_alpha(raw, a)?,
            None => 255,
        },
    })
}

/// Parses the color syntaxes the rasterizer understands. Wide-gamut
/// functions are reported as [`ColorError::Unsupported`].
pub fn parse_color(value: &str) -> Result<Rgba, ColorError> {
    let v = value.trim().to_ascii_lowercase();
    if is_wide_gamut(&v) {
        return Err(ColorError::Unsupported(value.trim().to_string()));
    }
    if let Some(hex) = v.strip_prefix('#') {
        return parse_hex(value, hex);
    }
    for prefix in ["rgba(", "rgb("] {
        if let Some(rest) = v.strip_prefix(prefix) {
            let args = rest
                .strip_suffix(')')
                .ok_or_else(|| ColorError::Invalid(value.to_string()))?;
            return parse_rgb_function(value, args);
        }
    }
    match v.as_str() {
        "transparent" => Ok(Rgba::TRANSPARENT),
        "white" => Ok(Rgba::opaque(255, 255, 255)),
        "black" => Ok(Rgba::opaque(0, 0, 0)),
        "red" => Ok(Rgba::opaque(255, 0, 0)),
        "green" => Ok(Rgba::opaque(0, 128, 0)),
        "gray" | "grey" => Ok(Rgba::opaque(128, 128, 128)),
        "gold" => Ok(Rgba::opaque(255, 215, 0)),
        _ => Err(ColorError::Invalid(value.to_string())),
    }
}

pub const TEXT_FALLBACK: &str = "#ffffff";
pub const BACKGROUND_FALLBACK: &str = "transparent";
pub const BORDER_FALLBACK: &str = "#333333";
pub const OUTLINE_FALLBACK: &str = "transparent";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub nodes: usize,
    pub substitutions: usize,
}

fn replace_if_wide_gamut(value: &mut String, fallback: &str) -> bool {
    if is_wide_gamut(value) {
        *value = fallback.to_string();
        true
    } else {
        false
    }
}

/// Returns a detached copy of `root` whose colors the rasterizer can parse.
/// The input tree is left untouched.
pub fn sanitize(root: &StyledNode) -> (StyledNode, SanitizeReport) {
    let mut clone = root.clone();
    let mut report = SanitizeReport::default();
    clone.walk_mut(&mut |node| {
        report.nodes += 1;
        let s = &mut node.style;
        let hits = [
            replace_if_wide_gamut(&mut s.color, TEXT_FALLBACK),
            replace_if_wide_gamut(&mut s.background_color, BACKGROUND_FALLBACK),
            replace_if_wide_gamut(&mut s.border_color, BORDER_FALLBACK),
            replace_if_wide_gamut(&mut s.outline_color, OUTLINE_FALLBACK),
        ];
        report.substitutions += hits.iter().filter(|h| **h).count();
    });
    (clone, report)
}
