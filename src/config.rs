use crate::db;
use crate::export::style::{parse_color, ColorError};
use crate::scoring::DEFAULT_PASS_THRESHOLD;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupSection {
    Scoring,
    Export,
    Theme,
}

impl SetupSection {
    pub const ALL: [SetupSection; 3] = [Self::Scoring, Self::Export, Self::Theme];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scoring" => Some(Self::Scoring),
            "export" => Some(Self::Export),
            "theme" => Some(Self::Theme),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Scoring => "scoring",
            Self::Export => "export",
            Self::Theme => "theme",
        }
    }

    fn key(self) -> String {
        format!("setup.{}", self.name())
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Scoring => json!({
            "passThreshold": 70
        }),
        SetupSection::Export => json!({
            "scale": 2,
            "background": "#0f1115",
            "filenamePrefix": "VSJX_DEBRIEF",
            "jpegQuality": 92,
            "pageWidthPt": 595.28,
            "fontPath": null,
            "systemFonts": true
        }),
        // Palette values as the web front end resolves them; several are
        // wide-gamut and get replaced by the export sanitizer.
        SetupSection::Theme => json!({
            "canvas": "#111318",
            "panel": "rgba(255, 255, 255, 0.02)",
            "accent": "#d4af37",
            "text": "oklch(96.7% 0.003 264.542)",
            "muted": "rgba(255, 255, 255, 0.3)",
            "border": "oklch(100% 0 0 / 0.1)",
            "pass": "oklch(72.3% 0.219 149.579)",
            "fail": "oklch(63.7% 0.237 25.331)"
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_f64_range(v: &Value, key: &str, min: f64, max: f64) -> Result<f64, String> {
    let n = v.as_f64().ok_or_else(|| format!("{} must be a number", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn parse_nonempty(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = parse_string_max(v, key, max_len)?;
    if s.is_empty() {
        return Err(format!("{} must not be empty", key));
    }
    Ok(s)
}

/// A color the rasterizer can paint. Theme colors may also use wide-gamut
/// syntax, which the export sanitizer replaces.
fn parse_css_color(v: &Value, key: &str, allow_wide_gamut: bool) -> Result<String, String> {
    let s = parse_nonempty(v, key, 64)?;
    match parse_color(&s) {
        Ok(_) => Ok(s),
        Err(ColorError::Unsupported(_)) if allow_wide_gamut => Ok(s),
        Err(e) => Err(format!("{}: {}", key, e)),
    }
}

pub fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Scoring => match k.as_str() {
                "passThreshold" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 100)?));
                }
                _ => return Err(format!("unknown scoring field: {}", k)),
            },
            SetupSection::Export => match k.as_str() {
                "scale" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 4)?));
                }
                "jpegQuality" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 50, 100)?));
                }
                "pageWidthPt" => {
                    obj.insert(k.clone(), Value::from(parse_f64_range(v, k, 72.0, 2000.0)?));
                }
                "background" => {
                    obj.insert(k.clone(), Value::String(parse_css_color(v, k, false)?));
                }
                "fontPath" => {
                    let path = match v {
                        Value::Null => Value::Null,
                        _ => match parse_string_max(v, k, 1024)? {
                            s if s.is_empty() => Value::Null,
                            s => Value::String(s),
                        },
                    };
                    obj.insert(k.clone(), path);
                }
                "systemFonts" => {
                    let b = v.as_bool().ok_or_else(|| format!("{} must be boolean", k))?;
                    obj.insert(k.clone(), Value::Bool(b));
                }
                "filenamePrefix" => {
                    let s = parse_nonempty(v, k, 40)?;
                    if s.contains(['/', '\\']) {
                        return Err("filenamePrefix must not contain path separators".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown export field: {}", k)),
            },
            SetupSection::Theme => match k.as_str() {
                "canvas" | "panel" | "accent" | "text" | "muted" | "border" | "pass" | "fail" => {
                    obj.insert(k.clone(), Value::String(parse_css_color(v, k, true)?));
                }
                _ => return Err(format!("unknown theme field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, &section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: a malformed stored value falls back to defaults.
            if let Err(e) = merge_section_patch(section, &mut current, saved_obj) {
                tracing::warn!(section = section.name(), error = %e, "ignoring stored setup values");
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

pub fn update_section(
    conn: &rusqlite::Connection,
    section: SetupSection,
    patch: &Map<String, Value>,
) -> anyhow::Result<Result<Value, String>> {
    let mut current = load_section(conn, section)?;
    if let Err(msg) = merge_section_patch(section, &mut current, patch) {
        return Ok(Err(msg));
    }
    db::settings_set_json(conn, &section.key(), &current)?;
    tracing::info!(section = section.name(), "setup updated");
    Ok(Ok(current))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub pass_threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    pub scale: u32,
    pub background: String,
    pub filename_prefix: String,
    pub jpeg_quality: u8,
    pub page_width_pt: f64,
    /// Tried before the bundled face, for scripts it lacks.
    pub font_path: Option<String>,
    pub system_fonts: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub canvas: String,
    pub panel: String,
    pub accent: String,
    pub text: String,
    pub muted: String,
    pub border: String,
    pub pass: String,
    pub fail: String,
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key).and_then(|s| s.as_str()).unwrap_or_default().to_string()
}

impl ScoringConfig {
    pub fn from_value(v: &Value) -> Self {
        Self {
            pass_threshold: v.get("passThreshold").and_then(|n| n.as_f64()).unwrap_or(DEFAULT_PASS_THRESHOLD),
        }
    }

    pub fn load(conn: &rusqlite::Connection) -> anyhow::Result<Self> {
        Ok(Self::from_value(&load_section(conn, SetupSection::Scoring)?))
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::from_value(&default_section(SetupSection::Scoring))
    }
}

impl ExportConfig {
    pub fn from_value(v: &Value) -> Self {
        Self {
            scale: v.get("scale").and_then(|n| n.as_u64()).unwrap_or(2) as u32,
            background: str_field(v, "background"),
            filename_prefix: str_field(v, "filenamePrefix"),
            jpeg_quality: v.get("jpegQuality").and_then(|n| n.as_u64()).unwrap_or(92) as u8,
            page_width_pt: v.get("pageWidthPt").and_then(|n| n.as_f64()).unwrap_or(595.28),
            font_path: v.get("fontPath").and_then(|s| s.as_str()).map(str::to_string),
            system_fonts: v.get("systemFonts").and_then(|b| b.as_bool()).unwrap_or(true),
        }
    }

    pub fn load(conn: &rusqlite::Connection) -> anyhow::Result<Self> {
        Ok(Self::from_value(&load_section(conn, SetupSection::Export)?))
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self::from_value(&default_section(SetupSection::Export))
    }
}

impl Theme {
    pub fn from_value(v: &Value) -> Self {
        Self {
            canvas: str_field(v, "canvas"),
            panel: str_field(v, "panel"),
            accent: str_field(v, "accent"),
            text: str_field(v, "text"),
            muted: str_field(v, "muted"),
            border: str_field(v, "border"),
            pass: str_field(v, "pass"),
            fail: str_field(v, "fail"),
        }
    }

    pub fn load(conn: &rusqlite::Connection) -> anyhow::Result<Self> {
        Ok(Self::from_value(&load_section(conn, SetupSection::Theme)?))
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_value(&default_section(SetupSection::Theme))
    }
}
