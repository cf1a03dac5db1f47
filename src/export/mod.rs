//! Debrief export: styled view → sanitized clone → raster → one-page PDF.

pub mod font;
pub mod pdf;
pub mod raster;
pub mod style;
pub mod view;

use chrono::NaiveDate;
use image::codecs::jpeg::JpegEncoder;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{ExportConfig, Theme};
use crate::report::DebriefReport;
use font::{FontError, FontSet};
use raster::{RasterError, RasterOptions};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Font(#[from] FontError),
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error("jpeg encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("pdf assembly failed: {0}")]
    Assemble(#[source] std::io::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Export control state for one trainee. Failures are terminal until the
/// next explicit export request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ExportStatus {
    Idle,
    Preparing,
    Generated { path: String },
    Failed { message: String },
}

impl ExportStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ExportStatus::Idle => "GENERATE PDF DEBRIEFING",
            ExportStatus::Preparing => "PREPARING ENGINE...",
            ExportStatus::Generated { .. } => "REPORT GENERATED",
            ExportStatus::Failed { .. } => "ENGINE ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub path: PathBuf,
    pub file_name: String,
    pub bytes: usize,
    pub image_width: u32,
    pub image_height: u32,
    pub page_width_pt: f64,
    pub page_height_pt: f64,
    pub color_substitutions: usize,
}

pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub image_width: u32,
    pub image_height: u32,
    pub page: pdf::PageGeometry,
    pub color_substitutions: usize,
}

fn file_component(s: &str) -> String {
    let cleaned: String = s
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "UNKNOWN".to_string(),
        s => s.to_string(),
    }
}

/// `<PREFIX>_<student>_<YYYY-MM-DD>.pdf`
pub fn export_file_name(prefix: &str, student_name: &str, date: NaiveDate) -> String {
    format!(
        "{}_{}_{}.pdf",
        file_component(prefix),
        file_component(student_name),
        date.format("%Y-%m-%d")
    )
}

pub fn render_pdf(
    report: &DebriefReport,
    theme: &Theme,
    config: &ExportConfig,
) -> Result<RenderedPdf, ExportError> {
    let live = view::report_view(report, theme);
    let (clean, sanitized) = style::sanitize(&live);
    if sanitized.substitutions > 0 {
        tracing::debug!(
            nodes = sanitized.nodes,
            substitutions = sanitized.substitutions,
            "replaced wide-gamut colors for export"
        );
    }

    let fonts = FontSet::load(config.font_path.as_deref().map(Path::new), config.system_fonts)?;
    let img = raster::rasterize(
        &clean,
        &RasterOptions {
            width: view::VIEW_WIDTH,
            scale: config.scale,
            background: config.background.clone(),
        },
        &fonts,
    )?;
    let (width, height) = img.dimensions();
    let rgb = image::DynamicImage::ImageRgba8(img).to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, config.jpeg_quality).encode(
        rgb.as_raw(),
        width,
        height,
        image::ColorType::Rgb8,
    )?;

    let page = pdf::page_for_image(width, height, config.page_width_pt);
    let title = format!("{} debrief", report.student_name);
    let bytes = pdf::jpeg_page_pdf(&jpeg, width, height, &page, &title).map_err(ExportError::Assemble)?;
    Ok(RenderedPdf {
        bytes,
        image_width: width,
        image_height: height,
        page,
        color_substitutions: sanitized.substitutions,
    })
}

pub fn export_debrief(
    report: &DebriefReport,
    theme: &Theme,
    config: &ExportConfig,
    out_dir: &Path,
    date: NaiveDate,
) -> Result<ExportArtifact, ExportError> {
    let rendered = render_pdf(report, theme, config)?;
    let file_name = export_file_name(&config.filename_prefix, &report.student_name, date);
    let path = out_dir.join(&file_name);
    let write_err = |source| ExportError::Write {
        path: path.to_string_lossy().to_string(),
        source,
    };
    std::fs::create_dir_all(out_dir).map_err(write_err)?;
    std::fs::write(&path, &rendered.bytes).map_err(write_err)?;

    tracing::info!(
        student = %report.student_name,
        path = %path.display(),
        bytes = rendered.bytes.len(),
        "debrief exported"
    );
    Ok(ExportArtifact {
        file_name,
        bytes: rendered.bytes.len(),
        image_width: rendered.image_width,
        image_height: rendered.image_height,
        page_width_pt: rendered.page.width_pt,
        page_height_pt: rendered.page.height_pt,
        color_substitutions: rendered.color_substitutions,
        path,
    })
}
