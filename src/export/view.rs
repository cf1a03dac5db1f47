//! Debrief report laid out as a styled node tree, colored from the theme.

use super::raster::NO_EXPORT_CLASS;
use super::style::{Align, Style, StyledNode};
use crate::config::Theme;
use crate::report::{DebriefReport, DebriefRow, DebriefSection};
use crate::scoring::round_off_1_decimal;

pub const VIEW_WIDTH: u32 = 800;

fn text_style(color: &str, font_size: u32) -> Style {
    Style {
        color: color.to_string(),
        font_size,
        ..Style::default()
    }
}

fn label(text: impl Into<String>, color: &str) -> StyledNode {
    StyledNode::text("span", text, text_style(color, 10))
}

fn header(report: &DebriefReport, theme: &Theme) -> StyledNode {
    let left = StyledNode::block(
        "div",
        Style { gap: 4, ..Style::default() },
        vec![
            StyledNode::text("h1", report.student_name.to_uppercase(), text_style(&theme.text, 32)),
            label("DEBRIEFING REPORT // INTERNAL AUDIT", &theme.accent),
        ],
    );
    let right = StyledNode::block(
        "div",
        Style { gap: 4, ..Style::default() },
        vec![
            StyledNode::text("p", format!("DATE: {}", report.generated_on), Style {
                align: Align::Right,
                ..text_style(&theme.muted, 10)
            }),
            StyledNode::text("p", "VSJX ACADEMY OPERATIONS", Style {
                align: Align::Right,
                ..text_style(&theme.muted, 10)
            }),
        ],
    );
    StyledNode::row(
        "header",
        Style {
            border_color: theme.accent.clone(),
            border_width: 1,
            padding: 12,
            ..Style::default()
        },
        vec![2, 1],
        vec![left, right],
    )
}

fn row_view(row: &DebriefRow, theme: &Theme) -> StyledNode {
    let (verdict_color, verdict) = if row.correct {
        (&theme.pass, "CORRECT")
    } else {
        (&theme.fail, "INCORRECT")
    };
    let selected = match &row.selected_letter {
        Some(letter) => format!("{}: {}", letter, row.selected_text),
        None => row.selected_text.clone(),
    };

    let mut answer = vec![
        label(verdict, verdict_color),
        StyledNode::text("p", selected, text_style(verdict_color, 12)),
    ];
    if let (Some(letter), Some(text)) = (&row.correct_letter, &row.correct_text) {
        answer.push(StyledNode::text(
            "p",
            format!("TRUE: {}: {}", letter, text),
            text_style(&theme.accent, 12),
        ));
    }

    let mut question = vec![StyledNode::text("p", row.question.as_str(), text_style(&theme.text, 12))];
    if let Some(url) = &row.image_url {
        question.push(label(format!("VISUAL REF: {}", url), &theme.muted));
    }

    StyledNode::row(
        "div",
        Style {
            border_color: theme.border.clone(),
            border_width: 1,
            padding: 8,
            gap: 12,
            ..Style::default()
        },
        vec![1, 7, 4],
        vec![
            label(format!("#{:02}", row.position), &theme.muted),
            StyledNode::block("div", Style { gap: 4, ..Style::default() }, question),
            StyledNode::block("div", Style { gap: 2, ..Style::default() }, answer),
        ],
    )
}

fn section_view(section: &DebriefSection, theme: &Theme) -> StyledNode {
    let score_color = if section.passed { &theme.pass } else { &theme.fail };
    let head = StyledNode::row(
        "div",
        Style::default(),
        vec![3, 1],
        vec![
            StyledNode::block(
                "div",
                Style { gap: 4, ..Style::default() },
                vec![
                    label(format!("MISSION // {}", section.created_at), &theme.muted),
                    StyledNode::text("h3", section.chapter.to_uppercase(), text_style(&theme.text, 16)),
                ],
            ),
            StyledNode::text("p", format!("{}%", round_off_1_decimal(section.score)), Style {
                align: Align::Right,
                ..text_style(score_color, 24)
            }),
        ],
    );
    let tally = label(
        format!("{}/{} CORRECT", section.correct_count, section.rows.len()),
        &theme.muted,
    );

    let mut children = vec![head, tally];
    children.extend(section.rows.iter().map(|r| row_view(r, theme)));
    StyledNode::block(
        "section",
        Style {
            background_color: theme.panel.clone(),
            border_color: theme.border.clone(),
            border_width: 1,
            padding: 16,
            gap: 8,
            ..Style::default()
        },
        children,
    )
}

fn footer(report: &DebriefReport, theme: &Theme) -> StyledNode {
    let digest: String = report.digest.chars().take(16).collect();
    StyledNode::row(
        "footer",
        Style {
            border_color: theme.border.clone(),
            border_width: 1,
            padding: 12,
            ..Style::default()
        },
        vec![2, 1],
        vec![
            StyledNode::block(
                "div",
                Style { gap: 4, ..Style::default() },
                vec![
                    label("AUTHENTICITY VERIFIED BY VSJX SYSTEM LOG", &theme.muted),
                    label(format!("DIGEST {}", digest.to_uppercase()), &theme.muted),
                ],
            ),
            StyledNode::text("p", "FLIGHT COMMAND", Style {
                align: Align::Right,
                ..text_style(&theme.accent, 16)
            }),
        ],
    )
}

/// The on-screen debrief. The action bar is classed `no-export`.
pub fn report_view(report: &DebriefReport, theme: &Theme) -> StyledNode {
    let actions = StyledNode::row(
        "nav",
        Style {
            background_color: theme.accent.clone(),
            padding: 6,
            ..Style::default()
        },
        vec![1],
        vec![StyledNode::text("button", "GENERATE PDF DEBRIEFING", Style {
            align: Align::Center,
            ..text_style(&theme.canvas, 12)
        })],
    )
    .with_class(NO_EXPORT_CLASS);

    let mut children = vec![actions, header(report, theme)];
    if report.sections.is_empty() {
        children.push(StyledNode::text("p", "NO FLIGHT RECORDS", Style {
            align: Align::Center,
            padding: 24,
            ..text_style(&theme.muted, 16)
        }));
    }
    children.extend(report.sections.iter().map(|s| section_view(s, theme)));
    children.push(footer(report, theme));

    StyledNode::block(
        "article",
        Style {
            color: theme.text.clone(),
            background_color: theme.canvas.clone(),
            border_color: theme.border.clone(),
            border_width: 1,
            padding: 24,
            gap: 16,
            ..Style::default()
        },
        children,
    )
}
