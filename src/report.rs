use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::scoring::{chapter_key, coerce_score};
use crate::store::{Quiz, Submission};

pub const NO_DATA: &str = "NO DATA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JoinMode {
    /// Answers carry the id of the quiz they answered.
    ByQuestionId,
    /// Legacy rows: answer i belongs to the i-th quiz of the chapter.
    Positional,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebriefRow {
    pub position: usize,
    pub quiz_id: String,
    pub question: String,
    pub image_url: Option<String>,
    pub selected_index: Option<i64>,
    pub selected_letter: Option<String>,
    pub selected_text: String,
    pub correct: bool,
    pub correct_letter: Option<String>,
    pub correct_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebriefSection {
    pub submission_id: String,
    pub chapter: String,
    pub score: f64,
    pub passed: bool,
    pub created_at: String,
    pub join_mode: JoinMode,
    pub correct_count: usize,
    pub rows: Vec<DebriefRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebriefReport {
    pub student_name: String,
    pub generated_on: String,
    pub sections: Vec<DebriefSection>,
    pub digest: String,
}

/// `A`, `B`, `C`, ... for an option index.
pub fn option_letter(index: i64) -> Option<String> {
    u8::try_from(index)
        .ok()
        .filter(|i| *i < 26)
        .map(|i| char::from(b'A' + i).to_string())
}

fn build_row(position: usize, quiz: &Quiz, selected: Option<i64>) -> DebriefRow {
    let selected_text = selected
        .and_then(|i| usize::try_from(i).ok())
        .and_then(|i| quiz.options.get(i))
        .cloned();
    let in_range = selected_text.is_some();
    let correct = in_range && selected == Some(quiz.correct_answer);
    let correct_text = usize::try_from(quiz.correct_answer)
        .ok()
        .and_then(|i| quiz.options.get(i))
        .cloned();

    DebriefRow {
        position,
        quiz_id: quiz.id.clone(),
        question: quiz.question.clone(),
        image_url: quiz.image_url.clone(),
        selected_index: selected,
        selected_letter: if in_range { selected.and_then(option_letter) } else { None },
        selected_text: selected_text.unwrap_or_else(|| NO_DATA.to_string()),
        correct,
        correct_letter: if correct { None } else { option_letter(quiz.correct_answer) },
        correct_text: if correct { None } else { correct_text },
    }
}

/// Pairs each answer of `submission` with its quiz. Never fails: missing
/// answers render `NO DATA`, answers without a quiz render nothing.
pub fn debrief_section(submission: &Submission, quizzes: &[Quiz], pass_threshold: f64) -> DebriefSection {
    let (join_mode, rows) = match &submission.question_ids {
        Some(ids) => {
            let by_id: HashMap<&str, &Quiz> = quizzes.iter().map(|q| (q.id.as_str(), q)).collect();
            let rows: Vec<DebriefRow> = ids
                .iter()
                .enumerate()
                .filter_map(|(i, id)| by_id.get(id.as_str()).map(|q| (i, *q)))
                .map(|(i, q)| build_row(i + 1, q, submission.raw_results.get(i).copied().flatten()))
                .collect();
            (JoinMode::ByQuestionId, rows)
        }
        None => {
            let key = chapter_key(&submission.chapter);
            let rows: Vec<DebriefRow> = quizzes
                .iter()
                .filter(|q| chapter_key(&q.chapter) == key)
                .enumerate()
                .map(|(i, q)| build_row(i + 1, q, submission.raw_results.get(i).copied().flatten()))
                .collect();
            (JoinMode::Positional, rows)
        }
    };
    let score = coerce_score(&submission.score);

    DebriefSection {
        submission_id: submission.id.clone(),
        chapter: submission.chapter.clone(),
        score,
        passed: score >= pass_threshold,
        created_at: submission.created_at.clone(),
        join_mode,
        correct_count: rows.iter().filter(|r| r.correct).count(),
        rows,
    }
}

fn digest_sections(student_name: &str, sections: &[DebriefSection]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(student_name.as_bytes());
    hasher.update([0u8]);
    // serde_json only fails on non-string map keys or a failing custom
    // Serialize impl; sections have neither, and non-finite floats write as null.
    if let Err(e) = serde_json::to_writer(&mut hasher, sections) {
        tracing::error!(student = student_name, error = %e, "debrief digest covers the name only");
    }
    let out = hasher.finalize();
    out.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn build_report(
    student_name: &str,
    submissions: &[Submission],
    quizzes: &[Quiz],
    pass_threshold: f64,
    generated_on: &str,
) -> DebriefReport {
    let sections: Vec<DebriefSection> = submissions
        .iter()
        .map(|s| debrief_section(s, quizzes, pass_threshold))
        .collect();
    DebriefReport {
        student_name: student_name.to_string(),
        generated_on: generated_on.to_string(),
        digest: digest_sections(student_name, &sections),
        sections,
    }
}

/// Report over every submission of one trainee (exact name match), newest first.
pub fn student_debrief(
    student_name: &str,
    submissions: &[Submission],
    quizzes: &[Quiz],
    pass_threshold: f64,
    generated_on: &str,
) -> DebriefReport {
    let mine: Vec<Submission> = submissions
        .iter()
        .filter(|s| s.student_name == student_name)
        .cloned()
        .collect();
    build_report(student_name, &mine, quizzes, pass_threshold, generated_on)
}
