use serde::Serialize;
use std::collections::HashSet;

use crate::store::{Quiz, ScoreValue, Submission};

pub const DEFAULT_PASS_THRESHOLD: f64 = 70.0;

/// The one comparison used wherever chapters are matched or grouped by name.
pub fn chapter_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// `Math.round` for the non-negative values scores produce.
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// `toFixed(1)` for non-negative values: `Int(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Unsigned `0x`/`0o`/`0b` literal, as `Number("0x10")` reads it.
fn parse_radix_literal(t: &str) -> Option<f64> {
    let radix = match t.get(..2)? {
        "0x" | "0X" => 16,
        "0o" | "0O" => 8,
        "0b" | "0B" => 2,
        _ => return None,
    };
    let digits = &t[2..];
    if digits.is_empty() {
        return None;
    }
    digits
        .chars()
        .try_fold(0.0, |acc, c| c.to_digit(radix).map(|d| acc * radix as f64 + d as f64))
}

/// Numeric value of a stored score: numbers pass through, numeric text is
/// parsed, everything else counts as 0. Never drops the row.
///
/// Text accepts signed decimals with optional exponent (`" 85 "`, `"-1.5e2"`)
/// and unsigned radix literals (`"0x10"`, `"0o17"`, `"0b101"`). Anything
/// non-finite, including `"Infinity"`, coerces to 0.
pub fn coerce_score(score: &ScoreValue) -> f64 {
    let v = match score {
        ScoreValue::Missing => 0.0,
        ScoreValue::Number(n) => *n,
        ScoreValue::Text(s) => {
            let t = s.trim();
            if t.is_empty() {
                0.0
            } else {
                parse_radix_literal(t)
                    .or_else(|| t.parse::<f64>().ok())
                    .unwrap_or(0.0)
            }
        }
    };
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Percentage of answers matching the positional correct answer.
/// An empty question list scores 0.
pub fn score(answers: &[i64], quizzes: &[&Quiz]) -> i64 {
    if quizzes.is_empty() {
        return 0;
    }
    let correct = quizzes
        .iter()
        .enumerate()
        .filter(|(i, q)| answers.get(*i) == Some(&q.correct_answer))
        .count();
    round_half_up(100.0 * correct as f64 / quizzes.len() as f64) as i64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub avg_score: String,
    pub total_students: usize,
    pub pass_rate: String,
}

pub fn aggregate(submissions: &[Submission], pass_threshold: f64) -> AggregateStats {
    let total_students = submissions
        .iter()
        .map(|s| s.student_name.as_str())
        .filter(|n| !n.trim().is_empty())
        .collect::<HashSet<_>>()
        .len();

    if submissions.is_empty() {
        return AggregateStats {
            avg_score: "0".into(),
            total_students,
            pass_rate: "0".into(),
        };
    }

    let n = submissions.len() as f64;
    let (sum, passed) = submissions.iter().fold((0.0, 0usize), |(sum, passed), s| {
        let v = coerce_score(&s.score);
        (sum + v, passed + usize::from(v >= pass_threshold))
    });

    AggregateStats {
        avg_score: format!("{:.1}", round_off_1_decimal(sum / n)),
        total_students,
        pass_rate: format!("{:.0}", round_half_up(100.0 * passed as f64 / n)),
    }
}

/// Whole-number mean score of one chapter's submissions, `"0"` when it has none.
pub fn chapter_average(chapter: &str, submissions: &[Submission]) -> String {
    let key = chapter_key(chapter);
    let scores: Vec<f64> = submissions
        .iter()
        .filter(|s| chapter_key(&s.chapter) == key)
        .map(|s| coerce_score(&s.score))
        .collect();
    if scores.is_empty() {
        return "0".into();
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    format!("{:.0}", round_half_up(mean))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterProficiency {
    pub chapter: String,
    pub avg: String,
}

/// One entry per chapter that has questions, in the order the chapters first
/// appear in the quiz list.
pub fn proficiency_index(quizzes: &[Quiz], submissions: &[Submission]) -> Vec<ChapterProficiency> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for q in quizzes {
        let key = chapter_key(&q.chapter);
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        out.push(ChapterProficiency {
            chapter: q.chapter.trim().to_string(),
            avg: chapter_average(&q.chapter, submissions),
        });
    }
    out
}

/// Distinct non-blank trainee names in submission order.
pub fn roster(submissions: &[Submission]) -> Vec<String> {
    let mut seen = HashSet::new();
    submissions
        .iter()
        .filter(|s| !s.student_name.trim().is_empty())
        .filter(|s| seen.insert(s.student_name.as_str()))
        .map(|s| s.student_name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz(id: &str, chapter: &str, correct: i64) -> Quiz {
        Quiz {
            id: id.into(),
            chapter: chapter.into(),
            question: format!("question {}", id),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_answer: correct,
            image_url: None,
            audio_url: None,
        }
    }

    fn sub(name: &str, chapter: &str, score: ScoreValue) -> Submission {
        Submission {
            id: format!("{}-{}", name, chapter),
            student_name: name.into(),
            chapter: chapter.into(),
            score,
            raw_results: vec![],
            question_ids: None,
            created_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn single_question_scores_all_or_nothing() {
        let q = quiz("1", "Radio", 1);
        assert_eq!(score(&[1], &[&q]), 100);
        assert_eq!(score(&[0], &[&q]), 0);
    }

    #[test]
    fn score_rounds_half_up_and_guards_empty() {
        let qs = [quiz("1", "R", 0), quiz("2", "R", 0), quiz("3", "R", 0)];
        let refs: Vec<&Quiz> = qs.iter().collect();
        assert_eq!(score(&[0, 1, 1], &refs), 33);
        assert_eq!(score(&[0, 0, 1], &refs), 67);
        // Missing answers count as wrong.
        assert_eq!(score(&[0], &refs), 33);
        assert_eq!(score(&[0, 0], &[]), 0);

        let eight: Vec<Quiz> = (0..8).map(|i| quiz(&i.to_string(), "R", 2)).collect();
        let refs: Vec<&Quiz> = eight.iter().collect();
        // 1/8 = 12.5 -> 13
        assert_eq!(score(&[2], &refs), 13);
    }

    #[test]
    fn score_is_a_multiple_of_the_step() {
        for n in 1..=9usize {
            let qs: Vec<Quiz> = (0..n).map(|i| quiz(&i.to_string(), "R", 1)).collect();
            let refs: Vec<&Quiz> = qs.iter().collect();
            for k in 0..=n {
                let answers: Vec<i64> = (0..n).map(|i| if i < k { 1 } else { 0 }).collect();
                let expected = round_half_up(100.0 * k as f64 / n as f64) as i64;
                assert_eq!(score(&answers, &refs), expected, "n={} k={}", n, k);
            }
        }
    }

    #[test]
    fn aggregate_of_nothing_is_zero() {
        assert_eq!(
            aggregate(&[], DEFAULT_PASS_THRESHOLD),
            AggregateStats {
                avg_score: "0".into(),
                total_students: 0,
                pass_rate: "0".into(),
            }
        );
    }

    #[test]
    fn aggregate_coerces_bad_scores_to_zero() {
        let subs = vec![
            sub("A", "Radio", ScoreValue::Number(80.0)),
            sub("B", "Radio", ScoreValue::Text("bad".into())),
            sub("C", "Radio", ScoreValue::Number(60.0)),
        ];
        let stats = aggregate(&subs, DEFAULT_PASS_THRESHOLD);
        assert_eq!(stats.avg_score, "46.7");
        assert_eq!(stats.pass_rate, "33");
        assert_eq!(stats.total_students, 3);
    }

    #[test]
    fn aggregate_ignores_order_and_blank_names() {
        let mut subs = vec![
            sub("A", "Radio", ScoreValue::Number(90.0)),
            sub("A", "Nav", ScoreValue::Text(" 70 ".into())),
            sub("", "Nav", ScoreValue::Missing),
            sub("  ", "Nav", ScoreValue::Number(10.0)),
        ];
        let forward = aggregate(&subs, DEFAULT_PASS_THRESHOLD);
        subs.reverse();
        let backward = aggregate(&subs, DEFAULT_PASS_THRESHOLD);
        assert_eq!(forward, backward);
        assert_eq!(forward.total_students, 1);
        assert_eq!(forward.avg_score, "42.5");
        assert_eq!(forward.pass_rate, "50");
    }

    #[test]
    fn chapter_average_matches_normalized_names() {
        let subs = vec![
            sub("A", " Radio ", ScoreValue::Number(100.0)),
            sub("B", "radio", ScoreValue::Number(33.0)),
            sub("C", "Nav", ScoreValue::Number(10.0)),
        ];
        assert_eq!(chapter_average("RADIO", &subs), "67");
        assert_eq!(chapter_average("Approach", &subs), "0");
    }

    #[test]
    fn proficiency_lists_each_quiz_chapter_once() {
        let quizzes = vec![
            quiz("1", "Radio", 0),
            quiz("2", "Nav", 0),
            quiz("3", " radio", 0),
            quiz("4", "  ", 0),
        ];
        let subs = vec![sub("A", "Nav", ScoreValue::Number(55.0))];
        let idx = proficiency_index(&quizzes, &subs);
        assert_eq!(
            idx,
            vec![
                ChapterProficiency {
                    chapter: "Radio".into(),
                    avg: "0".into()
                },
                ChapterProficiency {
                    chapter: "Nav".into(),
                    avg: "55".into()
                },
            ]
        );
    }

    #[test]
    fn coerce_handles_text_and_non_finite() {
        assert_eq!(coerce_score(&ScoreValue::Text("".into())), 0.0);
        assert_eq!(coerce_score(&ScoreValue::Text("85.5".into())), 85.5);
        assert_eq!(coerce_score(&ScoreValue::Text("NaN".into())), 0.0);
        assert_eq!(coerce_score(&ScoreValue::Number(f64::NAN)), 0.0);
    }

    #[test]
    fn coerce_reads_radix_literals_like_number() {
        let text = |s: &str| coerce_score(&ScoreValue::Text(s.into()));
        assert_eq!(text("0x10"), 16.0);
        assert_eq!(text(" 0X1f "), 31.0);
        assert_eq!(text("0o17"), 15.0);
        assert_eq!(text("0b101"), 5.0);
        assert_eq!(text("-1.5e2"), -150.0);
        for garbage in ["0x", "0xg", "-0x10", "0b2", "Infinity"] {
            assert_eq!(text(garbage), 0.0, "{}", garbage);
        }
    }

    #[test]
    fn roster_keeps_first_seen_order() {
        let subs = vec![
            sub("B", "R", ScoreValue::Missing),
            sub("A", "R", ScoreValue::Missing),
            sub("B", "N", ScoreValue::Missing),
        ];
        assert_eq!(roster(&subs), vec!["B".to_string(), "A".to_string()]);
    }
}
