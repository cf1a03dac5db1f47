//! Question bank editing rules layered over the store.

use crate::scoring::chapter_key;
use crate::store::{Chapter, Quiz, QuizDraft, QuizStore, StoreError};

pub const OPTION_COUNT: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BankError {
    pub fn code(&self) -> &'static str {
        match self {
            BankError::Invalid(_) => "validation_failed",
            BankError::Store(e) => e.code(),
        }
    }
}

fn blank_to_none(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl QuizDraft {
    /// Trims fields and checks the draft against the quiz invariants.
    pub fn normalized(self) -> Result<QuizDraft, BankError> {
        let chapter = self.chapter.trim().to_string();
        if chapter.is_empty() {
            return Err(BankError::Invalid("select a chapter first".into()));
        }
        let question = self.question.trim().to_string();
        if question.is_empty() {
            return Err(BankError::Invalid("question text must not be empty".into()));
        }
        if self.options.len() != OPTION_COUNT {
            return Err(BankError::Invalid(format!(
                "exactly {} options are required, got {}",
                OPTION_COUNT,
                self.options.len()
            )));
        }
        let options: Vec<String> = self.options.iter().map(|o| o.trim().to_string()).collect();
        if let Some(i) = options.iter().position(|o| o.is_empty()) {
            return Err(BankError::Invalid(format!("option {} must not be empty", i)));
        }
        if !(0..OPTION_COUNT as i64).contains(&self.correct_answer) {
            return Err(BankError::Invalid(format!(
                "correctAnswer must be in 0..={}",
                OPTION_COUNT - 1
            )));
        }
        Ok(QuizDraft {
            chapter,
            question,
            options,
            correct_answer: self.correct_answer,
            image_url: blank_to_none(self.image_url),
            audio_url: blank_to_none(self.audio_url),
        })
    }
}

pub fn create_chapter(store: &dyn QuizStore, name: &str) -> Result<Chapter, BankError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BankError::Invalid("chapter name must not be empty".into()));
    }
    let chapter = store.insert_chapter(name)?;
    tracing::info!(chapter = %chapter.name, "chapter created");
    Ok(chapter)
}

/// Resolves the draft's chapter to its stored spelling so quizzes always
/// carry a name that exists in the chapter list.
fn resolve_chapter(store: &dyn QuizStore, draft: QuizDraft) -> Result<QuizDraft, BankError> {
    let draft = draft.normalized()?;
    let key = chapter_key(&draft.chapter);
    let chapter = store
        .list_chapters()?
        .into_iter()
        .find(|c| chapter_key(&c.name) == key)
        .ok_or_else(|| BankError::Invalid(format!("unknown chapter: {}", draft.chapter)))?;
    Ok(QuizDraft {
        chapter: chapter.name,
        ..draft
    })
}

pub fn create_quiz(store: &dyn QuizStore, draft: QuizDraft) -> Result<Quiz, BankError> {
    let draft = resolve_chapter(store, draft)?;
    let quiz = store.insert_quiz(&draft)?;
    tracing::info!(quiz_id = %quiz.id, chapter = %quiz.chapter, "quiz created");
    Ok(quiz)
}

pub fn update_quiz(store: &dyn QuizStore, id: &str, draft: QuizDraft) -> Result<Quiz, BankError> {
    let draft = resolve_chapter(store, draft)?;
    let quiz = store.update_quiz(id, &draft)?;
    tracing::info!(quiz_id = %quiz.id, "quiz updated");
    Ok(quiz)
}

pub fn delete_quiz(store: &dyn QuizStore, id: &str) -> Result<(), BankError> {
    store.delete_quiz(id)?;
    tracing::info!(quiz_id = id, "quiz deleted");
    Ok(())
}

/// `None` or `"ALL"` lists every quiz.
pub fn list_quizzes(store: &dyn QuizStore, chapter: Option<&str>) -> Result<Vec<Quiz>, BankError> {
    let quizzes = store.list_quizzes()?;
    match chapter.map(str::trim) {
        None | Some("ALL") | Some("") => Ok(quizzes),
        Some(ch) => {
            let key = chapter_key(ch);
            Ok(quizzes
                .into_iter()
                .filter(|q| chapter_key(&q.chapter) == key)
                .collect())
        }
    }
}
