// src/models/question.rs

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Option letter of a choice question. A question carries up to five
/// options; A and B are always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionKey {
    A,
    B,
    C,
    D,
    E,
}

impl OptionKey {
    /// Parses a single option letter, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "A" | "a" => Some(OptionKey::A),
            "B" | "b" => Some(OptionKey::B),
            "C" | "c" => Some(OptionKey::C),
            "D" | "d" => Some(OptionKey::D),
            "E" | "e" => Some(OptionKey::E),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKey::A => "A",
            OptionKey::B => "B",
            OptionKey::C => "C",
            OptionKey::D => "D",
            OptionKey::E => "E",
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid answer key '{0}'")]
pub struct AnswerKeyError(pub String);

/// Parses a comma-encoded answer key (e.g. "A,C") into an ordered set of
/// option letters. An empty or unrecognized key is an error: a question
/// with a broken key must fail the whole load, not silently score zero.
pub fn parse_answer_key(raw: &str) -> Result<BTreeSet<OptionKey>, AnswerKeyError> {
    let mut keys = BTreeSet::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let key = OptionKey::parse(part).ok_or_else(|| AnswerKeyError(raw.to_string()))?;
        keys.insert(key);
    }
    if keys.is_empty() {
        return Err(AnswerKeyError(raw.to_string()));
    }
    Ok(keys)
}

/// Encodes an answer-key set back into the comma form used by the storage layer.
pub fn encode_answer_key(keys: &BTreeSet<OptionKey>) -> String {
    keys.iter()
        .map(OptionKey::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Question type: single choice or multiple choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Single,
    Multiple,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Single => "single",
            QuestionType::Multiple => "multiple",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "single" => Some(QuestionType::Single),
            "multiple" => Some(QuestionType::Multiple),
            _ => None,
        }
    }
}

/// A question of an assignment, with its answer key already parsed.
///
/// This is the in-memory shape every component works with. The
/// comma-encoded `correct_answers` column is decoded exactly once, when a
/// row crosses the storage boundary; nothing downstream re-parses it.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: i64,
    pub assignment_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub option_a: String,
    pub option_b: String,
    pub option_c: Option<String>,
    pub option_d: Option<String>,
    pub option_e: Option<String>,
    pub correct_answers: BTreeSet<OptionKey>,
    pub marks: i32,
    pub explanation: Option<String>,
    pub question_order: i32,
    pub is_active: bool,
}

impl Question {
    /// Options actually present on this question, in letter order.
    pub fn options(&self) -> Vec<(OptionKey, &str)> {
        let mut opts = vec![
            (OptionKey::A, self.option_a.as_str()),
            (OptionKey::B, self.option_b.as_str()),
        ];
        for (key, text) in [
            (OptionKey::C, &self.option_c),
            (OptionKey::D, &self.option_d),
            (OptionKey::E, &self.option_e),
        ] {
            if let Some(text) = text {
                opts.push((key, text.as_str()));
            }
        }
        opts
    }
}

/// Raw `assignment_questions` row. Decoded into [`Question`] on load.
#[derive(Debug, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub assignment_id: i64,
    pub question_text: String,
    pub question_type: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: Option<String>,
    pub option_d: Option<String>,
    pub option_e: Option<String>,
    pub correct_answers: String,
    pub marks: i32,
    pub explanation: Option<String>,
    pub question_order: i32,
    pub is_active: bool,
}

impl TryFrom<QuestionRow> for Question {
    type Error = String;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let question_type = QuestionType::parse(&row.question_type)
            .ok_or_else(|| format!("unknown question type '{}'", row.question_type))?;
        let correct_answers = parse_answer_key(&row.correct_answers).map_err(|e| e.to_string())?;
        Ok(Question {
            id: row.id,
            assignment_id: row.assignment_id,
            question_text: row.question_text,
            question_type,
            option_a: row.option_a,
            option_b: row.option_b,
            option_c: row.option_c,
            option_d: row.option_d,
            option_e: row.option_e,
            correct_answers,
            marks: row.marks,
            explanation: row.explanation,
            question_order: row.question_order,
            is_active: row.is_active,
        })
    }
}

/// A single option as presented to a student.
#[derive(Debug, Serialize)]
pub struct PublicOption {
    pub key: OptionKey,
    pub text: String,
}

/// DTO for sending a question to a student during an attempt.
/// Excludes the answer key and the explanation.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub question_text: String,
    pub options: Vec<PublicOption>,
    pub marks: i32,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        PublicQuestion {
            id: q.id,
            question_type: q.question_type,
            question_text: q.question_text.clone(),
            options: q
                .options()
                .into_iter()
                .map(|(key, text)| PublicOption {
                    key,
                    text: text.to_string(),
                })
                .collect(),
            marks: q.marks,
        }
    }
}

/// DTO for creating or replacing a question. Staff only.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question_text: String,
    pub question_type: QuestionType,
    #[validate(length(min = 1, max = 500))]
    pub option_a: String,
    #[validate(length(min = 1, max = 500))]
    pub option_b: String,
    #[validate(length(max = 500))]
    pub option_c: Option<String>,
    #[validate(length(max = 500))]
    pub option_d: Option<String>,
    #[validate(length(max = 500))]
    pub option_e: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub correct_answers: String,
    #[validate(range(min = 1, max = 100))]
    pub marks: i32,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
    pub question_order: Option<i32>,
}

impl CreateQuestionRequest {
    /// Letters for which this request actually supplies an option.
    fn provided_keys(&self) -> BTreeSet<OptionKey> {
        let mut keys = BTreeSet::from([OptionKey::A, OptionKey::B]);
        for (key, text) in [
            (OptionKey::C, &self.option_c),
            (OptionKey::D, &self.option_d),
            (OptionKey::E, &self.option_e),
        ] {
            if text.as_deref().is_some_and(|t| !t.is_empty()) {
                keys.insert(key);
            }
        }
        keys
    }

    /// Cross-field validation of the answer key: every correct letter must
    /// name a provided option, and single-choice questions have exactly
    /// one correct letter.
    pub fn answer_key(&self) -> Result<BTreeSet<OptionKey>, String> {
        let keys = parse_answer_key(&self.correct_answers).map_err(|e| e.to_string())?;
        let provided = self.provided_keys();
        if let Some(missing) = keys.iter().find(|k| !provided.contains(k)) {
            return Err(format!("correct answer '{missing}' has no matching option"));
        }
        if self.question_type == QuestionType::Single && keys.len() != 1 {
            return Err("single-choice question must have exactly one correct answer".to_string());
        }
        Ok(keys)
    }
}
