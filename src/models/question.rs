// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The five answer formats a question can take.
/// Stored in the `questions.type` column as the snake_case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleAnswers,
    SelectThree,
    Matching,
    Written,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleChoice => "single_choice",
            Self::MultipleAnswers => "multiple_answers",
            Self::SelectThree => "select_three",
            Self::Matching => "matching",
            Self::Written => "written",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "single_choice" => Ok(Self::SingleChoice),
            "multiple_answers" => Ok(Self::MultipleAnswers),
            "select_three" => Ok(Self::SelectThree),
            "matching" => Ok(Self::Matching),
            "written" => Ok(Self::Written),
            other => Err(format!("unknown question type '{other}'")),
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRow {
    pub id: i64,
    pub test_id: i64,
    pub position: i32,

    /// Mapped from the column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type")]
    pub question_type: String,

    pub text: String,

    /// Weight of the question in the raw score.
    pub points: i32,
}

/// Represents the 'answers' table: one selectable option of a question.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,

    /// Display order; also the position token for select_three questions.
    #[sqlx(rename = "sort_order")]
    pub order: Option<i32>,

    /// Right-hand label for matching questions.
    pub matching_pair: Option<String>,
}
