//! Answer correctness for every question type.
//!
//! Everything here is pure: no I/O, no logging, no errors. Malformed stored
//! answers decode to an empty answer, which is never correct.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::models::{
    attempt::selection_tokens,
    question::{AnswerOption, QuestionType},
};

/// What the user submitted for one question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmittedAnswer {
    /// Selected option ids, position tokens, or matching labels, in submission order.
    /// select_three takes positions, or option ids written as `id:<id>`.
    pub selected: Vec<String>,
    pub text: Option<String>,
}

impl SubmittedAnswer {
    pub fn selection<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected: tokens.into_iter().map(Into::into).collect(),
            text: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            selected: Vec::new(),
            text: Some(text.into()),
        }
    }

    /// Rebuilds an answer from the `user_answers` columns.
    pub fn from_stored(answer_ids: Option<&str>, answer_text: Option<&str>) -> Self {
        Self {
            selected: answer_ids.map(decode_selection).unwrap_or_default(),
            text: answer_text
                .filter(|t| !t.trim().is_empty())
                .map(str::to_string),
        }
    }

    fn written_text(&self) -> Option<&str> {
        self.text.as_deref().or(match self.selected.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        })
    }
}

/// Decodes the serialized `answer_ids` column. Unparsable input yields no selection.
pub fn decode_selection(raw: &str) -> Vec<String> {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|value| selection_tokens(&value))
        .unwrap_or_default()
        .into_iter()
        .filter(|token| !token.is_empty())
        .collect()
}

/// Type-dependent reference data a submission is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrectnessSpec {
    /// Order-independent set of correct tokens.
    SingleSet(BTreeSet<String>),
    /// Position-exact sequence of labels.
    OrderedSequence(Vec<String>),
    /// Accepted free-text answers.
    TextSet(Vec<String>),
}

impl CorrectnessSpec {
    /// Derives the reference data for a question from its own options.
    pub fn for_question(question_type: QuestionType, options: &[AnswerOption]) -> Self {
        match question_type {
            QuestionType::SingleChoice | QuestionType::MultipleAnswers => Self::SingleSet(
                options
                    .iter()
                    .filter(|o| o.is_correct)
                    .map(|o| o.id.to_string())
                    .collect(),
            ),
            QuestionType::SelectThree => Self::SingleSet(
                options
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| o.is_correct)
                    .map(|(index, o)| position_token(index, o))
                    .collect(),
            ),
            QuestionType::Matching => {
                let mut pairs: Vec<(usize, &AnswerOption)> = options
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| o.matching_pair.is_some())
                    .collect();
                // Unordered options go last; ties keep stored order.
                pairs.sort_by_key(|(index, o)| (o.order.is_none(), o.order, *index));
                Self::OrderedSequence(
                    pairs
                        .into_iter()
                        .filter_map(|(_, o)| o.matching_pair.as_deref())
                        .map(|label| label.trim().to_string())
                        .collect(),
                )
            }
            QuestionType::Written => Self::TextSet(
                options
                    .iter()
                    .filter(|o| o.is_correct)
                    .map(|o| o.text.clone())
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub is_correct: bool,
}

/// Compares a submission with the reference data for its type.
///
/// For select_three the submission must already be in position-token space;
/// [`AnswerKey::evaluate`] takes care of that.
pub fn evaluate(
    question_type: QuestionType,
    submitted: &SubmittedAnswer,
    spec: &CorrectnessSpec,
) -> Evaluation {
    let is_correct = match (question_type, spec) {
        (
            QuestionType::SingleChoice | QuestionType::MultipleAnswers | QuestionType::SelectThree,
            CorrectnessSpec::SingleSet(correct),
        ) => {
            let chosen: BTreeSet<String> = submitted
                .selected
                .iter()
                .map(|token| token.trim())
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect();
            !chosen.is_empty() && chosen == *correct
        }
        (QuestionType::Matching, CorrectnessSpec::OrderedSequence(expected)) => {
            !submitted.selected.is_empty()
                && submitted.selected.len() == expected.len()
                && submitted
                    .selected
                    .iter()
                    .zip(expected)
                    .all(|(got, want)| got.trim() == want)
        }
        (QuestionType::Written, CorrectnessSpec::TextSet(accepted)) => {
            match submitted.written_text().map(normalize_text) {
                Some(text) if !text.is_empty() => {
                    accepted.iter().any(|candidate| normalize_text(candidate) == text)
                }
                _ => false,
            }
        }
        _ => false,
    };

    Evaluation { is_correct }
}

/// Marks a select_three token as an option id instead of a position.
pub const OPTION_ID_PREFIX: &str = "id:";

/// A question's correctness spec plus the lookup needed to normalize submissions.
#[derive(Debug, Clone)]
pub struct AnswerKey {
    question_type: QuestionType,
    spec: CorrectnessSpec,
    /// Option id -> position token, only for select_three.
    positions: HashMap<String, String>,
}

impl AnswerKey {
    pub fn new(question_type: QuestionType, options: &[AnswerOption]) -> Self {
        let positions = if question_type == QuestionType::SelectThree {
            options
                .iter()
                .enumerate()
                .map(|(index, o)| (o.id.to_string(), position_token(index, o)))
                .collect()
        } else {
            HashMap::new()
        };

        Self {
            question_type,
            spec: CorrectnessSpec::for_question(question_type, options),
            positions,
        }
    }

    pub fn spec(&self) -> &CorrectnessSpec {
        &self.spec
    }

    /// Bare tokens are positions. `id:<option id>` names an option explicitly;
    /// an unknown id is kept verbatim so it never matches a position.
    fn position_of(&self, token: &str) -> String {
        token
            .strip_prefix(OPTION_ID_PREFIX)
            .and_then(|id| self.positions.get(id.trim()))
            .cloned()
            .unwrap_or_else(|| token.to_string())
    }

    pub fn evaluate(&self, submitted: &SubmittedAnswer) -> Evaluation {
        if self.question_type != QuestionType::SelectThree {
            return evaluate(self.question_type, submitted, &self.spec);
        }

        let normalized = SubmittedAnswer {
            selected: submitted
                .selected
                .iter()
                .map(|token| self.position_of(token.trim()))
                .collect(),
            text: None,
        };
        evaluate(self.question_type, &normalized, &self.spec)
    }
}

/// Convenience wrapper for one-off checks.
pub fn evaluate_question(
    question_type: QuestionType,
    options: &[AnswerOption],
    submitted: &SubmittedAnswer,
) -> Evaluation {
    AnswerKey::new(question_type, options).evaluate(submitted)
}

fn position_token(index: usize, option: &AnswerOption) -> String {
    option
        .order
        .map(|order| order.to_string())
        .unwrap_or_else(|| (index + 1).to_string())
}

fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}
