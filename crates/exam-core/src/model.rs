//! Papers, questions, and grading.
//!
//! The JSON shape here is the wire format pushed to the remote store, so
//! field names are camelCase and `createdAt` is epoch milliseconds.

use chrono::{DateTime, Local, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ExamError, Result};

/// Whether an answer is edited on one line or many.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    #[default]
    #[serde(alias = "input")]
    Short,
    #[serde(alias = "textarea")]
    Long,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Short => "short",
            QuestionType::Long => "long",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            QuestionType::Short => QuestionType::Long,
            QuestionType::Long => QuestionType::Short,
        }
    }

    fn parse_lenient(raw: Option<&str>) -> Self {
        match raw {
            Some("long") | Some("textarea") => QuestionType::Long,
            _ => QuestionType::Short,
        }
    }
}

/// Auxiliary A/B/C tag. Not part of grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionTag {
    A,
    B,
    C,
}

impl OptionTag {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "A" | "a" => Some(OptionTag::A),
            "B" | "b" => Some(OptionTag::B),
            "C" | "c" => Some(OptionTag::C),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptionTag::A => "A",
            OptionTag::B => "B",
            OptionTag::C => "C",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub user_answer: String,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(rename = "type", default)]
    pub kind: QuestionType,
    #[serde(default)]
    pub starred: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<OptionTag>,
    #[serde(default)]
    pub memo: String,
}

impl Question {
    pub fn blank(kind: QuestionType) -> Self {
        Self {
            id: new_id(),
            user_answer: String::new(),
            correct_answer: String::new(),
            kind,
            starred: false,
            selected_option: None,
            memo: String::new(),
        }
    }

    /// Nothing has been written into this question yet.
    pub fn is_blank(&self) -> bool {
        self.user_answer.trim().is_empty()
            && self.correct_answer.trim().is_empty()
            && self.memo.trim().is_empty()
    }

    /// The answer key is filled in and the user's answer does not match it.
    pub fn is_incorrect(&self) -> bool {
        let correct = self.correct_answer.trim();
        !correct.is_empty() && correct != self.user_answer.trim()
    }

    pub fn is_correct(&self) -> bool {
        let correct = self.correct_answer.trim();
        !correct.is_empty() && correct == self.user_answer.trim()
    }

    /// Option tag and outcome, once the answer key is filled in.
    pub fn score_state(&self) -> Option<ScoreState> {
        if self.correct_answer.trim().is_empty() {
            return None;
        }
        Some(ScoreState {
            option: self.selected_option,
            correct: self.is_correct(),
        })
    }

    /// Lenient read of one question. `fallback_id` is used when the entry
    /// carries no usable id.
    fn from_value(value: &Value, fallback_id: impl FnOnce() -> String) -> Self {
        let text = |field: &str| {
            value
                .get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            id: value.get("id").and_then(id_string).unwrap_or_else(fallback_id),
            user_answer: text("userAnswer"),
            correct_answer: text("correctAnswer"),
            kind: QuestionType::parse_lenient(value.get("type").and_then(Value::as_str)),
            starred: value
                .get("starred")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            selected_option: value
                .get("selectedOption")
                .and_then(Value::as_str)
                .and_then(OptionTag::parse),
            memo: text("memo"),
        }
    }
}

/// A question set.
///
/// `created_at` is kept at millisecond precision so a paper survives the
/// trip through its JSON form unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub questions: Vec<Question>,
}

/// Grading summary for one paper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Score {
    /// Questions counted, excluding the blank trailing one.
    pub total: usize,
    pub answered: usize,
    /// Questions whose answer key is filled in.
    pub keyed: usize,
    pub correct: usize,
    pub incorrect: usize,
}

/// A keyed question's option tag crossed with its outcome.
///
/// Labels read `AO`, `BX`, `NO` and so on: the tag (`N` for none) then `O`
/// for correct or `X` for wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScoreState {
    pub option: Option<OptionTag>,
    pub correct: bool,
}

impl ScoreState {
    pub fn label(self) -> String {
        let tag = self.option.map_or("N", OptionTag::as_str);
        format!("{}{}", tag, if self.correct { "O" } else { "X" })
    }
}

/// Which graded questions a score review lists.
///
/// Empty `options` keeps every tag; `None` in it stands for untagged
/// questions. Setting neither `correct` nor `wrong` keeps both outcomes.
/// Once a tag or outcome is asked for, unkeyed questions drop out since
/// they have no state to match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreFilter {
    pub options: Vec<Option<OptionTag>>,
    pub correct: bool,
    pub wrong: bool,
    pub starred_only: bool,
}

impl ScoreFilter {
    /// Only wrong answers, as on a printed review sheet.
    pub fn wrong_only() -> Self {
        Self {
            wrong: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn matches(&self, question: &Question) -> bool {
        if self.starred_only && !question.starred {
            return false;
        }
        if self.options.is_empty() && !self.correct && !self.wrong {
            return true;
        }
        let Some(state) = question.score_state() else {
            return false;
        };
        let option_ok = self.options.is_empty() || self.options.contains(&state.option);
        let outcome_ok = (!self.correct && !self.wrong)
            || (self.correct && state.correct)
            || (self.wrong && !state.correct);
        option_ok && outcome_ok
    }
}

impl Paper {
    /// Start a paper with one blank short question.
    pub fn new(title: &str, now: DateTime<Utc>) -> Result<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ExamError::InvalidInput("Title cannot be empty".to_string()));
        }

        Ok(Self {
            id: new_id(),
            title: title.to_string(),
            subtitle: None,
            created_at: now.trunc_subsecs(3),
            questions: vec![Question::blank(QuestionType::Short)],
        })
    }

    pub fn question(&self, index: usize) -> Result<&Question> {
        self.questions
            .get(index)
            .ok_or_else(|| ExamError::NotFound(format!("Question {}", index + 1)))
    }

    fn question_mut(&mut self, index: usize) -> Result<&mut Question> {
        self.questions
            .get_mut(index)
            .ok_or_else(|| ExamError::NotFound(format!("Question {}", index + 1)))
    }

    /// Record the user's answer.
    ///
    /// Writing a non-blank answer into the last question appends a fresh
    /// blank question of the same type. Returns whether one was appended.
    pub fn set_user_answer(&mut self, index: usize, value: &str) -> Result<bool> {
        let last = self.questions.len().saturating_sub(1);
        let question = self.question_mut(index)?;
        question.user_answer = value.to_string();
        let kind = question.kind;

        if index == last && !value.trim().is_empty() {
            self.questions.push(Question::blank(kind));
            return Ok(true);
        }
        Ok(false)
    }

    pub fn set_correct_answer(&mut self, index: usize, value: &str) -> Result<()> {
        self.question_mut(index)?.correct_answer = value.to_string();
        Ok(())
    }

    pub fn set_memo(&mut self, index: usize, value: &str) -> Result<()> {
        self.question_mut(index)?.memo = value.to_string();
        Ok(())
    }

    pub fn toggle_type(&mut self, index: usize) -> Result<QuestionType> {
        let question = self.question_mut(index)?;
        question.kind = question.kind.toggled();
        Ok(question.kind)
    }

    pub fn toggle_starred(&mut self, index: usize) -> Result<bool> {
        let question = self.question_mut(index)?;
        question.starred = !question.starred;
        Ok(question.starred)
    }

    /// Set or clear the A/B/C tag.
    pub fn select_option(&mut self, index: usize, option: Option<OptionTag>) -> Result<()> {
        self.question_mut(index)?.selected_option = option;
        Ok(())
    }

    /// Copy this paper under a fresh id, stamped with `now`.
    pub fn duplicate(&self, now: DateTime<Utc>) -> Self {
        let stamp = now.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        Self {
            id: new_id(),
            title: self.title.clone(),
            subtitle: Some(format!("Copy ({})", stamp)),
            created_at: now.trunc_subsecs(3),
            questions: self
                .questions
                .iter()
                .map(|q| Question {
                    id: new_id(),
                    ..q.clone()
                })
                .collect(),
        }
    }

    /// Questions that count toward grading: all but a blank trailing one.
    pub fn graded_questions(&self) -> &[Question] {
        match self.questions.split_last() {
            Some((last, rest)) if last.is_blank() => rest,
            _ => &self.questions,
        }
    }

    pub fn score(&self) -> Score {
        self.graded_questions()
            .iter()
            .fold(Score::default(), |mut score, q| {
                score.total += 1;
                if !q.user_answer.trim().is_empty() {
                    score.answered += 1;
                }
                if !q.correct_answer.trim().is_empty() {
                    score.keyed += 1;
                }
                if q.is_correct() {
                    score.correct += 1;
                }
                if q.is_incorrect() {
                    score.incorrect += 1;
                }
                score
            })
    }

    /// Graded questions kept by `filter`, with their zero-based index.
    pub fn review<'a>(
        &'a self,
        filter: &'a ScoreFilter,
    ) -> impl Iterator<Item = (usize, &'a Question)> + 'a {
        self.graded_questions()
            .iter()
            .enumerate()
            .filter(move |(_, q)| filter.matches(q))
    }

    /// Validate and convert one entry of a remote snapshot.
    ///
    /// Requires an `id` (string or number), a string `title` and a
    /// `questions` array. Everything else falls back to a default.
    pub fn from_remote(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ExamError::MalformedRecord("entry is not an object".to_string()))?;

        let id = object
            .get("id")
            .and_then(id_string)
            .ok_or_else(|| ExamError::MalformedRecord("missing id".to_string()))?;
        let title = object
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| ExamError::MalformedRecord(format!("paper {} has no title", id)))?;
        let questions = object
            .get("questions")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ExamError::MalformedRecord(format!("paper {} has no questions array", id))
            })?;

        let subtitle = object
            .get("subtitle")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let created_at = object
            .get("createdAt")
            .and_then(Value::as_i64)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_default();
        // Positional fallback ids keep repeated merges of one snapshot stable.
        let questions = questions
            .iter()
            .enumerate()
            .map(|(index, q)| Question::from_value(q, || format!("{}-{}", id, index)))
            .collect();

        Ok(Self {
            id,
            title: title.to_string(),
            subtitle,
            created_at,
            questions,
        })
    }
}

/// Serialize papers for a local JSON export.
pub fn export_papers(papers: &[Paper]) -> Result<String> {
    Ok(serde_json::to_string_pretty(papers)?)
}

/// Parse a local JSON export.
///
/// Accepts an array or a single paper object. Entries without a string
/// `title` and a `questions` array are skipped. Every imported paper and
/// question gets a fresh id, and an empty paper gets one blank question.
pub fn import_papers(raw: &str, now: DateTime<Utc>) -> Result<Vec<Paper>> {
    let data: Value = serde_json::from_str(raw)
        .map_err(|e| ExamError::InvalidInput(format!("Not a valid JSON export: {}", e)))?;
    let entries = match data {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut papers = Vec::new();
    for (offset, entry) in entries.iter().enumerate() {
        let Some(title) = entry.get("title").and_then(Value::as_str) else {
            continue;
        };
        let Some(questions) = entry.get("questions").and_then(Value::as_array) else {
            continue;
        };

        let mut questions: Vec<Question> = questions
            .iter()
            .map(|q| Question {
                id: new_id(),
                ..Question::from_value(q, String::new)
            })
            .collect();
        if questions.is_empty() {
            questions.push(Question::blank(QuestionType::Short));
        }

        let created_at = entry
            .get("createdAt")
            .and_then(Value::as_i64)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(|| now.trunc_subsecs(3) + chrono::Duration::milliseconds(offset as i64));

        papers.push(Paper {
            id: new_id(),
            title: title.to_string(),
            subtitle: entry
                .get("subtitle")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            created_at,
            questions,
        });
    }

    Ok(papers)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
