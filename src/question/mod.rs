pub mod bank;
pub mod seed;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Theory,
    Practical,
}

impl QuestionKind {
    pub const ALL: [QuestionKind; 2] = [QuestionKind::Theory, QuestionKind::Practical];

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::Theory => "theory",
            QuestionKind::Practical => "practical",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QuestionKind::Theory => "Theory",
            QuestionKind::Practical => "Practical",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "theory" => Ok(QuestionKind::Theory),
            "practical" => Ok(QuestionKind::Practical),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuestionError {
    #[error("question has an empty id")]
    MissingId,
    #[error("question {id}: correct answer matches {matches} options (expected exactly 1)")]
    AnswerNotInOptions { id: String, matches: usize },
    #[error("question {id}: empty reference solution")]
    EmptySolution { id: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TheoryQuestion {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    pub question: String,
    pub options: [String; 4],
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub hint: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticalQuestion {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    pub question: String,
    #[serde(default)]
    pub code_template: String,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub hint: String,
}

/// A quiz question. Serialized with an explicit `"type"` tag so documents
/// coming back from the store decode into the right variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Question {
    Theory(TheoryQuestion),
    Practical(PracticalQuestion),
}

impl Question {
    pub fn id(&self) -> &str {
        match self {
            Question::Theory(q) => &q.id,
            Question::Practical(q) => &q.id,
        }
    }

    pub fn kind(&self) -> QuestionKind {
        match self {
            Question::Theory(_) => QuestionKind::Theory,
            Question::Practical(_) => QuestionKind::Practical,
        }
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        match self {
            Question::Theory(q) => q.difficulty,
            Question::Practical(q) => q.difficulty,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            Question::Theory(q) => &q.question,
            Question::Practical(q) => &q.question,
        }
    }

    pub fn hint(&self) -> &str {
        match self {
            Question::Theory(q) => &q.hint,
            Question::Practical(q) => &q.hint,
        }
    }

    pub fn explanation(&self) -> &str {
        match self {
            Question::Theory(q) => &q.explanation,
            Question::Practical(q) => &q.explanation,
        }
    }

    pub fn correct_answer(&self) -> &str {
        match self {
            Question::Theory(q) => &q.correct_answer,
            Question::Practical(q) => &q.correct_answer,
        }
    }

    pub fn set_id(&mut self, id: String) {
        match self {
            Question::Theory(q) => q.id = id,
            Question::Practical(q) => q.id = id,
        }
    }

    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.id().trim().is_empty() {
            return Err(QuestionError::MissingId);
        }
        match self {
            Question::Theory(q) => {
                let matches = q
                    .options
                    .iter()
                    .filter(|opt| **opt == q.correct_answer)
                    .count();
                if matches != 1 {
                    return Err(QuestionError::AnswerNotInOptions {
                        id: q.id.clone(),
                        matches,
                    });
                }
            }
            Question::Practical(q) => {
                if q.correct_answer.trim().is_empty() {
                    return Err(QuestionError::EmptySolution { id: q.id.clone() });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theory(answer: &str) -> Question {
        Question::Theory(TheoryQuestion {
            id: "T900".to_string(),
            difficulty: None,
            question: "Which header declares printf?".to_string(),
            options: [
                "stdio.h".to_string(),
                "stdlib.h".to_string(),
                "string.h".to_string(),
                "math.h".to_string(),
            ],
            correct_answer: answer.to_string(),
            explanation: String::new(),
            hint: String::new(),
        })
    }

    #[test]
    fn test_theory_validate_requires_answer_among_options() {
        assert!(theory("stdio.h").validate().is_ok());
        assert_eq!(
            theory("conio.h").validate(),
            Err(QuestionError::AnswerNotInOptions {
                id: "T900".to_string(),
                matches: 0
            })
        );
    }

    #[test]
    fn test_duplicate_option_matching_answer_is_rejected() {
        let mut q = theory("stdio.h");
        if let Question::Theory(ref mut t) = q {
            t.options[1] = "stdio.h".to_string();
        }
        assert!(matches!(
            q.validate(),
            Err(QuestionError::AnswerNotInOptions { matches: 2, .. })
        ));
    }

    #[test]
    fn test_decode_tagged_practical() {
        let json = r#"{
            "type": "practical",
            "id": "P001",
            "difficulty": "easy",
            "question": "Print hello",
            "codeTemplate": "int main() {}",
            "correctAnswer": "int main() { puts(\"hello\"); }",
            "hint": "puts"
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.kind(), QuestionKind::Practical);
        assert_eq!(q.difficulty(), Some(Difficulty::Easy));
        assert_eq!(q.explanation(), "");
        assert!(q.validate().is_ok());
    }

    #[test]
    fn test_theory_with_three_options_fails_to_decode() {
        let json = r#"{
            "type": "theory",
            "id": "T1",
            "question": "q",
            "options": ["a", "b", "c"],
            "correctAnswer": "a",
            "hint": "h"
        }"#;
        assert!(serde_json::from_str::<Question>(json).is_err());
    }

    #[test]
    fn test_kind_and_difficulty_parse() {
        assert_eq!("Theory".parse::<QuestionKind>(), Ok(QuestionKind::Theory));
        assert_eq!("HARD".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert!("quiz".parse::<QuestionKind>().is_err());
    }
}
