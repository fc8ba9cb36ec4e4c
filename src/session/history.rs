use std::cell::RefCell;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::question::QuestionKind;
use crate::store::{Document, StoreError};

/// Outcome of one graded question, as produced by the quiz session. The
/// store adds the id and the creation timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryEntry {
    pub question_id: String,
    pub question_type: QuestionKind,
    pub is_correct: bool,
    pub user_answer: String,
    pub correct_answer: String,
    pub explanation: String,
}

/// Receives graded outcomes. Recording is fire-and-forget.
pub trait HistorySink {
    fn record(&self, entry: NewHistoryEntry);
}

impl HistorySink for RefCell<Vec<NewHistoryEntry>> {
    fn record(&self, entry: NewHistoryEntry) {
        self.borrow_mut().push(entry);
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    question_id: String,
    question_type: QuestionKind,
    is_correct: bool,
    #[serde(default)]
    user_answer: Option<String>,
    #[serde(default)]
    correct_answer: Option<String>,
    #[serde(default)]
    explanation: String,
    /// Written by clients that stamp entries themselves. Anything that is not
    /// an RFC 3339 string is ignored.
    #[serde(default)]
    timestamp: Option<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    pub question_id: String,
    pub question_type: QuestionKind,
    pub is_correct: bool,
    pub user_answer: Option<String>,
    pub correct_answer: Option<String>,
    pub explanation: String,
    /// `None` while the store has not assigned a creation time yet.
    pub timestamp: Option<DateTime<Utc>>,
}

impl HistoryEntry {
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let stored: StoredEntry = doc.decode()?;
        let stamped = stored
            .timestamp
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc));
        Ok(Self {
            id: doc.id.clone(),
            question_id: stored.question_id,
            question_type: stored.question_type,
            is_correct: stored.is_correct,
            user_answer: stored.user_answer,
            correct_answer: stored.correct_answer,
            explanation: stored.explanation,
            timestamp: stamped.or(doc.create_time),
        })
    }
}

/// Most recent first. Entries still waiting for a timestamp are treated as
/// the newest.
pub fn sorted_recent_first(entries: &[HistoryEntry]) -> Vec<&HistoryEntry> {
    let mut sorted: Vec<&HistoryEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(ta), Some(tb)) => tb.cmp(&ta),
    });
    sorted
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KindTally {
    pub total: usize,
    pub correct: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HistorySummary {
    pub theory: KindTally,
    pub practical: KindTally,
}

impl HistorySummary {
    pub fn from_entries(entries: &[HistoryEntry]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            let tally = match entry.question_type {
                QuestionKind::Theory => &mut summary.theory,
                QuestionKind::Practical => &mut summary.practical,
            };
            tally.total += 1;
            if entry.is_correct {
                tally.correct += 1;
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.theory.total + self.practical.total
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.theory.correct + self.practical.correct) as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn entry_at(id: &str, secs: Option<i64>, correct: bool) -> HistoryEntry {
        HistoryEntry {
            id: id.to_string(),
            question_id: "T001".to_string(),
            question_type: QuestionKind::Theory,
            is_correct: correct,
            user_answer: None,
            correct_answer: None,
            explanation: String::new(),
            timestamp: secs.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
        }
    }

    #[test]
    fn test_sorted_recent_first() {
        let entries = vec![
            entry_at("t2", Some(200), true),
            entry_at("t1", Some(100), true),
            entry_at("t3", Some(300), false),
        ];
        let ids: Vec<&str> = sorted_recent_first(&entries)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["t3", "t2", "t1"]);
    }

    #[test]
    fn test_pending_timestamp_sorts_first() {
        let entries = vec![entry_at("old", Some(10), true), entry_at("pending", None, true)];
        assert_eq!(sorted_recent_first(&entries)[0].id, "pending");
    }

    #[test]
    fn test_from_document() {
        let created = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let doc = Document {
            id: "abc".to_string(),
            data: json!({
                "questionId": "P004",
                "questionType": "practical",
                "isCorrect": false,
                "userAnswer": "int main() {}",
                "correctAnswer": "int main() { return 0; }",
                "explanation": "e"
            }),
            create_time: Some(created),
        };
        let entry = HistoryEntry::from_document(&doc).unwrap();
        assert_eq!(entry.id, "abc");
        assert_eq!(entry.question_type, QuestionKind::Practical);
        assert!(!entry.is_correct);
        assert_eq!(entry.timestamp, Some(created));
    }

    #[test]
    fn test_stored_timestamp_wins_over_create_time() {
        let created = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let doc = |timestamp: serde_json::Value| Document {
            id: "h1".to_string(),
            data: json!({
                "questionId": "T002",
                "questionType": "theory",
                "isCorrect": true,
                "timestamp": timestamp
            }),
            create_time: Some(created),
        };

        let stamped = HistoryEntry::from_document(&doc(json!("2024-05-01T10:00:00Z"))).unwrap();
        assert_eq!(
            stamped.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );

        let unreadable = HistoryEntry::from_document(&doc(json!({ "seconds": 5 }))).unwrap();
        assert_eq!(unreadable.timestamp, Some(created));

        let older = HistoryEntry::from_document(&doc(json!("2020-01-01T00:00:00Z"))).unwrap();
        let entries = vec![older, stamped];
        assert_eq!(
            sorted_recent_first(&entries)[0].timestamp.map(|t| t.timestamp()),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap().timestamp())
        );
    }

    #[test]
    fn test_summary_counts_by_kind() {
        let mut entries = vec![
            entry_at("a", Some(1), true),
            entry_at("b", Some(2), false),
        ];
        let mut practical = entry_at("c", Some(3), true);
        practical.question_type = QuestionKind::Practical;
        entries.push(practical);

        let summary = HistorySummary::from_entries(&entries);
        assert_eq!(summary.theory, KindTally { total: 2, correct: 1 });
        assert_eq!(summary.practical, KindTally { total: 1, correct: 1 });
        assert!((summary.accuracy() - 66.666).abs() < 0.01);
    }
}
