use std::collections::HashSet;

use rand::Rng;
use serde_json::Value;

use crate::generator::GenerateError;
use crate::generator::ids::generate_id;
use crate::question::{Difficulty, Question, QuestionKind};

/// Text of the first candidate's first part.
fn candidate_text(body: &Value) -> Result<&str, GenerateError> {
    body.get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("text"))
        .and_then(Value::as_str)
        .ok_or(GenerateError::MissingCandidate)
}

/// Turn a `generateContent` response into questions of `kind`. Ids are
/// always reassigned. A single bad item rejects the whole batch.
pub fn parse_response<R: Rng + ?Sized>(
    kind: QuestionKind,
    difficulty: Difficulty,
    body: &Value,
    rng: &mut R,
) -> Result<Vec<Question>, GenerateError> {
    let text = candidate_text(body)?;
    let items: Vec<Value> = serde_json::from_str(text)
        .map_err(|e| GenerateError::MalformedPayload(format!("not a JSON array: {e}")))?;
    if items.is_empty() {
        return Err(GenerateError::MalformedPayload("empty question list".to_string()));
    }

    let mut seen = HashSet::new();
    let mut questions = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(mut fields) = item else {
            return Err(GenerateError::MalformedPayload(format!(
                "item {index} is not an object"
            )));
        };
        let id = loop {
            let candidate = generate_id(kind, difficulty, rng);
            if seen.insert(candidate.clone()) {
                break candidate;
            }
        };
        fields.insert("id".to_string(), Value::from(id));
        fields.insert("type".to_string(), Value::from(kind.as_str()));
        fields.insert("difficulty".to_string(), Value::from(difficulty.as_str()));

        let question: Question = serde_json::from_value(Value::Object(fields))
            .map_err(|e| GenerateError::MalformedPayload(format!("item {index}: {e}")))?;
        question.validate()?;
        questions.push(question);
    }
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use serde_json::json;

    use super::*;
    use crate::question::QuestionError;

    fn wrap(items: Value) -> Value {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": items.to_string() }] }
            }]
        })
    }

    fn theory_item(answer: &str) -> Value {
        json!({
            "id": "GT001",
            "question": "Size of char?",
            "options": ["1", "2", "4", "8"],
            "correctAnswer": answer,
            "explanation": "char is one byte.",
            "hint": "Smallest type."
        })
    }

    #[test]
    fn test_parses_and_reassigns_ids() {
        let mut rng = SmallRng::seed_from_u64(4);
        let body = wrap(json!([theory_item("1"), theory_item("1")]));
        let qs = parse_response(QuestionKind::Theory, Difficulty::Medium, &body, &mut rng).unwrap();
        assert_eq!(qs.len(), 2);
        assert!(qs.iter().all(|q| q.id().starts_with("MT") && q.id() != "GT001"));
        assert_ne!(qs[0].id(), qs[1].id());
        assert_eq!(qs[0].difficulty(), Some(Difficulty::Medium));
        assert_eq!(qs[0].kind(), QuestionKind::Theory);
    }

    #[test]
    fn test_practical_items() {
        let mut rng = SmallRng::seed_from_u64(4);
        let body = wrap(json!([{
            "question": "Print hello",
            "codeTemplate": "int main() {\n}",
            "correctAnswer": "int main() { puts(\"hello\"); }",
            "explanation": "puts prints a line.",
            "hint": "puts"
        }]));
        let qs = parse_response(QuestionKind::Practical, Difficulty::Easy, &body, &mut rng).unwrap();
        assert!(qs[0].id().starts_with("EP"));
        assert!(matches!(&qs[0], Question::Practical(p) if p.code_template.contains("main")));
    }

    #[test]
    fn test_missing_candidate() {
        let mut rng = SmallRng::seed_from_u64(1);
        for body in [json!({}), json!({ "candidates": [] }), json!({ "candidates": [{ "content": { "parts": [] } }] })] {
            assert!(matches!(
                parse_response(QuestionKind::Theory, Difficulty::Easy, &body, &mut rng),
                Err(GenerateError::MissingCandidate)
            ));
        }
    }

    #[test]
    fn test_text_that_is_not_an_array_is_malformed() {
        let mut rng = SmallRng::seed_from_u64(1);
        let body = json!({ "candidates": [{ "content": { "parts": [{ "text": "Sure! Here are..." }] } }] });
        assert!(matches!(
            parse_response(QuestionKind::Theory, Difficulty::Easy, &body, &mut rng),
            Err(GenerateError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_one_invalid_item_rejects_batch() {
        let mut rng = SmallRng::seed_from_u64(1);
        let body = wrap(json!([theory_item("1"), theory_item("16")]));
        assert!(matches!(
            parse_response(QuestionKind::Theory, Difficulty::Hard, &body, &mut rng),
            Err(GenerateError::InvalidQuestion(QuestionError::AnswerNotInOptions { matches: 0, .. }))
        ));

        let short_options = wrap(json!([{
            "question": "q", "options": ["a", "b"], "correctAnswer": "a"
        }]));
        assert!(matches!(
            parse_response(QuestionKind::Theory, Difficulty::Hard, &short_options, &mut rng),
            Err(GenerateError::MalformedPayload(_))
        ));
    }
}
