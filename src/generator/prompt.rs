use serde_json::{Value, json};

use crate::question::{Difficulty, QuestionKind};

const CONCEPTS: &str = "variables, data types, operators, control structures, arrays, \
strings, functions, pointers, structs, file I/O, memory management";

fn fields(kind: QuestionKind) -> [&'static str; 6] {
    match kind {
        QuestionKind::Theory => [
            "id",
            "question",
            "options",
            "correctAnswer",
            "explanation",
            "hint",
        ],
        QuestionKind::Practical => [
            "id",
            "question",
            "codeTemplate",
            "correctAnswer",
            "explanation",
            "hint",
        ],
    }
}

pub fn build_prompt(kind: QuestionKind, difficulty: Difficulty, count: usize) -> String {
    let fields = match kind {
        QuestionKind::Theory => {
            "- id (unique string)\n\
             - question (string)\n\
             - options (array of exactly 4 strings)\n\
             - correctAnswer (string, exactly one of the options)\n\
             - explanation (string, brief explanation of the correct answer)\n\
             - hint (string, a subtle hint)"
        }
        QuestionKind::Practical => {
            "- id (unique string)\n\
             - question (string, describing the coding task)\n\
             - codeTemplate (string, a compilable C skeleton with \
               #include <stdio.h> and int main() for the user to fill in)\n\
             - correctAnswer (string, the complete correct C solution)\n\
             - explanation (string, brief explanation of the solution)\n\
             - hint (string, a subtle hint for coding)"
        }
    };
    let style = match kind {
        QuestionKind::Theory => "multiple choice theory",
        QuestionKind::Practical => "practical coding",
    };
    format!(
        "Generate {count} unique {difficulty} C programming {style} questions.\n\
         For each question provide:\n{fields}\n\n\
         Cover a range of C programming concepts ({CONCEPTS}).\n\
         Respond with a JSON array of question objects and nothing else."
    )
}

pub fn response_schema(kind: QuestionKind) -> Value {
    let mut properties = serde_json::Map::new();
    for field in fields(kind) {
        let schema = if field == "options" {
            json!({ "type": "ARRAY", "items": { "type": "STRING" } })
        } else {
            json!({ "type": "STRING" })
        };
        properties.insert(field.to_string(), schema);
    }
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": properties,
            "required": fields(kind),
            "propertyOrdering": fields(kind),
        }
    })
}

/// Body of a `generateContent` call asking for `count` questions.
pub fn build_request(kind: QuestionKind, difficulty: Difficulty, count: usize) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": build_prompt(kind, difficulty, count) }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(kind),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_mentions_count_and_difficulty() {
        let prompt = build_prompt(QuestionKind::Practical, Difficulty::Hard, 12);
        assert!(prompt.starts_with("Generate 12 unique hard C programming practical coding"));
        assert!(prompt.contains("codeTemplate"));
        assert!(prompt.contains("pointers"));
    }

    #[test]
    fn test_theory_schema_orders_options() {
        let schema = response_schema(QuestionKind::Theory);
        assert_eq!(schema["type"], "ARRAY");
        let items = &schema["items"];
        assert_eq!(items["properties"]["options"]["type"], "ARRAY");
        assert!(items["properties"].get("codeTemplate").is_none());
        assert_eq!(
            items["propertyOrdering"],
            json!(["id", "question", "options", "correctAnswer", "explanation", "hint"])
        );
    }

    #[test]
    fn test_request_shape() {
        let body = build_request(QuestionKind::Practical, Difficulty::Easy, 20);
        assert_eq!(body["contents"][0]["role"], "user");
        assert!(body["contents"][0]["parts"][0]["text"].is_string());
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(
            body["generationConfig"]["responseSchema"]["items"]["required"][2],
            "codeTemplate"
        );
    }
}
