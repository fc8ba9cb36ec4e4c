use std::collections::HashSet;

use rand::Rng;
use tracing::{debug, warn};

use crate::question::{Question, QuestionKind, seed};
use crate::store::Document;

/// Working set of questions per kind: the built-in seed questions plus
/// whatever generated questions the store last reported.
#[derive(Clone, Debug, Default)]
pub struct QuestionBank {
    seed_theory: Vec<Question>,
    seed_practical: Vec<Question>,
    generated: Vec<Question>,
    theory: Vec<Question>,
    practical: Vec<Question>,
}

impl QuestionBank {
    pub fn new(seed: Vec<Question>) -> Self {
        let (seed_theory, seed_practical): (Vec<_>, Vec<_>) = seed
            .into_iter()
            .partition(|q| q.kind() == QuestionKind::Theory);
        let mut bank = Self {
            seed_theory,
            seed_practical,
            generated: Vec::new(),
            theory: Vec::new(),
            practical: Vec::new(),
        };
        bank.apply_generated(&[]);
        bank
    }

    pub fn with_builtin_seed() -> Self {
        Self::new(seed::load_all())
    }

    /// Rebuild both working sets from the seed plus `generated`. Seed entries
    /// win on id collisions, and the first generated entry wins among
    /// generated duplicates.
    pub fn apply_generated(&mut self, generated: &[Question]) {
        self.generated = generated.to_vec();
        self.rebuild();
    }

    /// Add a batch on top of the generated questions already applied. Used
    /// when no store snapshot will bring the batch back.
    pub fn extend_generated(&mut self, batch: &[Question]) {
        self.generated.extend_from_slice(batch);
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.theory = merge(&self.seed_theory, &self.generated, QuestionKind::Theory);
        self.practical = merge(&self.seed_practical, &self.generated, QuestionKind::Practical);
        debug!(
            theory = self.theory.len(),
            practical = self.practical.len(),
            "question bank merged"
        );
    }

    pub fn questions(&self, kind: QuestionKind) -> &[Question] {
        match kind {
            QuestionKind::Theory => &self.theory,
            QuestionKind::Practical => &self.practical,
        }
    }

    pub fn len(&self, kind: QuestionKind) -> usize {
        self.questions(kind).len()
    }

    pub fn is_empty(&self, kind: QuestionKind) -> bool {
        self.questions(kind).is_empty()
    }

    pub fn generated_count(&self, kind: QuestionKind) -> usize {
        let seed_len = match kind {
            QuestionKind::Theory => self.seed_theory.len(),
            QuestionKind::Practical => self.seed_practical.len(),
        };
        self.len(kind) - seed_len
    }

    pub fn sample<R: Rng + ?Sized>(
        &self,
        kind: QuestionKind,
        count: usize,
        rng: &mut R,
    ) -> Vec<Question> {
        sample_from(self.questions(kind), count, rng)
    }
}

fn merge(seed: &[Question], generated: &[Question], kind: QuestionKind) -> Vec<Question> {
    let mut seen: HashSet<String> = seed.iter().map(|q| q.id().to_string()).collect();
    let mut merged = seed.to_vec();
    for q in generated.iter().filter(|q| q.kind() == kind) {
        if seen.insert(q.id().to_string()) {
            merged.push(q.clone());
        }
    }
    merged
}

/// Fisher-Yates shuffle of a copy of `pool`, truncated to `count`.
pub fn sample_from<R: Rng + ?Sized>(pool: &[Question], count: usize, rng: &mut R) -> Vec<Question> {
    let mut picked = pool.to_vec();
    for i in (1..picked.len()).rev() {
        let j = rng.gen_range(0..=i);
        picked.swap(i, j);
    }
    picked.truncate(count);
    picked
}

/// Decode generated-question documents. The document id stands in for a
/// missing `id` field; undecodable or invalid documents are skipped.
pub fn questions_from_documents(documents: &[Document]) -> Vec<Question> {
    documents
        .iter()
        .filter_map(|doc| {
            let mut question: Question = match doc.decode() {
                Ok(q) => q,
                Err(e) => {
                    warn!(id = %doc.id, error = %e, "skipping undecodable question");
                    return None;
                }
            };
            if question.id().is_empty() {
                question.set_id(doc.id.clone());
            }
            match question.validate() {
                Ok(()) => Some(question),
                Err(e) => {
                    warn!(id = %doc.id, error = %e, "skipping invalid question");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::question::{PracticalQuestion, TheoryQuestion};

    fn theory(id: &str, text: &str) -> Question {
        Question::Theory(TheoryQuestion {
            id: id.to_string(),
            difficulty: None,
            question: text.to_string(),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer: "a".to_string(),
            explanation: String::new(),
            hint: String::new(),
        })
    }

    fn practical(id: &str) -> Question {
        Question::Practical(PracticalQuestion {
            id: id.to_string(),
            difficulty: None,
            question: "q".to_string(),
            code_template: String::new(),
            correct_answer: "int x;".to_string(),
            explanation: String::new(),
            hint: String::new(),
        })
    }

    #[test]
    fn test_questions_from_documents_skips_bad_entries() {
        let good = serde_json::to_value(theory("", "from store")).unwrap();
        let docs = vec![
            Document {
                id: "MTa1b2c3d".to_string(),
                data: good,
                create_time: None,
            },
            Document {
                id: "broken".to_string(),
                data: serde_json::json!({ "type": "theory", "question": 3 }),
                create_time: None,
            },
        ];
        let qs = questions_from_documents(&docs);
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].id(), "MTa1b2c3d");
    }

    #[test]
    fn test_extend_generated_keeps_earlier_batches() {
        let mut bank = QuestionBank::new(vec![theory("T1", "seed")]);
        bank.apply_generated(&[theory("G1", "from store")]);
        bank.extend_generated(&[theory("G2", "first batch"), practical("GP1")]);
        bank.extend_generated(&[theory("G3", "second batch"), theory("G2", "dup")]);

        assert_eq!(bank.len(QuestionKind::Theory), 4);
        assert_eq!(bank.generated_count(QuestionKind::Theory), 3);
        assert_eq!(bank.generated_count(QuestionKind::Practical), 1);

        bank.apply_generated(&[]);
        assert_eq!(bank.generated_count(QuestionKind::Theory), 0);
    }

    #[test]
    fn test_document_without_id_field_takes_document_id() {
        let docs = vec![Document {
            id: "docid123".to_string(),
            data: serde_json::json!({
                "type": "theory",
                "question": "Which header declares printf?",
                "options": ["stdio.h", "stdlib.h", "string.h", "math.h"],
                "correctAnswer": "stdio.h",
                "explanation": "printf lives in stdio.h."
            }),
            create_time: None,
        }];
        let qs = questions_from_documents(&docs);
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].id(), "docid123");
        assert_eq!(qs[0].kind(), QuestionKind::Theory);
    }

    #[test]
    fn test_seed_wins_on_id_collision() {
        let mut bank = QuestionBank::new(vec![theory("T1", "seed text")]);
        bank.apply_generated(&[theory("T1", "generated text"), theory("G1", "new")]);

        let qs = bank.questions(QuestionKind::Theory);
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].prompt(), "seed text");
        assert_eq!(qs[1].id(), "G1");
        assert_eq!(bank.generated_count(QuestionKind::Theory), 1);
    }

    #[test]
    fn test_generated_duplicates_collapse() {
        let mut bank = QuestionBank::new(Vec::new());
        bank.apply_generated(&[theory("G1", "first"), theory("G1", "second")]);
        let qs = bank.questions(QuestionKind::Theory);
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].prompt(), "first");
    }

    #[test]
    fn test_merge_routes_by_kind() {
        let mut bank = QuestionBank::new(vec![theory("T1", "t"), practical("P1")]);
        bank.apply_generated(&[practical("GP1"), theory("GT1", "t")]);
        assert_eq!(bank.len(QuestionKind::Theory), 2);
        assert_eq!(bank.len(QuestionKind::Practical), 2);
    }

    #[test]
    fn test_new_snapshot_replaces_previous_generated_set() {
        let mut bank = QuestionBank::new(vec![theory("T1", "t")]);
        bank.apply_generated(&[theory("G1", "a"), theory("G2", "b")]);
        bank.apply_generated(&[theory("G3", "c")]);
        let ids: Vec<&str> = bank
            .questions(QuestionKind::Theory)
            .iter()
            .map(|q| q.id())
            .collect();
        assert_eq!(ids, vec!["T1", "G3"]);
    }

    #[test]
    fn test_sample_is_truncated_permutation() {
        let pool: Vec<Question> = (0..30).map(|i| theory(&format!("T{i}"), "t")).collect();
        let mut rng = SmallRng::seed_from_u64(7);
        let picked = sample_from(&pool, 20, &mut rng);
        assert_eq!(picked.len(), 20);
        let ids: HashSet<&str> = picked.iter().map(|q| q.id()).collect();
        assert_eq!(ids.len(), 20);
        assert!(ids.iter().all(|id| pool.iter().any(|q| q.id() == *id)));
    }

    #[test]
    fn test_sample_smaller_pool_returns_everything_once() {
        let pool = vec![theory("A", "t"), theory("B", "t"), theory("C", "t")];
        let mut rng = SmallRng::seed_from_u64(1);
        let picked = sample_from(&pool, 20, &mut rng);
        let mut ids: Vec<&str> = picked.iter().map(|q| q.id()).collect();
        ids.sort();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_builtin_bank_has_seed_questions() {
        let bank = QuestionBank::with_builtin_seed();
        assert_eq!(bank.len(QuestionKind::Theory), 20);
        assert_eq!(bank.generated_count(QuestionKind::Practical), 0);
    }
}
