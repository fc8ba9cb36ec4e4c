use rand::Rng;

use crate::question::{Difficulty, QuestionKind};

const SUFFIX_LEN: usize = 7;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Id for a generated question: difficulty initial, kind initial, then seven
/// lowercase base-36 characters, e.g. `MTk3x9q0a`.
pub fn generate_id<R: Rng + ?Sized>(
    kind: QuestionKind,
    difficulty: Difficulty,
    rng: &mut R,
) -> String {
    let mut id = String::with_capacity(2 + SUFFIX_LEN);
    id.push(initial(difficulty.as_str()));
    id.push(initial(kind.as_str()));
    for _ in 0..SUFFIX_LEN {
        id.push(char::from(BASE36[rng.gen_range(0..BASE36.len())]));
    }
    id
}

fn initial(name: &str) -> char {
    name.chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('X')
}
