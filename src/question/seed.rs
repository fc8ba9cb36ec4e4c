use rust_embed::Embed;
use tracing::warn;

use crate::question::{Question, QuestionKind};

#[derive(Embed)]
#[folder = "assets/questions/"]
struct SeedAssets;

fn asset_name(kind: QuestionKind) -> String {
    format!("{}.json", kind.as_str())
}

/// Built-in questions for `kind`. Entries that fail to decode, have the wrong
/// type tag, or break the question invariants are skipped.
pub fn load(kind: QuestionKind) -> Vec<Question> {
    let Some(file) = SeedAssets::get(&asset_name(kind)) else {
        warn!(kind = %kind, "seed asset missing");
        return Vec::new();
    };
    let raw: Vec<serde_json::Value> = match serde_json::from_slice(file.data.as_ref()) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(kind = %kind, error = %e, "seed asset is not a JSON array");
            return Vec::new();
        }
    };

    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<Question>(value) {
            Ok(q) if q.kind() != kind => {
                warn!(id = q.id(), "seed question filed under the wrong type");
                None
            }
            Ok(q) => match q.validate() {
                Ok(()) => Some(q),
                Err(e) => {
                    warn!(error = %e, "skipping invalid seed question");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "skipping undecodable seed question");
                None
            }
        })
        .collect()
}

pub fn load_all() -> Vec<Question> {
    QuestionKind::ALL.into_iter().flat_map(load).collect()
}
