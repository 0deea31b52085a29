// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document filter construction.
//!
//! Dotted fields address embedded documents, so they become nested objects
//! rather than joins:
//!
//! ```text
//! profile.age > 30, profile.city = Oslo
//!   → { profile: { age: { $gt: "30" }, city: { $eq: "Oslo" } } }
//! ```

use bson::{Bson, Document};
use tracing::debug;

use super::operators::DOCUMENT_OPERATORS;
use crate::criteria::{split_path, Criterion};

fn insert_nested(target: &mut Document, path: &[&str], leaf: &str, value: Bson) {
    let Some((head, rest)) = path.split_first() else {
        target.insert(leaf, value);
        return;
    };
    if !matches!(target.get(*head), Some(Bson::Document(_))) {
        target.insert(*head, Document::new());
    }
    if let Some(Bson::Document(child)) = target.get_mut(*head) {
        insert_nested(child, rest, leaf, value);
    }
}

/// Build a nested filter from criteria. Last write wins per leaf key.
#[must_use]
pub fn build_filter(criteria: &[Criterion]) -> Document {
    let mut filter = Document::new();
    for criterion in criteria {
        let (path, leaf) = split_path(&criterion.field);
        let condition = DOCUMENT_OPERATORS.translate(criterion.operator, &criterion.value);
        insert_nested(&mut filter, &path, leaf, condition);
    }
    debug!(filter = %filter, "Document filter");
    filter
}

/// Combine top-level conditions for a `$match` stage: `None` when empty,
/// the single condition as-is, otherwise an `$and` of one document per key.
#[must_use]
pub fn match_condition(filter: &Document) -> Option<Document> {
    match filter.len() {
        0 => None,
        1 => Some(filter.clone()),
        _ => {
            let parts: Vec<Bson> = filter
                .iter()
                .map(|(key, value)| {
                    let mut part = Document::new();
                    part.insert(key.clone(), value.clone());
                    Bson::Document(part)
                })
                .collect();
            let mut combined = Document::new();
            combined.insert("$and", parts);
            Some(combined)
        }
    }
}
