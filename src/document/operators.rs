// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document operator translation.
//!
//! ```text
//! EQ       → { $eq: v }
//! LIKE     → { $regex: v, $options: "i" }
//! IN       → { $in: [v, ...] }
//! BETWEEN  → { $gte: a, $lte: b }
//! NBETWEEN → { $not: { $gte: a, $lte: b } }
//! ```
//!
//! Equality always carries the explicit `$eq` marker so a condition means
//! the same thing at the top level and inside `$and`.

use bson::{doc, Bson};

use crate::criteria::operator_table::{entry, first, second, OperatorTable, TranslateFn};
use crate::criteria::Operator;

fn eq(values: &[String]) -> Bson {
    Bson::Document(doc! { "$eq": first(values) })
}

fn ne(values: &[String]) -> Bson {
    Bson::Document(doc! { "$ne": first(values) })
}

fn gt(values: &[String]) -> Bson {
    Bson::Document(doc! { "$gt": first(values) })
}

fn gte(values: &[String]) -> Bson {
    Bson::Document(doc! { "$gte": first(values) })
}

fn lt(values: &[String]) -> Bson {
    Bson::Document(doc! { "$lt": first(values) })
}

fn lte(values: &[String]) -> Bson {
    Bson::Document(doc! { "$lte": first(values) })
}

// LIKE and ILIKE are both case-insensitive pattern matches
fn regex(values: &[String]) -> Bson {
    Bson::Document(doc! { "$regex": first(values), "$options": "i" })
}

fn is_in(values: &[String]) -> Bson {
    Bson::Document(doc! { "$in": values.to_vec() })
}

fn not_in(values: &[String]) -> Bson {
    Bson::Document(doc! { "$nin": values.to_vec() })
}

fn between(values: &[String]) -> Bson {
    Bson::Document(doc! { "$gte": first(values), "$lte": second(values) })
}

fn not_between(values: &[String]) -> Bson {
    Bson::Document(doc! { "$not": { "$gte": first(values), "$lte": second(values) } })
}

/// Raw value: the implicit-equality form.
fn raw(values: &[String]) -> Bson {
    Bson::String(first(values))
}

static DOCUMENT_ENTRIES: [(Operator, TranslateFn<Bson>); 12] = [
    entry(Operator::Eq, eq),
    entry(Operator::Neq, ne),
    entry(Operator::Gt, gt),
    entry(Operator::Gte, gte),
    entry(Operator::Lt, lt),
    entry(Operator::Lte, lte),
    entry(Operator::Like, regex),
    entry(Operator::ILike, regex),
    entry(Operator::In, is_in),
    entry(Operator::NotIn, not_in),
    entry(Operator::Between, between),
    entry(Operator::NotBetween, not_between),
];

/// Document operator table; misses fall back to the raw first value.
pub static DOCUMENT_OPERATORS: OperatorTable<Bson> = OperatorTable::new(&DOCUMENT_ENTRIES, raw);

#[cfg(test)]
mod tests {
    use super::*;

    fn vals(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_table_is_complete() {
        assert!(DOCUMENT_OPERATORS.is_complete());
    }

    #[test]
    fn test_eq_uses_explicit_marker() {
        let out = DOCUMENT_OPERATORS.translate(Operator::Eq, &vals(&["john"]));
        assert_eq!(out, Bson::Document(doc! { "$eq": "john" }));
    }

    #[test]
    fn test_comparisons() {
        let v = vals(&["30"]);
        assert_eq!(DOCUMENT_OPERATORS.translate(Operator::Neq, &v), Bson::Document(doc! { "$ne": "30" }));
        assert_eq!(DOCUMENT_OPERATORS.translate(Operator::Gt, &v), Bson::Document(doc! { "$gt": "30" }));
        assert_eq!(DOCUMENT_OPERATORS.translate(Operator::Gte, &v), Bson::Document(doc! { "$gte": "30" }));
        assert_eq!(DOCUMENT_OPERATORS.translate(Operator::Lt, &v), Bson::Document(doc! { "$lt": "30" }));
        assert_eq!(DOCUMENT_OPERATORS.translate(Operator::Lte, &v), Bson::Document(doc! { "$lte": "30" }));
    }

    #[test]
    fn test_like_and_ilike_are_case_insensitive() {
        let expected = Bson::Document(doc! { "$regex": "ann", "$options": "i" });
        assert_eq!(DOCUMENT_OPERATORS.translate(Operator::Like, &vals(&["ann"])), expected);
        assert_eq!(DOCUMENT_OPERATORS.translate(Operator::ILike, &vals(&["ann"])), expected);
    }

    #[test]
    fn test_membership_and_ranges() {
        assert_eq!(
            DOCUMENT_OPERATORS.translate(Operator::In, &vals(&["a", "b"])),
            Bson::Document(doc! { "$in": ["a", "b"] })
        );
        assert_eq!(
            DOCUMENT_OPERATORS.translate(Operator::NotIn, &vals(&["a"])),
            Bson::Document(doc! { "$nin": ["a"] })
        );
        assert_eq!(
            DOCUMENT_OPERATORS.translate(Operator::Between, &vals(&["1", "9"])),
            Bson::Document(doc! { "$gte": "1", "$lte": "9" })
        );
        assert_eq!(
            DOCUMENT_OPERATORS.translate(Operator::NotBetween, &vals(&["1", "9"])),
            Bson::Document(doc! { "$not": { "$gte": "1", "$lte": "9" } })
        );
    }
}
