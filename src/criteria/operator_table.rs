// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Finite operator table.
//!
//! Each backend owns one static [`OperatorTable`] mapping every [`Operator`]
//! to a pure translation function. Lookup misses fall back to an equality on
//! the first value; with a complete table this path is unreachable, but it is
//! kept so a partially populated table still produces a usable condition.

use super::Operator;

/// Pure translation from a value list to a backend-native condition.
pub type TranslateFn<C> = fn(&[String]) -> C;

/// Build a table entry (coerces the fn item to a pointer in const context).
pub const fn entry<C>(operator: Operator, translate: TranslateFn<C>) -> (Operator, TranslateFn<C>) {
    (operator, translate)
}

/// Static operator → translation table for one backend.
pub struct OperatorTable<C: 'static> {
    entries: &'static [(Operator, TranslateFn<C>)],
    fallback: TranslateFn<C>,
}

impl<C: 'static> OperatorTable<C> {
    pub const fn new(
        entries: &'static [(Operator, TranslateFn<C>)],
        fallback: TranslateFn<C>,
    ) -> Self {
        Self { entries, fallback }
    }

    /// Translate an operator and its values into a condition fragment.
    pub fn translate(&self, operator: Operator, values: &[String]) -> C {
        match self.entries.iter().find(|(op, _)| *op == operator) {
            Some((_, translate)) => translate(values),
            None => (self.fallback)(values),
        }
    }

    /// Whether every operator has an explicit entry.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        Operator::ALL
            .iter()
            .all(|op| self.entries.iter().any(|(entry_op, _)| entry_op == op))
    }
}

/// First value, or empty when absent. Criteria are validated before
/// translation so this only matters for hand-built calls.
pub fn first(values: &[String]) -> String {
    values.first().cloned().unwrap_or_default()
}

/// Second value, or empty when absent.
pub fn second(values: &[String]) -> String {
    values.get(1).cloned().unwrap_or_default()
}
