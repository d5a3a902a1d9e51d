//! # Completion
//!
//! Completion is never stored. Every read path and the save path call into this
//! module with the template's fields and the current submission's answers.

use crate::types::FormField;
use std::collections::HashMap;

/// An answer counts when it is present and not blank after trimming.
pub fn is_answered(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// `100 * answered / total`, rounded to two decimals; `0` for a template without fields.
pub fn percentage(answered: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(100.0 * answered as f64 / total as f64)
}

/// Computes completion of `responses` (field id → value) against the template `fields`.
///
/// Responses for ids outside `fields` are ignored.
pub fn completion(fields: &[FormField], responses: &HashMap<String, Option<String>>) -> f64 {
    let answered = fields
        .iter()
        .filter(|f| {
            responses
                .get(&f.field_id)
                .is_some_and(|v| is_answered(v.as_deref()))
        })
        .count();
    percentage(answered, fields.len())
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
