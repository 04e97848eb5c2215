//! Minimal query description for the document store.

use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Single-field predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    Equals(String, Value),
    /// Numeric field `>=` bound.
    AtLeast(String, i64),
    /// Numeric field `<=` bound.
    AtMost(String, i64),
}

impl FieldFilter {
    /// Evaluates the predicate against one document.
    ///
    /// Missing fields never match.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Self::Equals(field, expected) => document.get(field) == Some(expected),
            Self::AtLeast(field, bound) => document
                .get(field)
                .and_then(Value::as_i64)
                .is_some_and(|value| value >= *bound),
            Self::AtMost(field, bound) => document
                .get(field)
                .and_then(Value::as_i64)
                .is_some_and(|value| value <= *bound),
        }
    }
}

/// Conjunctive filters plus optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub filters: Vec<FieldFilter>,
    pub order_by: Option<(String, SortDirection)>,
    pub limit: Option<u32>,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters
            .push(FieldFilter::Equals(field.to_string(), value.into()));
        self
    }

    pub fn where_at_least(mut self, field: &str, bound: i64) -> Self {
        self.filters.push(FieldFilter::AtLeast(field.to_string(), bound));
        self
    }

    pub fn where_at_most(mut self, field: &str, bound: i64) -> Self {
        self.filters.push(FieldFilter::AtMost(field.to_string(), bound));
        self
    }

    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.filters.iter().all(|filter| filter.matches(document))
    }

    /// Compares two documents by the configured order field.
    ///
    /// Numbers compare numerically, everything else by string form.
    pub fn compare(&self, left: &Value, right: &Value) -> Ordering {
        let Some((field, direction)) = &self.order_by else {
            return Ordering::Equal;
        };
        let ordering = compare_field(left.get(field), right.get(field));
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

fn compare_field(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(left)), Some(Value::Number(right))) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(left), Some(right)) => left.to_string().cmp(&right.to_string()),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}
