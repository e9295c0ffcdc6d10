//! Document queries: equality filters plus an optional sort field.
//!
//! E.g. `lists where userId == "u1" order by createdAt desc`.

use std::cmp::Ordering;

use serde_json::Value;

use crate::storage::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    /// Add an equality filter.
    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| doc.fields.get(field) == Some(value))
    }

    /// Filter and sort documents given in insertion order.
    ///
    /// Ties on the sort field keep insertion order for `Asc` and reverse it for
    /// `Desc`, so "newest first" stays newest first within one millisecond.
    pub fn apply(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut matched: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();
        if let Some(order) = &self.order_by {
            if order.direction == Direction::Desc {
                matched.reverse();
            }
            matched.sort_by(|a, b| {
                let ord = compare_values(a.fields.get(&order.field), b.fields.get(&order.field));
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }
        matched
    }
}

/// Missing < null < bool < number < string; other types compare equal.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, fields: Value) -> Document {
        Document {
            id: id.to_string(),
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn filters_by_equality() {
        let q = Query::new("lists").where_eq("userId", "u1");
        assert!(q.matches(&doc("a", json!({"userId": "u1"}))));
        assert!(!q.matches(&doc("b", json!({"userId": "u2"}))));
        assert!(!q.matches(&doc("c", json!({}))));
    }

    #[test]
    fn sorts_newest_first_with_ties_by_insertion() {
        let docs = vec![
            doc("old", json!({"createdAt": 1})),
            doc("tie-first", json!({"createdAt": 5})),
            doc("tie-second", json!({"createdAt": 5})),
            doc("mid", json!({"createdAt": 3})),
        ];
        let ids: Vec<String> = Query::new("lists")
            .order_by("createdAt", Direction::Desc)
            .apply(docs)
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, ["tie-second", "tie-first", "mid", "old"]);
    }

    #[test]
    fn ascending_keeps_insertion_order_for_ties() {
        let docs = vec![
            doc("b", json!({"n": 2})),
            doc("a1", json!({"n": 1})),
            doc("a2", json!({"n": 1})),
        ];
        let ids: Vec<String> = Query::new("x")
            .order_by("n", Direction::Asc)
            .apply(docs)
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, ["a1", "a2", "b"]);
    }
}
