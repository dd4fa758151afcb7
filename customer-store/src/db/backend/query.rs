//! Ordered range queries over documents
//!
//! Semantics follow the managed document store the app was written against:
//! - documents lacking the ordered field are excluded
//! - ties on the ordered field are broken by document id, in the same direction
//! - `start_at` / `end_at` are inclusive bounds expressed in query direction
//! - `start_after` resumes strictly after a previously returned document

use super::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

/// Position of a document within an ordered query: its sort value and id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCursor {
    pub value: Value,
    pub id: String,
}

impl QueryCursor {
    /// Cursor positioned on `doc` for a query ordered by `field`
    pub fn from_document(doc: &Document, field: &str) -> Option<Self> {
        doc.get(field).map(|value| Self {
            value: value.clone(),
            id: doc.id.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub order_by: String,
    pub direction: Direction,
    pub start_at: Option<Value>,
    pub end_at: Option<Value>,
    pub start_after: Option<QueryCursor>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn order_by(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            order_by: field.into(),
            direction,
            start_at: None,
            end_at: None,
            start_after: None,
            limit: None,
        }
    }

    pub fn start_at(mut self, value: impl Into<Value>) -> Self {
        self.start_at = Some(value.into());
        self
    }

    pub fn end_at(mut self, value: impl Into<Value>) -> Self {
        self.end_at = Some(value.into());
        self
    }

    pub fn start_after(mut self, cursor: Option<QueryCursor>) -> Self {
        self.start_after = cursor;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object.
/// Strings compare by UTF-8 bytes.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.as_bytes().cmp(y.as_bytes()),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ord = compare_values(left, right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Apply `query` to an unordered set of documents
pub fn order_documents(docs: Vec<Document>, query: &Query) -> Vec<Document> {
    let field = query.order_by.as_str();
    let dir = query.direction;
    let position = |value: &Value, id: &str, cursor: &QueryCursor| {
        dir.apply(compare_values(value, &cursor.value))
            .then_with(|| dir.apply(id.cmp(cursor.id.as_str())))
    };

    let mut matched: Vec<Document> = docs
        .into_iter()
        .filter(|doc| {
            let Some(value) = doc.get(field) else {
                return false;
            };
            if let Some(start) = &query.start_at {
                if dir.apply(compare_values(value, start)) == Ordering::Less {
                    return false;
                }
            }
            if let Some(end) = &query.end_at {
                if dir.apply(compare_values(value, end)) == Ordering::Greater {
                    return false;
                }
            }
            if let Some(cursor) = &query.start_after {
                if position(value, &doc.id, cursor) != Ordering::Greater {
                    return false;
                }
            }
            true
        })
        .collect();

    matched.sort_by(|a, b| {
        let (va, vb) = (&a.fields[field], &b.fields[field]);
        dir.apply(compare_values(va, vb))
            .then_with(|| dir.apply(a.id.cmp(&b.id)))
    });

    if let Some(limit) = query.limit {
        matched.truncate(limit);
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, name: Value) -> Document {
        let mut fields = super::super::Fields::new();
        fields.insert("name".into(), name);
        Document::new(id, fields)
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_compare_values_across_types() {
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(1), &json!("1")), Ordering::Less);
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Ordering::Greater);
        assert_eq!(compare_values(&json!("Jo"), &json!("jo")), Ordering::Less);
        assert_eq!(compare_values(&json!([1, 2]), &json!([1, 2, 0])), Ordering::Less);
    }

    #[test]
    fn test_order_and_limit() {
        let docs = vec![
            doc("c", json!("Carol")),
            doc("a", json!("Alice")),
            doc("b", json!("Bob")),
            Document::new("x", Default::default()),
        ];
        let asc = order_documents(docs.clone(), &Query::order_by("name", Direction::Asc));
        assert_eq!(ids(&asc), vec!["a", "b", "c"]);

        let desc = order_documents(docs, &Query::order_by("name", Direction::Desc).limit(2));
        assert_eq!(ids(&desc), vec!["c", "b"]);
    }

    #[test]
    fn test_ties_broken_by_id() {
        let docs = vec![doc("2", json!("Same")), doc("1", json!("Same")), doc("3", json!("Same"))];
        let asc = order_documents(docs.clone(), &Query::order_by("name", Direction::Asc));
        assert_eq!(ids(&asc), vec!["1", "2", "3"]);
        let desc = order_documents(docs, &Query::order_by("name", Direction::Desc));
        assert_eq!(ids(&desc), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_prefix_range_is_case_sensitive() {
        let docs = vec![
            doc("1", json!("John")),
            doc("2", json!("jo Smith")),
            doc("3", json!("Jo")),
            doc("4", json!("Joan")),
            doc("5", json!("Karl")),
            doc("6", json!("J")),
        ];
        let query = Query::order_by("name", Direction::Asc)
            .start_at("Jo")
            .end_at("Jo\u{f8ff}");
        let result = order_documents(docs, &query);
        assert_eq!(ids(&result), vec!["3", "4", "1"]);
    }

    #[test]
    fn test_start_after_cursor() {
        let docs = vec![
            doc("a", json!("Alice")),
            doc("b", json!("Bob")),
            doc("b2", json!("Bob")),
            doc("c", json!("Carol")),
        ];
        let cursor = QueryCursor {
            value: json!("Bob"),
            id: "b".into(),
        };
        let query = Query::order_by("name", Direction::Asc).start_after(Some(cursor));
        assert_eq!(ids(&order_documents(docs.clone(), &query)), vec!["b2", "c"]);

        let cursor = QueryCursor {
            value: json!("Bob"),
            id: "b2".into(),
        };
        let query = Query::order_by("name", Direction::Desc).start_after(Some(cursor));
        assert_eq!(ids(&order_documents(docs, &query)), vec!["b", "a"]);
    }
}
