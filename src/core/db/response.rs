/// Response Module
///
/// The immutable result envelope produced by every statement execution.
use super::value::{Keyed, Row, Value};
use crate::core::{DbError, Result};
use serde::{Serialize, Serializer};

/// Normalized result payload of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A first-row request that found no row.
    Null,
    /// A single value, from a first-row single-column request.
    Scalar(Value),
    /// A single row, from a first-row request.
    Row(Row),
    /// All rows of a set.
    Rows(Vec<Row>),
    /// All rows of a set reduced to their values.
    Values(Vec<Value>),
    /// All rows of a set keyed by a field value.
    KeyedRows(Keyed<Row>),
    /// All rows of a set reduced to one value each, keyed by a field value.
    KeyedValues(Keyed<Value>),
    /// Several result sets, in driver order.
    Sets(Vec<Payload>),
}

impl Payload {
    /// True when the payload holds no row data at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Null => true,
            Payload::Scalar(v) => v.is_null(),
            Payload::Row(_) => false,
            Payload::Rows(rows) => rows.is_empty(),
            Payload::Values(values) => values.is_empty(),
            Payload::KeyedRows(keyed) => keyed.is_empty(),
            Payload::KeyedValues(keyed) => keyed.is_empty(),
            Payload::Sets(sets) => sets.iter().all(Payload::is_empty),
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Payload::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_row(&self) -> Option<&Row> {
        match self {
            Payload::Row(row) => Some(row),
            _ => None,
        }
    }

    pub fn as_rows(&self) -> Option<&[Row]> {
        match self {
            Payload::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn as_values(&self) -> Option<&[Value]> {
        match self {
            Payload::Values(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_keyed_rows(&self) -> Option<&Keyed<Row>> {
        match self {
            Payload::KeyedRows(keyed) => Some(keyed),
            _ => None,
        }
    }

    pub fn as_keyed_values(&self) -> Option<&Keyed<Value>> {
        match self {
            Payload::KeyedValues(keyed) => Some(keyed),
            _ => None,
        }
    }

    pub fn as_sets(&self) -> Option<&[Payload]> {
        match self {
            Payload::Sets(sets) => Some(sets),
            _ => None,
        }
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Payload::Null => serializer.serialize_unit(),
            Payload::Scalar(v) => v.serialize(serializer),
            Payload::Row(row) => row.serialize(serializer),
            Payload::Rows(rows) => rows.serialize(serializer),
            Payload::Values(values) => values.serialize(serializer),
            Payload::KeyedRows(keyed) => keyed.serialize(serializer),
            Payload::KeyedValues(keyed) => keyed.serialize(serializer),
            Payload::Sets(sets) => sets.serialize(serializer),
        }
    }
}

/// Result of executing one statement (or of a failed batch).
///
/// Exactly one of `success() == true` or a non-empty `error()` holds, and
/// `result()` is `None` whenever no rows were produced. There are no setters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    success: bool,
    result: Option<Payload>,
    #[serde(rename = "rowsAffected", skip_serializing_if = "Option::is_none")]
    rows_affected: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Vec<String>>,
}

impl Response {
    /// Builds a successful response. A negative `rows_affected` means the
    /// statement modified nothing and is dropped.
    pub fn success(result: Option<Payload>, rows_affected: i64) -> Self {
        Response {
            success: true,
            result: result.filter(|p| !p.is_empty()),
            rows_affected: (rows_affected >= 0).then_some(rows_affected),
            error: None,
        }
    }

    /// Builds a failed response. An empty error list is replaced by a
    /// generic message so the error invariant holds.
    pub fn failure(errors: Vec<String>) -> Self {
        let errors = if errors.is_empty() {
            vec!["Unknown error".to_string()]
        } else {
            errors
        };
        Response {
            success: false,
            result: None,
            rows_affected: None,
            error: Some(errors),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn result(&self) -> Option<&Payload> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<Payload> {
        self.result
    }

    pub fn rows_affected(&self) -> Option<i64> {
        self.rows_affected
    }

    pub fn error(&self) -> Option<&[String]> {
        self.error.as_deref()
    }

    /// Name-based access to a field, as serialized.
    ///
    /// Asking for a field the response does not carry (for example `error`
    /// on a success) is a programming error.
    pub fn field(&self, name: &str) -> Result<serde_json::Value> {
        let value = match name {
            "success" => Some(serde_json::Value::Bool(self.success)),
            "result" => Some(serde_json::to_value(&self.result)?),
            "rowsAffected" => self.rows_affected.map(serde_json::Value::from),
            "error" => self.error.as_ref().map(|e| serde_json::Value::from(e.clone())),
            _ => None,
        };
        value.ok_or_else(|| DbError::Programming(format!("'{}' does not exist", name)))
    }
}

/// Outcome of an execute call: one response per statement, collapsed to a
/// bare response when the batch held a single statement or failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Single(Response),
    Batch(Vec<Response>),
}

impl Outcome {
    pub(crate) fn from_list(mut list: Vec<Response>) -> Self {
        if list.len() == 1 {
            Outcome::Single(list.remove(0))
        } else {
            Outcome::Batch(list)
        }
    }

    /// True unless the outcome is a failed single response.
    pub fn is_success(&self) -> bool {
        match self {
            Outcome::Single(r) => r.is_success(),
            Outcome::Batch(list) => list.iter().all(Response::is_success),
        }
    }

    pub fn as_single(&self) -> Option<&Response> {
        match self {
            Outcome::Single(r) => Some(r),
            Outcome::Batch(_) => None,
        }
    }

    pub fn into_single(self) -> Option<Response> {
        match self {
            Outcome::Single(r) => Some(r),
            Outcome::Batch(_) => None,
        }
    }

    /// All responses, in statement order.
    pub fn responses(&self) -> &[Response] {
        match self {
            Outcome::Single(r) => std::slice::from_ref(r),
            Outcome::Batch(list) => list,
        }
    }
}
