//! Query-string construction for filtered list endpoints.
//!
//! Pairs are encoded as `application/x-www-form-urlencoded`, the same
//! encoding browsers use for `URLSearchParams`. An empty query leaves the
//! path untouched so no dangling `?` is ever produced.

use serde::Serialize;
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::error::ApiError;

/// Ordered list of query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter. Builder-style.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.pairs.push((key.into(), value.to_string()));
    }

    /// Append a parameter only when `value` is present.
    pub fn with_opt<V: ToString>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    /// Build from a JSON filter object. `null` values are skipped; the rest
    /// render as a browser would stringify them (see `render`).
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let pairs = object
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), render(value)))
            .collect();
        Self { pairs }
    }

    /// Build from any serializable filter struct or map.
    ///
    /// The value must serialize to a JSON object (or `null`, which yields an
    /// empty query).
    pub fn from_serialize<T: Serialize + ?Sized>(filters: &T) -> Result<Self, ApiError> {
        match serde_json::to_value(filters).map_err(|e| ApiError::Serialization(e.to_string()))? {
            Value::Object(object) => Ok(Self::from_object(&object)),
            Value::Null => Ok(Self::new()),
            other => Err(ApiError::Serialization(format!(
                "query filters must be an object, got {other}"
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Encoded query string without the leading `?`.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.pairs {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    /// Attach the query to `path`, or return `path` unchanged when empty.
    pub fn apply(&self, path: &str) -> String {
        if self.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{}", self.encode())
        }
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Query::new();
        for (key, value) in iter {
            query.push(key, value);
        }
        query
    }
}

/// Stringify a filter value: strings verbatim, whole floats without a
/// fraction (`1.0` is `1`), arrays comma-joined with `null` items empty.
/// Objects fall back to their JSON text.
fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => {
                // `+ 0.0` turns -0 into 0
                format!("{:.0}", f + 0.0)
            }
            _ => n.to_string(),
        },
        Value::Array(items) => items.iter().map(render).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}
