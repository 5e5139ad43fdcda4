use std::collections::BTreeMap;

use http::Request;
use porter_collection::GatewayError;
use serde_json::{Map, Value};

/// Immutable view of the parts of an HTTP request the translators read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSnapshot {
    query: BTreeMap<String, String>,
    body: Value,
}

impl RequestSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_http(req: &Request<Vec<u8>>) -> Result<Self, GatewayError> {
        let query = req
            .uri()
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect::<BTreeMap<_, _>>()
            })
            .unwrap_or_default();

        let body = if req.body().is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(req.body())
                .map_err(|_| GatewayError::validation("Request body is not valid JSON"))?
        };

        Ok(Self { query, body })
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// `data.attributes` of a JSON:API-style body.
    pub fn attributes(&self) -> Option<&Map<String, Value>> {
        self.body
            .get("data")
            .and_then(|d| d.get("attributes"))
            .and_then(Value::as_object)
    }

    /// The query nested inside a bulk/action body.
    pub fn envelope(&self) -> Option<&Map<String, Value>> {
        self.attributes()
            .and_then(|a| a.get("all_records_subset_query"))
            .and_then(Value::as_object)
    }

    /// Look `key` up in the envelope, then the body top level, then the
    /// query string. Nulls count as absent.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.envelope().and_then(|e| e.get(key)).filter(|v| !v.is_null()) {
            return Some(value.clone());
        }
        if let Some(value) = self.body.get(key).filter(|v| !v.is_null()) {
            return Some(value.clone());
        }
        self.query(key).map(|v| Value::String(v.to_string()))
    }

    /// [`RequestSnapshot::lookup`] rendered as text; strings stay unquoted.
    pub fn lookup_text(&self, key: &str) -> Option<String> {
        self.lookup(key).map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }
}
