use std::collections::BTreeMap;

use porter_collection::{ActionField, ActionFieldKind, FormData, FormValue, GatewayError};
use porter_http::RequestSnapshot;
use porter_query::{Datasource, unpack_id};
use serde_json::{Map, Value};

use crate::data_uri::parse_data_uri;

/// Labels the dashboard uses as placeholders while a form is loading.
/// Values submitted under them are never decoded.
pub const RESERVED_FIELDS: [&str; 1] = ["Loading..."];

pub fn is_reserved(label: &str) -> bool {
    RESERVED_FIELDS.contains(&label)
}

/// Submitted values, typed by shape alone.
///
/// Form resolution runs before the authoritative field list is known, so
/// this is the best guess available to it: data URIs become files, arrays
/// of data URIs become file lists, and everything else stays JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFormInput {
    submitted: BTreeMap<String, Value>,
    guessed: FormData,
}

impl RawFormInput {
    pub fn from_values(values: &Map<String, Value>) -> Self {
        let mut input = Self::default();
        for (label, value) in values.iter().filter(|(label, _)| !is_reserved(label)) {
            input.guessed.insert(label.clone(), guess(value));
            input.submitted.insert(label.clone(), value.clone());
        }
        input
    }

    /// `data.attributes.values` of an action request.
    pub fn from_request(request: &RequestSnapshot) -> Self {
        request
            .attributes()
            .and_then(|a| a.get("values"))
            .and_then(Value::as_object)
            .map(Self::from_values)
            .unwrap_or_default()
    }

    pub fn guessed(&self) -> &FormData {
        &self.guessed
    }
}

fn guess(value: &Value) -> FormValue {
    match value {
        Value::String(s) => match parse_data_uri(s) {
            Some(file) => FormValue::File(file),
            None => FormValue::Json(value.clone()),
        },
        Value::Array(items) if !items.is_empty() => {
            let files: Option<Vec<_>> = items
                .iter()
                .map(|item| item.as_str().and_then(parse_data_uri))
                .collect();
            match files {
                Some(files) => FormValue::FileList(files),
                None => FormValue::Json(value.clone()),
            }
        }
        other => FormValue::Json(other.clone()),
    }
}

/// Submitted values decoded against the field list returned by form
/// resolution. Collection, file and file-list fields are decoded by their
/// declared kind; every other submitted value passes through as JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedFormInput {
    values: FormData,
}

impl TypedFormInput {
    pub fn from_raw(
        raw: &RawFormInput,
        fields: &[ActionField],
        datasource: &Datasource,
    ) -> Result<Self, GatewayError> {
        let mut values = FormData::new();
        for (label, value) in &raw.submitted {
            let decoded = match fields.iter().find(|f| &f.label == label) {
                Some(field) => decode(field, value, datasource)?,
                None => FormValue::Json(value.clone()),
            };
            values.insert(label.clone(), decoded);
        }
        Ok(Self { values })
    }

    /// Decode the values carried by an explicit field list, as sent by the
    /// form hooks. Values that are already typed are kept.
    pub fn from_fields(fields: &[ActionField], datasource: &Datasource) -> Result<Self, GatewayError> {
        let mut values = FormData::new();
        for field in fields.iter().filter(|f| !is_reserved(&f.label)) {
            let decoded = match &field.value {
                None => continue,
                Some(FormValue::Json(value)) => decode(field, value, datasource)?,
                Some(typed) => typed.clone(),
            };
            values.insert(field.label.clone(), decoded);
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &FormData {
        &self.values
    }

    pub fn into_values(self) -> FormData {
        self.values
    }
}

fn decode(field: &ActionField, value: &Value, datasource: &Datasource) -> Result<FormValue, GatewayError> {
    if value.is_null() {
        return Ok(FormValue::Json(Value::Null));
    }
    match &field.kind {
        ActionFieldKind::Collection(collection) => {
            let schema = datasource.collection(collection).ok_or_else(|| {
                GatewayError::validation(format!(
                    "Field '{}' references unknown collection '{collection}'",
                    field.label
                ))
            })?;
            let packed = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Array(items) if items.len() == 1 => match &items[0] {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => return Err(invalid(field, "reference")),
                },
                _ => return Err(invalid(field, "reference")),
            };
            Ok(FormValue::Reference(unpack_id(schema, &packed)?))
        }
        ActionFieldKind::File => value
            .as_str()
            .and_then(parse_data_uri)
            .map(FormValue::File)
            .ok_or_else(|| invalid(field, "file")),
        ActionFieldKind::FileList => value
            .as_array()
            .and_then(|items| {
                items
                    .iter()
                    .map(|item| item.as_str().and_then(parse_data_uri))
                    .collect::<Option<Vec<_>>>()
            })
            .map(FormValue::FileList)
            .ok_or_else(|| invalid(field, "file list")),
        _ => Ok(FormValue::Json(value.clone())),
    }
}

fn invalid(field: &ActionField, what: &str) -> GatewayError {
    GatewayError::validation(format!("Invalid {what} for field '{}'", field.label))
}

/// The explicit field list of a change-hook request
/// (`data.attributes.fields`), each field carrying its current value.
pub fn hook_fields(request: &RequestSnapshot) -> Result<Vec<ActionField>, GatewayError> {
    let Some(fields) = request
        .attributes()
        .and_then(|a| a.get("fields"))
        .and_then(Value::as_array)
    else {
        return Ok(Vec::new());
    };

    fields
        .iter()
        .map(|raw| {
            let label = raw
                .get("field")
                .and_then(Value::as_str)
                .ok_or_else(|| GatewayError::validation("Hook field without a name"))?;
            let type_name = raw.get("type").and_then(Value::as_str).unwrap_or("String");
            let enums = raw
                .get("enums")
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let kind = ActionFieldKind::from_wire(
                type_name,
                raw.get("reference").and_then(Value::as_str),
                enums,
            )
            .ok_or_else(|| {
                GatewayError::validation(format!("Invalid type '{type_name}' for field '{label}'"))
            })?;

            let mut field = ActionField::new(label, kind);
            if let Some(value) = raw.get("value") {
                field = field.with_value(FormValue::Json(value.clone()));
            }
            Ok(field)
        })
        .collect()
}
