use porter_collection::{ActionField, ActionFieldKind, FormValue};
use porter_query::Datasource;
use serde_json::{Map, Value, json};

use crate::data_uri::encode_data_uri;

/// Wire shape of a resolved form: `{fields: [...]}`.
pub fn serialize_form(fields: &[ActionField], datasource: &Datasource) -> Value {
    json!({
        "fields": fields
            .iter()
            .map(|field| serialize_field(field, datasource))
            .collect::<Vec<_>>(),
    })
}

fn serialize_field(field: &ActionField, datasource: &Datasource) -> Value {
    let mut out = Map::new();
    out.insert("field".into(), json!(field.label));
    out.insert("label".into(), json!(field.label));
    out.insert("type".into(), json!(field.kind.wire_name()));
    out.insert(
        "value".into(),
        field.value.as_ref().map_or(Value::Null, serialize_value),
    );
    out.insert("isRequired".into(), json!(field.is_required));
    out.insert("isReadOnly".into(), json!(field.is_read_only));
    out.insert("description".into(), json!(field.description));

    match &field.kind {
        ActionFieldKind::Enum(values) | ActionFieldKind::EnumList(values) => {
            out.insert("enums".into(), json!(values));
        }
        ActionFieldKind::Collection(collection) => {
            let pk = datasource
                .collection(collection)
                .and_then(|schema| schema.primary_key_names().into_iter().next())
                .unwrap_or_else(|| "id".to_string());
            out.insert("reference".into(), json!(format!("{collection}.{pk}")));
        }
        _ => {}
    }
    if field.watch_changes {
        out.insert("hook".into(), json!("changeHook"));
    }
    Value::Object(out)
}

fn serialize_value(value: &FormValue) -> Value {
    match value {
        FormValue::Json(value) => value.clone(),
        FormValue::File(file) => json!(encode_data_uri(file)),
        FormValue::FileList(files) => files.iter().map(|f| json!(encode_data_uri(f))).collect(),
        FormValue::Reference(id) => json!(id.pack()),
    }
}
