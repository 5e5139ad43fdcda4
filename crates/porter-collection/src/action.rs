use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use futures::stream::{self, BoxStream, StreamExt};
use porter_query::CompositeId;
use serde::Deserialize;
use serde_json::Value;

use crate::error::GatewayError;

pub type ByteStream = BoxStream<'static, Result<Vec<u8>, GatewayError>>;

/// Submitted or default values of an action form, keyed by field label.
pub type FormData = BTreeMap<String, FormValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub mime_type: String,
    pub buffer: Vec<u8>,
    pub name: String,
    pub charset: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Json(Value),
    File(File),
    FileList(Vec<File>),
    Reference(CompositeId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionFieldKind {
    Boolean,
    Date,
    Dateonly,
    Time,
    Number,
    NumberList,
    String,
    StringList,
    Json,
    Enum(Vec<String>),
    EnumList(Vec<String>),
    File,
    FileList,
    /// Reference to a record of another collection.
    Collection(String),
}

impl ActionFieldKind {
    pub fn wire_name(&self) -> &'static str {
        match self {
            ActionFieldKind::Boolean => "Boolean",
            ActionFieldKind::Date => "Date",
            ActionFieldKind::Dateonly => "Dateonly",
            ActionFieldKind::Time => "Time",
            ActionFieldKind::Number => "Number",
            ActionFieldKind::NumberList => "NumberList",
            ActionFieldKind::String => "String",
            ActionFieldKind::StringList => "StringList",
            ActionFieldKind::Json => "Json",
            ActionFieldKind::Enum(_) => "Enum",
            ActionFieldKind::EnumList(_) => "EnumList",
            ActionFieldKind::File => "File",
            ActionFieldKind::FileList => "FileList",
            ActionFieldKind::Collection(_) => "Collection",
        }
    }

    /// Inverse of [`ActionFieldKind::wire_name`]. `reference` is the
    /// `collection.field` target of a `Collection` field.
    pub fn from_wire(name: &str, reference: Option<&str>, enums: Vec<String>) -> Option<Self> {
        Some(match name {
            "Boolean" => ActionFieldKind::Boolean,
            "Date" => ActionFieldKind::Date,
            "Dateonly" => ActionFieldKind::Dateonly,
            "Time" => ActionFieldKind::Time,
            "Number" => ActionFieldKind::Number,
            "NumberList" => ActionFieldKind::NumberList,
            "String" => ActionFieldKind::String,
            "StringList" => ActionFieldKind::StringList,
            "Json" => ActionFieldKind::Json,
            "Enum" => ActionFieldKind::Enum(enums),
            "EnumList" => ActionFieldKind::EnumList(enums),
            "File" => ActionFieldKind::File,
            "FileList" => ActionFieldKind::FileList,
            "Collection" => {
                let collection = reference?.split('.').next()?;
                ActionFieldKind::Collection(collection.to_string())
            }
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionField {
    pub label: String,
    pub kind: ActionFieldKind,
    pub value: Option<FormValue>,
    pub is_required: bool,
    pub is_read_only: bool,
    pub description: Option<String>,
    pub watch_changes: bool,
}

impl ActionField {
    pub fn new(label: impl Into<String>, kind: ActionFieldKind) -> Self {
        Self {
            label: label.into(),
            kind,
            value: None,
            is_required: false,
            is_read_only: false,
            description: None,
            watch_changes: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn watching_changes(mut self) -> Self {
        self.watch_changes = true;
        self
    }

    pub fn with_value(mut self, value: FormValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Extra context handed to form resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormMeta {
    /// Label of the field whose change triggered a hook, when any.
    pub change_field: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    #[default]
    Text,
    Html,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuccessResult {
    pub message: String,
    pub format: ResultFormat,
    /// Relations whose cached content the dashboard must refresh.
    pub invalidated: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResult {
    pub message: String,
    pub html: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResult {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedirectResult {
    pub path: String,
}

pub struct FileResult {
    pub name: String,
    pub mime_type: String,
    pub stream: ByteStream,
}

impl fmt::Debug for FileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileResult")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// Outcome of an action execution. Exactly one variant per invocation.
#[derive(Debug)]
pub enum ActionResult {
    Success(SuccessResult),
    Error(ErrorResult),
    Webhook(WebhookResult),
    Redirect(RedirectResult),
    File(FileResult),
}

impl ActionResult {
    pub fn success(message: impl Into<String>) -> Self {
        ActionResult::Success(SuccessResult {
            message: message.into(),
            format: ResultFormat::Text,
            invalidated: BTreeSet::new(),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ActionResult::Error(ErrorResult {
            message: message.into(),
            html: None,
        })
    }

    pub fn redirect(path: impl Into<String>) -> Self {
        ActionResult::Redirect(RedirectResult { path: path.into() })
    }

    pub fn file(name: impl Into<String>, mime_type: impl Into<String>, stream: ByteStream) -> Self {
        ActionResult::File(FileResult {
            name: name.into(),
            mime_type: mime_type.into(),
            stream,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ActionResult::Success(_) => "Success",
            ActionResult::Error(_) => "Error",
            ActionResult::Webhook(_) => "Webhook",
            ActionResult::Redirect(_) => "Redirect",
            ActionResult::File(_) => "File",
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum WireResult {
    Success {
        message: String,
        #[serde(default)]
        format: ResultFormat,
        #[serde(default)]
        invalidated: BTreeSet<String>,
    },
    Error {
        message: String,
        #[serde(default)]
        html: Option<String>,
    },
    Webhook {
        url: String,
        method: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default)]
        body: Value,
    },
    Redirect {
        path: String,
    },
    File {
        name: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        content: String,
    },
}

const RESULT_TAGS: [&str; 5] = ["Success", "Error", "Webhook", "Redirect", "File"];

impl ActionResult {
    /// Decode a `type`-tagged result reported by a collaborator over the wire.
    ///
    /// A tag outside the five known variants is an implementation error on the
    /// collaborator side and surfaces as [`GatewayError::Fatal`].
    pub fn from_wire(value: Value) -> Result<ActionResult, GatewayError> {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        if !RESULT_TAGS.contains(&tag.as_str()) {
            return Err(GatewayError::Fatal(format!(
                "unknown action result type: '{tag}'"
            )));
        }

        let wire: WireResult = serde_json::from_value(value)
            .map_err(|e| GatewayError::internal(format!("malformed {tag} action result: {e}")))?;

        Ok(match wire {
            WireResult::Success {
                message,
                format,
                invalidated,
            } => ActionResult::Success(SuccessResult {
                message,
                format,
                invalidated,
            }),
            WireResult::Error { message, html } => ActionResult::Error(ErrorResult { message, html }),
            WireResult::Webhook {
                url,
                method,
                headers,
                body,
            } => ActionResult::Webhook(WebhookResult {
                url,
                method,
                headers,
                body,
            }),
            WireResult::Redirect { path } => ActionResult::Redirect(RedirectResult { path }),
            WireResult::File {
                name,
                mime_type,
                content,
            } => ActionResult::file(
                name,
                mime_type,
                stream::once(async move { Ok(content.into_bytes()) }).boxed(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use serde_json::json;

    #[test]
    fn decodes_success_with_defaults() {
        let result = ActionResult::from_wire(json!({ "type": "Success", "message": "done" })).unwrap();
        match result {
            ActionResult::Success(s) => {
                assert_eq!(s.message, "done");
                assert_eq!(s.format, ResultFormat::Text);
                assert!(s.invalidated.is_empty());
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn decodes_webhook() {
        let result = ActionResult::from_wire(json!({
            "type": "Webhook",
            "url": "https://hooks.example.com",
            "method": "POST",
            "headers": { "x-token": "t" },
            "body": { "a": 1 }
        }))
        .unwrap();
        assert!(matches!(result, ActionResult::Webhook(ref w) if w.headers["x-token"] == "t"));
    }

    #[tokio::test]
    async fn decodes_file_into_stream() {
        let result = ActionResult::from_wire(json!({
            "type": "File",
            "name": "x.csv",
            "mimeType": "text/csv",
            "content": "a,b\n"
        }))
        .unwrap();
        let ActionResult::File(file) = result else {
            panic!("expected file");
        };
        let chunks: Vec<Vec<u8>> = file.stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"a,b\n");
    }

    #[test]
    fn unknown_tag_is_fatal() {
        let err = ActionResult::from_wire(json!({ "type": "Teleport" })).unwrap_err();
        assert!(matches!(err, GatewayError::Fatal(ref m) if m.contains("Teleport")));
        let err = ActionResult::from_wire(json!({ "message": "no tag" })).unwrap_err();
        assert!(matches!(err, GatewayError::Fatal(_)));
    }

    #[test]
    fn malformed_known_tag_is_internal() {
        let err = ActionResult::from_wire(json!({ "type": "Redirect" })).unwrap_err();
        assert!(matches!(err, GatewayError::Internal(ref m) if m.contains("malformed Redirect")));
    }
}
