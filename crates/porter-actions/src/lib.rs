mod data_uri;
mod form;
mod http;
mod pipeline;
mod result;
mod selection;
mod serialize;

pub use data_uri::{encode_data_uri, parse_data_uri};
pub use form::{RESERVED_FIELDS, RawFormInput, TypedFormInput, hook_fields, is_reserved};
pub use http::ActionHttp;
pub use pipeline::{ActionRun, PipelineState, RunKind};
pub use result::dispatch;
pub use selection::{ParentLink, Selection, resolve_selection};
pub use serialize::serialize_form;
