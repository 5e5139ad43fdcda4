mod action;
mod caller;
mod collection;
mod error;

pub use action::{
    ActionField, ActionFieldKind, ActionResult, ByteStream, ErrorResult, File, FileResult,
    FormData, FormMeta, FormValue, RedirectResult, ResultFormat, SuccessResult, WebhookResult,
};
pub use caller::{Caller, Permission};
pub use collection::{Authorizer, Collection, CollectionRegistry, RelationFilterProvider, ScopeProvider};
pub use error::GatewayError;
