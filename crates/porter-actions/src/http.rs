use std::sync::Arc;

use http::{Method, Request, StatusCode};
use percent_encoding::percent_decode_str;
use porter_collection::{Caller, Collection, FormMeta, GatewayError, Permission, RelationFilterProvider};
use porter_http::{
    CallerIdentity, GatewayResponse, GatewayState, RequestSnapshot, error_response, finish,
    json_ok,
};
use porter_query::Filter;
use serde_json::Value;
use tracing::{debug, info};

use crate::form::{RawFormInput, TypedFormInput, hook_fields};
use crate::pipeline::{ActionRun, PipelineState};
use crate::result::dispatch;
use crate::selection::{Selection, resolve_selection};
use crate::serialize::serialize_form;

/// Action endpoints.
///
/// | method | path | entry point |
/// |---|---|---|
/// | POST | `/_actions/{collection}/{action}` | execute |
/// | POST | `/_actions/{collection}/{action}/hooks/load` | load hook |
/// | POST | `/_actions/{collection}/{action}/hooks/change` | change hook |
pub struct ActionHttp {
    state: GatewayState,
    relations: Arc<dyn RelationFilterProvider>,
}

impl ActionHttp {
    pub fn new(state: GatewayState, relations: Arc<dyn RelationFilterProvider>) -> Self {
        Self { state, relations }
    }

    pub async fn handle(&self, req: Request<Vec<u8>>) -> GatewayResponse {
        let identity = CallerIdentity::from_headers(req.headers());
        let request = match RequestSnapshot::from_http(&req) {
            Ok(r) => r,
            Err(e) => return error_response(e.status_code(), &e.to_string()),
        };

        let path = req.uri().path().trim_matches('/').to_string();
        let segments: Vec<String> = match path
            .split('/')
            .map(|s| percent_decode_str(s).decode_utf8().map(|s| s.into_owned()))
            .collect::<Result<_, _>>()
        {
            Ok(segments) => segments,
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid action path"),
        };
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        if req.method() != Method::POST {
            return error_response(StatusCode::NOT_FOUND, "not found");
        }
        match segments.as_slice() {
            ["_actions", collection, action] => {
                self.execute(&identity, collection, action, &request).await
            }
            ["_actions", collection, action, "hooks", "load"] => {
                self.load_form(&identity, collection, action, &request).await
            }
            ["_actions", collection, action, "hooks", "change"] => {
                self.change_form(&identity, collection, action, &request).await
            }
            _ => error_response(StatusCode::NOT_FOUND, "not found"),
        }
    }

    pub async fn execute(
        &self,
        identity: &CallerIdentity,
        collection: &str,
        action: &str,
        request: &RequestSnapshot,
    ) -> GatewayResponse {
        finish(
            collection,
            self.run_execute(identity, collection, action, request).await,
        )
    }

    pub async fn load_form(
        &self,
        identity: &CallerIdentity,
        collection: &str,
        action: &str,
        request: &RequestSnapshot,
    ) -> GatewayResponse {
        finish(
            collection,
            self.run_hook(identity, collection, action, request, false).await,
        )
    }

    pub async fn change_form(
        &self,
        identity: &CallerIdentity,
        collection: &str,
        action: &str,
        request: &RequestSnapshot,
    ) -> GatewayResponse {
        finish(
            collection,
            self.run_hook(identity, collection, action, request, true).await,
        )
    }

    /// Authorize the action and compute the records it targets.
    async fn select(
        &self,
        identity: &CallerIdentity,
        name: &str,
        action: &str,
        request: &RequestSnapshot,
    ) -> Result<(Arc<dyn Collection>, Caller, Filter), GatewayError> {
        let (collection, caller) = self
            .state
            .prepare(
                identity,
                name,
                request,
                Permission::ExecuteAction(action.to_string()),
            )
            .await?;
        let schema = collection.schema();
        let action_schema = schema
            .get_action(action)
            .ok_or_else(|| GatewayError::NotFound(format!("action '{action}' on '{name}'")))?;
        if !action_schema.accepts_many() && Selection::from_request(request).targets_many() {
            return Err(GatewayError::validation(format!(
                "Action '{action}' can only run on a single record"
            )));
        }

        let translator = self.state.translator(schema);
        let scope = self.state.scopes.scope(&caller, schema).await?;
        let filter =
            resolve_selection(&translator, &caller, request, scope, self.relations.as_ref())
                .await?;
        Ok((collection, caller, filter))
    }

    async fn run_execute(
        &self,
        identity: &CallerIdentity,
        name: &str,
        action: &str,
        request: &RequestSnapshot,
    ) -> Result<GatewayResponse, GatewayError> {
        let mut run = ActionRun::execute(action);
        let (collection, caller, filter) = self.select(identity, name, action, request).await?;
        let raw = RawFormInput::from_request(request);

        run.advance(PipelineState::FormRequested)?;
        let fields = collection
            .get_form(
                &caller,
                action,
                Some(raw.guessed()),
                Some(&filter),
                &FormMeta::default(),
            )
            .await?;
        run.advance(PipelineState::FormResolved)?;
        debug!(action = %action, fields = fields.len(), "form resolved");

        let data = TypedFormInput::from_raw(&raw, &fields, self.state.registry.datasource())?;
        let result = collection
            .execute(&caller, action, data.values(), &filter)
            .await?;
        run.advance(PipelineState::Executed)?;

        let kind = result.kind();
        let response = dispatch(result)?;
        run.advance(PipelineState::ResultDispatched)?;
        info!(collection = %name, action = %action, result = kind, "action dispatched");
        Ok(response)
    }

    async fn run_hook(
        &self,
        identity: &CallerIdentity,
        name: &str,
        action: &str,
        request: &RequestSnapshot,
        change: bool,
    ) -> Result<GatewayResponse, GatewayError> {
        let mut run = ActionRun::hook(action);
        let (collection, caller, filter) = self.select(identity, name, action, request).await?;
        let datasource = self.state.registry.datasource();

        let fields = hook_fields(request)?;
        let data = if fields.is_empty() {
            None
        } else {
            Some(TypedFormInput::from_fields(&fields, datasource)?)
        };
        let meta = if change {
            FormMeta {
                change_field: request
                    .attributes()
                    .and_then(|a| a.get("changed_field"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }
        } else {
            FormMeta::default()
        };

        run.advance(PipelineState::FormRequested)?;
        let fields = collection
            .get_form(
                &caller,
                action,
                data.as_ref().map(TypedFormInput::values),
                Some(&filter),
                &meta,
            )
            .await?;
        run.advance(PipelineState::FormResolved)?;
        debug!(action = %action, fields = fields.len(), change, "hook resolved form");

        Ok(json_ok(StatusCode::OK, &serialize_form(&fields, datasource)))
    }
}
