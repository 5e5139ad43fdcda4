use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use http::header::{CONTENT_DISPOSITION, HeaderMap};
use http::{Method, Request, StatusCode};
use percent_encoding::percent_decode_str;
use porter_collection::{
    Authorizer, Caller, Collection, CollectionRegistry, GatewayError, Permission, ScopeProvider,
};
use porter_query::{
    Aggregation, CollectionSchema, ConditionTree, Filter, Page, PaginatedFilter, Sort, match_ids,
    unpack_id,
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::compose::{build_filter, build_paginated};
use crate::config::GatewayConfig;
use crate::export::generate;
use crate::record::{build_record, link_one_to_one};
use crate::request::RequestSnapshot;
use crate::response::{GatewayResponse, attachment, error_response, json_ok, stream_response};
use crate::timezone::TimezoneSupport;
use crate::translate::RequestQueryTranslator;

/// Collaborators shared by every request.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<dyn CollectionRegistry>,
    pub scopes: Arc<dyn ScopeProvider>,
    pub authorizer: Arc<dyn Authorizer>,
    pub timezones: Arc<dyn TimezoneSupport>,
    pub config: Arc<GatewayConfig>,
}

impl GatewayState {
    pub fn translator<'a>(&'a self, schema: &'a CollectionSchema) -> RequestQueryTranslator<'a> {
        RequestQueryTranslator::new(
            self.registry.datasource(),
            schema,
            &self.config,
            self.timezones.as_ref(),
        )
    }

    /// Resolve the collection, identify the caller and check `permission`.
    pub async fn prepare(
        &self,
        identity: &CallerIdentity,
        collection: &str,
        request: &RequestSnapshot,
        permission: Permission,
    ) -> Result<(Arc<dyn Collection>, Caller), GatewayError> {
        let handle = self.registry.require(collection)?;
        let caller =
            self.translator(handle.schema())
                .parse_caller(request, &identity.id, &identity.email)?;
        self.authorizer.ensure(&caller, collection, &permission).await?;
        Ok((handle, caller))
    }
}

/// Who is calling, as asserted by the upstream authentication layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    pub id: String,
    pub email: String,
}

impl CallerIdentity {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }

    /// Read `x-caller-id` and `x-caller-email`; missing headers are empty.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string()
        };
        Self {
            id: header("x-caller-id"),
            email: header("x-caller-email"),
        }
    }
}

/// Record endpoints of the gateway.
///
/// | method | path | handler |
/// |---|---|---|
/// | GET | `/{collection}` | list |
/// | GET | `/{collection}/count` | count |
/// | GET | `/{collection}.csv` | export |
/// | GET | `/{collection}/{id}` | get |
/// | POST | `/{collection}` | create |
pub struct GatewayHttp {
    state: GatewayState,
}

impl GatewayHttp {
    pub fn new(state: GatewayState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    pub async fn handle(&self, req: Request<Vec<u8>>) -> GatewayResponse {
        let identity = CallerIdentity::from_headers(req.headers());
        let request = match RequestSnapshot::from_http(&req) {
            Ok(r) => r,
            Err(e) => return error_response(e.status_code(), &e.to_string()),
        };

        let path = req.uri().path().trim_matches('/').to_string();
        let segments: Vec<&str> = path.split('/').collect();

        match (req.method(), segments.as_slice()) {
            (&Method::GET, [name]) => match name.strip_suffix(".csv") {
                Some(name) => self.export(&identity, name, &request).await,
                None => self.list(&identity, name, &request).await,
            },
            (&Method::GET, [name, "count"]) => self.count(&identity, name, &request).await,
            (&Method::GET, [name, id]) => match percent_decode_str(id).decode_utf8() {
                Ok(id) => self.get(&identity, name, &id, &request).await,
                Err(_) => error_response(StatusCode::BAD_REQUEST, "Invalid record id"),
            },
            (&Method::POST, [name]) => self.create(&identity, name, &request).await,
            _ => error_response(StatusCode::NOT_FOUND, "not found"),
        }
    }

    pub async fn list(
        &self,
        identity: &CallerIdentity,
        collection: &str,
        request: &RequestSnapshot,
    ) -> GatewayResponse {
        finish(collection, self.execute_list(identity, collection, request).await)
    }

    pub async fn count(
        &self,
        identity: &CallerIdentity,
        collection: &str,
        request: &RequestSnapshot,
    ) -> GatewayResponse {
        finish(collection, self.execute_count(identity, collection, request).await)
    }

    pub async fn get(
        &self,
        identity: &CallerIdentity,
        collection: &str,
        id: &str,
        request: &RequestSnapshot,
    ) -> GatewayResponse {
        finish(collection, self.execute_get(identity, collection, id, request).await)
    }

    pub async fn export(
        &self,
        identity: &CallerIdentity,
        collection: &str,
        request: &RequestSnapshot,
    ) -> GatewayResponse {
        finish(collection, self.execute_export(identity, collection, request).await)
    }

    pub async fn create(
        &self,
        identity: &CallerIdentity,
        collection: &str,
        request: &RequestSnapshot,
    ) -> GatewayResponse {
        finish(collection, self.execute_create(identity, collection, request).await)
    }

    async fn execute_list(
        &self,
        identity: &CallerIdentity,
        name: &str,
        request: &RequestSnapshot,
    ) -> Result<GatewayResponse, GatewayError> {
        let (collection, caller) = self
            .state
            .prepare(identity, name, request, Permission::Browse)
            .await?;
        let schema = collection.schema();
        let translator = self.state.translator(schema);

        let scope = self.state.scopes.scope(&caller, schema).await?;
        let filter = build_paginated(&translator, &caller, request, scope, None)?;
        let projection = translator.parse_projection_with_pks(request)?;

        let records = collection.list(&caller, &filter, &projection).await?;
        Ok(json_ok(StatusCode::OK, &json!({ "records": records })))
    }

    async fn execute_count(
        &self,
        identity: &CallerIdentity,
        name: &str,
        request: &RequestSnapshot,
    ) -> Result<GatewayResponse, GatewayError> {
        let (collection, caller) = self
            .state
            .prepare(identity, name, request, Permission::Browse)
            .await?;
        let schema = collection.schema();
        let translator = self.state.translator(schema);

        let scope = self.state.scopes.scope(&caller, schema).await?;
        let filter = build_filter(&translator, &caller, request, scope)?;

        let results = collection
            .aggregate(&caller, &filter, &Aggregation::count(), None)
            .await?;
        let count = results.first().map(|r| r.value.clone()).unwrap_or(json!(0));
        Ok(json_ok(StatusCode::OK, &json!({ "count": count })))
    }

    async fn execute_get(
        &self,
        identity: &CallerIdentity,
        name: &str,
        packed_id: &str,
        request: &RequestSnapshot,
    ) -> Result<GatewayResponse, GatewayError> {
        let (collection, caller) = self
            .state
            .prepare(identity, name, request, Permission::Read)
            .await?;
        let schema = collection.schema();
        let translator = self.state.translator(schema);

        let id = unpack_id(schema, packed_id)?;
        let scope = self.state.scopes.scope(&caller, schema).await?;
        let filter = PaginatedFilter::new(
            Filter {
                condition_tree: ConditionTree::intersect(Some(match_ids(schema, &[id])?), scope),
                timezone: Some(caller.timezone.clone()),
                ..Filter::default()
            },
            Sort::default(),
            Some(Page::new(0, 1)),
        );
        let projection = translator.parse_projection_with_pks(request)?;

        let mut records = collection.list(&caller, &filter, &projection).await?;
        if records.is_empty() {
            return Err(GatewayError::NotFound(format!("{name} record '{packed_id}'")));
        }
        Ok(json_ok(StatusCode::OK, &json!({ "record": records.swap_remove(0) })))
    }

    async fn execute_export(
        &self,
        identity: &CallerIdentity,
        name: &str,
        request: &RequestSnapshot,
    ) -> Result<GatewayResponse, GatewayError> {
        let (collection, caller) = self
            .state
            .prepare(identity, name, request, Permission::Export)
            .await?;
        let schema = collection.schema();
        let translator = self.state.translator(schema);

        let header = request
            .query("header")
            .map(str::to_string)
            .ok_or_else(|| GatewayError::validation("Missing export header"))?;
        let filename = request
            .query("filename")
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(self.state.config.export_filename.as_str());
        let filename = if filename.ends_with(".csv") {
            filename.to_string()
        } else {
            format!("{filename}.csv")
        };

        let scope = self.state.scopes.scope(&caller, schema).await?;
        let filter = build_paginated(&translator, &caller, request, scope, None)?;
        let projection = translator.parse_projection(request)?;

        info!(collection = %name, filename = %filename, "starting export");
        let chunks = generate(
            caller,
            projection,
            header,
            &filter,
            schema,
            collection.clone(),
            self.state.config.export_chunk_size,
        )
        .map_ok(String::into_bytes)
        .boxed();

        let mut response = stream_response("text/csv; charset=utf-8", chunks)?;
        response
            .headers_mut()
            .insert(CONTENT_DISPOSITION, attachment(&filename)?);
        Ok(response)
    }

    async fn execute_create(
        &self,
        identity: &CallerIdentity,
        name: &str,
        request: &RequestSnapshot,
    ) -> Result<GatewayResponse, GatewayError> {
        let (collection, caller) = self
            .state
            .prepare(identity, name, request, Permission::Add)
            .await?;
        let schema = collection.schema();

        let (record, links) = build_record(
            &caller,
            self.state.registry.as_ref(),
            self.state.scopes.as_ref(),
            schema,
            request,
        )
        .await?;

        let mut created = collection.create(&caller, vec![record]).await?;
        if created.is_empty() {
            return Err(GatewayError::internal(format!(
                "{name} returned no record after create"
            )));
        }
        let created = created.swap_remove(0);
        link_one_to_one(&caller, self.state.registry.as_ref(), schema, &created, &links).await?;

        Ok(json_ok(StatusCode::OK, &json!({ "record": created })))
    }
}

/// Turn a handler outcome into a response, logging rejections.
pub fn finish(
    collection: &str,
    outcome: Result<GatewayResponse, GatewayError>,
) -> GatewayResponse {
    match outcome {
        Ok(response) => response,
        Err(e) => {
            let status = e.status_code();
            if status.is_server_error() {
                error!(collection = %collection, error = %e, "request failed");
            } else {
                warn!(collection = %collection, status = status.as_u16(), error = %e, "request rejected");
            }
            error_response(status, &e.to_string())
        }
    }
}
