use std::sync::Arc;

use async_trait::async_trait;
use porter_query::{
    AggregateResult, Aggregation, CollectionSchema, CompositeId, ConditionTree, Datasource, Filter,
    PaginatedFilter, Projection, Record,
};

use crate::action::{ActionField, ActionResult, FormData, FormMeta};
use crate::caller::{Caller, Permission};
use crate::error::GatewayError;

/// A schema-described collection backed by some storage engine.
///
/// Implementations own the actual I/O; this layer only hands them typed,
/// validated query values.
#[async_trait]
pub trait Collection: Send + Sync {
    fn schema(&self) -> &CollectionSchema;

    /// Whether `list` honors [`porter_query::Page::cursor`] for keyset pagination.
    fn supports_cursor(&self) -> bool {
        false
    }

    async fn list(
        &self,
        caller: &Caller,
        filter: &PaginatedFilter,
        projection: &Projection,
    ) -> Result<Vec<Record>, GatewayError>;

    async fn aggregate(
        &self,
        caller: &Caller,
        filter: &Filter,
        aggregation: &Aggregation,
        limit: Option<usize>,
    ) -> Result<Vec<AggregateResult>, GatewayError>;

    async fn create(&self, caller: &Caller, records: Vec<Record>) -> Result<Vec<Record>, GatewayError>;

    async fn update(&self, caller: &Caller, filter: &Filter, patch: &Record) -> Result<(), GatewayError>;

    async fn delete(&self, caller: &Caller, filter: &Filter) -> Result<(), GatewayError>;

    async fn execute(
        &self,
        caller: &Caller,
        action: &str,
        data: &FormData,
        filter: &Filter,
    ) -> Result<ActionResult, GatewayError>;

    async fn get_form(
        &self,
        caller: &Caller,
        action: &str,
        data: Option<&FormData>,
        filter: Option<&Filter>,
        meta: &FormMeta,
    ) -> Result<Vec<ActionField>, GatewayError>;
}

/// Lookup of collections by name, alongside their shared schema metadata.
pub trait CollectionRegistry: Send + Sync {
    fn datasource(&self) -> &Datasource;

    fn collection(&self, name: &str) -> Option<Arc<dyn Collection>>;

    fn require(&self, name: &str) -> Result<Arc<dyn Collection>, GatewayError> {
        self.collection(name)
            .ok_or_else(|| GatewayError::NotFound(format!("collection '{name}'")))
    }
}

/// Source of the mandatory row-level visibility restriction.
#[async_trait]
pub trait ScopeProvider: Send + Sync {
    async fn scope(
        &self,
        caller: &Caller,
        collection: &CollectionSchema,
    ) -> Result<Option<ConditionTree>, GatewayError>;
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn can(
        &self,
        caller: &Caller,
        collection: &str,
        permission: &Permission,
    ) -> Result<bool, GatewayError>;

    /// [`Authorizer::can`], turning a denial into [`GatewayError::Authorization`].
    async fn ensure(
        &self,
        caller: &Caller,
        collection: &str,
        permission: &Permission,
    ) -> Result<(), GatewayError> {
        if self.can(caller, collection, permission).await? {
            Ok(())
        } else {
            Err(GatewayError::Authorization(format!(
                "{permission:?} on '{collection}' is not allowed for {}",
                caller.email
            )))
        }
    }
}

/// Builds the condition restricting a collection to the records related to
/// one parent record through `relation`.
#[async_trait]
pub trait RelationFilterProvider: Send + Sync {
    async fn related_to(
        &self,
        caller: &Caller,
        parent: &CollectionSchema,
        parent_id: &CompositeId,
        relation: &str,
    ) -> Result<ConditionTree, GatewayError>;
}
