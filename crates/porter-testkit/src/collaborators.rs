use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use porter_collection::{
    Authorizer, Caller, GatewayError, Permission, RelationFilterProvider, ScopeProvider,
};
use porter_query::{CollectionSchema, CompositeId, ConditionTree, Operator, QueryError};
use serde_json::Value;

/// Fixed scope per collection name; unknown collections are unscoped.
#[derive(Debug, Clone, Default)]
pub struct StaticScope {
    scopes: BTreeMap<String, ConditionTree>,
}

impl StaticScope {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, collection: impl Into<String>, tree: ConditionTree) -> Self {
        self.scopes.insert(collection.into(), tree);
        self
    }
}

#[async_trait]
impl ScopeProvider for StaticScope {
    async fn scope(
        &self,
        _caller: &Caller,
        collection: &CollectionSchema,
    ) -> Result<Option<ConditionTree>, GatewayError> {
        Ok(self.scopes.get(&collection.name).cloned())
    }
}

/// Allows everything except the listed permissions.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    denied: BTreeSet<(String, String)>,
}

impl StaticAuthorizer {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn deny(mut self, collection: impl Into<String>, permission: Permission) -> Self {
        self.denied
            .insert((collection.into(), format!("{permission:?}")));
        self
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn can(
        &self,
        _caller: &Caller,
        collection: &str,
        permission: &Permission,
    ) -> Result<bool, GatewayError> {
        Ok(!self
            .denied
            .contains(&(collection.to_string(), format!("{permission:?}"))))
    }
}

/// Restricts children to those whose `foreign_key` equals the parent's
/// single-column primary key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForeignKeyRelationFilter;

#[async_trait]
impl RelationFilterProvider for ForeignKeyRelationFilter {
    async fn related_to(
        &self,
        _caller: &Caller,
        parent: &CollectionSchema,
        parent_id: &CompositeId,
        relation: &str,
    ) -> Result<ConditionTree, GatewayError> {
        let relation = parent
            .get_relation(relation)
            .ok_or_else(|| QueryError::UnknownField(relation.to_string()))?;
        let value = parent_id.values().first().cloned().unwrap_or(Value::Null);
        Ok(ConditionTree::leaf(
            relation.foreign_key.clone(),
            Operator::Equal,
            value,
        ))
    }
}
