use futures::future::try_join_all;
use porter_collection::{Caller, CollectionRegistry, GatewayError, ScopeProvider};
use porter_query::{
    CollectionSchema, CompositeId, ConditionTree, Filter, Page, PaginatedFilter, Projection, Record,
    RelationSchema, RelationType, Sort, match_ids, unpack_id,
};
use serde_json::Value;
use tracing::debug;

use crate::request::RequestSnapshot;

/// A relation of the record being created whose target was named in
/// `data.relationships`, with the foreign record already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLink {
    pub relation: String,
    pub foreign_record: Record,
}

/// Build the record to create from a JSON:API-style body.
///
/// Writable columns are copied from `data.attributes`. Every many-to-one or
/// one-to-one relation named in `data.relationships` is resolved by looking
/// up the foreign record, all of them concurrently. Many-to-one targets fill
/// the local foreign key; one-to-one targets are returned so that
/// [`link_one_to_one`] can point them back at the created record.
pub async fn build_record(
    caller: &Caller,
    registry: &dyn CollectionRegistry,
    scopes: &dyn ScopeProvider,
    schema: &CollectionSchema,
    request: &RequestSnapshot,
) -> Result<(Record, Vec<ResolvedLink>), GatewayError> {
    let mut record = Record::new();
    if let Some(attributes) = request.attributes() {
        for column in schema.columns().filter(|c| !c.is_read_only) {
            if let Some(value) = attributes.get(&column.name) {
                record.insert(column.name.clone(), value.clone());
            }
        }
    }

    let requested: Vec<(&RelationSchema, String)> = schema
        .relations()
        .filter(|relation| relation.is_single())
        .filter_map(|relation| {
            relationship_id(request, &relation.name).map(|id| (relation, id))
        })
        .collect();

    let links = try_join_all(
        requested
            .iter()
            .map(|(relation, id)| fetch_target(caller, registry, scopes, relation, id)),
    )
    .await?;

    for ((relation, _), foreign_record) in requested.iter().zip(&links) {
        if relation.relation_type == RelationType::ManyToOne {
            let target = foreign_record
                .get(&relation.foreign_key_target)
                .cloned()
                .unwrap_or(Value::Null);
            record.insert(relation.foreign_key.clone(), target);
        }
    }

    let one_to_one = requested
        .iter()
        .zip(links)
        .filter(|((relation, _), _)| relation.relation_type == RelationType::OneToOne)
        .map(|((relation, _), foreign_record)| ResolvedLink {
            relation: relation.name.clone(),
            foreign_record,
        })
        .collect();

    Ok((record, one_to_one))
}

/// Point every resolved one-to-one target at `created` by writing the
/// created record's `foreign_key_target` into the foreign `foreign_key`.
pub async fn link_one_to_one(
    caller: &Caller,
    registry: &dyn CollectionRegistry,
    schema: &CollectionSchema,
    created: &Record,
    links: &[ResolvedLink],
) -> Result<(), GatewayError> {
    let updates = links.iter().filter_map(|link| {
        let relation = schema.get_relation(&link.relation)?;
        Some(async move {
            let foreign = registry.require(&relation.foreign_collection)?;
            // Both records come from collaborators, so a missing key is their fault.
            let id = CompositeId::from_record(foreign.schema(), &link.foreign_record)
                .map_err(|e| GatewayError::internal(format!("{} target: {e}", relation.name)))?;
            let target = created.get(&relation.foreign_key_target).cloned().ok_or_else(|| {
                GatewayError::internal(format!(
                    "created record lacks '{}' needed by '{}'",
                    relation.foreign_key_target, relation.name
                ))
            })?;
            let filter = Filter {
                condition_tree: Some(match_ids(foreign.schema(), &[id])?),
                ..Filter::default()
            };
            let mut patch = Record::new();
            patch.insert(relation.foreign_key.clone(), target);
            foreign.update(caller, &filter, &patch).await
        })
    });
    try_join_all(updates).await?;
    Ok(())
}

fn relationship_id(request: &RequestSnapshot, relation: &str) -> Option<String> {
    match request
        .body()
        .get("data")?
        .get("relationships")?
        .get(relation)?
        .get("data")?
        .get("id")?
    {
        Value::String(id) => Some(id.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn fetch_target(
    caller: &Caller,
    registry: &dyn CollectionRegistry,
    scopes: &dyn ScopeProvider,
    relation: &RelationSchema,
    packed_id: &str,
) -> Result<Record, GatewayError> {
    let foreign = registry.require(&relation.foreign_collection)?;
    let foreign_schema = foreign.schema();
    let id = unpack_id(foreign_schema, packed_id)?;
    let scope = scopes.scope(caller, foreign_schema).await?;

    let filter = PaginatedFilter::new(
        Filter {
            condition_tree: ConditionTree::intersect(Some(match_ids(foreign_schema, &[id])?), scope),
            ..Filter::default()
        },
        Sort::default(),
        Some(Page::new(0, 1)),
    );
    let mut projection = Projection::primary_keys(foreign_schema);
    projection.push(relation.foreign_key_target.clone());

    debug!(relation = %relation.name, id = %packed_id, "resolving relation target");
    let mut rows = foreign.list(caller, &filter, &projection).await?;
    if rows.is_empty() {
        return Err(GatewayError::NotFound(format!(
            "{} record '{packed_id}' referenced by '{}'",
            relation.foreign_collection, relation.name
        )));
    }
    Ok(rows.swap_remove(0))
}
