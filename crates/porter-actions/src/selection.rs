use porter_collection::{Caller, GatewayError, RelationFilterProvider};
use porter_http::{RequestQueryTranslator, RequestSnapshot, build_filter};
use porter_query::{ConditionTree, Filter, match_ids, unpack_id, unpack_ids};
use serde_json::Value;
use tracing::debug;

/// Which records an action request targets, as sent in `data.attributes`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub ids: Vec<String>,
    pub all_records: bool,
    pub excluded_ids: Vec<String>,
    pub parent: Option<ParentLink>,
}

/// The related-record view an action was triggered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub collection: String,
    pub id: String,
    pub relation: String,
}

impl Selection {
    pub fn from_request(request: &RequestSnapshot) -> Self {
        let Some(attributes) = request.attributes() else {
            return Self::default();
        };
        let text = |key: &str| attributes.get(key).and_then(Value::as_str).map(str::to_string);

        let parent = match (
            text("parent_collection_name"),
            attributes.get("parent_collection_id").and_then(id_text),
            text("parent_association_name"),
        ) {
            (Some(collection), Some(id), Some(relation)) => Some(ParentLink {
                collection,
                id,
                relation,
            }),
            _ => None,
        };

        Self {
            ids: id_list(attributes.get("ids")),
            all_records: attributes
                .get("all_records")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            excluded_ids: id_list(attributes.get("all_records_ids_excluded")),
            parent,
        }
    }

    /// Whether the request may target more than one record.
    pub fn targets_many(&self) -> bool {
        self.all_records || self.ids.len() > 1
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(id_text).collect())
        .unwrap_or_default()
}

/// Build the filter selecting the records an action applies to.
///
/// Explicit ids select exactly those records; `all_records` selects
/// everything the request's own filters match except the excluded ids. The
/// result is always intersected with `scope` and, when the action runs from
/// a related-record view, with the records related to that parent.
pub async fn resolve_selection(
    translator: &RequestQueryTranslator<'_>,
    caller: &Caller,
    request: &RequestSnapshot,
    scope: Option<ConditionTree>,
    relations: &dyn RelationFilterProvider,
) -> Result<Filter, GatewayError> {
    let schema = translator.schema();
    let selection = Selection::from_request(request);
    let base = build_filter(translator, caller, request, scope)?;

    let ids = if selection.all_records {
        if selection.excluded_ids.is_empty() {
            None
        } else {
            let excluded = unpack_ids(schema, &selection.excluded_ids)?;
            Some(match_ids(schema, &excluded)?.inverse()?)
        }
    } else {
        Some(match_ids(schema, &unpack_ids(schema, &selection.ids)?)?)
    };

    let related = match &selection.parent {
        None => None,
        Some(parent) => {
            let parent_schema = translator
                .datasource()
                .collection(&parent.collection)
                .ok_or_else(|| {
                    GatewayError::validation(format!(
                        "Unknown parent collection '{}'",
                        parent.collection
                    ))
                })?;
            let parent_id = unpack_id(parent_schema, &parent.id)?;
            debug!(
                collection = %schema.name,
                parent = %parent.collection,
                relation = %parent.relation,
                "restricting selection to related records"
            );
            Some(
                relations
                    .related_to(caller, parent_schema, &parent_id, &parent.relation)
                    .await?,
            )
        }
    };

    Ok(Filter {
        condition_tree: ConditionTree::intersect(
            ConditionTree::intersect(ids, base.condition_tree),
            related,
        ),
        ..base
    })
}
