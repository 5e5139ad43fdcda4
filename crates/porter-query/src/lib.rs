mod condition_tree;
mod error;
mod filter;
mod id;
mod operator;
mod parse_filter;
mod projection;
mod schema;

pub use condition_tree::{Aggregator, ConditionBranch, ConditionLeaf, ConditionTree};
pub use error::QueryError;
pub use filter::{
    AggregateOperation, AggregateResult, Aggregation, Cursor, Filter, FilterOverrides, Page,
    PaginatedFilter, Sort, SortClause,
};
pub use id::{CompositeId, Record, match_ids, pack_id, unpack_id, unpack_ids};
pub use operator::{Operator, normalize_operator_name};
pub use parse_filter::{parse_condition_tree, validate_condition_tree};
pub use projection::Projection;
pub use schema::{
    ActionSchema, ActionScope, CollectionSchema, ColumnSchema, ColumnType, ColumnValidation,
    Datasource, FieldSchema, Pattern, RelationSchema, RelationType,
};
