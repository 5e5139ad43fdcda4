use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use porter_collection::{
    ActionField, ActionResult, Caller, Collection, CollectionRegistry, FormData, FormMeta,
    GatewayError,
};
use porter_query::{
    AggregateOperation, AggregateResult, Aggregation, CollectionSchema, ColumnType, ConditionTree,
    Datasource, Filter, Page, PaginatedFilter, Projection, Record, Sort,
};
use serde_json::{Map, Value, json};

use crate::eval::{compare, compare_records, lookup, matches};

pub type ExecuteFn =
    Arc<dyn Fn(&str, &FormData, &Filter) -> Result<ActionResult, GatewayError> + Send + Sync>;
pub type FormFn = Arc<
    dyn Fn(&str, Option<&FormData>, &FormMeta) -> Result<Vec<ActionField>, GatewayError>
        + Send
        + Sync,
>;

/// One recorded call to [`Collection::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub action: String,
    pub data: FormData,
    pub filter: Filter,
}

/// One recorded call to [`Collection::get_form`].
#[derive(Debug, Clone, PartialEq)]
pub struct FormRequest {
    pub action: String,
    pub data: Option<FormData>,
    pub filter: Option<Filter>,
    pub meta: FormMeta,
}

#[derive(Default)]
struct CallLog {
    lists: Vec<PaginatedFilter>,
    executions: Vec<Execution>,
    forms: Vec<FormRequest>,
    updates: Vec<(Filter, Record)>,
}

/// An in-memory [`Collection`] that evaluates filters itself and records
/// every call for assertions.
pub struct MemoryCollection {
    schema: CollectionSchema,
    rows: RwLock<Vec<Record>>,
    cursor: bool,
    segments: BTreeMap<String, ConditionTree>,
    fail_list_call: Option<usize>,
    on_execute: Option<ExecuteFn>,
    on_form: Option<FormFn>,
    log: Mutex<CallLog>,
}

impl MemoryCollection {
    pub fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            rows: RwLock::new(Vec::new()),
            cursor: false,
            segments: BTreeMap::new(),
            fail_list_call: None,
            on_execute: None,
            on_form: None,
            log: Mutex::new(CallLog::default()),
        }
    }

    pub fn with_rows(self, rows: impl IntoIterator<Item = Record>) -> Self {
        self.rows.write().unwrap().extend(rows);
        self
    }

    /// Honor [`Page::cursor`] instead of `skip` when one is supplied.
    pub fn with_cursor_support(mut self) -> Self {
        self.cursor = true;
        self
    }

    pub fn with_segment(mut self, name: impl Into<String>, tree: ConditionTree) -> Self {
        self.segments.insert(name.into(), tree);
        self
    }

    /// Make the `n`th call to `list` (1-based) fail with an internal error.
    pub fn failing_list_call(mut self, n: usize) -> Self {
        self.fail_list_call = Some(n);
        self
    }

    pub fn on_execute(
        mut self,
        f: impl Fn(&str, &FormData, &Filter) -> Result<ActionResult, GatewayError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.on_execute = Some(Arc::new(f));
        self
    }

    pub fn on_form(
        mut self,
        f: impl Fn(&str, Option<&FormData>, &FormMeta) -> Result<Vec<ActionField>, GatewayError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.on_form = Some(Arc::new(f));
        self
    }

    pub fn rows(&self) -> Vec<Record> {
        self.rows.read().unwrap().clone()
    }

    /// Every paginated filter `list` was called with, in order.
    pub fn list_calls(&self) -> Vec<PaginatedFilter> {
        self.log.lock().unwrap().lists.clone()
    }

    pub fn pages(&self) -> Vec<Option<Page>> {
        self.list_calls().into_iter().map(|f| f.page).collect()
    }

    pub fn executions(&self) -> Vec<Execution> {
        self.log.lock().unwrap().executions.clone()
    }

    pub fn form_requests(&self) -> Vec<FormRequest> {
        self.log.lock().unwrap().forms.clone()
    }

    pub fn updates(&self) -> Vec<(Filter, Record)> {
        self.log.lock().unwrap().updates.clone()
    }

    /// Rows visible through `filter`, unsorted.
    pub fn select(&self, filter: &Filter) -> Vec<Record> {
        self.rows
            .read()
            .unwrap()
            .iter()
            .filter(|row| self.visible(filter, row))
            .cloned()
            .collect()
    }

    fn visible(&self, filter: &Filter, row: &Record) -> bool {
        if let Some(tree) = &filter.condition_tree {
            if !matches(tree, row) {
                return false;
            }
        }
        if let Some(segment) = filter.segment.as_ref().and_then(|s| self.segments.get(s)) {
            if !matches(segment, row) {
                return false;
            }
        }
        match &filter.search {
            Some(search) => self.search_matches(search, row),
            None => true,
        }
    }

    fn search_matches(&self, search: &str, row: &Record) -> bool {
        let needle = search.to_lowercase();
        self.schema
            .columns()
            .filter(|c| c.column_type == ColumnType::String)
            .filter_map(|c| row.get(&c.name).and_then(Value::as_str))
            .any(|text| text.to_lowercase().contains(&needle))
    }

    fn paginate(&self, rows: Vec<Record>, sort: &Sort, page: Option<&Page>) -> Vec<Record> {
        let Some(page) = page else {
            return rows;
        };
        match (&page.cursor, self.cursor) {
            (Some(cursor), true) => rows
                .into_iter()
                .filter(|row| self.after_cursor(sort, &cursor.0, row))
                .skip(page.skip)
                .take(page.limit)
                .collect(),
            _ => rows.into_iter().skip(page.skip).take(page.limit).collect(),
        }
    }

    fn after_cursor(&self, sort: &Sort, cursor: &[Value], row: &Record) -> bool {
        for (value, clause) in cursor.iter().zip(sort.clauses()) {
            let actual = lookup(row, &clause.field).unwrap_or(&Value::Null);
            match compare(actual, value).unwrap_or(Ordering::Equal) {
                Ordering::Equal => continue,
                Ordering::Greater => return clause.ascending,
                Ordering::Less => return !clause.ascending,
            }
        }
        false
    }

    fn next_id(&self, rows: &[Record]) -> Option<Value> {
        let pks = self.schema.primary_keys();
        let [pk] = pks.as_slice() else {
            return None;
        };
        if pk.column_type != ColumnType::Number {
            return None;
        }
        let max = rows
            .iter()
            .filter_map(|r| r.get(&pk.name).and_then(Value::as_i64))
            .max()
            .unwrap_or(0);
        Some(json!(max + 1))
    }
}

/// Copy the projected paths of `row`, nesting `relation:field` paths.
pub fn project(row: &Record, projection: &Projection) -> Record {
    let mut out = Record::new();
    for path in projection.iter() {
        let Some(value) = lookup(row, path) else {
            continue;
        };
        insert_path(&mut out, path, value.clone());
    }
    out
}

fn insert_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once(':') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(nested) = entry {
                insert_path(nested, rest, value);
            }
        }
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    fn supports_cursor(&self) -> bool {
        self.cursor
    }

    async fn list(
        &self,
        _caller: &Caller,
        filter: &PaginatedFilter,
        projection: &Projection,
    ) -> Result<Vec<Record>, GatewayError> {
        let call = {
            let mut log = self.log.lock().unwrap();
            log.lists.push(filter.clone());
            log.lists.len()
        };
        if self.fail_list_call == Some(call) {
            return Err(GatewayError::internal(format!(
                "{} storage unavailable",
                self.schema.name
            )));
        }

        let mut rows = self.select(&filter.filter);
        rows.sort_by(|a, b| compare_records(&filter.sort, a, b));
        let rows = self.paginate(rows, &filter.sort, filter.page.as_ref());
        Ok(rows.iter().map(|row| project(row, projection)).collect())
    }

    async fn aggregate(
        &self,
        _caller: &Caller,
        filter: &Filter,
        aggregation: &Aggregation,
        limit: Option<usize>,
    ) -> Result<Vec<AggregateResult>, GatewayError> {
        let rows = self.select(filter);

        let mut groups: BTreeMap<String, (Map<String, Value>, Vec<&Record>)> = BTreeMap::new();
        for row in &rows {
            let key: Map<String, Value> = aggregation
                .groups
                .iter()
                .map(|g| (g.clone(), row.get(g).cloned().unwrap_or(Value::Null)))
                .collect();
            groups
                .entry(Value::Object(key.clone()).to_string())
                .or_insert_with(|| (key, Vec::new()))
                .1
                .push(row);
        }
        if groups.is_empty() && aggregation.groups.is_empty() {
            groups.insert(String::new(), (Map::new(), Vec::new()));
        }

        let mut results: Vec<AggregateResult> = groups
            .into_values()
            .map(|(group, rows)| AggregateResult {
                value: reduce(aggregation, &rows),
                group,
            })
            .collect();
        if let Some(limit) = limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn create(&self, _caller: &Caller, records: Vec<Record>) -> Result<Vec<Record>, GatewayError> {
        let mut rows = self.rows.write().unwrap();
        let mut created = Vec::with_capacity(records.len());
        for mut record in records {
            let pks = self.schema.primary_key_names();
            if pks.len() == 1 && !record.contains_key(&pks[0]) {
                if let Some(id) = self.next_id(&rows) {
                    record.insert(pks[0].clone(), id);
                }
            }
            rows.push(record.clone());
            created.push(record);
        }
        Ok(created)
    }

    async fn update(&self, _caller: &Caller, filter: &Filter, patch: &Record) -> Result<(), GatewayError> {
        self.log
            .lock()
            .unwrap()
            .updates
            .push((filter.clone(), patch.clone()));
        let mut rows = self.rows.write().unwrap();
        for row in rows.iter_mut() {
            if filter.condition_tree.as_ref().is_none_or(|t| matches(t, row)) {
                for (key, value) in patch {
                    row.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, _caller: &Caller, filter: &Filter) -> Result<(), GatewayError> {
        let mut rows = self.rows.write().unwrap();
        rows.retain(|row| !filter.condition_tree.as_ref().is_none_or(|t| matches(t, row)));
        Ok(())
    }

    async fn execute(
        &self,
        _caller: &Caller,
        action: &str,
        data: &FormData,
        filter: &Filter,
    ) -> Result<ActionResult, GatewayError> {
        self.log.lock().unwrap().executions.push(Execution {
            action: action.to_string(),
            data: data.clone(),
            filter: filter.clone(),
        });
        match &self.on_execute {
            Some(f) => f(action, data, filter),
            None => Ok(ActionResult::success(format!("{action} done"))),
        }
    }

    async fn get_form(
        &self,
        _caller: &Caller,
        action: &str,
        data: Option<&FormData>,
        filter: Option<&Filter>,
        meta: &FormMeta,
    ) -> Result<Vec<ActionField>, GatewayError> {
        self.log.lock().unwrap().forms.push(FormRequest {
            action: action.to_string(),
            data: data.cloned(),
            filter: filter.cloned(),
            meta: meta.clone(),
        });
        match &self.on_form {
            Some(f) => f(action, data, meta),
            None => Ok(Vec::new()),
        }
    }
}

fn reduce(aggregation: &Aggregation, rows: &[&Record]) -> Value {
    let numbers = || {
        rows.iter().filter_map(|row| {
            aggregation
                .field
                .as_ref()
                .and_then(|f| row.get(f))
                .and_then(Value::as_f64)
        })
    };
    match aggregation.operation {
        AggregateOperation::Count => json!(rows.len()),
        AggregateOperation::Sum => json!(numbers().sum::<f64>()),
        AggregateOperation::Avg => {
            let values: Vec<f64> = numbers().collect();
            if values.is_empty() {
                Value::Null
            } else {
                json!(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        AggregateOperation::Min => numbers().reduce(f64::min).map_or(Value::Null, |v| json!(v)),
        AggregateOperation::Max => numbers().reduce(f64::max).map_or(Value::Null, |v| json!(v)),
    }
}

/// [`CollectionRegistry`] over [`MemoryCollection`]s.
pub struct MemoryRegistry {
    datasource: Datasource,
    collections: BTreeMap<String, Arc<MemoryCollection>>,
}

impl MemoryRegistry {
    pub fn new(datasource: Datasource) -> Self {
        Self {
            datasource,
            collections: BTreeMap::new(),
        }
    }

    /// Register `collection`, which must be described by the datasource.
    pub fn with(mut self, collection: MemoryCollection) -> Self {
        self.collections
            .insert(collection.schema.name.clone(), Arc::new(collection));
        self
    }

    pub fn memory(&self, name: &str) -> Arc<MemoryCollection> {
        self.collections
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("no memory collection named {name}"))
    }
}

impl CollectionRegistry for MemoryRegistry {
    fn datasource(&self) -> &Datasource {
        &self.datasource
    }

    fn collection(&self, name: &str) -> Option<Arc<dyn Collection>> {
        self.collections
            .get(name)
            .map(|c| c.clone() as Arc<dyn Collection>)
    }
}
