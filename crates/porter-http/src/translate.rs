use porter_collection::{Caller, GatewayError};
use porter_query::{
    CollectionSchema, ConditionTree, Datasource, Page, Projection, QueryError, Sort, SortClause,
    parse_condition_tree, validate_condition_tree,
};
use serde_json::Value;
use tracing::debug;

use crate::config::GatewayConfig;
use crate::request::RequestSnapshot;
use crate::timezone::{TimezoneError, TimezoneSupport};

/// Turns untyped request parameters into typed query values for one collection.
///
/// Every parser reads its key from the bulk/action envelope first, then the
/// body, then the query string (see [`RequestSnapshot::lookup`]).
pub struct RequestQueryTranslator<'a> {
    datasource: &'a Datasource,
    schema: &'a CollectionSchema,
    config: &'a GatewayConfig,
    timezones: &'a dyn TimezoneSupport,
}

impl<'a> RequestQueryTranslator<'a> {
    pub fn new(
        datasource: &'a Datasource,
        schema: &'a CollectionSchema,
        config: &'a GatewayConfig,
        timezones: &'a dyn TimezoneSupport,
    ) -> Self {
        Self {
            datasource,
            schema,
            config,
            timezones,
        }
    }

    pub fn schema(&self) -> &'a CollectionSchema {
        self.schema
    }

    pub fn datasource(&self) -> &'a Datasource {
        self.datasource
    }

    pub fn parse_condition_tree(
        &self,
        request: &RequestSnapshot,
    ) -> Result<Option<ConditionTree>, GatewayError> {
        let raw = match request.lookup("filters") {
            None => return Ok(None),
            Some(Value::String(text)) if text.trim().is_empty() => return Ok(None),
            Some(Value::String(text)) => serde_json::from_str::<Value>(&text)
                .map_err(|_| GatewayError::validation("Invalid filters: not a valid JSON document"))?,
            Some(value) => value,
        };

        let tree = parse_condition_tree(self.datasource, self.schema, &raw)
            .and_then(|tree| {
                validate_condition_tree(self.datasource, self.schema, &tree)?;
                Ok(tree)
            })
            .map_err(|e| GatewayError::validation(format!("Invalid filters: {e}")))?;

        Ok(Some(tree))
    }

    /// The requested projection, or every column when none is requested.
    ///
    /// The caller only ever sees a generic message on failure; the detail
    /// is logged at debug level.
    pub fn parse_projection(&self, request: &RequestSnapshot) -> Result<Projection, GatewayError> {
        let key = format!("fields[{}]", self.schema.name);
        let requested = match request.lookup_text(&key) {
            Some(list) if !list.trim().is_empty() => list,
            _ => return Ok(Projection::all_columns(self.schema)),
        };

        self.build_projection(request, &requested).map_err(|e| {
            debug!(collection = %self.schema.name, error = %e, "rejecting projection");
            GatewayError::validation("Invalid projection")
        })
    }

    pub fn parse_projection_with_pks(
        &self,
        request: &RequestSnapshot,
    ) -> Result<Projection, GatewayError> {
        Ok(self.parse_projection(request)?.with_pks(self.schema))
    }

    fn build_projection(
        &self,
        request: &RequestSnapshot,
        requested: &str,
    ) -> Result<Projection, QueryError> {
        let mut projection = Projection::new();
        for name in split_list(requested) {
            if self.schema.get_column(name).is_some() {
                projection.push(name);
                continue;
            }

            let relation = self
                .schema
                .get_relation(name)
                .ok_or_else(|| QueryError::UnknownField(name.to_string()))?;
            let foreign = self
                .datasource
                .collection(&relation.foreign_collection)
                .ok_or_else(|| QueryError::UnknownField(relation.foreign_collection.clone()))?;

            let subfields = match request.lookup_text(&format!("fields[{name}]")) {
                Some(list) if !list.trim().is_empty() => {
                    split_list(&list).map(str::to_string).collect()
                }
                _ => foreign.primary_key_names(),
            };
            for subfield in subfields {
                projection.push(format!("{name}:{subfield}"));
            }
        }

        projection.validate(self.datasource, self.schema)?;
        Ok(projection)
    }

    pub fn parse_search(&self, request: &RequestSnapshot) -> Result<Option<String>, GatewayError> {
        let search = match request.lookup_text("search") {
            Some(s) if !s.trim().is_empty() => s,
            _ => return Ok(None),
        };
        if !self.schema.searchable {
            return Err(GatewayError::validation(format!(
                "Collection '{}' is not searchable",
                self.schema.name
            )));
        }
        Ok(Some(search))
    }

    pub fn parse_search_extended(&self, request: &RequestSnapshot) -> bool {
        match request.lookup("searchExtended") {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            Some(Value::String(s)) => matches!(s.trim(), "true" | "1"),
            _ => false,
        }
    }

    pub fn parse_segment(&self, request: &RequestSnapshot) -> Result<Option<String>, GatewayError> {
        let segment = match request.lookup_text("segment") {
            Some(s) if !s.trim().is_empty() => s,
            _ => return Ok(None),
        };
        if !self.schema.segments.contains(&segment) {
            return Err(GatewayError::validation(format!(
                "Invalid segment: \"{segment}\""
            )));
        }
        Ok(Some(segment))
    }

    /// The canonical IANA name of the requested timezone.
    ///
    /// A platform without timezone support yields [`GatewayError::Fatal`].
    pub fn parse_timezone(&self, request: &RequestSnapshot) -> Result<String, GatewayError> {
        let timezone = match request.lookup_text("timezone") {
            Some(tz) if !tz.trim().is_empty() => tz,
            _ => return Err(GatewayError::validation("Missing timezone")),
        };
        match self.timezones.resolve(timezone.trim()) {
            Ok(name) => Ok(name),
            Err(TimezoneError::Unknown) => Err(GatewayError::validation(format!(
                "Invalid timezone: \"{timezone}\""
            ))),
            Err(TimezoneError::Unsupported) => Err(GatewayError::Fatal(
                "timezone support is unavailable on this platform".into(),
            )),
        }
    }

    /// Identify the caller, taking the timezone from the request.
    pub fn parse_caller(
        &self,
        request: &RequestSnapshot,
        id: &str,
        email: &str,
    ) -> Result<Caller, GatewayError> {
        Ok(Caller::new(id, email, self.parse_timezone(request)?))
    }

    /// `page[size]` and 1-based `page[number]` turned into skip/limit.
    pub fn parse_pagination(&self, request: &RequestSnapshot) -> Result<Page, GatewayError> {
        let raw_size = request.lookup_text("page[size]");
        let raw_number = request.lookup_text("page[number]");

        let size = match &raw_size {
            None => Some(self.config.default_page_size),
            Some(raw) => parse_positive(raw),
        };
        let number = match &raw_number {
            None => Some(self.config.default_page_number),
            Some(raw) => parse_positive(raw),
        };

        match (size, number) {
            (Some(size), Some(number)) => Ok(Page::new((number - 1).saturating_mul(size), size)),
            _ => Err(GatewayError::validation(format!(
                "Invalid pagination [limit: {}, skip: {}]",
                raw_size.unwrap_or_else(|| self.config.default_page_size.to_string()),
                raw_number.unwrap_or_else(|| self.config.default_page_number.to_string()),
            ))),
        }
    }

    /// `field` sorts ascending, `-field` descending; `relation.field` is
    /// accepted for `relation:field`. Defaults to ascending primary key.
    pub fn parse_sort(&self, request: &RequestSnapshot) -> Result<Sort, GatewayError> {
        let raw = match request.lookup_text("sort") {
            Some(s) if !s.trim().is_empty() => s,
            _ => return Ok(Sort::by_primary_key(self.schema)),
        };

        let trimmed = raw.trim();
        let (field, ascending) = match trimmed.strip_prefix('-') {
            Some(field) => (field, false),
            None => (trimmed, true),
        };
        let field = field.replace('.', ":");

        let sortable = self
            .datasource
            .resolve_column(self.schema, &field)
            .is_some_and(|c| c.is_sortable);
        if !sortable {
            return Err(GatewayError::validation(format!("Invalid sort: {raw}")));
        }

        Ok(Sort(vec![SortClause { field, ascending }]))
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_positive(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|n| *n > 0)
}
