use porter_collection::{Caller, GatewayError};
use porter_query::{ConditionTree, Filter, FilterOverrides, PaginatedFilter};

use crate::request::RequestSnapshot;
use crate::translate::RequestQueryTranslator;

/// The request's filter intersected with the caller's mandatory scope.
pub fn build_filter(
    translator: &RequestQueryTranslator<'_>,
    caller: &Caller,
    request: &RequestSnapshot,
    scope: Option<ConditionTree>,
) -> Result<Filter, GatewayError> {
    let user = translator.parse_condition_tree(request)?;
    Ok(Filter {
        condition_tree: ConditionTree::intersect(user, scope),
        search: translator.parse_search(request)?,
        search_extended: translator.parse_search_extended(request),
        segment: translator.parse_segment(request)?,
        timezone: Some(caller.timezone.clone()),
    })
}

/// [`build_filter`] plus sort and page, with optional partial overrides.
pub fn build_paginated(
    translator: &RequestQueryTranslator<'_>,
    caller: &Caller,
    request: &RequestSnapshot,
    scope: Option<ConditionTree>,
    overrides: Option<FilterOverrides>,
) -> Result<PaginatedFilter, GatewayError> {
    let filter = build_filter(translator, caller, request, scope)?;
    let paginated = PaginatedFilter::new(
        filter,
        translator.parse_sort(request)?,
        Some(translator.parse_pagination(request)?),
    );
    Ok(match overrides {
        Some(overrides) => paginated.with_overrides(overrides),
        None => paginated,
    })
}
