use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use porter_collection::{Caller, Collection, GatewayError};
use porter_query::{
    CollectionSchema, Cursor, Page, PaginatedFilter, Projection, Record, Sort,
};
use serde_json::Value;
use tracing::{debug, info};

pub const EXPORT_CHUNK_SIZE: usize = 1000;

/// Source of export pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Whether [`Page::cursor`] is honored. Fetchers that do not support it
    /// are paginated with an advancing `skip` instead.
    fn supports_cursor(&self) -> bool;

    async fn fetch(
        &self,
        caller: &Caller,
        filter: &PaginatedFilter,
        projection: &Projection,
    ) -> Result<Vec<Record>, GatewayError>;
}

#[async_trait]
impl<C> PageFetcher for C
where
    C: Collection + ?Sized,
{
    fn supports_cursor(&self) -> bool {
        Collection::supports_cursor(self)
    }

    async fn fetch(
        &self,
        caller: &Caller,
        filter: &PaginatedFilter,
        projection: &Projection,
    ) -> Result<Vec<Record>, GatewayError> {
        self.list(caller, filter, projection).await
    }
}

struct ExportState<F: ?Sized> {
    fetcher: Arc<F>,
    caller: Caller,
    filter: PaginatedFilter,
    projection: Projection,
    fetch_projection: Projection,
    primary_keys: Vec<String>,
    chunk_size: usize,
    skip: usize,
    cursor: Option<Cursor>,
    pages: usize,
    exhausted: bool,
}

/// Lazily export every record matching `base_filter` as CSV text chunks.
///
/// The first chunk is `header` (newline-terminated); each following chunk
/// holds every row of one fetched page, fields in projection order. The
/// sort is forced to ascending primary key so pages can be resumed from the
/// last row. Nothing is fetched until the consumer pulls, and a short page
/// ends the sequence; a row count that is an exact multiple of
/// `chunk_size` costs one extra, empty fetch.
pub fn generate<F>(
    caller: Caller,
    projection: Projection,
    header: String,
    base_filter: &PaginatedFilter,
    schema: &CollectionSchema,
    fetcher: Arc<F>,
    chunk_size: usize,
) -> BoxStream<'static, Result<String, GatewayError>>
where
    F: PageFetcher + ?Sized + 'static,
{
    let state = ExportState {
        fetcher,
        caller,
        filter: base_filter.with_sort(Sort::by_primary_key(schema)),
        fetch_projection: projection.with_pks(schema),
        projection,
        primary_keys: schema.primary_key_names(),
        chunk_size: chunk_size.max(1),
        skip: 0,
        cursor: None,
        pages: 0,
        exhausted: false,
    };

    let header = if header.ends_with('\n') {
        header
    } else {
        format!("{header}\n")
    };

    stream::once(async move { Ok(header) })
        .chain(stream::try_unfold(state, next_chunk::<F>))
        .boxed()
}

async fn next_chunk<F>(
    mut state: ExportState<F>,
) -> Result<Option<(String, ExportState<F>)>, GatewayError>
where
    F: PageFetcher + ?Sized,
{
    if state.exhausted {
        return Ok(None);
    }

    let page = match (state.fetcher.supports_cursor(), state.cursor.take()) {
        (true, Some(cursor)) => Page::after(cursor, state.chunk_size),
        _ => Page::new(state.skip, state.chunk_size),
    };
    let rows = state
        .fetcher
        .fetch(&state.caller, &state.filter.with_page(page), &state.fetch_projection)
        .await?;

    state.pages += 1;
    state.skip += rows.len();
    debug!(page = state.pages, rows = rows.len(), "fetched export page");

    if rows.len() < state.chunk_size {
        state.exhausted = true;
        info!(pages = state.pages, rows = state.skip, "export complete");
    }

    let Some(last) = rows.last() else {
        return Ok(None);
    };
    state.cursor = Some(cursor_of(&state.primary_keys, last));

    let chunk = render_rows(&state.projection, &rows)?;
    Ok(Some((chunk, state)))
}

fn cursor_of(primary_keys: &[String], record: &Record) -> Cursor {
    Cursor(
        primary_keys
            .iter()
            .map(|pk| record.get(pk).cloned().unwrap_or(Value::Null))
            .collect(),
    )
}

/// Render rows as CSV lines, one column per projection path.
pub fn render_rows(projection: &Projection, rows: &[Record]) -> Result<String, GatewayError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for row in rows {
        let cells = projection.iter().map(|path| cell(lookup_path(row, path)));
        writer.write_record(cells).map_err(GatewayError::internal)?;
    }

    let bytes = writer.into_inner().map_err(GatewayError::internal)?;
    String::from_utf8(bytes).map_err(GatewayError::internal)
}

fn lookup_path<'r>(record: &'r Record, path: &str) -> Option<&'r Value> {
    match path.split_once(':') {
        None => record.get(path),
        Some((relation, rest)) => match record.get(relation)? {
            Value::Object(nested) => lookup_path(nested, rest),
            _ => None,
        },
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_rows_in_projection_order() {
        let projection: Projection = ["title", "id", "author:name", "tags"].into_iter().collect();
        let rows = vec![
            json!({ "id": 1, "title": "Dune", "author": { "name": "Herbert" }, "tags": ["a"] }),
            json!({ "id": 2, "title": "A, B", "author": null }),
        ]
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect::<Vec<_>>();

        let text = render_rows(&projection, &rows).unwrap();
        assert_eq!(
            text,
            "Dune,1,Herbert,\"[\"\"a\"\"]\"\n\"A, B\",2,,\n"
        );
    }
}
