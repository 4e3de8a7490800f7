#![deny(clippy::all, clippy::pedantic)]

use eden_query::hooks::{InfiniteQueryObserver, InfiniteQueryOptions};
use serde_json::Value;

use crate::args::PagesArgs;
use crate::client::{CliError, Ctx};
use crate::io::{parse_cursor, parse_input};

pub async fn handle(ctx: &Ctx, cmd: &PagesArgs) -> Result<Value, CliError> {
    let route = ctx.route(&cmd.path)?;
    let input = parse_input(cmd.input.as_deref())?;
    let field = cmd.cursor_field.clone();

    let mut options = InfiniteQueryOptions::new(move |last: &Value, _pages: &[Value]| {
        last.get(&field).filter(|cursor| !cursor.is_null()).cloned()
    })
    .request(ctx.query_options());
    if let Some(cursor) = parse_cursor(cmd.initial_cursor.as_deref()) {
        options = options.initial_cursor(cursor);
    }

    let observer = InfiniteQueryObserver::new(ctx.context(), route, input, options);
    observer.fetch().await?;
    let mut loaded = 1;
    while loaded < cmd.max_pages && observer.fetch_next_page().await? {
        loaded += 1;
    }

    let data = observer.data()?.unwrap_or_default();
    serde_json::to_value(&data).map_err(|e| CliError::Output(e.to_string()))
}
