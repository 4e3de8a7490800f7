#![deny(clippy::all, clippy::pedantic)]

use eden_query::Method;
use eden_query::hooks::{MutationObserver, MutationOptions};
use serde_json::Value;
use tracing::info;

use crate::args::{CallArgs, MutateArgs};
use crate::client::{CliError, Ctx};
use crate::io::parse_input;

/// GET goes through the query cache; other methods call the route directly.
pub async fn call(ctx: &Ctx, cmd: &CallArgs) -> Result<Value, CliError> {
    let route = ctx.route(&cmd.path)?;
    let input = parse_input(cmd.input.as_deref())?;
    let method = Method::from(cmd.method);

    let value = if method.is_query() {
        ctx.utils()
            .fetch(&route, input, &ctx.query_options())
            .await?
    } else {
        route.call(method, input, ctx.request_options()).await?
    };
    Ok(value)
}

pub async fn mutate(ctx: &Ctx, cmd: &MutateArgs) -> Result<Value, CliError> {
    let route = ctx.route(&cmd.path)?;
    let input = parse_input(cmd.input.as_deref())?;
    let path = cmd.path.clone();

    let options = MutationOptions::default()
        .request(ctx.query_options())
        .on_success(move |_data, _variables| info!(path = %path, "Mutation succeeded"));
    let observer = MutationObserver::new(ctx.context(), route, options);
    Ok(observer.mutate(input).await?)
}
