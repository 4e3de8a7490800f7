#![deny(clippy::all, clippy::pedantic)]

use eden_query::EdenError;
use futures::future::join_all;
use serde_json::{Value, json};

use crate::args::BatchArgs;
use crate::client::{CliError, Ctx};
use crate::io::parse_call;

/// Dispatch every call before awaiting any, so they share one window.
pub async fn handle(ctx: &Ctx, cmd: &BatchArgs) -> Result<Value, CliError> {
    let pending = cmd
        .calls
        .iter()
        .map(|spec| {
            let (path, input) = parse_call(spec)?;
            Ok(ctx.route(path)?.query(input, ctx.request_options()))
        })
        .collect::<Result<Vec<_>, CliError>>()?;

    let outcomes = join_all(pending)
        .await
        .into_iter()
        .map(|result| match result {
            Ok(data) => json!({ "data": data }),
            Err(EdenError::Application { status, error }) => {
                json!({ "status": status, "error": error })
            }
            Err(err) => json!({ "error": err.to_string() }),
        })
        .collect();
    Ok(Value::Array(outcomes))
}
