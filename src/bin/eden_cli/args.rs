//! Command-line surface for `eden-cli`.

#![deny(clippy::all, clippy::pedantic)]

use std::fmt;

use clap::{Args, Parser, Subcommand, ValueEnum};
use eden_query::Method;
use eden_query::config::ConfigArgs;

#[derive(Parser, Debug)]
#[command(name = "eden-cli", version, about = "Batching RPC client for eden endpoints", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Extra request header as `name:value` (repeatable)
    #[arg(long = "header", value_name = "NAME:VALUE", global = true)]
    pub headers: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Call one procedure; GET calls go through the query cache
    Call(CallArgs),
    /// POST to a procedure as a mutation
    Mutate(MutateArgs),
    /// Send several calls in one batch window and print positional results
    Batch(BatchArgs),
    /// Walk a cursor-paginated procedure until the cursor runs out
    Pages(PagesArgs),
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Route path, segments separated by `/` or `.`
    pub path: String,
    /// JSON input
    #[arg(long)]
    pub input: Option<String>,
    #[arg(long, default_value_t = MethodArg::Get)]
    pub method: MethodArg,
}

#[derive(Args, Debug)]
pub struct MutateArgs {
    pub path: String,
    /// JSON input
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// `path` or `path=JSON`, in submission order (repeatable)
    #[arg(long = "call", value_name = "PATH[=JSON]", required = true)]
    pub calls: Vec<String>,
}

#[derive(Args, Debug)]
pub struct PagesArgs {
    pub path: String,
    /// JSON object merged into every page request
    #[arg(long)]
    pub input: Option<String>,
    /// Response field holding the next cursor
    #[arg(long, default_value = "nextCursor")]
    pub cursor_field: String,
    #[arg(long, default_value_t = 10)]
    pub max_pages: usize,
    /// Cursor for the first page (JSON, or a bare string)
    #[arg(long)]
    pub initial_cursor: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum MethodArg {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for MethodArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MethodArg::Get => "get",
            MethodArg::Post => "post",
            MethodArg::Put => "put",
            MethodArg::Patch => "patch",
            MethodArg::Delete => "delete",
        };
        f.write_str(s)
    }
}

impl From<MethodArg> for Method {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Get => Method::Get,
            MethodArg::Post => Method::Post,
            MethodArg::Put => Method::Put,
            MethodArg::Patch => Method::Patch,
            MethodArg::Delete => Method::Delete,
        }
    }
}
