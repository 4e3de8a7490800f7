#![deny(clippy::all, clippy::pedantic)]

use eden_query::config::{LoadError, Settings};
use eden_query::domain::RequestOptions;
use eden_query::hooks::QueryRequestOptions;
use eden_query::infra::{bootstrap, error::InfraError};
use eden_query::{EdenContext, EdenError, EdenUtils, RouteBuilder};
use thiserror::Error;

use crate::io::parse_path;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Call(#[from] EdenError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to render output: {0}")]
    Output(String),
}

#[derive(Clone)]
pub struct Ctx {
    context: EdenContext,
    headers: Vec<(String, String)>,
}

impl Ctx {
    pub fn new(settings: &Settings, headers: Vec<(String, String)>) -> Result<Self, CliError> {
        let context = bootstrap::build_context(settings)?;
        Ok(Self { context, headers })
    }

    pub fn context(&self) -> &EdenContext {
        &self.context
    }

    pub fn utils(&self) -> EdenUtils {
        self.context.utils()
    }

    pub fn route(&self, path: &str) -> Result<RouteBuilder, CliError> {
        Ok(self.context.client().path(parse_path(path)?))
    }

    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            signal: None,
            headers: self.headers.clone(),
        }
    }

    pub fn query_options(&self) -> QueryRequestOptions {
        QueryRequestOptions {
            headers: self.headers.clone(),
            ..Default::default()
        }
    }
}
