//! Wire links, cache and context from loaded settings.

use std::sync::Arc;

use tracing::info;

use crate::cache::{QueryCacheConfig, QueryClient};
use crate::client::EdenClient;
use crate::config::{LinkSettings, Settings};
use crate::context::EdenContext;
use crate::link::{HttpBatchLink, HttpLink, LoggerLink, SharedLink};

use super::error::InfraError;

/// Batching or single-call HTTP link per `settings.batching`, wrapped in a
/// [`LoggerLink`].
pub fn build_link(settings: &LinkSettings) -> Result<SharedLink, InfraError> {
    let options = settings.batch_options();
    let link: SharedLink = if settings.batching {
        Arc::new(HttpBatchLink::new(options)?)
    } else {
        Arc::new(HttpLink::new(options)?)
    };

    info!(
        url = %settings.url,
        batching = settings.batching,
        max_batch_size = settings.max_batch_size.get(),
        "Link configured"
    );
    Ok(Arc::new(LoggerLink::new(link)))
}

pub fn build_context(settings: &Settings) -> Result<EdenContext, InfraError> {
    let link = build_link(&settings.link)?;
    let query_client = Arc::new(QueryClient::new(QueryCacheConfig::from(&settings.query)));
    Ok(EdenContext::new(query_client, EdenClient::new(link))
        .with_config(settings.query.eden_config()))
}
