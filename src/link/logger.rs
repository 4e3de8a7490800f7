//! Tracing decorator for any [`Link`].

use std::time::Instant;

use futures::FutureExt;
use tracing::{Instrument, debug, info_span, warn};

use crate::domain::RequestDescriptor;

use super::{Link, PendingCall, SharedLink};

/// Wraps a link and records one span per call. Results pass through
/// untouched.
#[derive(Clone)]
pub struct LoggerLink {
    next: SharedLink,
}

impl LoggerLink {
    pub fn new(next: SharedLink) -> Self {
        Self { next }
    }
}

impl Link for LoggerLink {
    fn dispatch(&self, descriptor: RequestDescriptor) -> PendingCall {
        let span = info_span!(
            "eden.call",
            id = %descriptor.id(),
            path = %descriptor.route(),
            method = %descriptor.method(),
        );
        let pending = span.in_scope(|| {
            debug!(has_input = descriptor.input().is_some(), "Call dispatched");
            self.next.dispatch(descriptor)
        });
        let started_at = Instant::now();

        async move {
            let result = pending.await;
            let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
            match &result {
                Ok(_) => debug!(elapsed_ms, result = "ok", "Call settled"),
                Err(err) if err.is_cancelled() => {
                    debug!(elapsed_ms, result = "cancelled", "Call settled");
                }
                Err(err) => warn!(elapsed_ms, result = "error", error = %err, "Call failed"),
            }
            result
        }
        .instrument(span)
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use eden_query_wire::Method;
    use serde_json::json;

    use super::*;
    use crate::domain::EdenError;

    struct Fixed(Result<serde_json::Value, EdenError>);

    impl Link for Fixed {
        fn dispatch(&self, _descriptor: RequestDescriptor) -> PendingCall {
            futures::future::ready(self.0.clone()).boxed()
        }
    }

    #[tokio::test]
    async fn passes_results_through() {
        let ok = LoggerLink::new(Arc::new(Fixed(Ok(json!("hi")))));
        let err = LoggerLink::new(Arc::new(Fixed(Err(EdenError::application(
            404,
            json!("missing"),
        )))));
        let descriptor = RequestDescriptor::new(["hello"], Method::Get, None);

        assert_eq!(ok.dispatch(descriptor.clone()).await, Ok(json!("hi")));
        assert_eq!(
            err.dispatch(descriptor).await,
            Err(EdenError::application(404, json!("missing")))
        );
    }
}
