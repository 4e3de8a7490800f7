//! Batching HTTP link.
//!
//! Calls dispatched during one scheduling turn share a window. The window is
//! flushed as a single POST once the turn ends (or `batch_wait` elapses), or
//! immediately when it reaches `max_batch_size`. Results are matched back to
//! callers by position.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eden_query_wire::BatchCall;
use futures::FutureExt;
use metrics::{counter, histogram};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

use crate::domain::{
    AbortSignal, EdenError, RequestDescriptor, SharedTransformer, TransportError, transformer,
};
use crate::util::lock::mutex_lock;

use super::transport::{
    BatchTransport, ReqwestTransport, TransportRequest, decode_outcomes, resolve_outcome,
};
use super::{Link, PendingCall};

const SOURCE: &str = "link::batch";
const METRIC_BATCH_FLUSH: &str = "eden_batch_flush_total";
const METRIC_BATCH_SIZE: &str = "eden_batch_size";

pub const DEFAULT_MAX_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(size) => size,
    None => NonZeroUsize::MIN,
};

#[derive(Debug, Clone)]
pub struct BatchLinkOptions {
    /// Batch endpoint, `{domain}{endpoint}`.
    pub url: Url,
    pub max_batch_size: NonZeroUsize,
    /// Zero flushes at the end of the current scheduling turn.
    pub batch_wait: Duration,
    /// Base headers; per-call headers override them by name.
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    pub transformer: SharedTransformer,
}

impl BatchLinkOptions {
    pub fn new(domain: &str, endpoint: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(&format!("{}{endpoint}", domain.trim_end_matches('/')))?;
        Ok(Self::with_url(url))
    }

    pub fn with_url(url: Url) -> Self {
        Self {
            url,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            batch_wait: Duration::ZERO,
            headers: Vec::new(),
            timeout: None,
            transformer: transformer::identity(),
        }
    }

    pub fn max_batch_size(mut self, size: NonZeroUsize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn batch_wait(mut self, wait: Duration) -> Self {
        self.batch_wait = wait;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn transformer(mut self, transformer: SharedTransformer) -> Self {
        self.transformer = transformer;
        self
    }
}

/// Link that coalesces concurrent calls into one HTTP request.
#[derive(Clone)]
pub struct HttpBatchLink {
    inner: Arc<BatchInner>,
}

impl HttpBatchLink {
    /// Build a link over the default `reqwest` transport.
    pub fn new(options: BatchLinkOptions) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(options.timeout)?;
        Ok(Self::with_transport(options, Arc::new(transport)))
    }

    pub fn with_transport(options: BatchLinkOptions, transport: Arc<dyn BatchTransport>) -> Self {
        Self {
            inner: Arc::new(BatchInner {
                options,
                transport,
                window: Mutex::new(None),
                next_window_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn options(&self) -> &BatchLinkOptions {
        &self.inner.options
    }

    /// Number of calls waiting in the open window.
    pub fn pending(&self) -> usize {
        mutex_lock(&self.inner.window, SOURCE, "pending")
            .as_ref()
            .map_or(0, |window| window.members.len())
    }
}

impl Link for HttpBatchLink {
    fn dispatch(&self, descriptor: RequestDescriptor) -> PendingCall {
        let call = match descriptor.to_call(self.inner.options.transformer.as_ref()) {
            Ok(call) => call,
            Err(err) => return futures::future::ready(Err(err)).boxed(),
        };
        let Ok(handle) = Handle::try_current() else {
            return futures::future::ready(Err(TransportError::NoRuntime.into())).boxed();
        };

        let (reply, receiver) = oneshot::channel();
        let signal = descriptor.options().signal.clone();
        self.inner.enqueue(
            &handle,
            Member {
                call,
                headers: descriptor.options().headers.clone(),
                reply,
            },
        );
        await_reply(receiver, signal).boxed()
    }
}

/// Wait for the positional result, resolving early with
/// [`EdenError::Cancelled`] if `signal` fires first.
async fn await_reply(
    receiver: oneshot::Receiver<Result<Value, EdenError>>,
    signal: Option<AbortSignal>,
) -> Result<Value, EdenError> {
    let reply = async {
        receiver
            .await
            .unwrap_or_else(|_| Err(TransportError::Dropped.into()))
    };
    match signal {
        Some(signal) => tokio::select! {
            biased;
            () = signal.aborted() => Err(EdenError::Cancelled),
            result = reply => result,
        },
        None => reply.await,
    }
}

struct BatchInner {
    options: BatchLinkOptions,
    transport: Arc<dyn BatchTransport>,
    window: Mutex<Option<OpenWindow>>,
    next_window_id: AtomicU64,
}

struct OpenWindow {
    id: u64,
    members: Vec<Member>,
}

struct Member {
    call: BatchCall,
    headers: Vec<(String, String)>,
    reply: oneshot::Sender<Result<Value, EdenError>>,
}

impl BatchInner {
    fn enqueue(self: &Arc<Self>, handle: &Handle, member: Member) {
        let sealed = {
            let mut slot = mutex_lock(&self.window, SOURCE, "enqueue");
            let window = slot.get_or_insert_with(|| {
                let id = self.next_window_id.fetch_add(1, Ordering::Relaxed);
                debug!(window = id, "Batch window opened");
                handle.spawn(Arc::clone(self).flush_after_wait(id));
                OpenWindow {
                    id,
                    members: Vec::new(),
                }
            });
            window.members.push(member);
            if window.members.len() >= self.options.max_batch_size.get() {
                slot.take()
            } else {
                None
            }
        };

        if let Some(window) = sealed {
            debug!(window = window.id, "Batch window full, flushing early");
            handle.spawn(Arc::clone(self).flush(window));
        }
    }

    async fn flush_after_wait(self: Arc<Self>, id: u64) {
        if self.options.batch_wait.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.options.batch_wait).await;
        }

        let window = {
            let mut slot = mutex_lock(&self.window, SOURCE, "seal");
            if slot.as_ref().is_some_and(|window| window.id == id) {
                slot.take()
            } else {
                None
            }
        };
        if let Some(window) = window {
            self.flush(window).await;
        }
    }

    async fn flush(self: Arc<Self>, window: OpenWindow) {
        let OpenWindow { id, members } = window;
        let size = members.len();

        let mut headers = self.options.headers.clone();
        let mut body = Vec::with_capacity(size);
        let mut replies = Vec::with_capacity(size);
        for member in members {
            for (name, value) in member.headers {
                merge_header(&mut headers, name, value);
            }
            body.push(member.call);
            replies.push(member.reply);
        }

        counter!(METRIC_BATCH_FLUSH).increment(1);
        histogram!(METRIC_BATCH_SIZE).record(size as f64);
        debug!(window = id, size, url = %self.options.url, "Flushing batch window");

        let request = TransportRequest {
            url: self.options.url.clone(),
            headers,
            body,
        };
        let outcomes = match self.transport.send(request).await {
            Ok(response) => decode_outcomes(&response, size),
            Err(err) => Err(err),
        };

        match outcomes {
            Ok(outcomes) => {
                for (reply, outcome) in replies.into_iter().zip(outcomes) {
                    let _ = reply.send(resolve_outcome(outcome, self.options.transformer.as_ref()));
                }
            }
            Err(err) => {
                warn!(window = id, size, error = %err, "Batch request failed");
                for reply in replies {
                    let _ = reply.send(Err(err.clone().into()));
                }
            }
        }
    }
}

/// Insert or replace a header, comparing names case-insensitively.
fn merge_header(headers: &mut Vec<(String, String)>, name: String, value: String) {
    match headers
        .iter_mut()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
    {
        Some(slot) => slot.1 = value,
        None => headers.push((name, value)),
    }
}
