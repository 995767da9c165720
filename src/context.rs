//! Per-request state carried through the authentication pipeline.
//!
//! One [`RequestContext`] is created per inbound request by the middleware
//! layer and shared with downstream handlers through request extensions as
//! `Arc<RequestContext>`. The pipeline is the only writer; every mutable
//! field has exactly one logical writer, so the only synchronization beyond
//! the chunk list mutex is the ordering guarantee provided by
//! [`RequestContext::raw_body_ready`].

use std::sync::{Mutex, OnceLock, PoisonError};

use bytes::{Bytes, BytesMut};
use tokio::sync::Notify;

use crate::error::AuthErrorKind;

/// Body interpretation produced by whichever parser stage matched the
/// request's content type. At most one stage writes this per request.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(serde_json::Value),
    /// Decoded `application/x-www-form-urlencoded` pairs, in wire order.
    Form(Vec<(String, String)>),
    Text(String),
    Raw(Bytes),
}

/// Terminal outcome of the authentication stage for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureOutcome {
    /// The authentication stage has not run (or not finished) yet.
    Pending,
    Accepted,
    Rejected(AuthErrorKind),
}

/// Mutable per-request state, exclusively owned by one request's pipeline
/// invocation and destroyed when that request completes.
///
/// Downstream handlers can read it via `Extension<Arc<RequestContext>>` or
/// the [`RequestContextExt`] helper.
#[derive(Debug, Default)]
pub struct RequestContext {
    /// Body chunks in arrival order; append-only until finalization.
    chunks: Mutex<Vec<Bytes>>,
    /// Byte-exact request body, written exactly once at end-of-stream.
    raw_body: OnceLock<Bytes>,
    parsed_body: OnceLock<ParsedBody>,
    /// API key resolved by the verification engine on success.
    api_key: OnceLock<String>,
    /// Final outcome; `Pending` is represented by the cell being unset.
    outcome: OnceLock<SignatureOutcome>,
    /// Stream-level failure reason, if the transport errored mid-body.
    transport_error: OnceLock<String>,
    /// One-shot completion signal for raw-body finalization. Fired on both
    /// the success and the failure path so no waiter stays suspended.
    body_done: Notify,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one received chunk. No-op once the raw body is finalized.
    pub(crate) fn append_chunk(&self, chunk: Bytes) {
        if self.is_complete() {
            return;
        }
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(chunk);
    }

    /// Finalize the raw body from the collected chunks.
    ///
    /// Idempotent: only the first call writes `raw_body`; every call fires
    /// the completion signal at most once per registered waiter.
    pub(crate) fn finish_raw_body(&self) {
        let chunks = std::mem::take(
            &mut *self.chunks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let raw = match chunks.len() {
            0 => Bytes::new(),
            1 => chunks.into_iter().next().unwrap_or_default(),
            _ => {
                let mut buf = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
                for chunk in &chunks {
                    buf.extend_from_slice(chunk);
                }
                buf.freeze()
            }
        };
        let _ = self.raw_body.set(raw);
        self.body_done.notify_waiters();
    }

    /// Record a stream-level failure and release any completion waiters.
    pub(crate) fn fail_raw_body(&self, reason: String) {
        let _ = self.transport_error.set(reason);
        self.body_done.notify_waiters();
    }

    /// The byte-exact request body, if end-of-stream has been observed.
    pub fn raw_body(&self) -> Option<Bytes> {
        self.raw_body.get().cloned()
    }

    /// The stream failure reason, if the transport errored mid-body.
    pub fn transport_error(&self) -> Option<&str> {
        self.transport_error.get().map(String::as_str)
    }

    /// Whether raw-body collection has settled, successfully or not.
    pub fn is_complete(&self) -> bool {
        self.raw_body.get().is_some() || self.transport_error.get().is_some()
    }

    /// Wait until raw-body collection settles.
    ///
    /// Resolves immediately if collection already settled, and exactly once
    /// otherwise. The waiter is registered *before* the completion re-check,
    /// so the immediate-check and deferred-signal paths can never race into
    /// a lost wakeup or a double fire.
    pub async fn raw_body_ready(&self) {
        let notified = self.body_done.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_complete() {
            return;
        }
        notified.await;
    }

    /// Record the parsed body. Returns `false` if a parser stage already
    /// wrote one (only the first writer wins).
    pub(crate) fn set_parsed_body(&self, parsed: ParsedBody) -> bool {
        self.parsed_body.set(parsed).is_ok()
    }

    /// The parsed body, if a parser stage matched and succeeded.
    pub fn parsed_body(&self) -> Option<&ParsedBody> {
        self.parsed_body.get()
    }

    /// The API key resolved by the verification engine, once accepted.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.get().map(String::as_str)
    }

    /// The signature outcome; `Pending` until the dispatcher runs.
    pub fn signature_outcome(&self) -> SignatureOutcome {
        self.outcome
            .get()
            .copied()
            .unwrap_or(SignatureOutcome::Pending)
    }

    pub(crate) fn set_accepted(&self, api_key: String) {
        let _ = self.api_key.set(api_key);
        let _ = self.outcome.set(SignatureOutcome::Accepted);
    }

    pub(crate) fn set_rejected(&self, kind: AuthErrorKind) {
        let _ = self.outcome.set(SignatureOutcome::Rejected(kind));
    }
}

/// Extension trait for reading the pipeline's context off a request.
pub trait RequestContextExt {
    /// The authentication context attached by the middleware, if any.
    fn auth_context(&self) -> Option<&std::sync::Arc<RequestContext>>;
}

impl<B> RequestContextExt for axum::http::Request<B> {
    fn auth_context(&self) -> Option<&std::sync::Arc<RequestContext>> {
        self.extensions().get::<std::sync::Arc<RequestContext>>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_finish_concatenates_chunks_in_order() {
        let ctx = RequestContext::new();
        ctx.append_chunk(Bytes::from_static(b"hello "));
        ctx.append_chunk(Bytes::from_static(b"world"));
        ctx.finish_raw_body();

        assert_eq!(ctx.raw_body().unwrap(), Bytes::from_static(b"hello world"));
    }

    #[test]
    fn test_finish_is_idempotent() {
        let ctx = RequestContext::new();
        ctx.append_chunk(Bytes::from_static(b"first"));
        ctx.finish_raw_body();

        // A second finalization must not overwrite the raw body.
        ctx.append_chunk(Bytes::from_static(b"second"));
        ctx.finish_raw_body();

        assert_eq!(ctx.raw_body().unwrap(), Bytes::from_static(b"first"));
    }

    #[test]
    fn test_empty_stream_finalizes_to_empty_body() {
        let ctx = RequestContext::new();
        ctx.finish_raw_body();
        assert_eq!(ctx.raw_body().unwrap(), Bytes::new());
    }

    #[test]
    fn test_parsed_body_first_writer_wins() {
        let ctx = RequestContext::new();
        assert!(ctx.set_parsed_body(ParsedBody::Text("one".into())));
        assert!(!ctx.set_parsed_body(ParsedBody::Text("two".into())));
        assert_eq!(ctx.parsed_body(), Some(&ParsedBody::Text("one".into())));
    }

    #[test]
    fn test_outcome_transitions_once() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.signature_outcome(), SignatureOutcome::Pending);

        ctx.set_accepted("K1".into());
        assert_eq!(ctx.signature_outcome(), SignatureOutcome::Accepted);
        assert_eq!(ctx.api_key(), Some("K1"));

        // Terminal: a later rejection must not replace the outcome.
        ctx.set_rejected(AuthErrorKind::SignatureInvalid);
        assert_eq!(ctx.signature_outcome(), SignatureOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_raw_body_ready_immediate_path() {
        let ctx = RequestContext::new();
        ctx.finish_raw_body();

        // Already complete: must resolve without a signal.
        ctx.raw_body_ready().await;
    }

    #[tokio::test]
    async fn test_raw_body_ready_deferred_path() {
        let ctx = Arc::new(RequestContext::new());

        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                ctx.raw_body_ready().await;
                ctx.raw_body()
            })
        };

        // Let the waiter register before the stream ends.
        tokio::task::yield_now().await;
        ctx.append_chunk(Bytes::from_static(b"late"));
        ctx.finish_raw_body();

        let raw = waiter.await.unwrap();
        assert_eq!(raw.unwrap(), Bytes::from_static(b"late"));
    }

    #[tokio::test]
    async fn test_raw_body_ready_fires_once_when_both_paths_race() {
        let ctx = Arc::new(RequestContext::new());
        ctx.finish_raw_body();

        // Completion already observed and a signal already fired: repeated
        // waits must still resolve immediately, never hang, never double.
        ctx.raw_body_ready().await;
        ctx.raw_body_ready().await;
    }

    #[tokio::test]
    async fn test_transport_failure_releases_waiters() {
        let ctx = Arc::new(RequestContext::new());

        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                ctx.raw_body_ready().await;
            })
        };

        tokio::task::yield_now().await;
        ctx.fail_raw_body("connection reset by peer".into());

        waiter.await.unwrap();
        assert!(ctx.raw_body().is_none());
        assert_eq!(ctx.transport_error(), Some("connection reset by peer"));
    }
}
