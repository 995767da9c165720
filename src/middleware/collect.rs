//! Raw-body collection: a tee on the request's byte stream.
//!
//! [`TeeBody`] wraps the incoming body at the earliest pipeline stage. Every
//! data frame is appended to the request context *and* forwarded unmodified,
//! so the raw-body collector and whichever parser stage consumes the body
//! are two independent observers of one stream - the body is buffered once,
//! never twice in sequence. Installing the tee never blocks the chain.
//!
//! End-of-stream finalizes [`RequestContext::raw_body`] exactly once and
//! fires the completion signal. A stream error marks the context failed and
//! fires the same signal, so a waiter is never left suspended by a client
//! disconnect.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request;
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};

use crate::context::RequestContext;

/// Body wrapper feeding the raw-body collector.
pub(crate) struct TeeBody {
    inner: Body,
    ctx: Arc<RequestContext>,
    settled: bool,
}

impl TeeBody {
    pub(crate) fn new(inner: Body, ctx: Arc<RequestContext>) -> Self {
        Self {
            inner,
            ctx,
            settled: false,
        }
    }
}

impl HttpBody for TeeBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        // axum's Body is Unpin, so no projection is needed.
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.ctx.append_chunk(data.clone());
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(err))) => {
                if !this.settled {
                    this.settled = true;
                    this.ctx.fail_raw_body(err.to_string());
                }
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                if !this.settled {
                    this.settled = true;
                    this.ctx.finish_raw_body();
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Install the collector on a request: create the per-request context, tee
/// the body through it, and expose the context to downstream handlers via
/// request extensions. Returns control immediately - collection happens as
/// the stream is driven by later stages.
pub(crate) fn attach(request: &mut Request<Body>) -> Arc<RequestContext> {
    let ctx = Arc::new(RequestContext::new());
    let body = std::mem::replace(request.body_mut(), Body::empty());
    *request.body_mut() = Body::new(TeeBody::new(body, ctx.clone()));
    request.extensions_mut().insert(ctx.clone());
    ctx
}
