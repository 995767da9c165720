//! Completion gate: the authentication stage never runs before the raw
//! body is final.
//!
//! Two paths converge here. If a parser stage already consumed the stream,
//! `raw_body` is set and the gate continues immediately. Otherwise the gate
//! drives the remaining tee'd stream to end-of-data while waiting on the
//! context's one-shot completion signal; the signal also fires on stream
//! failure, so the wait can never hang. Registering the waiter before the
//! completion re-check (inside [`RequestContext::raw_body_ready`]) is what
//! makes continuation fire exactly once even though both paths exist.
//!
//! On exit the downstream body is replaced with the buffered raw bytes, so
//! handlers behind the middleware still read a complete body. Both the
//! drained stream and any replaced body are dropped here, which drops
//! their frame sources - nothing can fire after the gate returns.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use bytes::Bytes;
use http_body_util::BodyExt;

use crate::context::RequestContext;
use crate::error::AuthError;

/// Block until raw-body collection settles, then hand back the exact bytes.
///
/// Client disconnects and other stream failures surface as
/// [`AuthError::Transport`].
pub(crate) async fn wait_for_raw_body(
    request: &mut Request<Body>,
    ctx: &Arc<RequestContext>,
) -> Result<Bytes, AuthError> {
    if !ctx.is_complete() {
        // No parser stage consumed the stream. Drive it to end-of-data so
        // the collector observes every frame; the completion signal settles
        // in the same pass.
        let body = std::mem::replace(request.body_mut(), Body::empty());
        let (drained, ()) = tokio::join!(drain(body), ctx.raw_body_ready());
        drained?;
    }

    if let Some(reason) = ctx.transport_error() {
        return Err(AuthError::Transport(reason.to_string()));
    }

    let raw = ctx.raw_body().ok_or_else(|| {
        AuthError::Transport("request body stream ended without completing".to_string())
    })?;

    // Restore a readable body for downstream handlers.
    *request.body_mut() = Body::from(raw.clone());
    Ok(raw)
}

async fn drain(mut body: Body) -> Result<(), AuthError> {
    while let Some(frame) = body.frame().await {
        if let Err(err) = frame {
            return Err(AuthError::Transport(err.to_string()));
        }
    }
    Ok(())
}
