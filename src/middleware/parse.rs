//! Parser stage set: content-type-driven body interpretation.
//!
//! One stage per format enabled in the normalized configuration, tried in a
//! fixed order (json, urlencoded, text, raw). The first stage whose matcher
//! accepts the request's `Content-Type` consumes the tee'd body to
//! end-of-stream under its size limit and writes the parsed result to the
//! context; every other stage is a no-op. A request whose content type
//! matches no enabled stage passes through untouched - the completion gate
//! drives the stream instead.
//!
//! Failures here are pipeline-level rejections distinct from signature
//! rejections: `BodyTooLarge` when the limit is exceeded, `BodyParse` on
//! malformed payloads. The authentication stage is never invoked after
//! either.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::http::header::CONTENT_TYPE;
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use mime::Mime;
use tracing::debug;

use crate::config::ParserStages;
use crate::context::{ParsedBody, RequestContext};
use crate::error::AuthError;

/// Run the configured parser stages against the request.
///
/// At most one stage consumes the body; the matched stage replaces it with
/// an empty placeholder (the gate restores the buffered raw bytes for
/// downstream handlers).
pub(crate) async fn run_stages(
    request: &mut Request<Body>,
    ctx: &Arc<RequestContext>,
    stages: &ParserStages,
) -> Result<(), AuthError> {
    let Some(mime) = content_type(request) else {
        return Ok(());
    };

    if let Some(options) = &stages.json
        && is_json(&mime)
    {
        let bytes = collect_limited(take_body(request), options.limit).await?;
        let value = serde_json::from_slice(&bytes)
            .map_err(|err| AuthError::BodyParse(err.to_string()))?;
        store(ctx, ParsedBody::Json(value), "json");
        return Ok(());
    }

    if let Some(options) = &stages.urlencoded
        && is_urlencoded(&mime)
    {
        let bytes = collect_limited(take_body(request), options.limit).await?;
        let pairs = serde_urlencoded::from_bytes(&bytes)
            .map_err(|err| AuthError::BodyParse(err.to_string()))?;
        store(ctx, ParsedBody::Form(pairs), "urlencoded");
        return Ok(());
    }

    if let Some(options) = &stages.text
        && matches_essence(&mime, &options.content_type)
    {
        let bytes = collect_limited(take_body(request), options.limit).await?;
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|_| AuthError::BodyParse("request body is not valid UTF-8".to_string()))?;
        store(ctx, ParsedBody::Text(text), "text");
        return Ok(());
    }

    if let Some(options) = &stages.raw
        && matches_essence(&mime, &options.content_type)
    {
        let bytes = collect_limited(take_body(request), options.limit).await?;
        store(ctx, ParsedBody::Raw(bytes), "raw");
        return Ok(());
    }

    Ok(())
}

fn take_body(request: &mut Request<Body>) -> Body {
    std::mem::replace(request.body_mut(), Body::empty())
}

fn store(ctx: &Arc<RequestContext>, parsed: ParsedBody, stage: &'static str) {
    if ctx.set_parsed_body(parsed) {
        debug!(stage, "parser stage consumed request body");
    }
}

/// Collect the body to end-of-stream, enforcing the stage's size limit.
/// The tee underneath observes every frame, so a successful collection also
/// finalizes the raw body.
async fn collect_limited(body: Body, limit: usize) -> Result<Bytes, AuthError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(AuthError::BodyTooLarge { limit })
        }
        Err(err) => Err(AuthError::Transport(err.to_string())),
    }
}

fn content_type<B>(request: &Request<B>) -> Option<Mime> {
    request
        .headers()
        .get(CONTENT_TYPE)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// `application/json` and structured suffixes like `application/hal+json`.
fn is_json(mime: &Mime) -> bool {
    mime.type_() == mime::APPLICATION
        && (mime.subtype() == mime::JSON || mime.suffix() == Some(mime::JSON))
}

fn is_urlencoded(mime: &Mime) -> bool {
    mime.type_() == mime::APPLICATION && mime.subtype() == mime::WWW_FORM_URLENCODED
}

/// Compare against the configured content type, ignoring parameters such as
/// `charset`.
fn matches_essence(mime: &Mime, expected: &str) -> bool {
    mime.essence_str().eq_ignore_ascii_case(expected)
}
