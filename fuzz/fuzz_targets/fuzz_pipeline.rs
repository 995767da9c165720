//! Fuzz testing for the authentication pipeline.
//!
//! Drives the full middleware stack with arbitrary content types, header
//! values, and body bytes. It ensures the pipeline:
//!
//! - Never panics on any input
//! - Always settles every request with a response (accept or reject)
//! - Handles hostile content-type strings and non-UTF-8 bodies
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the pipeline fuzz target
//! cargo +nightly fuzz run fuzz_pipeline
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_pipeline -- -max_total_time=60
//! ```

#![no_main]

use arbitrary::Arbitrary;
use axum::body::{Body, Bytes};
use axum::http::{Request, Response, StatusCode};
use hmac_gate::{
    AuthConfig, AuthEngine, AuthError, HmacAuthLayer, Rejection, RequestMetadata, SecretLookup,
};
use libfuzzer_sys::fuzz_target;
use tower::{Layer, Service, ServiceExt};

#[derive(Arbitrary, Debug)]
struct Input {
    content_type: String,
    api_key: String,
    body: Vec<u8>,
    body_size_limit: u16,
}

/// Engine that exercises the secret lookup but accepts everything the
/// lookup resolves; verification correctness is covered by the test suite,
/// the fuzzer is after panics in the body pipeline.
struct PassthroughEngine;

impl AuthEngine for PassthroughEngine {
    async fn authenticate(
        &self,
        metadata: &RequestMetadata,
        _raw_body: &Bytes,
        secrets: &SecretLookup,
    ) -> Result<String, AuthError> {
        let key = metadata
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AuthError::Credentials("missing x-api-key".into()))?;
        secrets.secret(key).await?;
        Ok(key.to_string())
    }
}

fuzz_target!(|input: Input| {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");

    rt.block_on(async move {
        let config = AuthConfig::builder()
            .secret_for_key(SecretLookup::from_static([("fuzz", "secret")]))
            .on_rejected(|_error, _ctx| {
                Rejection::Respond(
                    Response::builder()
                        .status(StatusCode::UNAUTHORIZED)
                        .body(Body::empty())
                        .unwrap(),
                )
            })
            .json(true)
            .urlencoded(true)
            .text(true)
            .raw(true)
            .body_size_limit(usize::from(input.body_size_limit))
            .build()
            .expect("config");

        let inner = tower::service_fn(|_req: Request<Body>| async {
            Ok::<_, std::convert::Infallible>(Response::new(Body::empty()))
        });
        let mut service = HmacAuthLayer::new(config, PassthroughEngine).layer(inner);

        let mut builder = Request::builder().method("POST").uri("/fuzz");
        // Arbitrary strings may not be valid header values; skip the header
        // rather than the whole input so bodies still get exercised.
        if let Ok(value) = input.content_type.parse::<axum::http::HeaderValue>() {
            builder = builder.header("content-type", value);
        }
        if let Ok(value) = input.api_key.parse::<axum::http::HeaderValue>() {
            builder = builder.header("x-api-key", value);
        }
        let request = builder.body(Body::from(input.body)).expect("request");

        // Must settle with a response, never panic.
        let _ = service.ready().await.expect("ready").call(request).await;
    });
});
