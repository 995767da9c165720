//! The seam to the external verification engine.
//!
//! The pipeline treats signature verification as an opaque capability: the
//! engine extracts an API key and a signature from request metadata,
//! resolves the shared secret through the configured [`SecretLookup`],
//! recomputes the expected signature over its own canonical representation
//! of the request, and compares in constant time. None of that lives here -
//! this crate only guarantees that the engine sees the byte-exact raw body
//! and runs after body collection has settled.
//!
//! The engine is held by composition (a generic parameter on the layer),
//! so it can be swapped or mocked without touching the pipeline.

use std::future::Future;

use axum::http::{HeaderMap, Method, Request};
use bytes::Bytes;

use crate::error::AuthError;
use crate::secret::SecretLookup;

/// Request metadata handed to the verification engine: everything the
/// canonical representation may cover, except the body (passed separately
/// as exact bytes).
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
}

impl RequestMetadata {
    /// Snapshot the verification-relevant parts of a request.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            query: request.uri().query().map(str::to_string),
            headers: request.headers().clone(),
        }
    }
}

/// External verification contract.
///
/// Resolves to the authenticated API key on success, or a typed
/// [`AuthError`] on failure. Expected error kinds: `Credentials` when the
/// key or signature cannot be extracted, `SecretLookup` when the lookup
/// fails, `SignatureInvalid` when the comparison fails.
pub trait AuthEngine: Send + Sync + 'static {
    fn authenticate(
        &self,
        metadata: &RequestMetadata,
        raw_body: &Bytes,
        secrets: &SecretLookup,
    ) -> impl Future<Output = Result<String, AuthError>> + Send;
}
