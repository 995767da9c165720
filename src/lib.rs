//! # hmac-gate
//!
//! HMAC request-authentication middleware for axum/tower, featuring:
//!
//! - **Byte-exact raw-body capture**: a tee on the request stream keeps the
//!   exact payload bytes for signature verification while the same stream
//!   is parsed (JSON, urlencoded, text, raw) for application handlers
//! - **Ordering guarantee**: a completion gate ensures verification never
//!   runs before the raw body is final
//! - **Caller-owned outcomes**: accept/reject observers decide the response
//!   and whether the chain continues - the middleware never writes one
//! - **Pluggable verification**: the HMAC engine is a trait, held by
//!   composition, trivially mocked in tests
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     axum / tower chain                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  HmacAuthLayer                                              │
//! │   RawBodyCollector (tee) → ParserStages → CompletionGate    │
//! │                  → AuthEngine → ResultDispatcher            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (read RequestContext from extensions)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::http::StatusCode;
//! use axum::response::IntoResponse;
//! use axum::{Router, routing::post};
//! use hmac_gate::{
//!     AuthConfig, AuthEngine, AuthError, HmacAuthLayer, Rejection, RequestMetadata,
//!     SecretLookup,
//! };
//!
//! // The verification engine is an external collaborator; any type
//! // implementing `AuthEngine` plugs in here.
//! struct MyEngine;
//!
//! impl AuthEngine for MyEngine {
//!     async fn authenticate(
//!         &self,
//!         metadata: &RequestMetadata,
//!         raw_body: &bytes::Bytes,
//!         secrets: &SecretLookup,
//!     ) -> Result<String, AuthError> {
//!         // Extract key + signature from metadata, resolve the secret,
//!         // recompute, compare in constant time...
//!         # let _ = (metadata, raw_body, secrets);
//!         Err(AuthError::SignatureInvalid)
//!     }
//! }
//!
//! fn router() -> Result<Router, hmac_gate::ConfigError> {
//!     let config = AuthConfig::builder()
//!         .secret_for_key(SecretLookup::from_static([("K1", "S1")]))
//!         .on_rejected(|error, _ctx| {
//!             Rejection::Respond(
//!                 (StatusCode::UNAUTHORIZED, error.to_string()).into_response(),
//!             )
//!         })
//!         .json(true)
//!         .build()?;
//!
//!     Ok(Router::new()
//!         .route("/items/", post(|| async { "ok" }))
//!         .layer(HmacAuthLayer::new(config, MyEngine)))
//! }
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod middleware;
pub mod secret;

// Re-exports for convenience
pub use config::{
    AuthConfig, AuthConfigBuilder, BodyOption, JsonOptions, RawOptions, Rejection, TextOptions,
    UrlencodedOptions, DEFAULT_BODY_SIZE_LIMIT,
};
pub use context::{ParsedBody, RequestContext, RequestContextExt, SignatureOutcome};
pub use engine::{AuthEngine, RequestMetadata};
pub use error::{AuthError, AuthErrorKind, ConfigError};
pub use middleware::{HmacAuthLayer, HmacAuthService};
pub use secret::SecretLookup;
