//! HMAC request-authentication middleware.
//!
//! The layer runs an ordered stage pipeline for every request, then
//! delegates to the inner service:
//!
//! ```text
//! Request → RawBodyCollector → ParserStages → CompletionGate → Authenticate → Dispatch
//!                 ↓ (tee)           ↓               ↓                ↓           ↓
//!            RequestContext    parsed_body     raw_body final    api_key    on_accepted /
//!                                                                           on_rejected
//! ```
//!
//! The collector and the matched parser stage observe the same byte stream
//! through a tee, so the body is buffered exactly once; the gate guarantees
//! the engine never sees an unfinished raw body. Every per-request failure
//! is routed to the configured `on_rejected` handler - the middleware never
//! writes a response of its own.

pub mod collect;
pub mod dispatch;
pub mod gate;
pub mod parse;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use tower::{Layer, Service};

use crate::config::AuthConfig;
use crate::context::RequestContext;
use crate::engine::{AuthEngine, RequestMetadata};
use crate::error::AuthError;
use dispatch::Disposition;

/// HMAC authentication layer for a tower/axum middleware chain.
///
/// Holds the verification engine by composition so it can be swapped or
/// mocked independently of the pipeline.
pub struct HmacAuthLayer<E> {
    config: Arc<AuthConfig>,
    engine: Arc<E>,
}

impl<E: AuthEngine> HmacAuthLayer<E> {
    /// Create a layer from a validated configuration and a verification
    /// engine.
    pub fn new(config: AuthConfig, engine: E) -> Self {
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
        }
    }
}

impl<E> Clone for HmacAuthLayer<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl<S, E: AuthEngine> Layer<S> for HmacAuthLayer<E> {
    type Service = HmacAuthService<S, E>;

    fn layer(&self, inner: S) -> Self::Service {
        HmacAuthService {
            inner,
            config: self.config.clone(),
            engine: self.engine.clone(),
        }
    }
}

/// Service wrapper running the authentication pipeline.
pub struct HmacAuthService<S, E> {
    inner: S,
    config: Arc<AuthConfig>,
    engine: Arc<E>,
}

impl<S: Clone, E> Clone for HmacAuthService<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: self.config.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl<S, E> Service<Request<Body>> for HmacAuthService<S, E>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    E: AuthEngine,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<
        Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let config = self.config.clone();
        let engine = self.engine.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let ctx = collect::attach(&mut req);
            let metadata = RequestMetadata::from_request(&req);

            let outcome =
                run_pipeline(&mut req, &ctx, &config, engine.as_ref(), &metadata).await;

            // Exactly one dispatch per request, whichever stage settled it.
            match dispatch::dispatch(&config, &ctx, outcome, &metadata.path) {
                Disposition::Respond(response) => Ok(*response),
                Disposition::Continue => inner.call(req).await,
            }
        })
    }
}

/// The stage sequence proper: parser stages, completion gate, then the
/// external verification contract against the finalized raw body.
async fn run_pipeline<E: AuthEngine>(
    req: &mut Request<Body>,
    ctx: &Arc<RequestContext>,
    config: &AuthConfig,
    engine: &E,
    metadata: &RequestMetadata,
) -> Result<String, AuthError> {
    parse::run_stages(req, ctx, &config.parsers).await?;
    let raw = gate::wait_for_raw_body(req, ctx).await?;
    engine.authenticate(metadata, &raw, &config.secret_for_key).await
}
