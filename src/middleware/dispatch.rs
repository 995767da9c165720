//! Result dispatch: route the pipeline outcome to exactly one observer.
//!
//! No retry, no fallback chain, no response of its own. The accept path
//! records the api key and continues the chain; the reject path records the
//! outcome and delegates continuation entirely to the `on_rejected`
//! handler, which may respond and terminate or let the chain proceed
//! anyway.

use std::sync::Arc;

use axum::response::Response;
use tracing::{debug, warn};

use crate::config::{AuthConfig, Rejection};
use crate::context::RequestContext;
use crate::error::AuthError;

/// What the chain does after dispatch.
pub(crate) enum Disposition {
    /// Invoke the inner service.
    Continue,
    /// Short-circuit with the handler-supplied response.
    Respond(Box<Response>),
}

/// Invoke exactly one of `on_accepted`/`on_rejected` for this request.
pub(crate) fn dispatch(
    config: &AuthConfig,
    ctx: &Arc<RequestContext>,
    outcome: Result<String, AuthError>,
    path: &str,
) -> Disposition {
    match outcome {
        Ok(api_key) => {
            debug!(path, api_key = %api_key, "request signature accepted");
            ctx.set_accepted(api_key);
            if let Some(on_accepted) = &config.on_accepted {
                on_accepted(ctx);
            }
            Disposition::Continue
        }
        Err(err) => {
            warn!(path, kind = ?err.kind(), error = %err, "request rejected");
            ctx.set_rejected(err.kind());
            match (config.on_rejected)(err, ctx) {
                Rejection::Respond(response) => Disposition::Respond(Box::new(response)),
                Rejection::Continue => Disposition::Continue,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use super::*;
    use crate::context::SignatureOutcome;
    use crate::error::AuthErrorKind;
    use crate::secret::SecretLookup;

    fn config_with_counters(
        accepted: Arc<AtomicUsize>,
        rejected: Arc<AtomicUsize>,
    ) -> AuthConfig {
        AuthConfig::builder()
            .secret_for_key(SecretLookup::from_static([("K1", "S1")]))
            .on_accepted(move |_ctx| {
                accepted.fetch_add(1, Ordering::SeqCst);
            })
            .on_rejected(move |_err, _ctx| {
                rejected.fetch_add(1, Ordering::SeqCst);
                Rejection::Respond(StatusCode::UNAUTHORIZED.into_response())
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_accept_invokes_only_the_accept_observer() {
        let accepted = Arc::new(AtomicUsize::new(0));
        let rejected = Arc::new(AtomicUsize::new(0));
        let config = config_with_counters(accepted.clone(), rejected.clone());
        let ctx = Arc::new(RequestContext::new());

        let disposition = dispatch(&config, &ctx, Ok("K1".to_string()), "/items/");

        assert!(matches!(disposition, Disposition::Continue));
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
        assert_eq!(rejected.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.api_key(), Some("K1"));
        assert_eq!(ctx.signature_outcome(), SignatureOutcome::Accepted);
    }

    #[test]
    fn test_reject_invokes_only_the_reject_observer() {
        let accepted = Arc::new(AtomicUsize::new(0));
        let rejected = Arc::new(AtomicUsize::new(0));
        let config = config_with_counters(accepted.clone(), rejected.clone());
        let ctx = Arc::new(RequestContext::new());

        let disposition = dispatch(&config, &ctx, Err(AuthError::SignatureInvalid), "/items/");

        assert!(matches!(disposition, Disposition::Respond(_)));
        assert_eq!(accepted.load(Ordering::SeqCst), 0);
        assert_eq!(rejected.load(Ordering::SeqCst), 1);
        assert_eq!(
            ctx.signature_outcome(),
            SignatureOutcome::Rejected(AuthErrorKind::SignatureInvalid)
        );
    }

    #[test]
    fn test_reject_handler_may_continue_the_chain() {
        let config = AuthConfig::builder()
            .secret_for_key(SecretLookup::from_static([("K1", "S1")]))
            .on_rejected(|_err, _ctx| Rejection::Continue)
            .build()
            .unwrap();
        let ctx = Arc::new(RequestContext::new());

        let disposition = dispatch(&config, &ctx, Err(AuthError::SignatureInvalid), "/");
        assert!(matches!(disposition, Disposition::Continue));
    }

    #[test]
    fn test_accept_without_observer_still_continues() {
        let config = AuthConfig::builder()
            .secret_for_key(SecretLookup::from_static([("K1", "S1")]))
            .on_rejected(|_err, _ctx| Rejection::Continue)
            .build()
            .unwrap();
        let ctx = Arc::new(RequestContext::new());

        let disposition = dispatch(&config, &ctx, Ok("K1".to_string()), "/");
        assert!(matches!(disposition, Disposition::Continue));
        assert_eq!(ctx.api_key(), Some("K1"));
    }
}
