use thiserror::Error;

/// Failures detected while building an [`AuthConfig`](crate::config::AuthConfig).
///
/// These are construction-time errors: a pipeline with an invalid
/// configuration must never be installed, so none of these can occur
/// per request.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required `secret_for_key` lookup")]
    MissingSecretLookup,

    #[error("missing required `on_rejected` handler")]
    MissingRejectHandler,
}

/// Per-request rejection reasons.
///
/// These never propagate through the tower error channel. Every variant is
/// routed to the configured `on_rejected` handler, which owns the
/// user-visible behavior (status code, response body). The middleware itself
/// never writes an HTTP response.
///
/// Parser-stage failures (`BodyTooLarge`, `BodyParse`) and transport
/// failures are distinct from authentication failures so handlers can
/// respond with the correct status (e.g. 413 vs 401).
#[derive(Error, Debug)]
pub enum AuthError {
    /// The secret lookup errored, or resolved no secret for the presented
    /// key. Distinct from a signature mismatch: the comparison was never
    /// performed.
    #[error("secret lookup failed: {0}")]
    SecretLookup(String),

    /// The recomputed signature does not match the one presented.
    #[error("request signature does not match")]
    SignatureInvalid,

    /// The API key or signature could not be extracted from the request
    /// metadata. Reported by the verification engine.
    #[error("credentials missing or malformed: {0}")]
    Credentials(String),

    /// The request body exceeded the configured size limit. Raised by the
    /// responsible parser stage; the authentication stage is never invoked.
    #[error("request body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize },

    /// The matched parser stage could not interpret the body.
    #[error("failed to parse request body: {0}")]
    BodyParse(String),

    /// The underlying byte stream failed before end-of-data (e.g. the
    /// client disconnected mid-body).
    #[error("transport error while reading request body: {0}")]
    Transport(String),
}

/// Stable discriminant for [`AuthError`], used for branching in rejection
/// handlers and recorded as the rejected outcome on the request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    SecretLookup,
    SignatureInvalid,
    Credentials,
    BodyTooLarge,
    BodyParse,
    Transport,
}

impl AuthError {
    /// The kind of this error, independent of its message payload.
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::SecretLookup(_) => AuthErrorKind::SecretLookup,
            AuthError::SignatureInvalid => AuthErrorKind::SignatureInvalid,
            AuthError::Credentials(_) => AuthErrorKind::Credentials,
            AuthError::BodyTooLarge { .. } => AuthErrorKind::BodyTooLarge,
            AuthError::BodyParse(_) => AuthErrorKind::BodyParse,
            AuthError::Transport(_) => AuthErrorKind::Transport,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            AuthError::SecretLookup("no such key".into()).kind(),
            AuthErrorKind::SecretLookup
        );
        assert_eq!(
            AuthError::SignatureInvalid.kind(),
            AuthErrorKind::SignatureInvalid
        );
        assert_eq!(
            AuthError::BodyTooLarge { limit: 1024 }.kind(),
            AuthErrorKind::BodyTooLarge
        );
        assert_eq!(
            AuthError::Transport("connection reset".into()).kind(),
            AuthErrorKind::Transport
        );
    }

    #[test]
    fn test_body_too_large_message_includes_limit() {
        let err = AuthError::BodyTooLarge { limit: 4096 };
        assert!(err.to_string().contains("4096"));
    }

    #[test]
    fn test_config_error_messages_name_the_missing_field() {
        assert!(
            ConfigError::MissingSecretLookup
                .to_string()
                .contains("secret_for_key")
        );
        assert!(
            ConfigError::MissingRejectHandler
                .to_string()
                .contains("on_rejected")
        );
    }
}
