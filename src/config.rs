//! Pipeline configuration: construction, validation, and normalization.
//!
//! Built once per middleware registration and immutable afterwards. All
//! shorthand expansion happens here, at [`AuthConfigBuilder::build`] time -
//! never per request:
//!
//! - `true` for a body format enables it with defaults derived from
//!   `body_size_limit` (mirroring the common "just parse JSON for me"
//!   setup); an explicit options struct overrides them.
//! - the secret lookup is already normalized to one async contract by
//!   [`SecretLookup`]'s constructors.
//!
//! Missing either required piece (`secret_for_key`, `on_rejected`) fails at
//! build time with a [`ConfigError`], before any request is processed.

use std::fmt;
use std::sync::Arc;

use axum::response::Response;

use crate::context::RequestContext;
use crate::error::{AuthError, ConfigError};
use crate::secret::SecretLookup;

/// Default maximum accepted body size: 10 MiB.
pub const DEFAULT_BODY_SIZE_LIMIT: usize = 10 * 1024 * 1024;

/// Default content type matched by the text parser stage.
pub const DEFAULT_TEXT_CONTENT_TYPE: &str = "text/plain";

/// Default content type matched by the raw parser stage.
pub const DEFAULT_RAW_CONTENT_TYPE: &str = "application/octet-stream";

/// Observer invoked with the context after a successful authentication.
pub type AcceptHandler = Arc<dyn Fn(&RequestContext) + Send + Sync>;

/// Observer invoked with the error and context on any per-request failure.
/// Owns the user-visible behavior: it decides the response *and* whether
/// the chain still continues.
pub type RejectHandler = Arc<dyn Fn(AuthError, &RequestContext) -> Rejection + Send + Sync>;

/// Decision returned by the rejection handler.
pub enum Rejection {
    /// Terminate the chain with this response.
    Respond(Response),
    /// Let the chain continue despite the failure. Downstream handlers can
    /// inspect [`RequestContext::signature_outcome`] to see the rejection.
    Continue,
}

/// Per-format parser setting, before normalization.
///
/// `From<bool>` gives the boolean shorthand: `true` is `Defaults`, `false`
/// is `Disabled`. `From<T>` wraps explicit options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BodyOption<T> {
    #[default]
    Disabled,
    /// Enable with defaults derived from `body_size_limit`.
    Defaults,
    Custom(T),
}

impl<T> From<bool> for BodyOption<T> {
    fn from(enabled: bool) -> Self {
        if enabled {
            BodyOption::Defaults
        } else {
            BodyOption::Disabled
        }
    }
}

impl From<JsonOptions> for BodyOption<JsonOptions> {
    fn from(options: JsonOptions) -> Self {
        BodyOption::Custom(options)
    }
}

impl From<UrlencodedOptions> for BodyOption<UrlencodedOptions> {
    fn from(options: UrlencodedOptions) -> Self {
        BodyOption::Custom(options)
    }
}

impl From<TextOptions> for BodyOption<TextOptions> {
    fn from(options: TextOptions) -> Self {
        BodyOption::Custom(options)
    }
}

impl From<RawOptions> for BodyOption<RawOptions> {
    fn from(options: RawOptions) -> Self {
        BodyOption::Custom(options)
    }
}

/// Options for the JSON parser stage (matches any `application/json` or
/// `+json` content type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonOptions {
    /// Maximum accepted body size in bytes.
    pub limit: usize,
}

/// Options for the `application/x-www-form-urlencoded` parser stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlencodedOptions {
    pub limit: usize,
}

/// Options for the text parser stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOptions {
    /// Content type this stage matches (essence only, parameters ignored).
    pub content_type: String,
    pub limit: usize,
}

/// Options for the raw (opaque bytes) parser stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOptions {
    /// Content type this stage matches (essence only, parameters ignored).
    pub content_type: String,
    pub limit: usize,
}

/// Normalized parser-stage set: shorthand already expanded, one concrete
/// options struct per enabled format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ParserStages {
    pub json: Option<JsonOptions>,
    pub urlencoded: Option<UrlencodedOptions>,
    pub text: Option<TextOptions>,
    pub raw: Option<RawOptions>,
}

/// Immutable pipeline configuration. Construct via [`AuthConfig::builder`].
pub struct AuthConfig {
    pub(crate) secret_for_key: SecretLookup,
    pub(crate) on_accepted: Option<AcceptHandler>,
    pub(crate) on_rejected: RejectHandler,
    pub(crate) parsers: ParserStages,
    pub(crate) body_size_limit: usize,
}

impl AuthConfig {
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// The normalized secret lookup capability.
    pub fn secret_for_key(&self) -> &SecretLookup {
        &self.secret_for_key
    }

    /// The configured body size limit in bytes.
    pub fn body_size_limit(&self) -> usize {
        self.body_size_limit
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("on_accepted", &self.on_accepted.is_some())
            .field("parsers", &self.parsers)
            .field("body_size_limit", &self.body_size_limit)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AuthConfig`].
///
/// # Example
///
/// ```rust,ignore
/// let config = AuthConfig::builder()
///     .secret_for_key(SecretLookup::from_static([("K1", "S1")]))
///     .on_rejected(|error, _ctx| {
///         Rejection::Respond((StatusCode::UNAUTHORIZED, error.to_string()).into_response())
///     })
///     .json(true)
///     .build()?;
/// ```
#[derive(Default)]
pub struct AuthConfigBuilder {
    secret_for_key: Option<SecretLookup>,
    on_accepted: Option<AcceptHandler>,
    on_rejected: Option<RejectHandler>,
    json: BodyOption<JsonOptions>,
    urlencoded: BodyOption<UrlencodedOptions>,
    text: BodyOption<TextOptions>,
    raw: BodyOption<RawOptions>,
    body_size_limit: Option<usize>,
}

impl AuthConfigBuilder {
    /// Required: the key-to-secret capability.
    pub fn secret_for_key(mut self, lookup: SecretLookup) -> Self {
        self.secret_for_key = Some(lookup);
        self
    }

    /// Optional: observer invoked after each accepted request.
    pub fn on_accepted<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RequestContext) + Send + Sync + 'static,
    {
        self.on_accepted = Some(Arc::new(handler));
        self
    }

    /// Required: observer invoked on each rejected request. Decides the
    /// response and whether the chain continues.
    pub fn on_rejected<F>(mut self, handler: F) -> Self
    where
        F: Fn(AuthError, &RequestContext) -> Rejection + Send + Sync + 'static,
    {
        self.on_rejected = Some(Arc::new(handler));
        self
    }

    /// Enable the JSON parser stage (`true` for defaults, or explicit
    /// [`JsonOptions`]).
    pub fn json(mut self, option: impl Into<BodyOption<JsonOptions>>) -> Self {
        self.json = option.into();
        self
    }

    /// Enable the urlencoded parser stage.
    pub fn urlencoded(mut self, option: impl Into<BodyOption<UrlencodedOptions>>) -> Self {
        self.urlencoded = option.into();
        self
    }

    /// Enable the text parser stage.
    pub fn text(mut self, option: impl Into<BodyOption<TextOptions>>) -> Self {
        self.text = option.into();
        self
    }

    /// Enable the raw parser stage.
    pub fn raw(mut self, option: impl Into<BodyOption<RawOptions>>) -> Self {
        self.raw = option.into();
        self
    }

    /// Maximum accepted body size in bytes (default 10 MiB). Used as the
    /// limit for every format enabled via defaults.
    pub fn body_size_limit(mut self, limit: usize) -> Self {
        self.body_size_limit = Some(limit);
        self
    }

    /// Validate and normalize. Fails fast when a required piece is missing;
    /// expands every `Defaults` shorthand exactly once.
    pub fn build(self) -> Result<AuthConfig, ConfigError> {
        let secret_for_key = self
            .secret_for_key
            .ok_or(ConfigError::MissingSecretLookup)?;
        let on_rejected = self.on_rejected.ok_or(ConfigError::MissingRejectHandler)?;
        let limit = self.body_size_limit.unwrap_or(DEFAULT_BODY_SIZE_LIMIT);

        let parsers = ParserStages {
            json: match self.json {
                BodyOption::Disabled => None,
                BodyOption::Defaults => Some(JsonOptions { limit }),
                BodyOption::Custom(options) => Some(options),
            },
            urlencoded: match self.urlencoded {
                BodyOption::Disabled => None,
                BodyOption::Defaults => Some(UrlencodedOptions { limit }),
                BodyOption::Custom(options) => Some(options),
            },
            text: match self.text {
                BodyOption::Disabled => None,
                BodyOption::Defaults => Some(TextOptions {
                    content_type: DEFAULT_TEXT_CONTENT_TYPE.to_string(),
                    limit,
                }),
                BodyOption::Custom(options) => Some(options),
            },
            raw: match self.raw {
                BodyOption::Disabled => None,
                BodyOption::Defaults => Some(RawOptions {
                    content_type: DEFAULT_RAW_CONTENT_TYPE.to_string(),
                    limit,
                }),
                BodyOption::Custom(options) => Some(options),
            },
        };

        Ok(AuthConfig {
            secret_for_key,
            on_accepted: self.on_accepted,
            on_rejected,
            parsers,
            body_size_limit: limit,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn reject_continue(_: AuthError, _: &RequestContext) -> Rejection {
        Rejection::Continue
    }

    #[test]
    fn test_build_fails_without_secret_lookup() {
        let err = AuthConfig::builder()
            .on_rejected(reject_continue)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingSecretLookup);
    }

    #[test]
    fn test_build_fails_without_reject_handler() {
        let err = AuthConfig::builder()
            .secret_for_key(SecretLookup::from_static([("K1", "S1")]))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingRejectHandler);
    }

    #[test]
    fn test_build_succeeds_with_required_pieces() {
        let config = AuthConfig::builder()
            .secret_for_key(SecretLookup::from_static([("K1", "S1")]))
            .on_rejected(reject_continue)
            .build()
            .unwrap();

        assert_eq!(config.body_size_limit(), DEFAULT_BODY_SIZE_LIMIT);
        assert!(config.parsers.json.is_none());
    }

    #[test]
    fn test_boolean_shorthand_expands_with_body_size_limit() {
        let config = AuthConfig::builder()
            .secret_for_key(SecretLookup::from_static([("K1", "S1")]))
            .on_rejected(reject_continue)
            .body_size_limit(2048)
            .json(true)
            .urlencoded(true)
            .text(true)
            .raw(true)
            .build()
            .unwrap();

        assert_eq!(config.parsers.json, Some(JsonOptions { limit: 2048 }));
        assert_eq!(
            config.parsers.urlencoded,
            Some(UrlencodedOptions { limit: 2048 })
        );
        assert_eq!(
            config.parsers.text,
            Some(TextOptions {
                content_type: DEFAULT_TEXT_CONTENT_TYPE.to_string(),
                limit: 2048,
            })
        );
        assert_eq!(
            config.parsers.raw,
            Some(RawOptions {
                content_type: DEFAULT_RAW_CONTENT_TYPE.to_string(),
                limit: 2048,
            })
        );
    }

    #[test]
    fn test_explicit_options_override_defaults() {
        let config = AuthConfig::builder()
            .secret_for_key(SecretLookup::from_static([("K1", "S1")]))
            .on_rejected(reject_continue)
            .text(TextOptions {
                content_type: "text/csv".to_string(),
                limit: 512,
            })
            .build()
            .unwrap();

        let text = config.parsers.text.unwrap();
        assert_eq!(text.content_type, "text/csv");
        assert_eq!(text.limit, 512);
    }

    #[test]
    fn test_false_shorthand_disables_a_format() {
        let config = AuthConfig::builder()
            .secret_for_key(SecretLookup::from_static([("K1", "S1")]))
            .on_rejected(reject_continue)
            .json(false)
            .build()
            .unwrap();

        assert!(config.parsers.json.is_none());
    }
}
