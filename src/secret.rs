//! Secret lookup capability, normalized to one asynchronous contract.
//!
//! Callers provide the key-to-secret mapping in whichever shape is natural
//! for them - a synchronous function, a future-returning function, or a
//! fixed map. All shapes are normalized here, at construction time, into a
//! single boxed async form; the pipeline never branches on calling
//! convention per request.
//!
//! The absence of a secret for a key is a lookup *failure*, never a
//! successful resolution to nothing: [`SecretLookup::secret`] returns
//! [`AuthError::SecretLookup`] both when the capability errors and when it
//! resolves `None`.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::AuthError;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type LookupFn = dyn Fn(String) -> BoxFuture<Result<Option<String>, String>> + Send + Sync;

/// Capability mapping an API key identifier to its shared secret.
///
/// Cheap to clone; the configuration holds one instance for the lifetime of
/// the pipeline.
#[derive(Clone)]
pub struct SecretLookup {
    inner: Arc<LookupFn>,
}

impl SecretLookup {
    /// Normalize a synchronous lookup function.
    ///
    /// Return `Ok(None)` when the key is unknown; the pipeline surfaces that
    /// as a lookup failure.
    pub fn from_fn<F, E>(lookup: F) -> Self
    where
        F: Fn(&str) -> Result<Option<String>, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        Self {
            inner: Arc::new(move |key: String| {
                let result = lookup(&key).map_err(|e| e.to_string());
                let fut: BoxFuture<_> = Box::pin(async move { result });
                fut
            }),
        }
    }

    /// Normalize an asynchronous lookup function (e.g. a database query).
    pub fn from_async<F, Fut, E>(lookup: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<String>, E>> + Send + 'static,
        E: fmt::Display,
    {
        Self {
            inner: Arc::new(move |key: String| {
                let inner = lookup(key);
                let fut: BoxFuture<_> = Box::pin(async move {
                    inner.await.map_err(|e| e.to_string())
                });
                fut
            }),
        }
    }

    /// Convenience: a fixed key-to-secret map, for tests and static setups.
    pub fn from_static<K, V, I>(secrets: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map: HashMap<String, String> = secrets
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_fn(move |key| Ok::<_, std::convert::Infallible>(map.get(key).cloned()))
    }

    /// Resolve the secret for `api_key`.
    ///
    /// Errors with [`AuthError::SecretLookup`] when the capability fails or
    /// resolves no secret for the key.
    pub async fn secret(&self, api_key: &str) -> Result<String, AuthError> {
        match (self.inner)(api_key.to_string()).await {
            Ok(Some(secret)) => Ok(secret),
            Ok(None) => Err(AuthError::SecretLookup(format!(
                "no secret for key '{api_key}'"
            ))),
            Err(reason) => Err(AuthError::SecretLookup(reason)),
        }
    }
}

impl fmt::Debug for SecretLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretLookup").finish_non_exhaustive()
    }
}
