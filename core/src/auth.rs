//! Request authentication.
//!
//! A request is either unauthenticated, carries static credentials, or
//! carries a provider closure that derives credentials from the client at
//! execution time. The provider is invoked exactly once per `execute()`.

use crate::client::Client;
use crate::error::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use std::sync::Arc;

/// Closure deriving credentials from the shared client.
pub type AuthProvider = Arc<dyn Fn(&Client) -> Result<AuthCredentials> + Send + Sync>;

/// How a request authenticates against the backend.
#[derive(Clone, Default)]
pub enum Auth {
    /// No `Authorization` header is produced
    #[default]
    None,
    /// Static credentials used as-is
    Credentials(AuthCredentials),
    /// Credentials derived from the client when the request executes
    Provider(AuthProvider),
}

impl Auth {
    /// Build an auth value from a provider closure.
    pub fn provider<F>(f: F) -> Self
    where
        F: Fn(&Client) -> Result<AuthCredentials> + Send + Sync + 'static,
    {
        Auth::Provider(Arc::new(f))
    }

    /// Resolve to concrete credentials, invoking the provider if present.
    pub fn resolve(&self, client: &Client) -> Result<Option<AuthCredentials>> {
        match self {
            Auth::None => Ok(None),
            Auth::Credentials(credentials) => Ok(Some(credentials.clone())),
            Auth::Provider(provider) => provider(client).map(Some),
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::None => f.write_str("Auth::None"),
            Auth::Credentials(credentials) => {
                f.debug_tuple("Auth::Credentials").field(credentials).finish()
            }
            Auth::Provider(_) => f.write_str("Auth::Provider(..)"),
        }
    }
}

/// Concrete credentials for the `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthCredentials {
    /// Authorization scheme, e.g. `Basic` or `Kinvey`
    pub scheme: String,
    kind: CredentialKind,
}

#[derive(Clone, PartialEq, Eq)]
enum CredentialKind {
    /// Opaque credential string used verbatim
    Token(String),
    /// Username and password, base64-framed as `user:pass`
    Basic { username: String, password: String },
}

impl AuthCredentials {
    /// Basic-auth credentials from a username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            scheme: "Basic".to_string(),
            kind: CredentialKind::Basic {
                username: username.into(),
                password: password.into(),
            },
        }
    }

    /// Opaque credentials under the given scheme, e.g. a session token.
    pub fn token(scheme: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            kind: CredentialKind::Token(token.into()),
        }
    }

    /// The full `Authorization` header value.
    pub fn header_value(&self) -> String {
        let credentials = match &self.kind {
            CredentialKind::Token(token) => token.clone(),
            CredentialKind::Basic { username, password } => {
                STANDARD.encode(format!("{}:{}", username, password))
            }
        };
        format!("{} {}", self.scheme, credentials)
    }
}

impl fmt::Debug for AuthCredentials {
    // Never print secrets
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCredentials")
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}
