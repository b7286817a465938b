use crate::Error;
use base64::{Engine, engine::general_purpose::STANDARD as B64};
use http::HeaderValue;
use std::fmt;

#[derive(Clone, Default, Eq, PartialEq)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Basic credentials for a remote server: a username plus a password or API
/// token.
#[derive(Clone, Debug, Default)]
pub struct Auth {
    user: String,
    secret: SecretString,
}

impl Auth {
    #[must_use]
    pub fn basic(user: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            secret: SecretString::new(secret),
        }
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// The empty pair (`":"` once joined) attaches no Authorization header.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.secret.expose().is_empty()
    }

    pub(crate) fn secrets(&self) -> Vec<&str> {
        vec![self.secret.expose()]
    }

    pub(crate) fn header_value(&self) -> Result<HeaderValue, Error> {
        let raw = format!(
            "Basic {}",
            B64.encode(format!("{}:{}", self.user, self.secret.expose()))
        );
        HeaderValue::from_str(&raw).map_err(|err| Error::InvalidConfig {
            message: "invalid Authorization header value".into(),
            source: Some(Box::new(err)),
        })
    }
}
