use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Body returned by the remote verification endpoint.
///
/// `status` is `"okay"` on success; anything else is a failure explained by `reason`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifierResponse {
    pub status: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub issuer: String,
    /// Milliseconds since the unix epoch.
    #[serde(default)]
    pub expires: Option<u64>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Verified,
    Failed,
}

/// An identity the verifier vouched for.
///
/// `audience`, `issuer` and `expires` are informational; only `email` is bound
/// to a session. Built only from a verifier answer, so holding one means the
/// email was vouched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    email: String,
    audience: String,
    issuer: String,
    expires: Option<DateTime<Utc>>,
}

impl VerifiedIdentity {
    pub(crate) fn new(
        email: String,
        audience: String,
        issuer: String,
        expires: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            email,
            audience,
            issuer,
            expires,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.expires
    }
}

/// Outcome of a verification round trip that completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    Verified(VerifiedIdentity),
    Failed { reason: String },
}

impl AuthResult {
    pub fn status(&self) -> AuthStatus {
        match self {
            AuthResult::Verified(_) => AuthStatus::Verified,
            AuthResult::Failed { .. } => AuthStatus::Failed,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            AuthResult::Verified(identity) => Some(identity.email()),
            AuthResult::Failed { .. } => None,
        }
    }
}
