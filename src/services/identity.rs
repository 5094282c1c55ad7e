use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use garde::Validate;
use thiserror::Error;

use crate::models::auth::{AuthResult, VerifiedIdentity, VerifierResponse};

/// The verifier could not give a usable answer.
///
/// Distinct from [`AuthResult::Failed`], which means the verifier answered and
/// rejected the assertion.
#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("verifier request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("verifier answered with HTTP {0}")]
    Status(u16),

    #[error("verifier response could not be decoded: {0}")]
    Decode(String),

    #[error("verifier response is unusable: {0}")]
    InvalidResponse(String),
}

/// Turns a client-supplied assertion into a verified identity, or a refusal.
///
/// Implementations hold no per-caller state and make exactly one round trip.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, assertion: &str, audience: &str) -> Result<AuthResult, VerifierError>;
}

#[derive(Validate)]
struct AssertedEmail {
    #[garde(email)]
    email: String,
}

impl TryFrom<VerifierResponse> for AuthResult {
    type Error = VerifierError;

    fn try_from(response: VerifierResponse) -> Result<Self, Self::Error> {
        if response.status != "okay" {
            let reason = if response.reason.is_empty() {
                format!("verifier status '{}'", response.status)
            } else {
                response.reason
            };
            return Ok(AuthResult::Failed { reason });
        }

        AssertedEmail {
            email: response.email.clone(),
        }
        .validate()
        .map_err(|e| VerifierError::InvalidResponse(format!("asserted email rejected: {}", e)))?;

        let expires = response
            .expires
            .and_then(|ms| i64::try_from(ms).ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis);

        Ok(AuthResult::Verified(VerifiedIdentity::new(
            response.email,
            response.audience,
            response.issuer,
            expires,
        )))
    }
}

/// Remote verification over an HTTPS form POST, Mozilla Persona style.
pub struct PersonaVerifier {
    endpoint: String,
    http: reqwest::Client,
}

impl PersonaVerifier {
    pub const DEFAULT_ENDPOINT: &'static str = "https://verifier.login.persona.org/verify";

    /// Creates a verifier whose every round trip is bounded by `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, VerifierError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl IdentityVerifier for PersonaVerifier {
    async fn verify(&self, assertion: &str, audience: &str) -> Result<AuthResult, VerifierError> {
        let params = [("assertion", assertion), ("audience", audience)];

        let response = self
            .http
            .post(&self.endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("❌ Verifier request to {} failed: {}", self.endpoint, e);
                VerifierError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("❌ Verifier {} answered HTTP {}", self.endpoint, status);
            return Err(VerifierError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: VerifierResponse = sonic_rs::from_slice(&body)
            .map_err(|e| VerifierError::Decode(e.to_string()))?;

        let result = AuthResult::try_from(parsed)?;

        match &result {
            AuthResult::Verified(identity) => {
                if identity.audience() != audience {
                    tracing::warn!(
                        "⚠️ Verifier asserted audience '{}' but '{}' was requested",
                        identity.audience(),
                        audience
                    );
                }
                tracing::debug!("✅ Assertion verified by {}", identity.issuer());
            }
            AuthResult::Failed { reason } => {
                tracing::info!("🚫 Assertion rejected: {}", reason);
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::AuthStatus;

    fn okay(email: &str) -> VerifierResponse {
        VerifierResponse {
            status: "okay".to_string(),
            email: email.to_string(),
            audience: "http://localhost:8080".to_string(),
            issuer: "login.persona.org".to_string(),
            expires: Some(1_700_000_000_000),
            reason: String::new(),
        }
    }

    #[test]
    fn okay_response_is_verified() {
        let result = AuthResult::try_from(okay("a@b.com")).unwrap();
        assert_eq!(result.status(), AuthStatus::Verified);
        assert_eq!(result.email(), Some("a@b.com"));
        match result {
            AuthResult::Verified(identity) => {
                assert_eq!(identity.issuer(), "login.persona.org");
                assert_eq!(identity.expires().unwrap().timestamp(), 1_700_000_000);
            }
            AuthResult::Failed { .. } => panic!("expected verified"),
        }
    }

    #[test]
    fn failure_status_carries_reason() {
        let response = VerifierResponse {
            status: "failure".to_string(),
            reason: "invalid assertion".to_string(),
            ..Default::default()
        };
        let result = AuthResult::try_from(response).unwrap();
        assert_eq!(
            result,
            AuthResult::Failed {
                reason: "invalid assertion".to_string()
            }
        );
        assert_eq!(result.email(), None);
    }

    #[test]
    fn failure_without_reason_mentions_status() {
        let response = VerifierResponse {
            status: "weird".to_string(),
            ..Default::default()
        };
        match AuthResult::try_from(response).unwrap() {
            AuthResult::Failed { reason } => assert!(reason.contains("weird")),
            AuthResult::Verified(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn okay_with_bogus_email_is_unusable() {
        assert!(matches!(
            AuthResult::try_from(okay("")),
            Err(VerifierError::InvalidResponse(_))
        ));
        assert!(matches!(
            AuthResult::try_from(okay("not-an-email")),
            Err(VerifierError::InvalidResponse(_))
        ));
    }
}
