use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use anyhow::{Context, Result};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::aes::{self, KEY_SIZE, SecureKey};
use crate::services::identity::PersonaVerifier;

/// Thirty days.
pub const DEFAULT_SESSION_MAX_AGE_SECS: i64 = 86400 * 30;
pub const DEFAULT_COOKIE_NAME: &str = "ccfp-session";

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Directory holding `index.html` and static assets.
    pub public_dir: String,
    /// Name of the session cookie.
    pub session_cookie_name: String,
    /// Cookie max-age and sealed-token lifetime, in seconds.
    pub session_max_age_secs: i64,
    /// Cookie keys, newest first.
    pub session_keys: Vec<Zeroizing<Vec<u8>>>,
    /// Audience (our origin) sent to the identity verifier.
    pub audience: String,
    /// Identity verifier endpoint.
    pub verifier_url: String,
    /// Bound on one verifier round trip.
    pub verifier_timeout: Duration,
    /// Bound on one backing-store operation, including pool checkout.
    pub store_timeout: Duration,
    /// Optional admin allow-list replacing the `admins` table.
    pub admin_emails: Option<Vec<String>>,
    /// Whether cookies are marked `Secure`.
    pub secure_cookies: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        let is_production = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string()) == "production";

        let session_keys = match env::var("SESSION_KEYS") {
            Ok(mut raw) => {
                let keys = parse_session_keys(&raw);
                raw.zeroize();
                keys?
            }
            Err(_) if is_production => {
                anyhow::bail!(
                    "SESSION_KEYS must be set in production (generate with: openssl rand -hex 32)"
                );
            }
            Err(_) => {
                tracing::warn!("⚠️  SESSION_KEYS not set, using an ephemeral key (sessions end on restart)");
                vec![Zeroizing::new(aes::generate_key().as_bytes().to_vec())]
            }
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            public_dir: env::var("PUBLIC_DIR").unwrap_or_else(|_| "public".to_string()),
            session_cookie_name: env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| DEFAULT_COOKIE_NAME.to_string()),
            session_max_age_secs: parse_max_age(
                &env::var("SESSION_MAX_AGE_SECS")
                    .unwrap_or_else(|_| DEFAULT_SESSION_MAX_AGE_SECS.to_string()),
            )?,
            session_keys,
            audience: env::var("AUTH_AUDIENCE")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            verifier_url: env::var("VERIFIER_URL")
                .unwrap_or_else(|_| PersonaVerifier::DEFAULT_ENDPOINT.to_string()),
            verifier_timeout: Duration::from_secs(
                env::var("VERIFIER_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .context("Invalid VERIFIER_TIMEOUT_SECS")?,
            ),
            store_timeout: Duration::from_secs(
                env::var("STORE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .context("Invalid STORE_TIMEOUT_SECS")?,
            ),
            admin_emails: env::var("ADMIN_EMAILS").ok().map(|raw| split_list(&raw)),
            secure_cookies: is_production,
        })
    }

    /// Builds the cookie keys, newest first.
    pub fn cookie_keys(&self) -> anyhow::Result<Vec<SecureKey>> {
        self.session_keys
            .iter()
            .map(|k| SecureKey::from_slice(k).map_err(|e| anyhow::anyhow!("{}", e)))
            .collect()
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses the session lifetime in seconds. It must be positive, otherwise every
/// issued cookie is already expired and each request mints a new session row.
fn parse_max_age(raw: &str) -> Result<i64> {
    let secs: i64 = raw
        .trim()
        .parse()
        .context("Invalid SESSION_MAX_AGE_SECS")?;
    if secs <= 0 {
        anyhow::bail!("SESSION_MAX_AGE_SECS must be positive, got {}", secs);
    }
    Ok(secs)
}

/// Parses comma-separated hex keys; each must decode to exactly `KEY_SIZE` bytes.
fn parse_session_keys(raw: &str) -> Result<Vec<Zeroizing<Vec<u8>>>> {
    let keys = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, hex_key)| {
            let bytes = Zeroizing::new(
                hex::decode(hex_key)
                    .with_context(|| format!("SESSION_KEYS entry {} must be valid hexadecimal", i))?,
            );
            if bytes.len() != KEY_SIZE {
                anyhow::bail!(
                    "SESSION_KEYS entry {} must be exactly {} bytes ({} hex characters)",
                    i,
                    KEY_SIZE,
                    KEY_SIZE * 2
                );
            }
            Ok(bytes)
        })
        .collect::<Result<Vec<_>>>()?;

    if keys.is_empty() {
        anyhow::bail!("SESSION_KEYS must contain at least one key");
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rotated_keys_in_order() {
        let newest = "11".repeat(32);
        let older = "22".repeat(32);
        let keys = parse_session_keys(&format!("{}, {}", newest, older)).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0][0], 0x11);
        assert_eq!(keys[1][0], 0x22);
    }

    #[test]
    fn rejects_short_or_non_hex_keys() {
        assert!(parse_session_keys("abcd").is_err());
        assert!(parse_session_keys(&"zz".repeat(32)).is_err());
        assert!(parse_session_keys(" , ").is_err());
    }

    #[test]
    fn max_age_must_be_positive() {
        assert_eq!(parse_max_age("3600").unwrap(), 3600);
        assert_eq!(
            parse_max_age(&DEFAULT_SESSION_MAX_AGE_SECS.to_string()).unwrap(),
            DEFAULT_SESSION_MAX_AGE_SECS
        );
        assert!(parse_max_age("0").is_err());
        assert!(parse_max_age("-5").is_err());
        assert!(parse_max_age("a month").is_err());
    }

    #[test]
    fn splits_admin_list() {
        assert_eq!(
            split_list(" a@b.com,, c@d.org "),
            vec!["a@b.com".to_string(), "c@d.org".to_string()]
        );
    }
}
