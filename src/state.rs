use std::sync::Arc;

use crate::config::Config;
use crate::crypto::cookie_codec::CookieCodec;
use crate::error::{AppError, Result};
use crate::repositories::admin::{AdminDirectory, PgAdminDirectory, StaticAdminList};
use crate::repositories::session::{PgSessionStore, SessionStore};
use crate::services::identity::{IdentityVerifier, PersonaVerifier};
use crate::services::session::{CookieSettings, SessionManager};

/// The application's state.
///
/// Built once at startup and cloned into every request; all members are shared handles.
#[derive(Clone)]
pub struct AppState {
    /// Session cookie and backing-store reconciliation.
    pub sessions: SessionManager,
    /// The identity verifier consulted on login.
    pub verifier: Arc<dyn IdentityVerifier>,
    /// The admin allow-list.
    pub admins: Arc<dyn AdminDirectory>,
    /// Audience sent with every verification.
    pub audience: Arc<str>,
}

impl AppState {
    /// Assembles state from already-built collaborators.
    pub fn new(
        sessions: SessionManager,
        verifier: Arc<dyn IdentityVerifier>,
        admins: Arc<dyn AdminDirectory>,
        audience: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            sessions,
            verifier,
            admins,
            audience: audience.into(),
        }
    }

    /// Connects the Postgres-backed collaborators described by `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url, config.store_timeout)?;
        crate::db::ensure_schema(&db).await?;
        tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");

        let keys = config
            .cookie_keys()
            .map_err(|e| AppError::Encryption(e.to_string()))?;
        let codec = CookieCodec::new(keys, config.session_max_age_secs)?;
        let store: Arc<dyn SessionStore> =
            Arc::new(PgSessionStore::new(db.clone(), config.store_timeout));
        let sessions = SessionManager::new(
            store,
            codec,
            CookieSettings::new(
                config.session_cookie_name.clone(),
                config.session_max_age_secs,
                config.secure_cookies,
            ),
        );
        tracing::info!(
            "✅ Session manager initialized ({} cookie key(s))",
            config.session_keys.len()
        );

        let persona = PersonaVerifier::new(config.verifier_url.clone(), config.verifier_timeout)?;
        tracing::info!("✅ Identity verifier: {}", persona.endpoint());
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(persona);

        let admins: Arc<dyn AdminDirectory> = match &config.admin_emails {
            Some(emails) => {
                tracing::info!("✅ Admin allow-list from ADMIN_EMAILS ({} entries)", emails.len());
                Arc::new(StaticAdminList::new(emails.iter().cloned()))
            }
            None => Arc::new(PgAdminDirectory::new(db)),
        };

        Ok(Self::new(sessions, verifier, admins, config.audience.clone()))
    }
}
