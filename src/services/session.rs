use std::sync::Arc;

use chrono::Utc;
use tower_cookies::cookie::time::Duration;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::crypto::cookie_codec::CookieCodec;
use crate::error::{AppError, Result};
use crate::models::session::Session;
use crate::repositories::session::SessionStore;

/// Attributes of the session cookie.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub path: String,
    pub max_age_secs: i64,
    pub secure: bool,
}

impl CookieSettings {
    pub fn new(name: impl Into<String>, max_age_secs: i64, secure: bool) -> Self {
        Self {
            name: name.into(),
            path: "/".to_string(),
            max_age_secs,
            secure,
        }
    }
}

/// Reconciles the session cookie with the backing store for each request.
///
/// The cookie carries only the sealed session id; the store is the sole source
/// of session values. Cloning is cheap and shares the store and codec.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    codec: Arc<CookieCodec>,
    cookie: CookieSettings,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, codec: CookieCodec, cookie: CookieSettings) -> Self {
        Self {
            store,
            codec: Arc::new(codec),
            cookie,
        }
    }

    /// Resolves the session for a request from its cookie jar.
    pub async fn load(&self, cookies: &Cookies) -> Result<Session> {
        let token = cookies
            .get(&self.cookie.name)
            .map(|cookie| cookie.value().to_string());
        self.resolve(token.as_deref()).await
    }

    /// Resolves a session from the raw cookie value, if any.
    ///
    /// Anything short of a decodable cookie naming a stored record yields a
    /// fresh session. Only a store failure is an error.
    pub async fn resolve(&self, token: Option<&str>) -> Result<Session> {
        let Some(token) = token else {
            tracing::debug!("🍪 No '{}' cookie, starting fresh session", self.cookie.name);
            return Ok(Session::fresh());
        };

        let decoded = match self.codec.decode(&self.cookie.name, token) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("⚠️ Discarding session cookie: {}", e);
                return Ok(Session::fresh());
            }
        };

        let id = match Uuid::parse_str(&decoded) {
            Ok(id) => id,
            Err(_) => {
                tracing::warn!("⚠️ Session cookie does not carry a session id");
                return Ok(Session::fresh());
            }
        };

        match self.store.fetch(id).await {
            Ok(Some(record)) => {
                tracing::debug!("🔑 Resumed session {}", id);
                Ok(Session::resumed(record))
            }
            Ok(None) => {
                tracing::warn!("⚠️ Session {} not found in store, starting fresh", id);
                Ok(Session::fresh())
            }
            Err(e) => {
                tracing::error!("❌ Session lookup for {} failed: {}", id, e);
                Err(AppError::Store(e))
            }
        }
    }

    /// Persists the session and returns the cookie that points at it.
    ///
    /// New sessions are inserted, others updated. Nothing is returned unless
    /// the write succeeded.
    ///
    /// # Arguments
    ///
    /// * `session` - The session to write; marked durable on success.
    ///
    /// # Returns
    ///
    /// The session cookie to send, or a store or codec error.
    pub async fn persist(&self, session: &mut Session) -> Result<Cookie<'static>> {
        let record = session.to_record(Utc::now());

        let written = if session.is_new() {
            self.store.insert(&record).await
        } else {
            self.store.update(&record).await
        };

        if let Err(e) = written {
            tracing::error!("❌ Failed to persist session {}: {}", record.id, e);
            return Err(AppError::Store(e));
        }
        session.mark_persisted(&record);

        let token = self
            .codec
            .encode(&self.cookie.name, &session.id().to_string())?;

        tracing::debug!("✅ Session {} persisted", record.id);
        Ok(self.session_cookie(token))
    }

    /// Persists the session and sets its cookie on the response.
    pub async fn save(&self, session: &mut Session, cookies: &Cookies) -> Result<()> {
        let cookie = self.persist(session).await?;
        cookies.add(cookie);
        Ok(())
    }

    /// Expires the client's cookie, then removes the backing record.
    ///
    /// The cookie is cleared even when the store fails; that failure is still returned.
    pub async fn delete(&self, session: &Session, cookies: &Cookies) -> Result<()> {
        cookies.add(self.removal_cookie());

        self.store.delete(session.id()).await.map_err(|e| {
            tracing::error!("❌ Failed to delete session {}: {}", session.id(), e);
            AppError::Store(e)
        })?;

        tracing::info!("👋 Session {} deleted", session.id());
        Ok(())
    }

    /// The cookie carrying a sealed session id.
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((self.cookie.name.clone(), token))
            .path(self.cookie.path.clone())
            .http_only(true)
            .secure(self.cookie.secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(self.cookie.max_age_secs))
            .build()
    }

    /// An already-expired cookie telling the client to drop its session cookie.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.cookie.name.clone(), ""))
            .path(self.cookie.path.clone())
            .http_only(true)
            .secure(self.cookie.secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(-1))
            .build()
    }
}
