use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::auth::VerifiedIdentity;

/// How the session for the current request came to be.
///
/// Fixed at resolution time; persisting a fresh session does not make it resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No usable cookie, or the cookie named a record that no longer exists.
    Fresh,
    /// Reloaded from the backing store through a valid cookie.
    Resumed,
}

/// The typed values carried by a session.
///
/// `email` is the empty string until a verified login binds an address; it can
/// only be set through [`Session::authenticate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionValues {
    email: String,
    /// When the record was first persisted.
    pub created: Option<DateTime<Utc>>,
    /// When the record was last persisted.
    pub modified: Option<DateTime<Utc>>,
}

impl SessionValues {
    /// The verified email address, or `""` when not authenticated.
    pub fn email(&self) -> &str {
        &self.email
    }
}

/// A server-side session resolved for one request.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    values: SessionValues,
    state: SessionState,
    is_new: bool,
}

impl Session {
    /// Starts an unauthenticated session with a newly minted, time-ordered id.
    pub fn fresh() -> Self {
        Self {
            id: Uuid::now_v7(),
            values: SessionValues::default(),
            state: SessionState::Fresh,
            is_new: true,
        }
    }

    /// Rebuilds a session from its persisted record.
    pub(crate) fn resumed(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            values: SessionValues {
                email: record.email,
                created: Some(record.created),
                modified: Some(record.modified),
            },
            state: SessionState::Resumed,
            is_new: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn values(&self) -> &SessionValues {
        &self.values
    }

    pub fn email(&self) -> &str {
        &self.values.email
    }

    /// True until the session has been durably stored once.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True when a verified email is bound to the session.
    pub fn is_authenticated(&self) -> bool {
        !self.values.email.is_empty()
    }

    /// Binds the verifier-asserted email address to this session.
    pub fn authenticate(&mut self, identity: &VerifiedIdentity) {
        self.values.email = identity.email().to_string();
    }

    /// The record that persisting this session at `now` would write.
    pub fn to_record(&self, now: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            id: self.id,
            email: self.values.email.clone(),
            created: self.values.created.unwrap_or(now),
            modified: now,
        }
    }

    /// Marks the session durable after a successful insert or update.
    pub(crate) fn mark_persisted(&mut self, record: &SessionRecord) {
        self.values.created = Some(record.created);
        self.values.modified = Some(record.modified);
        self.is_new = false;
    }
}

/// The persisted shape of a session: one row per id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub email: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(email: &str) -> VerifiedIdentity {
        VerifiedIdentity::new(
            email.to_string(),
            "http://localhost:8080".to_string(),
            "login.persona.org".to_string(),
            None,
        )
    }

    #[test]
    fn fresh_session_is_unauthenticated_and_new() {
        let session = Session::fresh();
        assert!(session.is_new());
        assert_eq!(session.state(), SessionState::Fresh);
        assert_eq!(session.email(), "");
        assert!(!session.is_authenticated());
        assert!(session.values().created.is_none());
    }

    #[test]
    fn fresh_ids_are_unique_v7() {
        let a = Session::fresh().id();
        let b = Session::fresh().id();
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 7);
    }

    #[test]
    fn authenticate_binds_verified_email() {
        let mut session = Session::fresh();
        session.authenticate(&identity("a@b.com"));
        assert!(session.is_authenticated());
        assert_eq!(session.email(), "a@b.com");
    }

    #[test]
    fn record_keeps_created_across_updates() {
        let mut session = Session::fresh();
        let t0 = Utc::now();
        let first = session.to_record(t0);
        assert_eq!(first.created, t0);
        assert_eq!(first.modified, t0);
        session.mark_persisted(&first);
        assert!(!session.is_new());
        assert_eq!(session.state(), SessionState::Fresh);

        let t1 = t0 + chrono::Duration::seconds(5);
        let second = session.to_record(t1);
        assert_eq!(second.created, t0);
        assert_eq!(second.modified, t1);
    }

    #[test]
    fn resumed_session_reflects_record() {
        let now = Utc::now();
        let record = SessionRecord {
            id: Uuid::now_v7(),
            email: "x@y.org".to_string(),
            created: now,
            modified: now,
        };
        let session = Session::resumed(record.clone());
        assert_eq!(session.id(), record.id);
        assert_eq!(session.state(), SessionState::Resumed);
        assert_eq!(session.email(), "x@y.org");
    }
}
