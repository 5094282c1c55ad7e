use std::collections::HashSet;

use async_trait::async_trait;
use deadpool_postgres::Pool;

use crate::error::{AppError, Result};

/// Looks verified email addresses up in the admin allow-list.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    async fn contains(&self, email: &str) -> Result<bool>;
}

/// Checks whether `email` is an admin.
///
/// An empty email is a caller bug (no verified identity), not a negative answer.
pub async fn is_admin(directory: &dyn AdminDirectory, email: &str) -> Result<bool> {
    if email.is_empty() {
        return Err(AppError::Validation("Invalid admin parameter".to_string()));
    }
    directory.contains(email).await
}

/// Admins listed in the Postgres `admins` table.
#[derive(Clone)]
pub struct PgAdminDirectory {
    pool: Pool,
}

impl PgAdminDirectory {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminDirectory for PgAdminDirectory {
    async fn contains(&self, email: &str) -> Result<bool> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT email FROM admins WHERE email = $1", &[&email])
            .await?;
        Ok(row.is_some())
    }
}

/// A fixed allow-list, e.g. from `ADMIN_EMAILS`.
#[derive(Clone, Default)]
pub struct StaticAdminList {
    emails: HashSet<String>,
}

impl StaticAdminList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            emails: emails.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl AdminDirectory for StaticAdminList {
    async fn contains(&self, email: &str) -> Result<bool> {
        Ok(self.emails.contains(email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_email_is_invalid_parameter() {
        let admins = StaticAdminList::new(["root@example.com"]);
        assert!(matches!(is_admin(&admins, "").await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn listed_email_is_admin() {
        let admins = StaticAdminList::new(["root@example.com"]);
        assert!(is_admin(&admins, "root@example.com").await.unwrap());
        assert!(!is_admin(&admins, "guest@example.com").await.unwrap());
    }
}
