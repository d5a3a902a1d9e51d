//! # Core Access Crate
//!
//! Staff identity and token revocation for the intake backend. Token issuance lives
//! outside this service; here a verified token subject is mapped to a `User`, and
//! logged-out tokens are remembered until they would have expired anyway.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_STAFF: &str = "staff";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use turso::{Database, Error as TursoError, Row, params};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreAccessError {
    #[error("Database error: {0}")]
    Database(#[from] TursoError),
    #[error("Failed to create or find user for identifier: {0}")]
    UserPersistenceFailed(String),
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),
}

/// Represents a staff member.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    /// The unique, deterministic ID of the user (UUIDv5 from the token subject).
    pub id: String,
    /// `admin` or `staff`.
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

impl TryFrom<&Row> for User {
    type Error = CoreAccessError;

    fn try_from(row: &Row) -> std::result::Result<Self, Self::Error> {
        let created_at_str: String = row.get(2)?;
        let created_at = chrono::NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FORMAT)
            .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
            .map_err(|e| {
                CoreAccessError::DataIntegrity(format!(
                    "Failed to parse date '{created_at_str}': {e}"
                ))
            })?;

        Ok(User {
            id: row.get(0)?,
            role: row.get(1)?,
            created_at,
        })
    }
}

/// Finds a user by their identifier (the token subject), creating them if they don't exist.
///
/// The primary key is a UUIDv5 of the identifier, so repeated calls are idempotent.
/// The first user ever created becomes `admin`; everyone after is `staff`.
pub async fn get_or_create_user(
    db: &Database,
    user_identifier: &str,
) -> Result<User, CoreAccessError> {
    let conn = db.connect()?;
    let user_id = Uuid::new_v5(&Uuid::NAMESPACE_URL, user_identifier.as_bytes()).to_string();

    let mut rows = conn
        .query(
            "SELECT id, role, created_at FROM users WHERE id = ?",
            params![user_id.clone()],
        )
        .await?;
    if let Some(row) = rows.next().await? {
        return User::try_from(&row);
    }
    drop(rows);

    let admin_exists = conn
        .query("SELECT 1 FROM users WHERE role = ? LIMIT 1", params![ROLE_ADMIN])
        .await?
        .next()
        .await?
        .is_some();
    let role = if admin_exists { ROLE_STAFF } else { ROLE_ADMIN };

    conn.execute(
        "INSERT INTO users (id, role, created_at) VALUES (?, ?, ?)",
        params![user_id.clone(), role, format_ts(Utc::now())],
    )
    .await?;
    info!(user_id = %user_id, role, "Created staff user.");

    let mut rows = conn
        .query(
            "SELECT id, role, created_at FROM users WHERE id = ?",
            params![user_id],
        )
        .await?;
    let row = rows
        .next()
        .await?
        .ok_or_else(|| CoreAccessError::UserPersistenceFailed(user_identifier.to_string()))?;

    User::try_from(&row)
}

/// Remembers `token` as logged out until `expires_at`. Revoking twice is harmless.
pub async fn revoke_token(
    db: &Database,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), CoreAccessError> {
    let conn = db.connect()?;
    conn.execute(
        "INSERT OR IGNORE INTO revoked_tokens (token, expires_at, revoked_at) VALUES (?, ?, ?)",
        params![token.to_string(), format_ts(expires_at), format_ts(Utc::now())],
    )
    .await?;
    info!("Revoked access token.");
    Ok(())
}

pub async fn is_token_revoked(db: &Database, token: &str) -> Result<bool, CoreAccessError> {
    let conn = db.connect()?;
    let revoked = conn
        .query(
            "SELECT 1 FROM revoked_tokens WHERE token = ? LIMIT 1",
            params![token.to_string()],
        )
        .await?
        .next()
        .await?
        .is_some();
    Ok(revoked)
}

/// Forgets revoked tokens whose expiry has passed. Returns how many were removed.
pub async fn purge_expired(db: &Database, now: DateTime<Utc>) -> Result<u64, CoreAccessError> {
    let conn = db.connect()?;
    let removed = conn
        .execute(
            "DELETE FROM revoked_tokens WHERE expires_at <= ?",
            params![format_ts(now)],
        )
        .await?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use intake::providers::db::sqlite::SqliteProvider;

    async fn test_db() -> Database {
        let provider = SqliteProvider::new(":memory:").await.unwrap();
        provider.initialize_schema().await.unwrap();
        provider.db
    }

    #[tokio::test]
    async fn test_get_or_create_user_flow() {
        // 1. Arrange
        let db = test_db().await;
        let user_identifier = "nurse@example.com";

        // 2. Act: First call should create the user
        let user1 = get_or_create_user(&db, user_identifier).await.unwrap();

        // 3. Assert: Check the created user
        let expected_id =
            Uuid::new_v5(&Uuid::NAMESPACE_URL, user_identifier.as_bytes()).to_string();
        assert_eq!(user1.id, expected_id);
        assert!(user1.is_admin(), "The first user should be admin");

        // 4. Act: Second call should retrieve the same user
        let user2 = get_or_create_user(&db, user_identifier).await.unwrap();
        assert_eq!(user1.id, user2.id);
        assert_eq!(user1.role, user2.role);
        assert_eq!(user1.created_at.timestamp(), user2.created_at.timestamp());

        // 5. Act: Create a second user
        let user3 = get_or_create_user(&db, "frontdesk@example.com").await.unwrap();

        // 6. Assert: The second user is regular staff
        assert_ne!(user1.id, user3.id);
        assert_eq!(user3.role, ROLE_STAFF);
    }

    #[tokio::test]
    async fn test_revoked_tokens_expire() {
        let db = test_db().await;
        let now = Utc::now();

        assert!(!is_token_revoked(&db, "t1").await.unwrap());
        revoke_token(&db, "t1", now + Duration::hours(1)).await.unwrap();
        revoke_token(&db, "t1", now + Duration::hours(1)).await.unwrap();
        revoke_token(&db, "t2", now - Duration::hours(1)).await.unwrap();
        assert!(is_token_revoked(&db, "t1").await.unwrap());

        assert_eq!(purge_expired(&db, now).await.unwrap(), 1);
        assert!(is_token_revoked(&db, "t1").await.unwrap());
        assert!(!is_token_revoked(&db, "t2").await.unwrap());
    }
}
