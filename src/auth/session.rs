use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::db::models::UserId;
use crate::db::RepositoryError;
use crate::state::DbPool;

/// Create a new session for a user. Returns the session token.
pub fn create_session(pool: &DbPool, user_id: &UserId, hours: u64) -> Result<String, RepositoryError> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id.as_str(), token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// User id and username behind an unexpired session token.
pub fn lookup_session(pool: &DbPool, token: &str) -> Result<Option<(UserId, String)>, RepositoryError> {
    let conn = pool.get()?;
    let found = conn
        .query_row(
            "SELECT u.id, u.username FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| Ok((UserId(row.get(0)?), row.get(1)?)),
        )
        .optional()?;
    Ok(found)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> Result<(), RepositoryError> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn pool_with_user() -> DbPool {
        let pool = test_pool();
        pool.get()
            .unwrap()
            .execute(
                "INSERT INTO users (id, username, password_hash) VALUES ('u1', 'ada', 'x')",
                [],
            )
            .unwrap();
        pool
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn session_round_trip() {
        let pool = pool_with_user();
        let token = create_session(&pool, &UserId::new("u1"), 1).unwrap();

        let (id, username) = lookup_session(&pool, &token).unwrap().unwrap();
        assert_eq!(id, UserId::new("u1"));
        assert_eq!(username, "ada");

        delete_session(&pool, &token).unwrap();
        assert!(lookup_session(&pool, &token).unwrap().is_none());
    }

    #[test]
    fn expired_session_is_ignored() {
        let pool = pool_with_user();
        pool.get()
            .unwrap()
            .execute(
                "INSERT INTO sessions (id, user_id, token, expires_at)
                 VALUES ('s1', 'u1', 'stale', datetime('now', '-1 hours'))",
                [],
            )
            .unwrap();
        assert!(lookup_session(&pool, "stale").unwrap().is_none());
    }
}
