use rusqlite::{params, OptionalExtension};

use crate::db::models::{User, UserId};
use crate::db::{is_unique_violation, RepositoryError};
use crate::state::DbPool;

pub const PASSWORD_MIN_LEN: usize = 8;

fn validate_username(username: &str) -> Result<(), RepositoryError> {
    let len = username.chars().count();
    let ok = (3..=30).contains(&len)
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(RepositoryError::Validation(
            "Username must be 3-30 letters, digits, '_' or '-'".into(),
        ))
    }
}

/// Register a new account. Usernames are unique.
pub fn create_user(
    pool: &DbPool,
    username: &str,
    password: &str,
    bcrypt_cost: u32,
) -> Result<User, RepositoryError> {
    let username = username.trim();
    validate_username(username)?;
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(RepositoryError::Validation(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN_LEN
        )));
    }

    let hash = bcrypt::hash(password, bcrypt_cost)
        .map_err(|e| RepositoryError::Validation(format!("Could not hash password: {}", e)))?;
    let id = UserId::generate();
    let conn = pool.get()?;
    // the UNIQUE index decides races between concurrent signups
    let created_at: String = conn
        .query_row(
            "INSERT INTO users (id, username, password_hash) VALUES (?1, ?2, ?3) RETURNING created_at",
            params![id.as_str(), username, hash],
            |row| row.get(0),
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Validation("That username is taken".into())
            } else {
                RepositoryError::Sql(e)
            }
        })?;

    tracing::info!(user_id = %id, username, "User registered");
    Ok(User {
        id,
        username: username.to_string(),
        created_at,
    })
}

/// The user, if the password matches.
pub fn verify_credentials(
    pool: &DbPool,
    username: &str,
    password: &str,
) -> Result<Option<User>, RepositoryError> {
    let conn = pool.get()?;
    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT id, password_hash, created_at FROM users WHERE username = ?1",
            params![username.trim()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    Ok(row.and_then(|(id, hash, created_at)| {
        bcrypt::verify(password, &hash)
            .unwrap_or(false)
            .then(|| User {
                id: UserId(id),
                username: username.trim().to_string(),
                created_at,
            })
    }))
}

/// Remove an account. Their posts, comments and replies stay with no author;
/// their likes and sessions go.
pub fn delete_user(pool: &DbPool, user_id: &UserId) -> Result<(), RepositoryError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id.as_str()])?;
    if rows == 0 {
        return Err(RepositoryError::NotFound(format!("user {}", user_id)));
    }
    tracing::info!(user_id = %user_id, "User deleted");
    Ok(())
}
