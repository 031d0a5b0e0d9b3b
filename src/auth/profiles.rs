use rusqlite::{params, OptionalExtension};
use serde::Deserialize;

use crate::content::domain::{validate_source_url, validate_text, Invalid};
use crate::db::models::{Profile, UserId};
use crate::db::RepositoryError;
use crate::state::DbPool;

pub const REALNAME_MAX_LEN: usize = 50;
pub const BIO_MAX_LEN: usize = 300;

/// Profile form fields as submitted. Blank means "not set".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileEdit {
    pub realname: String,
    pub image_url: String,
    pub bio: String,
}

fn optional<T>(
    raw: &str,
    check: impl FnOnce(&str) -> Result<T, Invalid>,
) -> Result<Option<T>, Invalid> {
    if raw.trim().is_empty() {
        Ok(None)
    } else {
        check(raw).map(Some)
    }
}

impl ProfileEdit {
    pub fn validated(&self) -> Result<Profile, Invalid> {
        Ok(Profile {
            realname: optional(&self.realname, |s| validate_text("Name", s, REALNAME_MAX_LEN))?,
            image_url: optional(&self.image_url, |s| {
                validate_source_url(s).map(|url| url.to_string())
            })?,
            bio: optional(&self.bio, |s| validate_text("Bio", s, BIO_MAX_LEN))?,
        })
    }
}

/// The user's profile, or an empty one if they never saved it.
pub fn get_profile(pool: &DbPool, user_id: &UserId) -> Result<Profile, RepositoryError> {
    let conn = pool.get()?;
    let profile = conn
        .query_row(
            "SELECT realname, image_url, bio FROM profiles WHERE user_id = ?1",
            params![user_id.as_str()],
            |row| {
                Ok(Profile {
                    realname: row.get(0)?,
                    image_url: row.get(1)?,
                    bio: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(profile.unwrap_or_default())
}

/// Validate and store the whole profile, replacing what was there.
pub fn save_profile(
    pool: &DbPool,
    user_id: &UserId,
    edit: &ProfileEdit,
) -> Result<Profile, RepositoryError> {
    let profile = edit.validated()?;
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO profiles (user_id, realname, image_url, bio) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id) DO UPDATE SET
             realname = excluded.realname,
             image_url = excluded.image_url,
             bio = excluded.bio,
             updated_at = datetime('now')",
        params![
            user_id.as_str(),
            profile.realname,
            profile.image_url,
            profile.bio
        ],
    )?;
    tracing::info!(user_id = %user_id, "Profile saved");
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::users;
    use crate::db::test_pool;

    fn edit(realname: &str, image_url: &str, bio: &str) -> ProfileEdit {
        ProfileEdit {
            realname: realname.into(),
            image_url: image_url.into(),
            bio: bio.into(),
        }
    }

    #[test]
    fn unsaved_profile_is_empty() {
        let pool = test_pool();
        let ada = users::create_user(&pool, "ada", "password1", 4).unwrap();
        assert_eq!(get_profile(&pool, &ada.id).unwrap(), Profile::default());
    }

    #[test]
    fn saving_twice_replaces_and_blanks_clear() {
        let pool = test_pool();
        let ada = users::create_user(&pool, "ada", "password1", 4).unwrap();

        save_profile(
            &pool,
            &ada.id,
            &edit(" Ada Lovelace ", "https://img.example/ada.png", "Counts things."),
        )
        .unwrap();
        let saved = get_profile(&pool, &ada.id).unwrap();
        assert_eq!(saved.realname.as_deref(), Some("Ada Lovelace"));
        assert_eq!(saved.image_url.as_deref(), Some("https://img.example/ada.png"));

        save_profile(&pool, &ada.id, &edit("Ada", "  ", "")).unwrap();
        assert_eq!(
            get_profile(&pool, &ada.id).unwrap(),
            Profile {
                realname: Some("Ada".into()),
                image_url: None,
                bio: None,
            }
        );
    }

    #[test]
    fn bad_fields_are_rejected_without_writing() {
        let pool = test_pool();
        let ada = users::create_user(&pool, "ada", "password1", 4).unwrap();

        let long_name = "n".repeat(REALNAME_MAX_LEN + 1);
        let long_bio = "b".repeat(BIO_MAX_LEN + 1);
        for bad in [
            edit(&long_name, "", ""),
            edit("", "", &long_bio),
            edit("", "file:///etc/passwd", ""),
            edit("", "http://127.0.0.1/me.png", ""),
        ] {
            assert!(matches!(
                save_profile(&pool, &ada.id, &bad),
                Err(RepositoryError::Validation(_))
            ));
        }
        assert_eq!(get_profile(&pool, &ada.id).unwrap(), Profile::default());
    }

    #[test]
    fn profile_goes_with_its_user() {
        let pool = test_pool();
        let ada = users::create_user(&pool, "ada", "password1", 4).unwrap();
        save_profile(&pool, &ada.id, &edit("Ada", "", "")).unwrap();

        users::delete_user(&pool, &ada.id).unwrap();

        let rows: i64 = pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }
}
