// Repository pattern - isolates all ledger side effects
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::db::models::UserId;
use crate::db::RepositoryError;
use crate::engagement::domain::*;
use crate::state::DbPool;

#[async_trait]
pub trait EngagementRepository: Send + Sync {
    /// Flip `actor`'s like on the entity and return the resulting state.
    /// Self-likes leave the ledger untouched.
    async fn toggle(
        &self,
        kind: EntityKind,
        entity_id: &str,
        actor: &UserId,
    ) -> Result<Toggled, RepositoryError>;

    /// Current like count and whether `viewer` is among the likers.
    async fn state(
        &self,
        kind: EntityKind,
        entity_id: &str,
        viewer: Option<&UserId>,
    ) -> Result<LikeState, RepositoryError>;

    /// Users who like the entity, oldest like first.
    async fn liked_by(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<UserId>, RepositoryError>;
}

pub struct SqliteEngagementRepository {
    pool: DbPool,
}

impl SqliteEngagementRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Author of the entity, or `NotFound` when it doesn't exist.
fn entity_author(
    conn: &Connection,
    kind: EntityKind,
    entity_id: &str,
) -> Result<Option<UserId>, RepositoryError> {
    let sql = format!("SELECT author_id FROM {} WHERE id = ?1", kind.table());
    let author: Option<Option<String>> = conn
        .query_row(&sql, params![entity_id], |row| row.get(0))
        .optional()?;

    match author {
        Some(author) => Ok(author.map(UserId)),
        None => Err(RepositoryError::NotFound(format!("{} {}", kind, entity_id))),
    }
}

fn read_state(
    conn: &Connection,
    kind: EntityKind,
    entity_id: &str,
    viewer: Option<&UserId>,
) -> Result<LikeState, rusqlite::Error> {
    let sql = format!("SELECT {}", kind.like_columns("?1", "?2"));
    conn.query_row(
        &sql,
        params![entity_id, viewer.map(UserId::as_str)],
        |row| {
            Ok(LikeState {
                count: row.get(0)?,
                liked: row.get(1)?,
            })
        },
    )
}

#[async_trait]
impl EngagementRepository for SqliteEngagementRepository {
    async fn toggle(
        &self,
        kind: EntityKind,
        entity_id: &str,
        actor: &UserId,
    ) -> Result<Toggled, RepositoryError> {
        let mut conn = self.pool.get()?;

        // IMMEDIATE takes the write lock up front, so check-then-write can't interleave
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let author = entity_author(&tx, kind, entity_id)?;
        let before = read_state(&tx, kind, entity_id, Some(actor))?;
        let outcome = plan_toggle(author.as_ref(), actor, before.liked);

        let ledger = kind.ledger_table();
        let fk = kind.ledger_column();
        match outcome {
            ToggleOutcome::SelfLikeIgnored => {}
            ToggleOutcome::Unliked => {
                tx.execute(
                    &format!("DELETE FROM {ledger} WHERE {fk} = ?1 AND user_id = ?2"),
                    params![entity_id, actor.as_str()],
                )?;
            }
            ToggleOutcome::Liked => {
                tx.execute(
                    &format!(
                        "INSERT INTO {ledger} ({fk}, user_id) VALUES (?1, ?2)
                         ON CONFLICT ({fk}, user_id) DO NOTHING"
                    ),
                    params![entity_id, actor.as_str()],
                )?;
            }
        }

        let state = read_state(&tx, kind, entity_id, Some(actor))?;
        tx.commit()?;

        tracing::info!(
            kind = %kind,
            entity_id,
            user_id = %actor,
            ?outcome,
            count = state.count,
            "Like toggled"
        );

        Ok(Toggled { outcome, state })
    }

    async fn state(
        &self,
        kind: EntityKind,
        entity_id: &str,
        viewer: Option<&UserId>,
    ) -> Result<LikeState, RepositoryError> {
        let conn = self.pool.get()?;
        entity_author(&conn, kind, entity_id)?;
        Ok(read_state(&conn, kind, entity_id, viewer)?)
    }

    async fn liked_by(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<UserId>, RepositoryError> {
        let conn = self.pool.get()?;
        entity_author(&conn, kind, entity_id)?;

        let sql = format!(
            "SELECT user_id FROM {} WHERE {} = ?1 ORDER BY created_at ASC, rowid ASC",
            kind.ledger_table(),
            kind.ledger_column()
        );
        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map(params![entity_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(UserId)
            .collect();

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn seed(pool: &DbPool) {
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, username, password_hash) VALUES
                 ('ada', 'ada', 'x'), ('bob', 'bob', 'x'), ('cy', 'cy', 'x');
             INSERT INTO posts (id, title, image_url, author_id, body)
                 VALUES ('p1', 'Fog', 'https://img/1', 'ada', 'morning');
             INSERT INTO comments (id, post_id, author_id, body)
                 VALUES ('c1', 'p1', 'bob', 'nice');
             INSERT INTO replies (id, comment_id, author_id, body)
                 VALUES ('r1', 'c1', 'cy', 'agreed');",
        )
        .unwrap();
    }

    fn repo() -> SqliteEngagementRepository {
        let pool = test_pool();
        seed(&pool);
        SqliteEngagementRepository::new(pool)
    }

    #[tokio::test]
    async fn like_then_unlike_returns_to_start() {
        let repo = repo();
        let bob = UserId::new("bob");

        let first = repo.toggle(EntityKind::Post, "p1", &bob).await.unwrap();
        assert_eq!(first.outcome, ToggleOutcome::Liked);
        assert_eq!(first.state, LikeState { count: 1, liked: true });

        let second = repo.toggle(EntityKind::Post, "p1", &bob).await.unwrap();
        assert_eq!(second.outcome, ToggleOutcome::Unliked);
        assert_eq!(second.state, LikeState { count: 0, liked: false });
    }

    #[tokio::test]
    async fn author_cannot_like_own_entity_at_any_tier() {
        let repo = repo();
        for (kind, id, author) in [
            (EntityKind::Post, "p1", "ada"),
            (EntityKind::Comment, "c1", "bob"),
            (EntityKind::Reply, "r1", "cy"),
        ] {
            let author = UserId::new(author);
            for _ in 0..3 {
                let t = repo.toggle(kind, id, &author).await.unwrap();
                assert_eq!(t.outcome, ToggleOutcome::SelfLikeIgnored);
                assert_eq!(t.state.count, 0);
                assert!(!t.state.liked);
            }
        }
    }

    #[tokio::test]
    async fn toggle_on_missing_entity_is_not_found() {
        let repo = repo();
        let err = repo
            .toggle(EntityKind::Comment, "nope", &UserId::new("ada"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn state_counts_every_liker_but_flags_only_viewer() {
        let repo = repo();
        repo.toggle(EntityKind::Reply, "r1", &UserId::new("ada"))
            .await
            .unwrap();
        repo.toggle(EntityKind::Reply, "r1", &UserId::new("bob"))
            .await
            .unwrap();

        let anon = repo.state(EntityKind::Reply, "r1", None).await.unwrap();
        assert_eq!(anon, LikeState { count: 2, liked: false });

        let cy = repo
            .state(EntityKind::Reply, "r1", Some(&UserId::new("cy")))
            .await
            .unwrap();
        assert_eq!(cy, LikeState { count: 2, liked: false });

        let ada = repo
            .state(EntityKind::Reply, "r1", Some(&UserId::new("ada")))
            .await
            .unwrap();
        assert!(ada.liked);
    }

    #[tokio::test]
    async fn liked_by_lists_user_ids_in_like_order() {
        let repo = repo();
        repo.toggle(EntityKind::Comment, "c1", &UserId::new("cy"))
            .await
            .unwrap();
        repo.toggle(EntityKind::Comment, "c1", &UserId::new("ada"))
            .await
            .unwrap();

        let users = repo.liked_by(EntityKind::Comment, "c1").await.unwrap();
        assert_eq!(users, vec![UserId::new("cy"), UserId::new("ada")]);
    }

    #[tokio::test]
    async fn tiers_keep_separate_ledgers() {
        let repo = repo();
        repo.toggle(EntityKind::Comment, "c1", &UserId::new("ada"))
            .await
            .unwrap();

        let post = repo.state(EntityKind::Post, "p1", None).await.unwrap();
        let comment = repo.state(EntityKind::Comment, "c1", None).await.unwrap();
        assert_eq!(post.count, 0);
        assert_eq!(comment.count, 1);
    }
}
