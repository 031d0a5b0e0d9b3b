// Repository pattern - isolates all content side effects
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

use crate::config::{FeedConfig, TagSeed};
use crate::content::domain::*;
use crate::db::models::{Author, CommentRecord, PostRecord, ReplyRecord, Tag, UserId};
use crate::db::RepositoryError;
use crate::engagement::{EntityKind, LikeState};
use crate::scrape::PhotoMetadata;
use crate::state::DbPool;

#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Persist a post from a submission plus the metadata fetched for it.
    async fn create_post(
        &self,
        author: &UserId,
        post: NewPost,
        metadata: PhotoMetadata,
    ) -> Result<PostRecord, RepositoryError>;

    /// Author-only. Anyone else gets `NotFound`.
    async fn edit_post(
        &self,
        post_id: &str,
        actor: &UserId,
        edit: PostEdit,
    ) -> Result<PostRecord, RepositoryError>;

    /// Author-only. Comments, replies and their likes go with it.
    async fn delete_post(&self, post_id: &str, actor: &UserId) -> Result<(), RepositoryError>;

    async fn get_post(
        &self,
        post_id: &str,
        viewer: Option<&UserId>,
    ) -> Result<PostRecord, RepositoryError>;

    /// Newest-first feed, optionally restricted to one tag. Pages start at 1.
    async fn list_posts(
        &self,
        tag_slug: Option<&str>,
        page: u32,
        page_size: u32,
        viewer: Option<&UserId>,
    ) -> Result<PostPage, RepositoryError>;

    async fn create_comment(
        &self,
        post_id: &str,
        author: &UserId,
        body: &str,
    ) -> Result<CommentRecord, RepositoryError>;

    /// Author-only. Returns the id of the post the comment was on.
    async fn delete_comment(
        &self,
        comment_id: &str,
        actor: &UserId,
    ) -> Result<String, RepositoryError>;

    async fn list_comments(
        &self,
        post_id: &str,
        viewer: Option<&UserId>,
        sort: CommentSort,
    ) -> Result<Vec<CommentRecord>, RepositoryError>;

    async fn create_reply(
        &self,
        comment_id: &str,
        author: &UserId,
        body: &str,
    ) -> Result<ReplyRecord, RepositoryError>;

    /// Author-only. Returns the id of the post the reply's comment was on.
    async fn delete_reply(&self, reply_id: &str, actor: &UserId)
        -> Result<String, RepositoryError>;

    /// All tags in display order; tags without an order come last.
    async fn list_tags(&self) -> Result<Vec<Tag>, RepositoryError>;

    async fn tag_by_slug(&self, slug: &str) -> Result<Tag, RepositoryError>;

    /// Insert the tag, or update the one with the same slug.
    async fn upsert_tag(&self, seed: &TagSeed) -> Result<Tag, RepositoryError>;
}

/// SQLite implementation
pub struct SqliteContentRepository {
    pool: DbPool,
    limits: FeedConfig,
}

impl SqliteContentRepository {
    pub fn new(pool: DbPool, limits: FeedConfig) -> Self {
        Self { pool, limits }
    }
}

const TAG_ORDER: &str = "t.display_order IS NULL, t.display_order, t.name";

fn author_from(row: &Row<'_>, first: usize) -> rusqlite::Result<Option<Author>> {
    let id: Option<String> = row.get(first)?;
    let username: Option<String> = row.get(first + 1)?;
    Ok(match (id, username) {
        (Some(id), Some(username)) => Some(Author {
            id: UserId(id),
            username,
            display_name: row.get(first + 2)?,
        }),
        _ => None,
    })
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        icon: row.get(2)?,
        slug: row.get(3)?,
        display_order: row.get(4)?,
    })
}

fn post_select() -> String {
    format!(
        "SELECT p.id, p.title, p.artist, p.source_url, p.image_url, p.author_id, u.username,
                pr.realname, p.body, p.created_at,
                {},
                (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
         FROM posts p
         LEFT JOIN users u ON u.id = p.author_id
         LEFT JOIN profiles pr ON pr.user_id = p.author_id",
        EntityKind::Post.like_columns("p.id", "?1")
    )
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        source_url: row.get(3)?,
        image_url: row.get(4)?,
        author: author_from(row, 5)?,
        body: row.get(8)?,
        created_at: row.get(9)?,
        tags: Vec::new(),
        likes: LikeState {
            count: row.get(10)?,
            liked: row.get(11)?,
        },
        comment_count: row.get(12)?,
    })
}

fn comment_select() -> String {
    format!(
        "SELECT c.id, c.post_id, c.author_id, u.username, pr.realname, c.body, c.created_at,
                {},
                c.rowid AS seq
         FROM comments c
         LEFT JOIN users u ON u.id = c.author_id
         LEFT JOIN profiles pr ON pr.user_id = c.author_id",
        EntityKind::Comment.like_columns("c.id", "?1")
    )
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author: author_from(row, 2)?,
        body: row.get(5)?,
        created_at: row.get(6)?,
        likes: LikeState {
            count: row.get(7)?,
            liked: row.get(8)?,
        },
        replies: Vec::new(),
    })
}

fn reply_select() -> String {
    format!(
        "SELECT r.id, r.comment_id, c.post_id, r.author_id, u.username, pr.realname, r.body, r.created_at,
                {}
         FROM replies r
         JOIN comments c ON c.id = r.comment_id
         LEFT JOIN users u ON u.id = r.author_id
         LEFT JOIN profiles pr ON pr.user_id = r.author_id",
        EntityKind::Reply.like_columns("r.id", "?1")
    )
}

fn reply_from_row(row: &Row<'_>) -> rusqlite::Result<ReplyRecord> {
    Ok(ReplyRecord {
        id: row.get(0)?,
        comment_id: row.get(1)?,
        post_id: row.get(2)?,
        author: author_from(row, 3)?,
        body: row.get(6)?,
        created_at: row.get(7)?,
        likes: LikeState {
            count: row.get(8)?,
            liked: row.get(9)?,
        },
    })
}

fn viewer_param(viewer: Option<&UserId>) -> Option<&str> {
    viewer.map(UserId::as_str)
}

fn load_post_tags(conn: &Connection, post_id: &str) -> Result<Vec<Tag>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT t.id, t.name, t.icon, t.slug, t.display_order
         FROM tags t
         JOIN post_tags pt ON pt.tag_id = t.id
         WHERE pt.post_id = ?1
         ORDER BY {TAG_ORDER}"
    ))?;
    let tags = stmt
        .query_map(params![post_id], tag_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

fn load_post(
    conn: &Connection,
    post_id: &str,
    viewer: Option<&UserId>,
) -> Result<PostRecord, RepositoryError> {
    let sql = format!("{} WHERE p.id = ?2", post_select());
    let mut post = conn
        .query_row(&sql, params![viewer_param(viewer), post_id], post_from_row)
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound(format!("post {}", post_id)))?;
    post.tags = load_post_tags(conn, &post.id)?;
    Ok(post)
}

fn load_comment(
    conn: &Connection,
    comment_id: &str,
    viewer: Option<&UserId>,
) -> Result<CommentRecord, RepositoryError> {
    let sql = format!("{} WHERE c.id = ?2", comment_select());
    let mut comment = conn
        .query_row(&sql, params![viewer_param(viewer), comment_id], comment_from_row)
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound(format!("comment {}", comment_id)))?;

    let sql = format!(
        "{} WHERE r.comment_id = ?2 ORDER BY r.created_at ASC, r.rowid ASC",
        reply_select()
    );
    let mut stmt = conn.prepare(&sql)?;
    comment.replies = stmt
        .query_map(params![viewer_param(viewer), comment_id], reply_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comment)
}

fn load_reply(
    conn: &Connection,
    reply_id: &str,
    viewer: Option<&UserId>,
) -> Result<ReplyRecord, RepositoryError> {
    let sql = format!("{} WHERE r.id = ?2", reply_select());
    conn.query_row(&sql, params![viewer_param(viewer), reply_id], reply_from_row)
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound(format!("reply {}", reply_id)))
}

fn entity_exists(conn: &Connection, kind: EntityKind, id: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT COUNT(*) > 0 FROM {} WHERE id = ?1", kind.table()),
        params![id],
        |row| row.get(0),
    )
}

/// Map slugs to tag ids; an unknown slug is a validation error.
fn resolve_tags(conn: &Connection, slugs: &[String]) -> Result<Vec<i64>, RepositoryError> {
    let mut ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM tags WHERE slug = ?1",
                params![slug],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => ids.push(id),
            None => return Err(RepositoryError::Validation(format!("Unknown tag: {}", slug))),
        }
    }
    Ok(ids)
}

fn set_post_tags(conn: &Connection, post_id: &str, tag_ids: &[i64]) -> Result<(), rusqlite::Error> {
    conn.execute("DELETE FROM post_tags WHERE post_id = ?1", params![post_id])?;
    let mut stmt = conn.prepare("INSERT INTO post_tags (post_id, tag_id) VALUES (?1, ?2)")?;
    for tag_id in tag_ids {
        stmt.execute(params![post_id, tag_id])?;
    }
    Ok(())
}

fn check_metadata(metadata: PhotoMetadata) -> Result<PhotoMetadata, Invalid> {
    let title = validate_text("Photo title", &metadata.title, TITLE_MAX_LEN)?;
    let artist = match metadata.artist {
        Some(artist) if !artist.trim().is_empty() => {
            Some(validate_text("Artist", &artist, TITLE_MAX_LEN)?)
        }
        _ => None,
    };
    let image_url = validate_source_url(&metadata.image_url)
        .map_err(|_| Invalid("Photo page has no usable image URL".into()))?
        .to_string();
    Ok(PhotoMetadata {
        title,
        artist,
        image_url,
    })
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    async fn create_post(
        &self,
        author: &UserId,
        post: NewPost,
        metadata: PhotoMetadata,
    ) -> Result<PostRecord, RepositoryError> {
        let post = post.validated(&self.limits)?;
        let metadata = check_metadata(metadata)?;

        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let tag_ids = resolve_tags(&tx, &post.tag_slugs)?;

        let post_id = uuid::Uuid::now_v7().to_string();
        tx.execute(
            "INSERT INTO posts (id, title, artist, source_url, image_url, author_id, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                post_id,
                metadata.title,
                metadata.artist,
                post.source_url,
                metadata.image_url,
                author.as_str(),
                post.body
            ],
        )?;
        set_post_tags(&tx, &post_id, &tag_ids)?;
        tx.commit()?;

        tracing::info!(post_id = %post_id, author = %author, "Post created");
        load_post(&conn, &post_id, Some(author))
    }

    async fn edit_post(
        &self,
        post_id: &str,
        actor: &UserId,
        edit: PostEdit,
    ) -> Result<PostRecord, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        // ownership first: a stranger must not learn anything from validation errors
        let owned: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1 AND author_id = ?2",
            params![post_id, actor.as_str()],
            |row| row.get(0),
        )?;
        if !owned {
            return Err(RepositoryError::NotFound(format!("post {}", post_id)));
        }

        let edit = edit.validated(&self.limits)?;
        let tag_ids = resolve_tags(&tx, &edit.tag_slugs)?;
        tx.execute(
            "UPDATE posts SET body = ?1 WHERE id = ?2",
            params![edit.body, post_id],
        )?;
        set_post_tags(&tx, post_id, &tag_ids)?;
        tx.commit()?;

        tracing::info!(post_id, "Post updated");
        load_post(&conn, post_id, Some(actor))
    }

    async fn delete_post(&self, post_id: &str, actor: &UserId) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM posts WHERE id = ?1 AND author_id = ?2",
            params![post_id, actor.as_str()],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound(format!("post {}", post_id)));
        }
        tracing::info!(post_id, "Post deleted");
        Ok(())
    }

    async fn get_post(
        &self,
        post_id: &str,
        viewer: Option<&UserId>,
    ) -> Result<PostRecord, RepositoryError> {
        let conn = self.pool.get()?;
        load_post(&conn, post_id, viewer)
    }

    async fn list_posts(
        &self,
        tag_slug: Option<&str>,
        page: u32,
        page_size: u32,
        viewer: Option<&UserId>,
    ) -> Result<PostPage, RepositoryError> {
        let conn = self.pool.get()?;

        if let Some(slug) = tag_slug {
            let known: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM tags WHERE slug = ?1",
                params![slug],
                |row| row.get(0),
            )?;
            if !known {
                return Err(RepositoryError::NotFound(format!("tag {}", slug)));
            }
        }

        let page = page.max(1);
        let offset = i64::from(page - 1) * i64::from(page_size);
        // one extra row tells us whether another page exists
        let limit = i64::from(page_size) + 1;

        let sql = format!(
            "{}
             WHERE ?2 IS NULL OR EXISTS (
                 SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id
                 WHERE pt.post_id = p.id AND t.slug = ?2)
             ORDER BY p.created_at DESC, p.rowid DESC
             LIMIT ?3 OFFSET ?4",
            post_select()
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut posts = stmt
            .query_map(
                params![viewer_param(viewer), tag_slug, limit, offset],
                post_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let has_next = posts.len() > page_size as usize;
        posts.truncate(page_size as usize);
        for post in &mut posts {
            post.tags = load_post_tags(&conn, &post.id)?;
        }

        Ok(PostPage {
            posts,
            page,
            has_next,
        })
    }

    async fn create_comment(
        &self,
        post_id: &str,
        author: &UserId,
        body: &str,
    ) -> Result<CommentRecord, RepositoryError> {
        let conn = self.pool.get()?;
        if !entity_exists(&conn, EntityKind::Post, post_id)? {
            return Err(RepositoryError::NotFound(format!("post {}", post_id)));
        }
        let body = validate_text("Comment", body, self.limits.comment_max_len)?;

        let comment_id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO comments (id, post_id, author_id, body) VALUES (?1, ?2, ?3, ?4)",
            params![comment_id, post_id, author.as_str(), body],
        )?;

        load_comment(&conn, &comment_id, Some(author))
    }

    async fn delete_comment(
        &self,
        comment_id: &str,
        actor: &UserId,
    ) -> Result<String, RepositoryError> {
        let conn = self.pool.get()?;
        conn.query_row(
            "DELETE FROM comments WHERE id = ?1 AND author_id = ?2 RETURNING post_id",
            params![comment_id, actor.as_str()],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound(format!("comment {}", comment_id)))
    }

    async fn list_comments(
        &self,
        post_id: &str,
        viewer: Option<&UserId>,
        sort: CommentSort,
    ) -> Result<Vec<CommentRecord>, RepositoryError> {
        let conn = self.pool.get()?;
        if !entity_exists(&conn, EntityKind::Post, post_id)? {
            return Err(RepositoryError::NotFound(format!("post {}", post_id)));
        }

        let (filter, order) = match sort {
            CommentSort::Recent => ("", "created_at DESC, seq DESC"),
            CommentSort::Top => (
                "WHERE like_count > 0",
                "like_count DESC, created_at DESC, seq DESC",
            ),
        };
        let sql = format!(
            "SELECT * FROM ({} WHERE c.post_id = ?2) {} ORDER BY {}",
            comment_select(),
            filter,
            order
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut comments = stmt
            .query_map(params![viewer_param(viewer), post_id], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let sql = format!(
            "{} WHERE c.post_id = ?2 ORDER BY r.created_at ASC, r.rowid ASC",
            reply_select()
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut replies: HashMap<String, Vec<ReplyRecord>> = HashMap::new();
        for reply in stmt.query_map(params![viewer_param(viewer), post_id], reply_from_row)? {
            let reply = reply?;
            replies.entry(reply.comment_id.clone()).or_default().push(reply);
        }
        for comment in &mut comments {
            comment.replies = replies.remove(&comment.id).unwrap_or_default();
        }

        Ok(comments)
    }

    async fn create_reply(
        &self,
        comment_id: &str,
        author: &UserId,
        body: &str,
    ) -> Result<ReplyRecord, RepositoryError> {
        let conn = self.pool.get()?;
        if !entity_exists(&conn, EntityKind::Comment, comment_id)? {
            return Err(RepositoryError::NotFound(format!("comment {}", comment_id)));
        }
        let body = validate_text("Reply", body, self.limits.comment_max_len)?;

        let reply_id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO replies (id, comment_id, author_id, body) VALUES (?1, ?2, ?3, ?4)",
            params![reply_id, comment_id, author.as_str(), body],
        )?;

        load_reply(&conn, &reply_id, Some(author))
    }

    async fn delete_reply(
        &self,
        reply_id: &str,
        actor: &UserId,
    ) -> Result<String, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let post_id: Option<String> = tx
            .query_row(
                "SELECT c.post_id FROM replies r
                 JOIN comments c ON c.id = r.comment_id
                 WHERE r.id = ?1 AND r.author_id = ?2",
                params![reply_id, actor.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let post_id =
            post_id.ok_or_else(|| RepositoryError::NotFound(format!("reply {}", reply_id)))?;
        tx.execute("DELETE FROM replies WHERE id = ?1", params![reply_id])?;
        tx.commit()?;
        Ok(post_id)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT t.id, t.name, t.icon, t.slug, t.display_order FROM tags t ORDER BY {TAG_ORDER}"
        ))?;
        let tags = stmt
            .query_map([], tag_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    async fn tag_by_slug(&self, slug: &str) -> Result<Tag, RepositoryError> {
        let conn = self.pool.get()?;
        conn.query_row(
            "SELECT id, name, icon, slug, display_order FROM tags WHERE slug = ?1",
            params![slug],
            tag_from_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound(format!("tag {}", slug)))
    }

    async fn upsert_tag(&self, seed: &TagSeed) -> Result<Tag, RepositoryError> {
        validate_slug(&seed.slug)?;
        let name = validate_text("Tag name", &seed.name, TAG_SLUG_MAX_LEN)?;

        let conn = self.pool.get()?;
        let tag = conn.query_row(
            "INSERT INTO tags (name, icon, slug, display_order) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(slug) DO UPDATE SET
               name = excluded.name,
               icon = excluded.icon,
               display_order = excluded.display_order
             RETURNING id, name, icon, slug, display_order",
            params![name, seed.icon, seed.slug, seed.order],
            tag_from_row,
        )?;
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn repo() -> SqliteContentRepository {
        let pool = test_pool();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch(
                "INSERT INTO users (id, username, password_hash) VALUES
                     ('ada', 'ada', 'x'), ('bob', 'bob', 'x');",
            )
            .unwrap();
        }
        SqliteContentRepository::new(pool, FeedConfig::default())
    }

    fn meta(title: &str) -> PhotoMetadata {
        PhotoMetadata {
            title: title.to_string(),
            artist: Some("Jo".to_string()),
            image_url: "https://live.staticflickr.com/1/2.jpg".to_string(),
        }
    }

    fn submission(tags: &[&str]) -> NewPost {
        NewPost {
            source_url: "https://www.flickr.com/photos/jo/2".into(),
            body: "golden hour".into(),
            tag_slugs: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    async fn seed_tags(repo: &SqliteContentRepository) {
        for (name, slug, order) in [("Street", "street", Some(2)), ("Night", "night", Some(1)), ("Misc", "misc", None)] {
            repo.upsert_tag(&TagSeed {
                name: name.into(),
                slug: slug.into(),
                icon: None,
                order,
            })
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn tags_sort_by_order_with_unordered_last() {
        let repo = repo();
        seed_tags(&repo).await;
        let slugs: Vec<String> = repo
            .list_tags()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.slug)
            .collect();
        assert_eq!(slugs, vec!["night", "street", "misc"]);
    }

    #[tokio::test]
    async fn upsert_tag_updates_existing_slug() {
        let repo = repo();
        seed_tags(&repo).await;
        let updated = repo
            .upsert_tag(&TagSeed {
                name: "Streets".into(),
                slug: "street".into(),
                icon: Some("icons/street.svg".into()),
                order: Some(9),
            })
            .await
            .unwrap();
        assert_eq!(updated.name, "Streets");
        assert_eq!(repo.list_tags().await.unwrap().len(), 3);
        assert_eq!(repo.tag_by_slug("street").await.unwrap().display_order, Some(9));
    }

    #[tokio::test]
    async fn create_post_stores_metadata_and_tags() {
        let repo = repo();
        seed_tags(&repo).await;
        let ada = UserId::new("ada");
        let post = repo
            .create_post(&ada, submission(&["street", "night"]), meta("Harbour"))
            .await
            .unwrap();

        assert_eq!(post.title, "Harbour");
        assert_eq!(post.artist.as_deref(), Some("Jo"));
        assert_eq!(post.body, "golden hour");
        assert!(post.is_authored_by(&ada));
        let slugs: Vec<&str> = post.tags.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, vec!["night", "street"]);
        assert_eq!(post.likes, LikeState::default());
    }

    #[tokio::test]
    async fn create_post_rejects_unknown_tag() {
        let repo = repo();
        let err = repo
            .create_post(&UserId::new("ada"), submission(&["nope"]), meta("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
    }

    #[tokio::test]
    async fn only_the_author_can_edit() {
        let repo = repo();
        seed_tags(&repo).await;
        let ada = UserId::new("ada");
        let post = repo
            .create_post(&ada, submission(&["street"]), meta("Harbour"))
            .await
            .unwrap();

        let edit = PostEdit {
            body: "blue hour".into(),
            tag_slugs: vec!["misc".into()],
        };
        let err = repo
            .edit_post(&post.id, &UserId::new("bob"), edit.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));

        let edited = repo.edit_post(&post.id, &ada, edit).await.unwrap();
        assert_eq!(edited.body, "blue hour");
        assert_eq!(edited.tags.len(), 1);
        assert_eq!(edited.tags[0].slug, "misc");
    }

    #[tokio::test]
    async fn stranger_delete_looks_like_missing_post() {
        let repo = repo();
        let post = repo
            .create_post(&UserId::new("ada"), submission(&[]), meta("Harbour"))
            .await
            .unwrap();
        let err = repo
            .delete_post(&post.id, &UserId::new("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
        assert!(repo.get_post(&post.id, None).await.is_ok());
    }

    #[tokio::test]
    async fn feed_pages_newest_first_and_filters_by_tag() {
        let repo = repo();
        seed_tags(&repo).await;
        let ada = UserId::new("ada");
        for i in 0..5 {
            let tags: &[&str] = if i % 2 == 0 { &["street"] } else { &[] };
            repo.create_post(&ada, submission(tags), meta(&format!("p{}", i)))
                .await
                .unwrap();
        }

        let first = repo.list_posts(None, 1, 3, None).await.unwrap();
        let titles: Vec<&str> = first.posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["p4", "p3", "p2"]);
        assert_eq!(first.next_page(), Some(2));

        let second = repo.list_posts(None, 2, 3, None).await.unwrap();
        assert_eq!(second.posts.len(), 2);
        assert!(!second.has_next);

        let past_end = repo.list_posts(None, 3, 3, None).await.unwrap();
        assert!(past_end.posts.is_empty());

        let street = repo.list_posts(Some("street"), 1, 3, None).await.unwrap();
        let titles: Vec<&str> = street.posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["p4", "p2", "p0"]);
        assert!(!street.has_next);
    }

    #[tokio::test]
    async fn feed_with_unknown_tag_is_not_found() {
        let repo = repo();
        let err = repo.list_posts(Some("ghost"), 1, 3, None).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn comment_and_reply_bodies_are_limited() {
        let repo = repo();
        let ada = UserId::new("ada");
        let post = repo
            .create_post(&ada, submission(&[]), meta("Harbour"))
            .await
            .unwrap();
        let long = "x".repeat(151);
        assert!(matches!(
            repo.create_comment(&post.id, &ada, &long).await,
            Err(RepositoryError::Validation(_))
        ));
        let comment = repo.create_comment(&post.id, &ada, "ok").await.unwrap();
        assert!(matches!(
            repo.create_reply(&comment.id, &ada, "  ").await,
            Err(RepositoryError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn comments_carry_replies_oldest_first() {
        let repo = repo();
        let ada = UserId::new("ada");
        let bob = UserId::new("bob");
        let post = repo
            .create_post(&ada, submission(&[]), meta("Harbour"))
            .await
            .unwrap();
        let older = repo.create_comment(&post.id, &bob, "first").await.unwrap();
        let newer = repo.create_comment(&post.id, &ada, "second").await.unwrap();
        repo.create_reply(&older.id, &ada, "r1").await.unwrap();
        let r2 = repo.create_reply(&older.id, &bob, "r2").await.unwrap();
        assert_eq!(r2.post_id, post.id);

        let comments = repo
            .list_comments(&post.id, None, CommentSort::Recent)
            .await
            .unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].id, newer.id);
        assert!(comments[0].replies.is_empty());
        let bodies: Vec<&str> = comments[1].replies.iter().map(|r| r.body.as_str()).collect();
        assert_eq!(bodies, vec!["r1", "r2"]);

        let post = repo.get_post(&post.id, None).await.unwrap();
        assert_eq!(post.comment_count, 2);
    }

    #[tokio::test]
    async fn deleting_comment_and_reply_reports_parent_post() {
        let repo = repo();
        let ada = UserId::new("ada");
        let bob = UserId::new("bob");
        let post = repo
            .create_post(&ada, submission(&[]), meta("Harbour"))
            .await
            .unwrap();
        let comment = repo.create_comment(&post.id, &bob, "hi").await.unwrap();
        let reply = repo.create_reply(&comment.id, &ada, "hey").await.unwrap();

        assert!(repo.delete_reply(&reply.id, &bob).await.is_err());
        assert_eq!(repo.delete_reply(&reply.id, &ada).await.unwrap(), post.id);

        assert!(repo.delete_comment(&comment.id, &ada).await.is_err());
        assert_eq!(repo.delete_comment(&comment.id, &bob).await.unwrap(), post.id);
        assert!(repo
            .list_comments(&post.id, None, CommentSort::Recent)
            .await
            .unwrap()
            .is_empty());
    }
}
