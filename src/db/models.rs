use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engagement::LikeState;

/// Stable user key. Likes and ownership are always keyed by this, never by username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub created_at: String,
}

/// Author of a post, comment or reply as shown to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub username: String,
    /// Profile name, when the author has set one.
    pub display_name: Option<String>,
}

impl Author {
    pub fn shown_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// What a user says about themselves. Every field is optional; a user with
/// no saved profile gets the empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub realname: Option<String>,
    pub image_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub icon: Option<String>,
    pub slug: String,
    pub display_order: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    pub source_url: Option<String>,
    pub image_url: String,
    /// `None` once the author's account is deleted.
    pub author: Option<Author>,
    pub body: String,
    pub created_at: String,
    pub tags: Vec<Tag>,
    pub likes: LikeState,
    pub comment_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub post_id: String,
    pub author: Option<Author>,
    pub body: String,
    pub created_at: String,
    pub likes: LikeState,
    pub replies: Vec<ReplyRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub id: String,
    pub comment_id: String,
    /// Post the parent comment belongs to.
    pub post_id: String,
    pub author: Option<Author>,
    pub body: String,
    pub created_at: String,
    pub likes: LikeState,
}

impl PostRecord {
    pub fn is_authored_by(&self, user: &UserId) -> bool {
        self.author.as_ref().is_some_and(|a| &a.id == user)
    }
}

impl CommentRecord {
    pub fn is_authored_by(&self, user: &UserId) -> bool {
        self.author.as_ref().is_some_and(|a| &a.id == user)
    }
}

impl ReplyRecord {
    pub fn is_authored_by(&self, user: &UserId) -> bool {
        self.author.as_ref().is_some_and(|a| &a.id == user)
    }
}
