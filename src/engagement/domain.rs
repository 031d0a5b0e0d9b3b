// Domain types - pure, no side effects
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::models::UserId;

/// The three likeable tiers of a discussion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Post,
    Comment,
    Reply,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Post, EntityKind::Comment, EntityKind::Reply];

    /// Table holding the entities themselves.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Post => "posts",
            EntityKind::Comment => "comments",
            EntityKind::Reply => "replies",
        }
    }

    /// Join table recording who liked what.
    pub fn ledger_table(self) -> &'static str {
        match self {
            EntityKind::Post => "liked_posts",
            EntityKind::Comment => "liked_comments",
            EntityKind::Reply => "liked_replies",
        }
    }

    /// Column in the ledger table pointing back at the entity.
    pub fn ledger_column(self) -> &'static str {
        match self {
            EntityKind::Post => "post_id",
            EntityKind::Comment => "comment_id",
            EntityKind::Reply => "reply_id",
        }
    }

    /// URL segment, as in `/comment/{id}/like`.
    pub fn path_segment(self) -> &'static str {
        match self {
            EntityKind::Post => "post",
            EntityKind::Comment => "comment",
            EntityKind::Reply => "reply",
        }
    }

    /// SQL select-list fragment yielding `like_count` and `liked` for the row
    /// whose id is `entity_col`, with the viewer bound at `viewer_param`.
    pub(crate) fn like_columns(self, entity_col: &str, viewer_param: &str) -> String {
        let ledger = self.ledger_table();
        let fk = self.ledger_column();
        format!(
            "(SELECT COUNT(*) FROM {ledger} l WHERE l.{fk} = {entity_col}) AS like_count,
             EXISTS(SELECT 1 FROM {ledger} l WHERE l.{fk} = {entity_col} AND l.user_id = {viewer_param}) AS liked"
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.path_segment() == s)
            .ok_or_else(|| format!("unknown entity kind: {}", s))
    }
}

/// Like count of an entity and whether the viewer is among the likers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub count: i64,
    pub liked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToggleOutcome {
    Liked,
    Unliked,
    /// The actor wrote the entity; nothing changed.
    SelfLikeIgnored,
}

/// Result of a toggle: what happened plus the state read in the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toggled {
    pub outcome: ToggleOutcome,
    pub state: LikeState,
}

/// Decide what a toggle does. Authors can never like their own content;
/// an orphaned entity (author deleted) is likeable by anyone.
pub fn plan_toggle(author: Option<&UserId>, actor: &UserId, already_liked: bool) -> ToggleOutcome {
    if author == Some(actor) {
        return ToggleOutcome::SelfLikeIgnored;
    }
    if already_liked {
        ToggleOutcome::Unliked
    } else {
        ToggleOutcome::Liked
    }
}
