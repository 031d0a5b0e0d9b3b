use askama::Template;
use chrono::{NaiveDateTime, Utc};

use crate::db::models::{Author, CommentRecord, PostRecord, ReplyRecord, Tag, UserId};
use crate::engagement::{EntityKind, LikeState};

// --- View structs ---

/// Like button + counter for any entity. Rendered standalone as the response
/// to a toggle, and embedded in cards with `{{ likes|safe }}`.
#[derive(Template, Debug, Clone)]
#[template(path = "components/likes.html")]
pub struct LikesTemplate {
    pub kind: &'static str,
    pub entity_id: String,
    pub count: i64,
    pub liked: bool,
    pub can_like: bool,
}

impl LikesTemplate {
    pub fn new(kind: EntityKind, entity_id: &str, state: LikeState, can_like: bool) -> Self {
        Self {
            kind: kind.path_segment(),
            entity_id: entity_id.to_string(),
            count: state.count,
            liked: state.liked,
            can_like,
        }
    }
}

pub struct PostView {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub source_url: String,
    pub image_url: String,
    pub author: String,
    pub body: String,
    pub created_at: String,
    pub tags: Vec<Tag>,
    pub comment_count: i64,
    pub can_edit: bool,
    pub likes: LikesTemplate,
}

pub struct ReplyView {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: String,
    pub can_delete: bool,
    pub likes: LikesTemplate,
}

pub struct CommentView {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: String,
    pub can_delete: bool,
    pub can_reply: bool,
    pub likes: LikesTemplate,
    pub replies: Vec<ReplyView>,
}

/// A tag as a checkbox on the post forms.
pub struct TagOption {
    pub slug: String,
    pub name: String,
    pub checked: bool,
}

impl TagOption {
    pub fn list(tags: Vec<Tag>, selected: &[String]) -> Vec<Self> {
        tags.into_iter()
            .map(|t| TagOption {
                checked: selected.contains(&t.slug),
                slug: t.slug,
                name: t.name,
            })
            .collect()
    }
}

fn author_name(author: &Option<Author>) -> String {
    author
        .as_ref()
        .map(|a| a.shown_name().to_string())
        .unwrap_or_else(|| "[deleted]".to_string())
}

/// Signed-in viewers may like anything they did not write.
fn can_like(author: &Option<Author>, viewer: Option<&UserId>) -> bool {
    match viewer {
        Some(viewer) => author.as_ref().map_or(true, |a| &a.id != viewer),
        None => false,
    }
}

impl PostView {
    pub fn from_record(post: PostRecord, viewer: Option<&UserId>) -> Self {
        let can_edit = viewer.is_some_and(|v| post.is_authored_by(v));
        let likes = LikesTemplate::new(
            EntityKind::Post,
            &post.id,
            post.likes,
            can_like(&post.author, viewer),
        );
        PostView {
            author: author_name(&post.author),
            created_at: age_label(&post.created_at),
            artist: post.artist.unwrap_or_default(),
            source_url: post.source_url.unwrap_or_default(),
            id: post.id,
            title: post.title,
            image_url: post.image_url,
            body: post.body,
            tags: post.tags,
            comment_count: post.comment_count,
            can_edit,
            likes,
        }
    }
}

impl ReplyView {
    pub fn from_record(reply: ReplyRecord, viewer: Option<&UserId>) -> Self {
        let can_delete = viewer.is_some_and(|v| reply.is_authored_by(v));
        let likes = LikesTemplate::new(
            EntityKind::Reply,
            &reply.id,
            reply.likes,
            can_like(&reply.author, viewer),
        );
        ReplyView {
            author: author_name(&reply.author),
            created_at: age_label(&reply.created_at),
            id: reply.id,
            body: reply.body,
            can_delete,
            likes,
        }
    }
}

impl CommentView {
    pub fn from_record(comment: CommentRecord, viewer: Option<&UserId>) -> Self {
        let can_delete = viewer.is_some_and(|v| comment.is_authored_by(v));
        let likes = LikesTemplate::new(
            EntityKind::Comment,
            &comment.id,
            comment.likes,
            can_like(&comment.author, viewer),
        );
        CommentView {
            author: author_name(&comment.author),
            created_at: age_label(&comment.created_at),
            id: comment.id,
            body: comment.body,
            can_delete,
            can_reply: viewer.is_some(),
            likes,
            replies: comment
                .replies
                .into_iter()
                .map(|r| ReplyView::from_record(r, viewer))
                .collect(),
        }
    }
}

// --- Time formatting ---

/// How SQLite's `datetime('now')` stores timestamps.
const STORED_TIME: &str = "%Y-%m-%d %H:%M:%S";

/// Age of a stored timestamp as shown on cards.
pub fn age_label(stored: &str) -> String {
    age_label_at(stored, Utc::now().naive_utc())
}

/// `age_label` against a given clock. Unparseable input is shown as-is;
/// anything a week or older gets a calendar date.
pub fn age_label_at(stored: &str, now: NaiveDateTime) -> String {
    let Ok(then) = NaiveDateTime::parse_from_str(stored, STORED_TIME) else {
        return stored.to_string();
    };
    let age = now - then;
    match age.num_seconds() {
        s if s < 60 => "just now".to_string(),
        s if s < 60 * 60 => format!("{}m ago", age.num_minutes()),
        s if s < 24 * 60 * 60 => format!("{}h ago", age.num_hours()),
        s if s < 7 * 24 * 60 * 60 => format!("{}d ago", age.num_days()),
        _ => then.format("%b %-d, %Y").to_string(),
    }
}

// --- Tests ---

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn author(id: &str) -> Option<Author> {
        Some(Author {
            id: UserId::new(id),
            username: id.to_string(),
            display_name: None,
        })
    }

    fn noon_on_march_10() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn ages_step_through_minutes_hours_and_days() {
        let now = noon_on_march_10();
        let cases = [
            ("2026-03-10 11:59:01", "just now"),
            ("2026-03-10 11:59:00", "1m ago"),
            ("2026-03-10 11:00:01", "59m ago"),
            ("2026-03-10 11:00:00", "1h ago"),
            ("2026-03-09 12:00:01", "23h ago"),
            ("2026-03-09 12:00:00", "1d ago"),
            ("2026-03-03 12:00:01", "6d ago"),
        ];
        for (stored, expected) in cases {
            assert_eq!(age_label_at(stored, now), expected, "for {}", stored);
        }
    }

    #[test]
    fn week_old_content_shows_its_date() {
        let now = noon_on_march_10();
        assert_eq!(age_label_at("2026-03-03 12:00:00", now), "Mar 3, 2026");
        assert_eq!(age_label_at("2025-12-25 08:30:00", now), "Dec 25, 2025");
    }

    #[test]
    fn clock_skew_and_garbage_degrade_gracefully() {
        let now = noon_on_march_10();
        assert_eq!(age_label_at("2026-03-10 12:05:00", now), "just now");
        assert_eq!(age_label_at("yesterday-ish", now), "yesterday-ish");
        assert_eq!(age_label_at("2026-03-10T11:00:00Z", now), "2026-03-10T11:00:00Z");
    }

    #[test]
    fn nobody_can_like_when_signed_out_and_authors_never_can() {
        let ada = UserId::new("ada");
        let bob = UserId::new("bob");
        assert!(!can_like(&author("ada"), None));
        assert!(!can_like(&author("ada"), Some(&ada)));
        assert!(can_like(&author("ada"), Some(&bob)));
        // orphaned content is likeable by anyone signed in
        assert!(can_like(&None, Some(&ada)));
    }

    #[test]
    fn likes_fragment_targets_entity_route() {
        let html = LikesTemplate::new(
            EntityKind::Comment,
            "c1",
            LikeState {
                count: 4,
                liked: true,
            },
            true,
        )
        .render()
        .unwrap();
        assert!(html.contains("/comment/c1/like"));
        assert!(html.contains(">4<"));
    }

    #[test]
    fn authors_show_profile_name_then_username_then_placeholder() {
        assert_eq!(author_name(&None), "[deleted]");
        assert_eq!(author_name(&author("ada")), "ada");
        let named = author("ada").map(|a| Author {
            display_name: Some("Ada Lovelace".into()),
            ..a
        });
        assert_eq!(author_name(&named), "Ada Lovelace");
    }

    #[test]
    fn tag_options_mark_selected() {
        let tags = vec![
            Tag {
                id: 1,
                name: "Street".into(),
                icon: None,
                slug: "street".into(),
                display_order: Some(1),
            },
            Tag {
                id: 2,
                name: "Sky".into(),
                icon: None,
                slug: "sky".into(),
                display_order: None,
            },
        ];
        let options = TagOption::list(tags, &["sky".to_string()]);
        assert!(!options[0].checked);
        assert!(options[1].checked);
    }
}
