//! Likes on posts, comments and replies.
//!
//! All three entity kinds share one ledger shape (entity, user, created_at)
//! and one toggle path, selected by [`EntityKind`].

pub mod domain;
pub mod repository;

pub use domain::{plan_toggle, EntityKind, LikeState, ToggleOutcome, Toggled};
pub use repository::{EngagementRepository, SqliteEngagementRepository};
