//! Posts, comments, replies and tags.

pub mod domain;
pub mod repository;

pub use domain::{CommentSort, Invalid, NewPost, PostEdit, PostPage};
pub use repository::{ContentRepository, SqliteContentRepository};
