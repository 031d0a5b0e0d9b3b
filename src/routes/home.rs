use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::db::models::Tag;
use crate::error::AppResult;
use crate::extractors::{HxRequest, MaybeUser};
use crate::routes::views::PostView;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub username: Option<String>,
    pub tags: Vec<Tag>,
    pub active_tag: String,
    pub posts: Vec<PostView>,
    pub next_url: String,
}

#[derive(Template)]
#[template(path = "components/post_list.html")]
pub struct PostListTemplate {
    pub posts: Vec<PostView>,
    pub next_url: String,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

#[derive(Deserialize, Default)]
pub struct FeedQuery {
    pub page: Option<u32>,
    pub tag: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/category/{slug}", get(category))
}

/// GET /?page=N&tag=slug
pub async fn index(
    State(state): State<AppState>,
    user: MaybeUser,
    hx: HxRequest,
    Query(query): Query<FeedQuery>,
) -> AppResult<Response> {
    let tag = query.tag.filter(|t| !t.trim().is_empty());
    feed(state, user, hx, tag, query.page.unwrap_or(1)).await
}

/// GET /category/{slug} — same feed, restricted to one tag
pub async fn category(
    State(state): State<AppState>,
    user: MaybeUser,
    hx: HxRequest,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    feed(state, user, hx, Some(slug), query.page.unwrap_or(1)).await
}

async fn feed(
    state: AppState,
    user: MaybeUser,
    HxRequest(is_htmx): HxRequest,
    tag: Option<String>,
    page: u32,
) -> AppResult<Response> {
    // pages start at 1; anything outside the feed is an empty body
    if page == 0 {
        return Ok((StatusCode::OK, "").into_response());
    }

    let viewer = user.id();
    let feed = state
        .content
        .list_posts(tag.as_deref(), page, state.config.feed.page_size, viewer)
        .await?;
    if feed.posts.is_empty() && page > 1 {
        return Ok((StatusCode::OK, "").into_response());
    }

    let next_url = match feed.next_page() {
        Some(next) => match &tag {
            Some(slug) => format!("/?page={}&tag={}", next, slug),
            None => format!("/?page={}", next),
        },
        None => String::new(),
    };
    let posts = feed
        .posts
        .into_iter()
        .map(|p| PostView::from_record(p, viewer))
        .collect();

    if is_htmx {
        return Ok(Html(PostListTemplate { posts, next_url }).into_response());
    }

    let tags = state.content.list_tags().await?;
    Ok(Html(HomeTemplate {
        username: user.username(),
        tags,
        active_tag: tag.unwrap_or_default(),
        posts,
        next_url,
    })
    .into_response())
}
