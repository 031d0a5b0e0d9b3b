use askama::Template;
use axum::extract::{Path, Query, RawForm, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::content::{CommentSort, NewPost, PostEdit};
use crate::db::RepositoryError;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, HxRequest, MaybeUser};
use crate::routes::home::Html;
use crate::routes::views::{CommentView, PostView, TagOption};
use crate::state::AppState;

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/post_create.html")]
pub struct PostCreateTemplate {
    pub username: Option<String>,
    pub tags: Vec<TagOption>,
    pub source_url: String,
    pub body: String,
    pub error: String,
    /// The photo page could not be read; offer to submit again as is.
    pub fetch_failed: bool,
    pub body_max_len: usize,
}

#[derive(Template)]
#[template(path = "pages/post_edit.html")]
pub struct PostEditTemplate {
    pub username: Option<String>,
    pub post_id: String,
    pub title: String,
    pub image_url: String,
    pub tags: Vec<TagOption>,
    pub body: String,
    pub error: String,
    pub body_max_len: usize,
}

#[derive(Template)]
#[template(path = "pages/post_page.html")]
pub struct PostPageTemplate {
    pub username: Option<String>,
    pub post: PostView,
    pub post_id: String,
    pub comments: Vec<CommentView>,
    pub top: bool,
    pub can_comment: bool,
    pub comment_max_len: usize,
}

#[derive(Template)]
#[template(path = "components/comment_list.html")]
pub struct CommentListTemplate {
    pub post_id: String,
    pub comments: Vec<CommentView>,
    pub top: bool,
    pub can_comment: bool,
    pub comment_max_len: usize,
}

// --- Forms ---

/// Fields of the create/edit forms. Tags arrive as repeated `tag` keys,
/// which is why this is parsed from the raw body.
#[derive(Debug, Default, PartialEq)]
pub struct PostForm {
    pub source_url: String,
    pub body: String,
    pub tags: Vec<String>,
}

impl PostForm {
    pub fn parse(raw: &[u8]) -> Self {
        let mut form = PostForm::default();
        for (key, value) in url::form_urlencoded::parse(raw) {
            match key.as_ref() {
                "source_url" => form.source_url = value.into_owned(),
                "body" => form.body = value.into_owned(),
                "tag" => form.tags.push(value.into_owned()),
                _ => {}
            }
        }
        form
    }
}

#[derive(Deserialize, Default)]
pub struct PostQuery {
    pub top: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/create", get(create_page).post(create_post))
        .route("/post/{id}", get(post_page))
        .route("/post/{id}/edit", get(edit_page).post(edit_post))
        .route("/post/{id}/delete", post(delete_post))
}

// --- Handlers ---

async fn create_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Html<PostCreateTemplate>> {
    let tags = state.content.list_tags().await?;
    Ok(Html(PostCreateTemplate {
        username: Some(user.username),
        tags: TagOption::list(tags, &[]),
        source_url: String::new(),
        body: String::new(),
        error: String::new(),
        fetch_failed: false,
        body_max_len: state.config.feed.post_body_max_len,
    }))
}

/// Validate, fetch the photo page, then store. Any failure re-renders the
/// form with what the user typed.
async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    RawForm(raw): RawForm,
) -> AppResult<Response> {
    let form = PostForm::parse(&raw);
    let submission = NewPost {
        source_url: form.source_url.clone(),
        body: form.body.clone(),
        tag_slugs: form.tags.clone(),
    };

    let submission = match submission.validated(&state.config.feed) {
        Ok(s) => s,
        Err(invalid) => {
            return rejected_create(&state, user.username, &form, invalid.0, false).await
        }
    };

    let metadata = match state.fetcher.fetch(&submission.source_url).await {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(source_url = %submission.source_url, "Photo page fetch failed: {}", e);
            let message = format!("Could not read the photo page ({}).", e);
            return rejected_create(&state, user.username, &form, message, true).await;
        }
    };

    match state.content.create_post(&user.id, submission, metadata).await {
        Ok(post) => Ok(Redirect::to(&format!("/post/{}", post.id)).into_response()),
        Err(RepositoryError::Validation(msg)) => {
            rejected_create(&state, user.username, &form, msg, false).await
        }
        Err(e) => Err(e.into()),
    }
}

/// The create form again, with the submitted values and what went wrong.
async fn rejected_create(
    state: &AppState,
    username: String,
    form: &PostForm,
    error: String,
    fetch_failed: bool,
) -> AppResult<Response> {
    let tags = state.content.list_tags().await?;
    let status = if fetch_failed {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((
        status,
        Html(PostCreateTemplate {
            username: Some(username),
            tags: TagOption::list(tags, &form.tags),
            source_url: form.source_url.clone(),
            body: form.body.clone(),
            error,
            fetch_failed,
            body_max_len: state.config.feed.post_body_max_len,
        }),
    )
        .into_response())
}

async fn post_page(
    State(state): State<AppState>,
    user: MaybeUser,
    HxRequest(is_htmx): HxRequest,
    Path(id): Path<String>,
    Query(query): Query<PostQuery>,
) -> AppResult<Response> {
    let viewer = user.id();
    let top = query.top.is_some();
    let sort = if top {
        CommentSort::Top
    } else {
        CommentSort::Recent
    };

    let post = state.content.get_post(&id, viewer).await?;
    let comments = state
        .content
        .list_comments(&id, viewer, sort)
        .await?
        .into_iter()
        .map(|c| CommentView::from_record(c, viewer))
        .collect();
    let comment_max_len = state.config.feed.comment_max_len;

    if is_htmx {
        return Ok(Html(CommentListTemplate {
            post_id: id,
            comments,
            top,
            can_comment: viewer.is_some(),
            comment_max_len,
        })
        .into_response());
    }

    Ok(Html(PostPageTemplate {
        username: user.username(),
        post: PostView::from_record(post, viewer),
        post_id: id,
        comments,
        top,
        can_comment: viewer.is_some(),
        comment_max_len,
    })
    .into_response())
}

async fn edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Html<PostEditTemplate>> {
    let post = state.content.get_post(&id, Some(&user.id)).await?;
    if !post.is_authored_by(&user.id) {
        return Err(AppError::NotFound);
    }

    let selected: Vec<String> = post.tags.iter().map(|t| t.slug.clone()).collect();
    let tags = state.content.list_tags().await?;
    Ok(Html(PostEditTemplate {
        username: Some(user.username),
        post_id: post.id,
        title: post.title,
        image_url: post.image_url,
        tags: TagOption::list(tags, &selected),
        body: post.body,
        error: String::new(),
        body_max_len: state.config.feed.post_body_max_len,
    }))
}

async fn edit_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    RawForm(raw): RawForm,
) -> AppResult<Response> {
    let form = PostForm::parse(&raw);
    let edit = PostEdit {
        body: form.body.clone(),
        tag_slugs: form.tags.clone(),
    };

    match state.content.edit_post(&id, &user.id, edit).await {
        Ok(post) => Ok(Redirect::to(&format!("/post/{}", post.id)).into_response()),
        Err(RepositoryError::Validation(error)) => {
            // the repository checked ownership before validating
            let post = state.content.get_post(&id, Some(&user.id)).await?;
            let tags = state.content.list_tags().await?;
            Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(PostEditTemplate {
                    username: Some(user.username),
                    post_id: post.id,
                    title: post.title,
                    image_url: post.image_url,
                    tags: TagOption::list(tags, &form.tags),
                    body: form.body,
                    error,
                    body_max_len: state.config.feed.post_body_max_len,
                }),
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    HxRequest(is_htmx): HxRequest,
    Path(id): Path<String>,
) -> AppResult<Response> {
    state.content.delete_post(&id, &user.id).await?;
    if is_htmx {
        return Ok((StatusCode::OK, "").into_response());
    }
    Ok((StatusCode::SEE_OTHER, [(header::LOCATION, "/")], "").into_response())
}
