use askama::Template;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::post;
use axum::{Form, Router};
use serde::Deserialize;

use crate::db::RepositoryError;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, HxRequest};
use crate::routes::home::Html;
use crate::routes::views::{CommentView, ReplyView};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "components/comment.html")]
pub struct CommentTemplate {
    pub comment: CommentView,
    pub comment_max_len: usize,
}

#[derive(Template)]
#[template(path = "components/reply.html")]
pub struct ReplyTemplate {
    pub reply: ReplyView,
}

/// Validation message swapped into a form's error slot.
#[derive(Template)]
#[template(path = "components/form_error.html")]
pub struct FormErrorTemplate {
    pub message: String,
}

#[derive(Deserialize)]
pub struct BodyForm {
    pub body: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/{id}/comment", post(create_comment))
        .route("/comment/{id}/reply", post(create_reply))
        .route("/comment/{id}/delete", post(delete_comment))
        .route("/reply/{id}/delete", post(delete_reply))
}

fn back_to_post(post_id: &str, anchor: Option<&str>) -> Response {
    let location = match anchor {
        Some(anchor) => format!("/post/{}#{}", post_id, anchor),
        None => format!("/post/{}", post_id),
    };
    Redirect::to(&location).into_response()
}

/// 422 aimed at the element `slot`; pages opt in to swapping 422 responses.
fn inline_error(slot: String, message: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        [("HX-Retarget", slot), ("HX-Reswap", "innerHTML".to_string())],
        Html(FormErrorTemplate { message }),
    )
        .into_response()
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    HxRequest(is_htmx): HxRequest,
    Path(post_id): Path<String>,
    Form(form): Form<BodyForm>,
) -> AppResult<Response> {
    let comment = match state
        .content
        .create_comment(&post_id, &user.id, &form.body)
        .await
    {
        Ok(comment) => comment,
        Err(RepositoryError::Validation(msg)) if is_htmx => {
            return Ok(inline_error(format!("#comment-error-{}", post_id), msg));
        }
        Err(e) => return Err(e.into()),
    };

    if is_htmx {
        let comment = CommentView::from_record(comment, Some(&user.id));
        let comment_max_len = state.config.feed.comment_max_len;
        return Ok(Html(CommentTemplate {
            comment,
            comment_max_len,
        })
        .into_response());
    }
    Ok(back_to_post(&post_id, Some(&format!("comment-{}", comment.id))))
}

async fn create_reply(
    State(state): State<AppState>,
    user: CurrentUser,
    HxRequest(is_htmx): HxRequest,
    Path(comment_id): Path<String>,
    Form(form): Form<BodyForm>,
) -> AppResult<Response> {
    let reply = match state
        .content
        .create_reply(&comment_id, &user.id, &form.body)
        .await
    {
        Ok(reply) => reply,
        Err(RepositoryError::Validation(msg)) if is_htmx => {
            return Ok(inline_error(format!("#reply-error-{}", comment_id), msg));
        }
        Err(e) => return Err(e.into()),
    };

    if is_htmx {
        let reply = ReplyView::from_record(reply, Some(&user.id));
        return Ok(Html(ReplyTemplate { reply }).into_response());
    }
    Ok(back_to_post(&reply.post_id, Some(&format!("reply-{}", reply.id))))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    HxRequest(is_htmx): HxRequest,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post_id = state.content.delete_comment(&id, &user.id).await?;
    if is_htmx {
        return Ok((StatusCode::OK, "").into_response());
    }
    Ok(back_to_post(&post_id, None))
}

async fn delete_reply(
    State(state): State<AppState>,
    user: CurrentUser,
    HxRequest(is_htmx): HxRequest,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post_id = state.content.delete_reply(&id, &user.id).await?;
    if is_htmx {
        return Ok((StatusCode::OK, "").into_response());
    }
    Ok(back_to_post(&post_id, None))
}
