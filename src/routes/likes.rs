use axum::extract::{Path, State};
use axum::routing::post;
use axum::Router;

use crate::engagement::{EntityKind, ToggleOutcome};
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::home::Html;
use crate::routes::views::LikesTemplate;
use crate::state::AppState;

/// `POST /{post,comment,reply}/{id}/like`, one route per entity kind.
pub fn router() -> Router<AppState> {
    EntityKind::ALL
        .into_iter()
        .fold(Router::new(), |router, kind| {
            router.route(
                &format!("/{}/{{id}}/like", kind.path_segment()),
                post(
                    move |state: State<AppState>, user: CurrentUser, id: Path<String>| {
                        toggle_like(kind, state, user, id)
                    },
                ),
            )
        })
}

async fn toggle_like(
    kind: EntityKind,
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Html<LikesTemplate>> {
    let toggled = state.engagement.toggle(kind, &id, &user.id).await?;
    let can_like = toggled.outcome != ToggleOutcome::SelfLikeIgnored;
    Ok(Html(LikesTemplate::new(kind, &id, toggled.state, can_like)))
}
