use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};

use crate::auth::profiles::{self, ProfileEdit, BIO_MAX_LEN, REALNAME_MAX_LEN};
use crate::db::RepositoryError;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::home::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/profile_edit.html")]
pub struct ProfileEditTemplate {
    pub username: Option<String>,
    pub realname: String,
    pub image_url: String,
    pub bio: String,
    pub error: String,
    pub realname_max_len: usize,
    pub bio_max_len: usize,
}

impl ProfileEditTemplate {
    fn new(username: String, form: ProfileEdit, error: String) -> Self {
        Self {
            username: Some(username),
            realname: form.realname,
            image_url: form.image_url,
            bio: form.bio,
            error,
            realname_max_len: REALNAME_MAX_LEN,
            bio_max_len: BIO_MAX_LEN,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/profile/edit", get(edit_page).post(save))
}

async fn edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Html<ProfileEditTemplate>> {
    let profile = profiles::get_profile(&state.db, &user.id)?;
    let form = ProfileEdit {
        realname: profile.realname.unwrap_or_default(),
        image_url: profile.image_url.unwrap_or_default(),
        bio: profile.bio.unwrap_or_default(),
    };
    Ok(Html(ProfileEditTemplate::new(user.username, form, String::new())))
}

async fn save(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<ProfileEdit>,
) -> AppResult<Response> {
    match profiles::save_profile(&state.db, &user.id, &form) {
        Ok(_) => Ok(Redirect::to("/profile/edit").into_response()),
        Err(RepositoryError::Validation(error)) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(ProfileEditTemplate::new(user.username, form, error)),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}
