use askama::Template;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::{session, users};
use crate::config::AuthConfig;
use crate::db::RepositoryError;
use crate::error::{AppError, AppResult};
use crate::extractors::{cookie_value, CurrentUser, MaybeUser};
use crate::routes::home::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub username: Option<String>,
    pub form_username: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub username: Option<String>,
    pub form_username: String,
    pub error: Option<String>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

// -- Cookie helpers --

fn session_cookie(auth: &AuthConfig, token: &str) -> String {
    let max_age_secs = auth.session_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        auth.cookie_name, token, max_age_secs
    )
}

fn clear_session_cookie(auth: &AuthConfig) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        auth.cookie_name
    )
}

fn signed_in_redirect(auth: &AuthConfig, token: &str) -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (header::SET_COOKIE, session_cookie(auth, token)),
        ],
        "",
    )
        .into_response()
}

fn signed_out_redirect(auth: &AuthConfig) -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (header::SET_COOKIE, clear_session_cookie(auth)),
        ],
        "",
    )
        .into_response()
}

// -- Signup --

/// GET /auth/signup
pub async fn signup_page(MaybeUser(user): MaybeUser) -> Html<SignupTemplate> {
    Html(SignupTemplate {
        username: user.map(|u| u.username),
        form_username: String::new(),
        error: None,
    })
}

/// POST /auth/signup — create the account and sign straight in
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    let auth = &state.config.auth;
    let user = match users::create_user(&state.db, &form.username, &form.password, auth.bcrypt_cost)
    {
        Ok(user) => user,
        Err(RepositoryError::Validation(msg)) => {
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(SignupTemplate {
                    username: None,
                    form_username: form.username,
                    error: Some(msg),
                }),
            )
                .into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let token = session::create_session(&state.db, &user.id, auth.session_hours)?;
    Ok(signed_in_redirect(auth, &token))
}

// -- Login --

/// GET /auth/login
pub async fn login_page(MaybeUser(user): MaybeUser) -> Html<LoginTemplate> {
    Html(LoginTemplate {
        username: user.map(|u| u.username),
        form_username: String::new(),
        error: None,
    })
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    let auth = &state.config.auth;
    let Some(user) = users::verify_credentials(&state.db, &form.username, &form.password)? else {
        tracing::info!(username = %form.username, "Failed login");
        return Ok((
            StatusCode::UNAUTHORIZED,
            Html(LoginTemplate {
                username: None,
                form_username: form.username,
                error: Some("Wrong username or password".into()),
            }),
        )
            .into_response());
    };

    let token = session::create_session(&state.db, &user.id, auth.session_hours)?;
    tracing::info!(user_id = %user.id, "User signed in");
    Ok(signed_in_redirect(auth, &token))
}

// -- Logout / account deletion --

/// POST /auth/logout — delete session and redirect
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let auth = &state.config.auth;
    if let Some(token) = cookie_value(&headers, &auth.cookie_name) {
        session::delete_session(&state.db, token)?;
    }
    Ok(signed_out_redirect(auth))
}

/// POST /account/delete — the user's posts, comments and replies stay, unattributed
pub async fn delete_account(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Response> {
    users::delete_user(&state.db, &user.id).map_err(|e| match e {
        RepositoryError::NotFound(_) => AppError::Unauthorized,
        other => other.into(),
    })?;
    Ok(signed_out_redirect(&state.config.auth))
}
