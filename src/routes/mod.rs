pub mod assets;
pub mod auth;
pub mod discussion;
pub mod home;
pub mod likes;
pub mod posts;
pub mod profile;
pub mod views;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Every page, fragment and asset route, still waiting for its state.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/assets/{*path}", get(assets::serve))
        .merge(home::router())
        .merge(auth::router())
        .merge(posts::router())
        .merge(discussion::router())
        .merge(likes::router())
        .merge(profile::router())
}
