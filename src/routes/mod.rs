pub mod forms;
pub mod settings;

use axum::Router;
use axum::routing::{get, post};

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route(
            "/api/v1/settings",
            get(settings::get).put(settings::update),
        )
        .route("/api/v1/blocked", get(settings::blocked))
}

pub fn form_routes() -> Router<SharedState> {
    Router::new().route("/forms/{form_id}", post(forms::submit))
}
