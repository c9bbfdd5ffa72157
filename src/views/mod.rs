pub mod forms;

use axum::Router;
use axum::routing::get;

use crate::state::SharedState;

pub fn view_routes() -> Router<SharedState> {
    Router::new().route("/forms/{form_id}", get(forms::form_page))
}
