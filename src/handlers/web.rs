use axum::extract::State;
use axum::response::{Html, IntoResponse, Redirect, Response};
use tracing::debug;

use crate::assets::{INDEX_HTML, TODOS_HTML};
use crate::middleware::MaybeUser;
use crate::AppState;

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(inject_page_config(INDEX_HTML, &state))
}

/// Route guard for the protected list page: anonymous visitors go back to
/// the root before anything else happens.
pub async fn todos_page(MaybeUser(user): MaybeUser, State(state): State<AppState>) -> Response {
    if user.is_none() {
        debug!("Anonymous request for /todos, redirecting");
        return Redirect::to(&root_path(&state.base_path)).into_response();
    }
    Html(inject_page_config(TODOS_HTML, &state)).into_response()
}

fn root_path(base_path: &str) -> String {
    if base_path.is_empty() {
        "/".to_string()
    } else {
        base_path.to_string()
    }
}

/// Hands the mount point and the public API key to the page scripts.
fn inject_page_config(html: &str, state: &AppState) -> String {
    let base_path = serde_json::Value::from(state.base_path.as_str());
    let api_key = serde_json::Value::from(state.api_key.as_deref());
    let script = format!(
        r#"<script>window.BASE_PATH = {base_path}; window.API_KEY = {api_key};</script>"#
    );
    html.replace("<head>", &format!("<head>\n    {script}"))
}
