pub mod assets;
pub mod auth;
pub mod backend;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod reconciler;
pub mod remote;
pub mod store;
pub mod validate;
pub mod view;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use backend::Backend;

#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub base_path: Arc<String>,
    pub api_key: Option<Arc<str>>,
}

pub fn create_app(state: AppState) -> Router {
    let base_path = state.base_path.clone();

    let api_routes = Router::new()
        .route("/auth/signup", post(handlers::auth::sign_up))
        .route("/auth/signin", post(handlers::auth::sign_in))
        .route("/auth/signout", post(handlers::auth::sign_out))
        .route("/auth/session", get(handlers::auth::session))
        .route("/auth/oauth/{provider}", get(handlers::auth::oauth))
        .route(
            "/todos",
            get(handlers::api::list_todos).post(handlers::api::create_todo),
        )
        .route(
            "/todos/{id}",
            put(handlers::api::update_todo).delete(handlers::api::delete_todo),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_api_key,
        ));

    let app_routes = Router::new()
        .route("/", get(handlers::web::index))
        .route("/todos", get(handlers::web::todos_page))
        .nest("/api", api_routes)
        .layer(
            tower::ServiceBuilder::new()
                .layer(tower_http::trace::TraceLayer::new_for_http())
                .layer(tower_http::compression::CompressionLayer::new()),
        )
        .with_state(state);

    tracing::info!("base_path: {base_path:?}");

    if base_path.is_empty() {
        app_routes
    } else {
        Router::new().nest(&*base_path, app_routes)
    }
}
