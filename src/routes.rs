use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
};
use tower::Layer;
use tower_http::{
    cors::CorsLayer,
    normalize_path::{NormalizePath, NormalizePathLayer},
    trace::TraceLayer,
};

use crate::{
    AppState,
    config::Config,
    handler::{
        auth::auth_handler, taxonomy::taxonomy_handler, titles::titles_handler,
        users::users_handler,
    },
    models::Taxonomy,
};

/// API routes under `/api/v1`
pub fn create_router(app_state: AppState) -> Router {
    let api_route = Router::new()
        .nest("/auth", auth_handler())
        .nest("/users", users_handler(app_state.clone()))
        .nest(
            "/categories",
            taxonomy_handler(app_state.clone(), Taxonomy::Category),
        )
        .nest("/genres", taxonomy_handler(app_state.clone(), Taxonomy::Genre))
        .nest("/titles", titles_handler(app_state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    Router::new().nest("/api/v1", api_route)
}

/// Allow the configured frontend with credentials, or anyone when unset
fn cors_layer(config: &Config) -> CorsLayer {
    let Some(frontend_url) = &config.frontend_url else {
        return CorsLayer::permissive();
    };

    let origin = match frontend_url.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(e) => {
            tracing::error!("FRONTEND_URL is not a valid origin, CORS disabled: {}", e);
            return CorsLayer::new();
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
}

/// The whole application: router, CORS, and `/titles/` treated like `/titles`
///
/// Path normalisation has to wrap the router from the outside, otherwise
/// routing happens before the slash is trimmed.
pub fn create_app(app_state: AppState) -> NormalizePath<Router> {
    let cors = cors_layer(&app_state.env);
    let router = create_router(app_state).layer(cors);

    NormalizePathLayer::trim_trailing_slash().layer(router)
}
