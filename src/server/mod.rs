mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::status_handler,
        api::dataset_info_handler,
        api::tilemap_handler,
        api::reduced_features_handler,
        api::upload_dataset_handler,
        api::dataset_features_handler,
        api::dataset_tilemap_handler,
    ),
    components(schemas(types::UploadForm,))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    let body_limit = state.upload.body_limit;
    Router::new()
        .route("/status", get(api::status_handler))
        .route("/dataset/info", get(api::dataset_info_handler))
        .route("/tilemaps/{id}", get(api::tilemap_handler))
        .route("/features/{method}/{start}/{end}", get(api::reduced_features_handler))
        .route("/dataset", post(api::upload_dataset_handler))
        .route("/dataset/{handle}/features/{method}", get(api::dataset_features_handler))
        .route("/dataset/{handle}/tilemap", get(api::dataset_tilemap_handler))
        .route("/api-docs/openapi.json", get(api::openapi_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
