use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum_typed_multipart::TypedMultipart;
use log::info;
use ndarray::Array2;
use tokio::task::block_in_place;
use utoipa::OpenApi;

use super::error::{ApiError, Result};
use super::state::AppState;
use super::types::*;
use crate::intake;
use crate::reduce::Method;

fn to_rows(matrix: &Array2<f32>) -> Vec<Vec<f32>> {
    matrix.rows().into_iter().map(|row| row.to_vec()).collect()
}

/// 服务状态，永不被忙碌门拦截，供客户端轮询
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, body = StatusResponse),
    )
)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse { busy: state.gate.is_busy() })
}

/// 参考数据集的总数和 tilemap 范围表
#[utoipa::path(
    get,
    path = "/dataset/info",
    responses(
        (status = 200, body = DatasetInfoResponse),
    )
)]
pub async fn dataset_info_handler(
    State(state): State<Arc<AppState>>,
) -> Json<DatasetInfoResponse> {
    Json(DatasetInfoResponse {
        total: state.corpus.total(),
        ranges: state.corpus.ranges().as_map().clone(),
    })
}

/// 参考数据集的预渲染 tilemap 图片
#[utoipa::path(
    get,
    path = "/tilemaps/{id}",
    params(("id" = String, Path, description = "三位零填充的 tilemap 编号")),
    responses(
        (status = 200, description = "JPEG 图片"),
        (status = 404, description = "tilemap 不存在"),
    )
)]
pub async fn tilemap_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let path = state
        .corpus
        .tilemap_path(&id)
        .ok_or_else(|| ApiError::NotFound(format!("tilemap {id}")))?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::NotFound(format!("tilemap {id}")))?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes))
}

/// 对参考数据集的一段 tilemap 范围做降维
///
/// 重型计算，受忙碌门保护；占用期间的并发请求收到 503。
#[utoipa::path(
    get,
    path = "/features/{method}/{start}/{end}",
    params(
        ("method" = String, Path, description = "降维方法，pca 或 umap"),
        ("start" = String, Path, description = "起始 tilemap 编号"),
        ("end" = String, Path, description = "结束 tilemap 编号（含）"),
    ),
    responses(
        (status = 200, body = ReducedFeaturesResponse),
        (status = 503, description = "有重型计算在执行"),
    )
)]
pub async fn reduced_features_handler(
    State(state): State<Arc<AppState>>,
    Path((method, start, end)): Path<(String, String, String)>,
) -> Result<Json<ReducedFeaturesResponse>> {
    // 参数错误在占用忙碌门之前就报告
    let method: Method = method.parse()?;
    let (start_idx, end_idx) = state.corpus.ranges().resolve(&start, &end)?;
    let tilemap_ids = state.corpus.ranges().ids_in_range(&start, &end)?;

    let _guard = state.gate.try_enter().ok_or(ApiError::Busy)?;
    info!("正在对 {start}..{end} 共 {} 组向量降维（{method}）", end_idx - start_idx);
    let reduced = block_in_place(|| {
        state.pipeline.reduce_matrix(method, state.corpus.slice(start_idx, end_idx))
    })?;

    Ok(Json(ReducedFeaturesResponse {
        total: reduced.nrows(),
        features: to_rows(&reduced),
        tilemap_ids,
    }))
}

/// 上传并摄取一个数据集压缩包
///
/// 校验 → 解包 → tilemap → 特征 → 注册。任何阶段失败都不会注册句柄。
#[utoipa::path(
    post,
    path = "/dataset",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = UploadResponse),
        (status = 503, description = "有重型计算在执行"),
    )
)]
pub async fn upload_dataset_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<UploadRequest>,
) -> Result<Json<UploadResponse>> {
    let stored = intake::accept_upload(
        data.file.metadata.file_name.as_deref(),
        &data.file.contents,
        &state.upload.allowed_exts,
        &state.scratch_dir,
    )?;

    let _guard = state.gate.try_enter().ok_or(ApiError::Busy)?;
    info!("正在摄取上传数据集 {}", stored.file_name);
    let result = block_in_place(|| state.ingestor.ingest(&stored.path, &state.pipeline));
    // 压缩包已经解包进工作目录，暂存文件无论成败都删除
    let _ = stored.discard();
    let (handle, workspace) = result?;
    state.registry.register(handle.clone(), workspace);

    Ok(Json(UploadResponse { id: handle }))
}

/// 上传数据集的降维结果
#[utoipa::path(
    get,
    path = "/dataset/{handle}/features/{method}",
    params(
        ("handle" = String, Path, description = "数据集句柄"),
        ("method" = String, Path, description = "降维方法，pca 或 umap"),
    ),
    responses(
        (status = 200, body = DatasetFeaturesResponse),
        (status = 404, description = "数据集或产物不存在"),
    )
)]
pub async fn dataset_features_handler(
    State(state): State<Arc<AppState>>,
    Path((handle, method)): Path<(String, String)>,
) -> Result<Json<DatasetFeaturesResponse>> {
    let method: Method = method.parse()?;
    let features = state.registry.read_features(&handle, method)?;
    Ok(Json(DatasetFeaturesResponse { total: features.nrows(), features: to_rows(&features) }))
}

/// 上传数据集的 tilemap 图片
#[utoipa::path(
    get,
    path = "/dataset/{handle}/tilemap",
    params(("handle" = String, Path, description = "数据集句柄")),
    responses(
        (status = 200, description = "JPEG 图片"),
        (status = 404, description = "数据集或产物不存在"),
    )
)]
pub async fn dataset_tilemap_handler(
    State(state): State<Arc<AppState>>,
    Path(handle): Path<String>,
) -> Result<impl IntoResponse> {
    let bytes =
        state.registry.read_artifact(&handle, crate::registry::ArtifactKind::Tilemap)?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes))
}

/// OpenAPI 文档
pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(super::ApiDoc::openapi())
}
