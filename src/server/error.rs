use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::intake::IntakeError;
use crate::pipeline::{IngestError, PipelineError};
use crate::range::RangeError;
use crate::reduce::ReduceError;
use crate::registry::RegistryError;
use crate::workspace::MaterializeError;

pub type Result<T> = std::result::Result<T, ApiError>;

/// API 错误，携带与故障类别对应的状态码
#[derive(Debug)]
pub enum ApiError {
    /// 有重型计算在执行，客户端应退避重试
    Busy,
    Intake(IntakeError),
    Range(RangeError),
    Reduce(ReduceError),
    Registry(RegistryError),
    Ingest(IngestError),
    NotFound(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Intake(_) | ApiError::Range(_) | ApiError::Reduce(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Registry(_) | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Ingest(IngestError::Materialize(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Ingest(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Busy => "服务器忙，请稍后再试".to_string(),
            ApiError::Intake(e) => e.to_string(),
            ApiError::Range(e) => e.to_string(),
            ApiError::Reduce(e) => e.to_string(),
            ApiError::Registry(e) => e.to_string(),
            ApiError::Ingest(e) => e.to_string(),
            ApiError::NotFound(what) => format!("资源不存在: {what}"),
            ApiError::Internal(e) => format!("内部错误: {e}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        Self::Intake(err)
    }
}

impl From<RangeError> for ApiError {
    fn from(err: RangeError) -> Self {
        Self::Range(err)
    }
}

impl From<ReduceError> for ApiError {
    fn from(err: ReduceError) -> Self {
        Self::Reduce(err)
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        Self::Ingest(err)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self::Ingest(IngestError::Pipeline(err))
    }
}

impl From<MaterializeError> for ApiError {
    fn from(err: MaterializeError) -> Self {
        Self::Ingest(IngestError::Materialize(err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::Busy.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::Intake(IntakeError::NoFile).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Registry(RegistryError::DatasetNotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Ingest(IngestError::Materialize(MaterializeError::EmptyDataset)).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("x")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
