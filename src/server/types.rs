use std::collections::BTreeMap;

use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use serde::Serialize;
use utoipa::ToSchema;

/// 上传数据集的请求参数
#[derive(TryFromMultipart)]
pub struct UploadRequest {
    pub file: FieldData<Bytes>,
}

/// 上传表单（用于 API 文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct UploadForm {
    /// 包含图片的 zip 压缩包
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
}

/// 服务状态
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    /// 是否有重型计算在执行
    pub busy: bool,
}

/// 参考数据集元信息
#[derive(Debug, Serialize, ToSchema)]
pub struct DatasetInfoResponse {
    /// 图片总数
    pub total: usize,
    /// tilemap 编号到 `[start, end)` 索引区间的映射
    pub ranges: BTreeMap<String, (usize, usize)>,
}

/// 参考数据集范围降维的结果
#[derive(Debug, Serialize, ToSchema)]
pub struct ReducedFeaturesResponse {
    /// 每行一个三维坐标
    pub features: Vec<Vec<f32>>,
    /// 行数
    pub total: usize,
    /// 覆盖的 tilemap 编号，升序
    pub tilemap_ids: Vec<String>,
}

/// 上传数据集的降维结果
#[derive(Debug, Serialize, ToSchema)]
pub struct DatasetFeaturesResponse {
    pub features: Vec<Vec<f32>>,
    pub total: usize,
}

/// 摄取成功后的数据集句柄
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    /// 内容哈希派生的句柄，后续读取用它寻址
    pub id: String,
}
