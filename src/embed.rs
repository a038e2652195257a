use std::path::{Path, PathBuf};

use image::DynamicImage;
use image::imageops::FilterType;
use ndarray::prelude::*;
use rayon::prelude::*;
use thiserror::Error;

use crate::utils;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("图片解码失败 {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("目录中没有可用图片")]
    Empty,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 嵌入模型的接入点
///
/// 生产环境在这里接 CNN 推理，单元测试和默认配置用 [`ThumbnailEmbedder`]。
/// 实现必须对同一输入返回同一向量。
pub trait Embedder: Send + Sync {
    /// 嵌入向量的维度
    fn dim(&self) -> usize;
    /// 对单张图片计算嵌入向量
    fn embed(&self, image: &DynamicImage) -> Array1<f32>;
}

/// 缩略图嵌入：灰度缩放到 `edge × edge` 后展平为归一化亮度向量
///
/// 没有语义信息，但对亮度和构图敏感，足以支撑布局可视化。
#[derive(Debug, Clone)]
pub struct ThumbnailEmbedder {
    pub edge: u32,
}

impl Default for ThumbnailEmbedder {
    fn default() -> Self {
        Self { edge: 16 }
    }
}

impl Embedder for ThumbnailEmbedder {
    fn dim(&self) -> usize {
        (self.edge * self.edge) as usize
    }

    fn embed(&self, image: &DynamicImage) -> Array1<f32> {
        let thumb =
            image.resize_exact(self.edge, self.edge, FilterType::Triangle).to_luma8();
        let mut v = Array1::from_iter(thumb.pixels().map(|p| p.0[0] as f32 / 255.0));
        let norm = v.dot(&v).sqrt();
        if norm > 0.0 {
            v /= norm;
        }
        v
    }
}

/// 按文件名顺序嵌入目录下的全部图片，返回每行一张图的矩阵
///
/// 任何一张图片解码失败都会使整个调用失败，内容校验发生在这里而不是上传时。
pub fn embed_dir(
    embedder: &dyn Embedder,
    dir: &Path,
    image_edge: u32,
) -> Result<Array2<f32>, EmbedError> {
    let files = utils::sorted_files(dir)?;
    if files.is_empty() {
        return Err(EmbedError::Empty);
    }

    let rows = files
        .par_iter()
        .map(|path| {
            let img = image::open(path)
                .map_err(|source| EmbedError::Decode { path: path.clone(), source })?;
            let img = img.resize_exact(image_edge, image_edge, FilterType::Triangle);
            Ok(embedder.embed(&img))
        })
        .collect::<Result<Vec<_>, EmbedError>>()?;

    let mut matrix = Array2::zeros((rows.len(), embedder.dim()));
    for (i, row) in rows.iter().enumerate() {
        matrix.row_mut(i).assign(row);
    }
    Ok(matrix)
}
