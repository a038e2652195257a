use std::path::{Path, PathBuf};

use log::{error, info};
use ndarray::prelude::*;
use ndarray_npy::write_npy;
use thiserror::Error;

use crate::config::{MaterializeOptions, PipelineOptions};
use crate::embed::{EmbedError, Embedder, ThumbnailEmbedder, embed_dir};
use crate::reduce::{Method, PcaReducer, ReduceError, Reducer, UmapReducer, standardize};
use crate::utils;
use crate::workspace::{DatasetWorkspace, MaterializeError};

/// 特征流水线内部故障，对外统一视为服务端错误
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("特征提取失败: {0}")]
    Embed(#[from] EmbedError),
    #[error("降维失败: {0}")]
    Reduce(#[from] ReduceError),
    #[error("特征持久化失败: {0}")]
    Persist(#[from] ndarray_npy::WriteNpyError),
}

/// 摄取流程错误，按阶段区分责任归属
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 图片目录 → 嵌入 → 标准化 → 双路降维
///
/// 嵌入模型和降维器都在构造时注入，运行期不再持有可变状态，
/// 可以在线程间共享。
pub struct FeaturePipeline {
    embedder: Box<dyn Embedder>,
    reducers: Vec<Box<dyn Reducer>>,
    image_edge: u32,
}

impl FeaturePipeline {
    pub fn new(opts: &PipelineOptions) -> Self {
        Self {
            embedder: Box::new(ThumbnailEmbedder { edge: opts.embed_edge }),
            reducers: vec![
                Box::new(PcaReducer),
                Box::new(UmapReducer {
                    n_neighbors: opts.n_neighbors,
                    epochs: opts.epochs,
                    seed: opts.seed,
                }),
            ],
            image_edge: opts.image_edge,
        }
    }

    /// 注入自定义嵌入模型
    pub fn with_embedder(mut self, embedder: Box<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    /// 对一个已标准化前的特征矩阵执行指定方法的降维
    ///
    /// 参考数据集的范围查询走这条路径，矩阵不落盘。
    pub fn reduce_matrix(
        &self,
        method: Method,
        x: ArrayView2<f32>,
    ) -> Result<Array2<f32>, PipelineError> {
        let reducer = self
            .reducers
            .iter()
            .find(|r| r.method() == method)
            .ok_or_else(|| ReduceError::UnknownMethod(method.to_string()))?;
        let x = standardize(x);
        Ok(reducer.reduce(x.view())?)
    }

    /// 计算并持久化一个工作目录的全部降维产物
    pub fn compute_and_persist(&self, ws: &DatasetWorkspace) -> Result<(), PipelineError> {
        let x = embed_dir(self.embedder.as_ref(), &ws.images_dir(), self.image_edge)?;
        info!("嵌入完成：{} 张图片，维度 {}", x.nrows(), x.ncols());
        let x = standardize(x.view());

        for reducer in &self.reducers {
            let reduced = reducer.reduce(x.view())?;
            write_npy(ws.reduced_features(reducer.method()), &reduced)?;
            info!("已写入 {} 降维产物（{} 行）", reducer.method(), reduced.nrows());
        }
        Ok(())
    }
}

/// 完整摄取流程：解包 → tilemap → 特征 → 注册前的落盘
///
/// 任意阶段失败都会删除工作目录，不留下可寻址的半成品。
pub struct Ingestor {
    pub uploads_dir: PathBuf,
    pub materialize: MaterializeOptions,
}

impl Ingestor {
    /// 同步执行，调用方负责忙碌门控和 `block_in_place` 包装
    pub fn ingest(
        &self,
        archive: &Path,
        pipeline: &FeaturePipeline,
    ) -> Result<(String, DatasetWorkspace), IngestError> {
        // 句柄取自压缩包内容哈希，与存储路径无关
        let handle = utils::hash_file(archive)?[..32].to_string();
        let ws = DatasetWorkspace::create(self.uploads_dir.join(&handle))?;

        match self.run_stages(archive, &ws, pipeline) {
            Ok(kept) => {
                info!("数据集 {handle} 摄取完成，共 {kept} 张图片");
                Ok((handle, ws))
            }
            Err(e) => {
                error!("数据集 {handle} 摄取失败: {e}");
                let _ = ws.remove();
                Err(e)
            }
        }
    }

    fn run_stages(
        &self,
        archive: &Path,
        ws: &DatasetWorkspace,
        pipeline: &FeaturePipeline,
    ) -> Result<usize, IngestError> {
        let kept = ws.unpack(archive, self.materialize.max_images)?;
        ws.render_tilemap(&self.materialize)?;
        pipeline.compute_and_persist(ws)?;
        Ok(kept)
    }
}
