use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::server::ServerCommand;
use crate::config::{DataDir, UploadOptions};
use crate::corpus::StaticCorpus;
use crate::gate::BusyGate;
use crate::pipeline::{FeaturePipeline, Ingestor};
use crate::registry::DatasetRegistry;

/// 应用状态，启动时组装一次，所有依赖显式注入
pub struct AppState {
    /// 静态参考数据集
    pub corpus: StaticCorpus,
    /// 重型计算的单飞门
    pub gate: BusyGate,
    /// 上传数据集注册表
    pub registry: DatasetRegistry,
    /// 特征流水线
    pub pipeline: FeaturePipeline,
    /// 摄取流程
    pub ingestor: Ingestor,
    /// 上传接口配置
    pub upload: UploadOptions,
    /// 上传压缩包的暂存目录
    pub scratch_dir: PathBuf,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(corpus: StaticCorpus, opts: &ServerCommand, data_dir: &DataDir) -> Arc<Self> {
        Arc::new(AppState {
            corpus,
            gate: BusyGate::new(),
            registry: DatasetRegistry::new(),
            pipeline: FeaturePipeline::new(&opts.pipeline),
            ingestor: Ingestor {
                uploads_dir: data_dir.uploads(),
                materialize: opts.materialize.clone(),
            },
            upload: opts.upload.clone(),
            scratch_dir: data_dir.scratch(),
        })
    }
}
