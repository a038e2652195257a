use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::reduce::Method;

static DATA_DIR: LazyLock<DataDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "", "facemap").expect("failed to get project dir");
    DataDir { path: proj_dirs.data_dir().to_path_buf() }
});

fn default_data_dir() -> &'static str {
    DATA_DIR.path().to_str().unwrap()
}

/// 特征流水线参数
#[derive(Parser, Debug, Clone)]
pub struct PipelineOptions {
    /// 图片送入嵌入模型前统一缩放到的边长
    #[arg(long, value_name = "N", default_value_t = 224)]
    pub image_edge: u32,
    /// 缩略图嵌入的边长，嵌入维度为其平方
    #[arg(long, value_name = "N", default_value_t = 16)]
    pub embed_edge: u32,
    /// umap 近邻数量
    #[arg(long, value_name = "K", default_value_t = 15)]
    pub n_neighbors: usize,
    /// umap 梯度下降轮数
    #[arg(long, value_name = "N", default_value_t = 200)]
    pub epochs: usize,
    /// umap 负采样随机种子
    #[arg(long, value_name = "SEED", default_value_t = 42)]
    pub seed: u64,
}

/// 数据集落盘与 tilemap 渲染参数
#[derive(Parser, Debug, Clone)]
pub struct MaterializeOptions {
    /// 每个数据集最多保留的图片数量，超出部分按文件名顺序丢弃
    #[arg(long, value_name = "N", default_value_t = 1000)]
    pub max_images: usize,
    /// tilemap 网格列数
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub tile_cols: u32,
    /// tilemap 网格行数
    #[arg(long, value_name = "N", default_value_t = 100)]
    pub tile_rows: u32,
    /// 单个 tile 的像素宽度
    #[arg(long, value_name = "PX", default_value_t = 64)]
    pub tile_width: u32,
    /// 单个 tile 的像素高度
    #[arg(long, value_name = "PX", default_value_t = 64)]
    pub tile_height: u32,
    /// 外部 montage 工具的可执行文件
    #[arg(long, value_name = "BIN", default_value = "montage")]
    pub montage_bin: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { image_edge: 224, embed_edge: 16, n_neighbors: 15, epochs: 200, seed: 42 }
    }
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            max_images: 1000,
            tile_cols: 10,
            tile_rows: 100,
            tile_width: 64,
            tile_height: 64,
            montage_bin: "montage".to_string(),
        }
    }
}

/// 上传接口参数
#[derive(Parser, Debug, Clone)]
pub struct UploadOptions {
    /// 允许上传的压缩包扩展名
    #[arg(long = "allowed-ext", value_name = "EXT", default_values_t = [String::from("zip")])]
    pub allowed_exts: Vec<String>,
    /// 请求体大小上限，单位为字节
    #[arg(long, value_name = "BYTES", default_value_t = 100 * 1024 * 1024)]
    pub body_limit: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self { allowed_exts: vec!["zip".to_string()], body_limit: 100 * 1024 * 1024 }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "facemap", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// facemap 数据目录
    #[arg(short, long, default_value = default_data_dir())]
    pub data_dir: DataDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 启动 HTTP 服务
    Server(ServerCommand),
    /// 离线摄取一个压缩包数据集
    Ingest(IngestCommand),
    /// 打印参考数据集的元信息
    Info(InfoCommand),
}

/// 数据目录及其内部布局
#[derive(Debug, Clone)]
pub struct DataDir {
    path: PathBuf,
}

impl DataDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 参考数据集的预计算特征矩阵
    pub fn features_npy(&self) -> PathBuf {
        self.path.join("features.npy")
    }

    /// 参考数据集的预渲染 tilemap 目录
    pub fn tilemaps(&self) -> PathBuf {
        self.path.join("tilemaps")
    }

    /// 上传数据集的工作目录
    pub fn uploads(&self) -> PathBuf {
        self.path.join("uploads")
    }

    /// 上传压缩包的暂存目录
    pub fn scratch(&self) -> PathBuf {
        self.path.join("scratch")
    }

    /// 指定数据集的工作目录
    pub fn workspace(&self, handle: &str) -> PathBuf {
        self.uploads().join(handle)
    }
}

impl FromStr for DataDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

/// 降维产物的文件名，上传数据集和参考数据集共用同一套命名
pub fn reduced_features_file(method: Method) -> String {
    format!("features_{method}_reduced.npy")
}
