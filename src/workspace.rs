use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};
use thiserror::Error;

use crate::config::{MaterializeOptions, reduced_features_file};
use crate::reduce::Method;
use crate::utils;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("无法解析压缩包: {0}")]
    BadArchive(#[from] zip::result::ZipError),
    #[error("数据集为空")]
    EmptyDataset,
    #[error("tilemap 生成失败: {0}")]
    Montage(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// 一个已摄取数据集的工作目录
///
/// 布局固定：`images/<0000..>.<ext>`、`tiles/tilemap.jpg`、
/// `features_<method>_reduced.npy`。成功摄取后目录所有权移交注册表，
/// 失败路径由摄取流程负责清理。
#[derive(Debug, Clone)]
pub struct DatasetWorkspace {
    root: PathBuf,
}

impl DatasetWorkspace {
    /// 创建（或复用）一个工作目录并准备内部布局
    pub fn create(root: PathBuf) -> io::Result<Self> {
        let ws = Self { root };
        fs::create_dir_all(ws.images_dir())?;
        fs::create_dir_all(ws.tiles_dir())?;
        Ok(ws)
    }

    /// 打开一个已存在的工作目录，不做任何校验
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn tiles_dir(&self) -> PathBuf {
        self.root.join("tiles")
    }

    pub fn tilemap(&self) -> PathBuf {
        self.tiles_dir().join("tilemap.jpg")
    }

    pub fn reduced_features(&self, method: Method) -> PathBuf {
        self.root.join(reduced_features_file(method))
    }

    /// 把压缩包完整解包进工作目录并整理图片集
    ///
    /// 条目统一展平为文件名（忽略目录结构和隐藏文件），按文件名字典序
    /// 保留前 `max_images` 个，重命名为四位零填充的序号并保留原扩展名，
    /// 超出部分删除。返回保留的图片数量。
    pub fn unpack(&self, archive: &Path, max_images: usize) -> Result<usize, MaterializeError> {
        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(file)?;

        let staging = self.root.join("unpacked");
        fs::create_dir_all(&staging)?;

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let Some(name) = entry
                .enclosed_name()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let mut out = File::create(staging.join(&name))?;
            io::copy(&mut entry, &mut out)?;
        }

        let entries = utils::sorted_files(&staging)?;
        if entries.is_empty() {
            fs::remove_dir_all(&staging)?;
            return Err(MaterializeError::EmptyDataset);
        }

        let kept = entries.len().min(max_images);
        for (seq, path) in entries.iter().take(max_images).enumerate() {
            let dest = match path.extension() {
                Some(ext) => format!("{seq:04}.{}", ext.to_string_lossy().to_lowercase()),
                None => format!("{seq:04}"),
            };
            fs::rename(path, self.images_dir().join(dest))?;
        }
        debug!("保留 {kept} 个条目，丢弃 {} 个", entries.len() - kept);

        // 超出上限的条目随暂存目录一并删除
        fs::remove_dir_all(&staging)?;
        Ok(kept)
    }

    /// 调用外部 montage 工具渲染 tilemap
    pub fn render_tilemap(&self, opts: &MaterializeOptions) -> Result<(), MaterializeError> {
        let images = utils::sorted_files(&self.images_dir())?;
        if images.is_empty() {
            return Err(MaterializeError::EmptyDataset);
        }

        let output = self.tilemap();
        info!("正在渲染 tilemap（{} 张图片）", images.len());
        let status = Command::new(&opts.montage_bin)
            .args(&images)
            .arg("-tile")
            .arg(format!("{}x{}", opts.tile_cols, opts.tile_rows))
            .arg("-geometry")
            .arg(format!("{}x{}+0+0", opts.tile_width, opts.tile_height))
            .arg(&output)
            .status()
            .map_err(|e| MaterializeError::Montage(format!("无法执行 {}: {e}", opts.montage_bin)))?;

        if !status.success() {
            return Err(MaterializeError::Montage(format!("montage 退出状态 {status}")));
        }
        if !output.exists() {
            return Err(MaterializeError::Montage("montage 未生成输出文件".to_string()));
        }
        Ok(())
    }

    /// 删除整个工作目录，仅用于摄取失败后的清理
    pub fn remove(self) -> io::Result<()> {
        fs::remove_dir_all(&self.root)
    }
}
