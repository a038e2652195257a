use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// 上传校验错误，全部属于用户输入问题
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("未上传文件")]
    NoFile,
    #[error("文件名不能为空")]
    EmptyFilename,
    #[error("不支持的文件类型: {0}")]
    DisallowedExtension(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 已落盘的上传文件
#[derive(Debug)]
pub struct StoredUpload {
    pub file_name: String,
    pub path: PathBuf,
}

impl StoredUpload {
    /// 删除暂存文件，摄取结束后调用
    pub fn discard(self) -> std::io::Result<()> {
        fs::remove_file(&self.path)
    }
}

/// 校验并暂存一个上传的压缩包
///
/// 只检查扩展名，不检查内容；压缩包是否合法由后续解包阶段判断。
/// 暂存文件名带内容哈希前缀，并发上传同名文件互不覆盖。
pub fn accept_upload(
    file_name: Option<&str>,
    content: &[u8],
    allowed_exts: &[String],
    scratch_dir: &Path,
) -> Result<StoredUpload, IntakeError> {
    if content.is_empty() {
        return Err(IntakeError::NoFile);
    }
    let file_name = sanitize_filename(file_name.unwrap_or_default());
    if file_name.is_empty() {
        return Err(IntakeError::EmptyFilename);
    }

    let ext = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    };
    if !allowed_exts.iter().any(|e| e.eq_ignore_ascii_case(&ext)) {
        return Err(IntakeError::DisallowedExtension(ext));
    }

    fs::create_dir_all(scratch_dir)?;
    let digest = blake3::hash(content).to_hex();
    let path = scratch_dir.join(format!("{}-{file_name}", &digest[..16]));
    fs::write(&path, content)?;
    Ok(StoredUpload { file_name, path })
}

/// 去掉路径部分和不安全字符，只保留 `[A-Za-z0-9._-]`
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    base.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zip_only() -> Vec<String> {
        vec!["zip".to_string()]
    }

    #[test]
    fn accepts_zip() {
        let dir = tempfile::tempdir().unwrap();
        let stored =
            accept_upload(Some("faces.zip"), b"PK\x03\x04", &zip_only(), dir.path()).unwrap();
        assert_eq!(stored.file_name, "faces.zip");
        assert_eq!(fs::read(&stored.path).unwrap(), b"PK\x03\x04");
    }

    #[test]
    fn rejects_disallowed_extension() {
        let dir = tempfile::tempdir().unwrap();
        let err = accept_upload(Some("malware.exe"), b"MZ", &zip_only(), dir.path()).unwrap_err();
        assert!(matches!(err, IntakeError::DisallowedExtension(ext) if ext == "exe"));
        // 没有扩展名同样拒绝
        let err = accept_upload(Some("noext"), b"x", &zip_only(), dir.path()).unwrap_err();
        assert!(matches!(err, IntakeError::DisallowedExtension(_)));
    }

    #[test]
    fn rejects_empty_upload() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            accept_upload(Some("faces.zip"), b"", &zip_only(), dir.path()),
            Err(IntakeError::NoFile)
        ));
        assert!(matches!(
            accept_upload(None, b"x", &zip_only(), dir.path()),
            Err(IntakeError::EmptyFilename)
        ));
        assert!(matches!(
            accept_upload(Some(""), b"x", &zip_only(), dir.path()),
            Err(IntakeError::EmptyFilename)
        ));
    }

    #[test]
    fn sanitizes_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("a\\b\\c.zip"), "c.zip");
        assert_eq!(sanitize_filename("fa ces!?.zip"), "faces.zip");
    }

    #[test]
    fn same_name_uploads_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let first =
            accept_upload(Some("faces.zip"), b"archive-A", &zip_only(), dir.path()).unwrap();
        let second =
            accept_upload(Some("faces.zip"), b"archive-B", &zip_only(), dir.path()).unwrap();

        // 同名不同内容的并发上传各存各的，先到者不被覆盖
        assert_ne!(first.path, second.path);
        assert_eq!(fs::read(&first.path).unwrap(), b"archive-A");
        assert_eq!(fs::read(&second.path).unwrap(), b"archive-B");
    }

    #[test]
    fn discard_removes_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let stored = accept_upload(Some("faces.zip"), b"PK", &zip_only(), dir.path()).unwrap();
        let path = stored.path.clone();
        assert!(path.exists());
        stored.discard().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn stored_file_never_escapes_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let stored =
            accept_upload(Some("../escape.zip"), b"PK", &zip_only(), dir.path()).unwrap();
        assert!(stored.path.starts_with(dir.path()));
        assert_eq!(stored.file_name, "escape.zip");
    }
}
