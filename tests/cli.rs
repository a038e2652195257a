use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use image::{Rgb, RgbImage};
use ndarray::Array2;
use predicates::prelude::*;
use zip::write::SimpleFileOptions;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

fn make_archive(dir: &Path, n: usize) -> Result<PathBuf> {
    let path = dir.join("faces.zip");
    let file = File::create(&path)?;
    let mut writer = zip::ZipWriter::new(file);
    for i in 0..n {
        let img = RgbImage::from_fn(24, 24, |x, y| {
            Rgb([(i * 37 % 256) as u8, (x * 10) as u8, (y * 10) as u8])
        });
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        writer.start_file(format!("face_{i:04}.png"), SimpleFileOptions::default())?;
        writer.write_all(&buf)?;
    }
    writer.finish()?;
    Ok(path)
}

#[cfg(unix)]
fn stub_montage(dir: &Path) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;
    let script = dir.join("montage-stub.sh");
    fs::write(&script, "#!/bin/sh\nfor a in \"$@\"; do out=\"$a\"; done\nprintf jpeg > \"$out\"\n")?;
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
    Ok(script)
}

#[test]
fn info_reports_static_corpus() -> Result<()> {
    let data_dir = assert_fs::TempDir::new()?;

    let features = Array2::<f32>::zeros((2500, 8));
    ndarray_npy::write_npy(data_dir.path().join("features.npy"), &features)?;

    cargo_run!("facemap", "-d", data_dir.path(), "info")
        .success()
        .stdout(predicate::str::contains("\"total\": 2500"))
        .stdout(predicate::str::contains("\"002\""));

    Ok(())
}

#[test]
fn info_fails_without_features() -> Result<()> {
    let data_dir = assert_fs::TempDir::new()?;
    cargo_run!("facemap", "-d", data_dir.path(), "info").failure();
    Ok(())
}

#[cfg(unix)]
#[test]
fn ingest_archive() -> Result<()> {
    let data_dir = assert_fs::TempDir::new()?;
    let archive = make_archive(data_dir.path(), 5)?;
    let montage = stub_montage(data_dir.path())?;

    let assert = cargo_run!(
        "facemap",
        "-d",
        data_dir.path(),
        "ingest",
        &archive,
        "--montage-bin",
        &montage,
        "--epochs",
        "20"
    )
    .success();

    // 输出为「句柄 \t 工作目录」，句柄是 32 位十六进制
    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let handle = stdout.split('\t').next().unwrap_or("").trim();
    assert_eq!(handle.len(), 32);

    let workspace = data_dir.path().join("uploads").join(handle);
    assert!(workspace.join("images").join("0000.png").exists());
    assert!(workspace.join("tiles").join("tilemap.jpg").exists());
    assert!(workspace.join("features_pca_reduced.npy").exists());
    assert!(workspace.join("features_umap_reduced.npy").exists());

    Ok(())
}

#[test]
fn ingest_rejects_bad_archive() -> Result<()> {
    let data_dir = assert_fs::TempDir::new()?;
    let archive = data_dir.path().join("bad.zip");
    fs::write(&archive, b"this is not a zip")?;

    cargo_run!("facemap", "-d", data_dir.path(), "ingest", &archive).failure();

    Ok(())
}
