use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use assert_fs::TempDir;
use image::{ImageFormat, Luma, GrayImage};
use predicates::prelude::*;
use rstest::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

/// 在目录中生成若干图片，并写出对应的清单文件
fn write_dataset(dir: &Path, name: &str, labels: &[&str]) -> Result<PathBuf> {
    let mut lines = vec![];
    for (i, label) in labels.iter().enumerate() {
        let img = GrayImage::from_fn(80 + i as u32 * 10, 24, |x, y| Luma([((x * 3 + y * 5) % 256) as u8]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png)?;
        let path = dir.join(format!("{}_{}.png", name, i));
        fs::write(&path, buf.into_inner())?;
        lines.push(format!("{} {}", path.display(), label));
    }
    let manifest = dir.join(format!("{}.txt", name));
    fs::write(&manifest, lines.join("\n"))?;
    Ok(manifest)
}

#[fixture]
fn work_dir() -> TempDir {
    TempDir::new().unwrap()
}

#[rstest]
fn build_and_read(work_dir: TempDir) -> Result<()> {
    let manifest = write_dataset(work_dir.path(), "part1", &["HELLO", "WORLD"])?;
    let db = work_dir.path().join("db");

    cargo_run!("srstore", "build", &db, &manifest)
        .success()
        .stdout(predicate::str::contains("成功添加: 2"));

    cargo_run!("srstore", "read", &db, "-n", "1")
        .success()
        .stdout(predicate::str::contains("总样本数: 2"))
        .stdout(predicate::str::contains("标签: HELLO"))
        .stdout(predicate::str::contains("WORLD").not());

    Ok(())
}

#[rstest]
fn build_refuses_existing(work_dir: TempDir) -> Result<()> {
    let manifest = write_dataset(work_dir.path(), "part1", &["A"])?;
    let db = work_dir.path().join("db");

    cargo_run!("srstore", "build", &db, &manifest).success();
    cargo_run!("srstore", "build", &db, &manifest).failure();
    cargo_run!("srstore", "count", &db).success().stdout(predicate::str::contains("总计: 1"));

    Ok(())
}

#[rstest]
fn append_reports_totals(work_dir: TempDir) -> Result<()> {
    let part1 = write_dataset(work_dir.path(), "part1", &["HELLO", "WORLD"])?;
    let part2 = write_dataset(work_dir.path(), "part2", &["C", "D", "E"])?;
    let db = work_dir.path().join("db");

    cargo_run!("srstore", "build", &db, &part1).success();
    cargo_run!("srstore", "append", &db, &part2)
        .success()
        .stdout(predicate::str::contains("总样本数: 2 -> 5"));

    cargo_run!("srstore", "read", &db, "-n", "10", "--format", "json")
        .success()
        .stdout(predicate::str::contains("\"total\": 5"))
        .stdout(predicate::str::contains("\"label\": \"E\""));
    cargo_run!("srstore", "verify", &db).success();

    Ok(())
}

#[rstest]
fn append_requires_existing_store(work_dir: TempDir) -> Result<()> {
    let manifest = write_dataset(work_dir.path(), "part1", &["A"])?;
    cargo_run!("srstore", "append", work_dir.path().join("missing"), &manifest).failure();
    Ok(())
}

#[rstest]
fn append_rejects_empty_manifest(work_dir: TempDir) -> Result<()> {
    let part1 = write_dataset(work_dir.path(), "part1", &["A"])?;
    let db = work_dir.path().join("db");
    cargo_run!("srstore", "build", &db, &part1).success();

    let empty = work_dir.path().join("empty.txt");
    fs::write(&empty, "# nothing here\n\nbadline\n")?;
    cargo_run!("srstore", "append", &db, &empty)
        .failure()
        .stderr(predicate::str::contains("没有找到有效的图片"));
    cargo_run!("srstore", "count", &db).success().stdout(predicate::str::contains("1"));

    Ok(())
}

#[rstest]
fn malformed_manifest_lines_are_skipped(work_dir: TempDir) -> Result<()> {
    let manifest = write_dataset(work_dir.path(), "part1", &["OK"])?;
    let mut text = fs::read_to_string(&manifest)?;
    text.push_str("\nbadline\n/no/such/file.png LABEL\n");
    fs::write(&manifest, text)?;
    let db = work_dir.path().join("db");

    cargo_run!("srstore", "build", &db, &manifest)
        .success()
        .stdout(predicate::str::contains("清单错误: 2"))
        .stderr(predicate::str::contains("格式错误"));
    cargo_run!("srstore", "count", &db).success().stdout(predicate::str::contains("1 样本"));

    Ok(())
}

#[rstest]
fn corrupted_image_is_counted_as_failure(work_dir: TempDir) -> Result<()> {
    let manifest = write_dataset(work_dir.path(), "part1", &["GOOD"])?;
    let broken = work_dir.path().join("broken.png");
    fs::write(&broken, b"not an image at all")?;
    let mut text = fs::read_to_string(&manifest)?;
    text.push_str(&format!("\n{} BROKEN\n", broken.display()));
    fs::write(&manifest, text)?;
    let db = work_dir.path().join("db");

    cargo_run!("srstore", "build", &db, &manifest)
        .success()
        .stdout(predicate::str::contains("成功添加: 1"))
        .stdout(predicate::str::contains("失败: 1"));

    Ok(())
}

#[rstest]
fn extract_writes_images(work_dir: TempDir) -> Result<()> {
    let manifest = write_dataset(work_dir.path(), "part1", &["HELLO", "a b/c"])?;
    let db = work_dir.path().join("db");
    let out = work_dir.path().join("out");

    cargo_run!("srstore", "build", &db, &manifest).success();
    cargo_run!("srstore", "extract", &db, &out, "-n", "5")
        .success()
        .stdout(predicate::str::contains("(128x32)"))
        .stdout(predicate::str::contains("(64x16)"));

    assert!(out.join("000000001_hr_HELLO.png").is_file());
    assert!(out.join("000000001_lr_HELLO.png").is_file());
    assert!(out.join("000000002_hr_a_bc.png").is_file());
    assert_eq!(image::image_dimensions(out.join("000000002_lr_a_bc.png"))?, (64, 16));

    Ok(())
}

#[rstest]
fn count_multiple_stores(work_dir: TempDir) -> Result<()> {
    let part1 = write_dataset(work_dir.path(), "part1", &["A", "B"])?;
    let part2 = write_dataset(work_dir.path(), "part2", &["C"])?;
    let db1 = work_dir.path().join("train1");
    let db2 = work_dir.path().join("train2");

    cargo_run!("srstore", "build", &db1, &part1).success();
    cargo_run!("srstore", "build", &db2, &part2).success();

    cargo_run!("srstore", "count", &db1, &db2, work_dir.path().join("train3"))
        .success()
        .stdout(predicate::str::contains("总计: 3 样本"))
        .stdout(predicate::str::contains("无法读取"));

    Ok(())
}

#[rstest]
fn verify_detects_wrong_sizes(work_dir: TempDir) -> Result<()> {
    let manifest = write_dataset(work_dir.path(), "part1", &["A"])?;
    let db = work_dir.path().join("db");

    cargo_run!("srstore", "build", &db, &manifest, "--hr-size", "100x20").success();
    cargo_run!("srstore", "verify", &db).failure().stdout(predicate::str::contains("尺寸错误"));
    cargo_run!("srstore", "verify", &db, "--hr-size", "100x20").success();
    cargo_run!("srstore", "verify", &db, "--skip-sizes").success();

    Ok(())
}
