use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use log::info;

use super::{SubCommandExtend, ingest_progress, print_summary, report_manifest};
use crate::config::{Opts, SizeOptions, StoreOptions};
use crate::ingest::{IngestOptions, ingest};
use crate::manifest::Manifest;
use crate::store::AccessMode;

#[derive(Parser, Debug, Clone)]
pub struct AppendCommand {
    /// 已有的数据集目录
    pub store_path: PathBuf,
    /// 图片清单，每行为 `路径 标签`
    pub manifest: PathBuf,
    #[command(flatten)]
    pub sizes: SizeOptions,
    #[command(flatten)]
    pub store: StoreOptions,
    /// 每个写事务提交的样本数
    #[arg(long, value_name = "SIZE", default_value_t = 1000)]
    pub batch_size: usize,
}

impl SubCommandExtend for AppendCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let manifest = Manifest::read(&self.manifest)?;
        report_manifest(&manifest);
        if manifest.entries.is_empty() {
            bail!("没有找到有效的图片");
        }

        let store = self.store.builder(&self.store_path).open(AccessMode::ReadWrite)?;
        let before = store.read_count()?;
        info!("当前样本数: {}", before);
        info!("准备添加 {} 个样本到 {}", manifest.entries.len(), self.store_path.display());

        let options =
            IngestOptions { sizes: self.sizes.pair(), batch_size: self.batch_size, skip_empty_labels: false };
        let pb = ingest_progress(manifest.entries.len());
        let summary = ingest(&store, &manifest.entries, options, &pb)?;
        pb.finish_and_clear();

        let after = store.read_count()?;
        print_summary(&summary, &manifest);
        println!("总样本数: {} -> {}", before, after);
        Ok(())
    }
}
