use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use log::info;

use super::{SubCommandExtend, ingest_progress, print_summary, report_manifest};
use crate::config::{Opts, SizeOptions, StoreOptions};
use crate::ingest::{IngestOptions, ingest};
use crate::manifest::Manifest;

#[derive(Parser, Debug, Clone)]
pub struct BuildCommand {
    /// 输出的数据集目录，不能已经包含数据集
    pub output: PathBuf,
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

impl SubCommandExtend for BuildCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        if self.output.join("data.mdb").exists() {
            bail!("数据集已存在: {}，请使用 append 追加", self.output.display());
        }

        let manifest = Manifest::read(&self.manifest)?;
        report_manifest(&manifest);

        let sizes = self.sizes.pair();
        info!("开始创建数据集，共 {} 个样本", manifest.entries.len());
        info!("HR 尺寸: {}，LR 尺寸: {}", sizes.hr, sizes.lr);

        let store = self.store.builder(&self.output).create()?;
        let options = IngestOptions { sizes, batch_size: self.batch_size, skip_empty_labels: true };

        let pb = ingest_progress(manifest.entries.len());
        let summary = ingest(&store, &manifest.entries, options, &pb)?;
        pb.finish_and_clear();

        print_summary(&summary, &manifest);
        println!("完成! 数据集 {} 共 {} 个样本", self.output.display(), store.read_count()?);
        Ok(())
    }
}
