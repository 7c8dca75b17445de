use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use log::info;

use super::SubCommandExtend;
use crate::config::{Opts, SizeOptions, StoreOptions};
use crate::store::AccessMode;

#[derive(Parser, Debug, Clone)]
pub struct VerifyCommand {
    /// 数据集目录
    pub store_path: PathBuf,
    #[command(flatten)]
    pub sizes: SizeOptions,
    /// 不解码图片检查尺寸，只检查键是否完整
    #[arg(long)]
    pub skip_sizes: bool,
    #[command(flatten)]
    pub store: StoreOptions,
}

impl SubCommandExtend for VerifyCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let store = self.store.builder(&self.store_path).open(AccessMode::ReadOnly)?;
        let sizes = (!self.skip_sizes).then(|| self.sizes.pair());
        info!("检查数据集 {}", self.store_path.display());
        let report = store.check_integrity(sizes)?;

        println!("总样本数: {}", report.count);
        for m in &report.missing {
            if m.start == m.end {
                println!("缺失: 样本 {} 的 {}", m.start, m.kind);
            } else {
                println!("缺失: 样本 {}..={} 的 {}", m.start, m.end, m.kind);
            }
        }
        for key in &report.orphan_keys {
            println!("多余的键: {}", key);
        }
        for key in &report.unknown_keys {
            println!("无法识别的键: {}", key);
        }
        for m in &report.size_mismatches {
            match m.actual {
                Some(actual) => {
                    println!("尺寸错误: 样本 {} 的 {} 为 {}，应为 {}", m.index, m.kind, actual, m.expected)
                }
                None => println!("无法解码: 样本 {} 的 {}", m.index, m.kind),
            }
        }

        if !report.is_consistent() {
            bail!("数据集 {} 不完整", self.store_path.display());
        }
        println!("数据集完整");
        Ok(())
    }
}
