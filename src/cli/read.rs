use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use super::SubCommandExtend;
use crate::config::{OutputFormat, Opts, StoreOptions};
use crate::store::AccessMode;

#[derive(Parser, Debug, Clone)]
pub struct ReadCommand {
    /// 数据集目录
    pub store_path: PathBuf,
    /// 显示的样本数量
    #[arg(short = 'n', long, default_value_t = 5)]
    pub max_samples: u64,
    /// 输出格式
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    #[command(flatten)]
    pub store: StoreOptions,
}

#[derive(Serialize)]
struct SampleInfo {
    index: u64,
    label: String,
    hr_bytes: usize,
    lr_bytes: usize,
}

#[derive(Serialize)]
struct ReadOutput {
    total: u64,
    samples: Vec<SampleInfo>,
}

impl SubCommandExtend for ReadCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let store = self.store.builder(&self.store_path).open(AccessMode::ReadOnly)?;
        let total = store.read_count()?;

        let samples = store
            .iter_samples(1, self.max_samples)?
            .map(|sample| {
                sample.map(|s| SampleInfo {
                    index: s.index,
                    label: s.label,
                    hr_bytes: s.hr_image.len(),
                    lr_bytes: s.lr_image.len(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&ReadOutput { total, samples })?);
            }
            OutputFormat::Table => {
                println!("总样本数: {}", total);
                println!("显示前 {} 个样本:\n", samples.len());
                for s in &samples {
                    println!("样本 {}:", s.index);
                    println!("  标签: {}", s.label);
                    println!("  高分辨率图像: {} bytes", s.hr_bytes);
                    println!("  低分辨率图像: {} bytes", s.lr_bytes);
                    println!();
                }
            }
        }
        Ok(())
    }
}
