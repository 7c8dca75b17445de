use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use image::ImageFormat;
use log::info;

use super::SubCommandExtend;
use crate::config::{Opts, StoreOptions};
use crate::store::AccessMode;
use crate::utils::sanitize_label;

#[derive(Parser, Debug, Clone)]
pub struct ExtractCommand {
    /// 数据集目录
    pub store_path: PathBuf,
    /// 图片输出目录
    pub output_dir: PathBuf,
    /// 导出的样本数量
    #[arg(short = 'n', long, default_value_t = 10)]
    pub num_samples: u64,
    #[command(flatten)]
    pub store: StoreOptions,
}

/// 解码后重新保存为 PNG，返回图像尺寸
fn save_image(data: &[u8], path: &Path) -> Result<(u32, u32)> {
    let img = image::load_from_memory(data).context("无法解码图像")?;
    img.save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("无法保存 {}", path.display()))?;
    Ok((img.width(), img.height()))
}

impl SubCommandExtend for ExtractCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let store = self.store.builder(&self.store_path).open(AccessMode::ReadOnly)?;
        fs::create_dir_all(&self.output_dir)?;

        let total = store.read_count()?;
        let num_extract = self.num_samples.min(total);
        println!("总样本数: {}", total);
        println!("提取前 {} 个样本到 {}\n", num_extract, self.output_dir.display());

        for sample in store.iter_samples(1, num_extract)? {
            let sample = sample?;
            let safe_label = sanitize_label(&sample.label, sample.index);
            let hr_path = self.output_dir.join(format!("{:09}_hr_{}.png", sample.index, safe_label));
            let lr_path = self.output_dir.join(format!("{:09}_lr_{}.png", sample.index, safe_label));

            let (hw, hh) = save_image(&sample.hr_image, &hr_path)
                .with_context(|| format!("样本 {} 的 HR 图像", sample.index))?;
            let (lw, lh) = save_image(&sample.lr_image, &lr_path)
                .with_context(|| format!("样本 {} 的 LR 图像", sample.index))?;

            println!("样本 {}: {}", sample.index, sample.label);
            println!("  HR: {} ({}x{})", hr_path.display(), hw, hh);
            println!("  LR: {} ({}x{})", lr_path.display(), lw, lh);
            println!();
        }

        info!("完成! 已提取 {} 个样本到 {}", num_extract, self.output_dir.display());
        Ok(())
    }
}
