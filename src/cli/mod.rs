mod append;
mod build;
mod count;
mod extract;
mod read;
mod verify;

pub use append::*;
pub use build::*;
pub use count::*;
pub use extract::*;
pub use read::*;
pub use verify::*;

use indicatif::ProgressBar;
use log::warn;

use crate::config::Opts;
use crate::ingest::IngestSummary;
use crate::manifest::Manifest;
use crate::utils::pb_style;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> anyhow::Result<()>;
}

fn report_manifest(manifest: &Manifest) {
    for issue in &manifest.issues {
        warn!("{}", issue);
    }
    if !manifest.issues.is_empty() {
        warn!("清单中有 {} 行被跳过", manifest.issues.len());
    }
}

fn ingest_progress(len: usize) -> ProgressBar {
    ProgressBar::new(len as u64).with_style(pb_style())
}

fn print_summary(summary: &IngestSummary, manifest: &Manifest) {
    println!("尝试: {}", summary.attempted);
    println!("成功添加: {}", summary.succeeded);
    println!("失败: {}", summary.failed);
    if summary.skipped > 0 {
        println!("跳过空标签: {}", summary.skipped);
    }
    if !manifest.issues.is_empty() {
        println!("清单错误: {}", manifest.issues.len());
    }
}
