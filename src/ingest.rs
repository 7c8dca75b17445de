use std::fs;

use indicatif::ProgressBar;
use log::warn;
use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::imaging::PairSizes;
use crate::manifest::ManifestEntry;
use crate::store::SampleStore;

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub sizes: PairSizes,
    /// 每个写事务提交的样本数
    pub batch_size: usize,
    /// 跳过标签为空的样本
    pub skip_empty_labels: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self { sizes: PairSizes::default(), batch_size: 1000, skip_empty_labels: false }
    }
}

/// 批量写入的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// 依次读取、校验并追加清单中的图片
///
/// 单个样本的错误（文件读取失败、图像无效）会被记录并跳过；
/// 数据集级别的错误（结构损坏、写入失败）立即返回，未提交的样本全部丢弃。
pub fn ingest(
    store: &SampleStore,
    entries: &[ManifestEntry],
    options: IngestOptions,
    pb: &ProgressBar,
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();
    let mut batch = store.batch(options.sizes, options.batch_size)?;

    for entry in entries {
        pb.inc(1);
        summary.attempted += 1;

        if options.skip_empty_labels && entry.label.is_empty() {
            summary.skipped += 1;
            continue;
        }

        let result = fs::read(&entry.path)
            .map_err(StoreError::from)
            .and_then(|raw| batch.push(&entry.label, &raw));
        match result {
            Ok(Some(range)) => {
                summary.succeeded += 1;
                pb.set_message(format!("已提交至 {}", range.end - 1));
            }
            Ok(None) => summary.succeeded += 1,
            Err(e) if e.is_recoverable() => {
                summary.failed += 1;
                pb.suspend(|| warn!("跳过 {}: {}", entry.path.display(), e));
            }
            Err(e) => return Err(e),
        }
    }

    batch.flush()?;
    Ok(summary)
}
