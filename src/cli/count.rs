use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::warn;
use serde::Serialize;

use super::SubCommandExtend;
use crate::config::{OutputFormat, Opts, StoreOptions};
use crate::store::AccessMode;

#[derive(Parser, Debug, Clone)]
pub struct CountCommand {
    /// 数据集目录，可以指定多个
    #[arg(required = true)]
    pub stores: Vec<PathBuf>,
    /// 输出格式
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    #[command(flatten)]
    pub store: StoreOptions,
}

#[derive(Serialize)]
struct StoreCount {
    path: PathBuf,
    /// 无法读取时为 None
    count: Option<u64>,
}

impl SubCommandExtend for CountCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let mut counts = vec![];
        for path in &self.stores {
            let count = self
                .store
                .builder(path)
                .open(AccessMode::ReadOnly)
                .and_then(|store| store.read_count());
            let count = match count {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!("无法读取 {}: {}", path.display(), e);
                    None
                }
            };
            counts.push(StoreCount { path: path.clone(), count });
        }
        let total: u64 = counts.iter().filter_map(|c| c.count).sum();

        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({ "stores": counts, "total": total });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                for c in &counts {
                    match c.count {
                        Some(n) => println!("{}: {} 样本", c.path.display(), n),
                        None => println!("{}: 无法读取", c.path.display()),
                    }
                }
                println!("总计: {} 样本", total);
            }
        }
        Ok(())
    }
}
