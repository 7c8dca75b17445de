use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::cli::*;
use crate::imaging::{PairSizes, Size};
use crate::store::{DEFAULT_MAP_SIZE, SampleStoreBuilder};

#[derive(Parser, Debug, Clone)]
#[command(name = "srstore", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 根据图片清单创建新的 HR/LR 数据集
    Build(BuildCommand),
    /// 向已有数据集追加图片
    Append(AppendCommand),
    /// 查看数据集的前几个样本
    Read(ReadCommand),
    /// 将样本导出为图片文件
    Extract(ExtractCommand),
    /// 统计一个或多个数据集的样本数
    Count(CountCommand),
    /// 检查数据集是否完整
    Verify(VerifyCommand),
}

#[derive(Args, Debug, Clone)]
pub struct SizeOptions {
    /// 高分辨率图像尺寸
    #[arg(long, value_name = "WIDTHxHEIGHT", default_value = "128x32")]
    pub hr_size: Size,
    /// 低分辨率图像尺寸
    #[arg(long, value_name = "WIDTHxHEIGHT", default_value = "64x16")]
    pub lr_size: Size,
}

impl SizeOptions {
    pub fn pair(&self) -> PairSizes {
        PairSizes { hr: self.hr_size, lr: self.lr_size }
    }
}

#[derive(Args, Debug, Clone)]
pub struct StoreOptions {
    /// LMDB 最大映射空间，单位为字节
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAP_SIZE)]
    pub map_size: usize,
}

impl StoreOptions {
    pub fn builder(&self, path: &std::path::Path) -> SampleStoreBuilder {
        SampleStoreBuilder::new(path).map_size(self.map_size)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// 逐行文本
    Table,
    /// JSON
    Json,
}
