use thiserror::Error;

/// 样本库操作可能出现的错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 源文件不存在或无法读取
    #[error("无法读取文件: {0}")]
    Io(#[from] std::io::Error),

    /// 图片数据无法解码，或者尺寸为 0
    #[error("无效图像: {0}")]
    InvalidImage(String),

    /// 重新编码 HR/LR 图像失败
    #[error("图像编码失败: {0}")]
    Encode(#[source] image::ImageError),

    /// 计数器缺失、不是合法的非负整数，或者键名无法解析
    #[error("数据集结构错误: {0}")]
    Schema(String),

    /// 样本序号超出 1..10^9 的范围
    #[error("样本序号超出范围: {0}")]
    Range(u64),

    /// 数据集目录不存在，或者请求的样本不存在/不完整
    #[error("未找到: {0}")]
    NotFound(String),

    /// 写事务提交失败，本次写入已整体回滚
    #[error("写入失败: {0}")]
    Write(#[source] heed::Error),

    /// 读取底层数据库失败
    #[error("读取失败: {0}")]
    Read(#[source] heed::Error),

    /// 在只读句柄上执行了写操作
    #[error("数据集以只读模式打开")]
    ReadOnly,

    /// 句柄已关闭
    #[error("数据集已关闭")]
    Closed,
}

impl StoreError {
    /// 是否为单个样本级别的错误，批量写入时可以跳过该样本继续
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::InvalidImage(_))
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
