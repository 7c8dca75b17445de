//! 样本在 LMDB 中的键名规则
//!
//! 每个样本对应三个键：`image_hr-NNNNNNNNN`、`image_lr-NNNNNNNNN`、`label-NNNNNNNNN`，
//! 序号固定为 9 位十进制数字，从 1 开始。样本总数保存在 `num-samples` 中。

use std::fmt;

use serde::Serialize;

use crate::error::{Result, StoreError};

/// 保存样本总数的键
pub const COUNTER_KEY: &str = "num-samples";

/// 序号的上限（不含），超过 9 位的序号无法编码
pub const MAX_INDEX: u64 = 1_000_000_000;

const INDEX_WIDTH: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// 高分辨率图像
    Hr,
    /// 低分辨率图像
    Lr,
    /// 文本标签
    Label,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Hr, RecordKind::Lr, RecordKind::Label];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Hr => "image_hr-",
            Self::Lr => "image_lr-",
            Self::Label => "label-",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hr => "hr",
            Self::Lr => "lr",
            Self::Label => "label",
        };
        f.write_str(name)
    }
}

/// 检查序号是否在 `1..MAX_INDEX` 范围内
pub fn check_index(index: u64) -> Result<u64> {
    if index == 0 || index >= MAX_INDEX {
        return Err(StoreError::Range(index));
    }
    Ok(index)
}

pub fn make_key(kind: RecordKind, index: u64) -> Result<String> {
    let index = check_index(index)?;
    Ok(format!("{}{:0width$}", kind.prefix(), index, width = INDEX_WIDTH))
}

pub fn counter_key() -> &'static str {
    COUNTER_KEY
}

/// `make_key` 的逆运算
pub fn parse_key(key: &str) -> Result<(RecordKind, u64)> {
    let malformed = || StoreError::Schema(format!("无法解析的键: {:?}", key));

    let (kind, digits) = RecordKind::ALL
        .iter()
        .find_map(|&kind| key.strip_prefix(kind.prefix()).map(|rest| (kind, rest)))
        .ok_or_else(malformed)?;

    if digits.len() != INDEX_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let index: u64 = digits.parse().map_err(|_| malformed())?;
    if index == 0 {
        return Err(malformed());
    }
    Ok((kind, index))
}

/// 一个样本的全部三个键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleKeys {
    pub hr: String,
    pub lr: String,
    pub label: String,
}

impl SampleKeys {
    pub fn new(index: u64) -> Result<Self> {
        Ok(Self {
            hr: make_key(RecordKind::Hr, index)?,
            lr: make_key(RecordKind::Lr, index)?,
            label: make_key(RecordKind::Label, index)?,
        })
    }

    pub fn get(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::Hr => &self.hr,
            RecordKind::Lr => &self.lr,
            RecordKind::Label => &self.label,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case(RecordKind::Hr, 1, "image_hr-000000001")]
    #[case(RecordKind::Lr, 42, "image_lr-000000042")]
    #[case(RecordKind::Label, 123_456_789, "label-123456789")]
    #[case(RecordKind::Hr, 999_999_999, "image_hr-999999999")]
    fn test_make_key(#[case] kind: RecordKind, #[case] index: u64, #[case] expected: &str) {
        assert_eq!(make_key(kind, index).unwrap(), expected);
    }

    #[rstest]
    #[case(0)]
    #[case(MAX_INDEX)]
    #[case(u64::MAX)]
    fn test_make_key_out_of_range(#[case] index: u64) {
        for kind in RecordKind::ALL {
            assert!(matches!(make_key(kind, index), Err(StoreError::Range(i)) if i == index));
        }
    }

    #[rstest]
    #[case(1)]
    #[case(9)]
    #[case(10)]
    #[case(1000)]
    #[case(100_000_000)]
    #[case(MAX_INDEX - 1)]
    fn test_round_trip(#[case] index: u64) {
        for kind in RecordKind::ALL {
            let key = make_key(kind, index).unwrap();
            assert_eq!(parse_key(&key).unwrap(), (kind, index));
        }
    }

    #[rstest]
    #[case("")]
    #[case("num-samples")]
    #[case("image-000000001")]
    #[case("image_hr-")]
    #[case("image_hr-1")]
    #[case("image_hr-00000001")]
    #[case("image_hr-0000000001")]
    #[case("image_hr-000000000")]
    #[case("image_hr-00000000a")]
    #[case("image_hr-+00000001")]
    #[case("label-00000001 ")]
    #[case("IMAGE_HR-000000001")]
    fn test_parse_malformed(#[case] key: &str) {
        assert!(matches!(parse_key(key), Err(StoreError::Schema(_))));
    }

    #[test]
    fn test_counter_key_is_not_a_sample_key() {
        assert_eq!(counter_key(), "num-samples");
        assert!(parse_key(counter_key()).is_err());
    }

    #[test]
    fn test_sample_keys() {
        let keys = SampleKeys::new(7).unwrap();
        assert_eq!(keys.get(RecordKind::Hr), "image_hr-000000007");
        assert_eq!(keys.get(RecordKind::Lr), "image_lr-000000007");
        assert_eq!(keys.get(RecordKind::Label), "label-000000007");
        assert!(SampleKeys::new(0).is_err());
    }
}
