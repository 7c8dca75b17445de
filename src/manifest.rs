//! 图片清单文件
//!
//! 每行格式为 `<路径><空格><标签>`，以第一个空格分隔，标签中可以包含空格。
//! 空行和以 `#` 开头的行会被忽略。格式错误或图片不存在的行只会被记录下来并跳过。

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// 所在行号，从 1 开始
    pub line: usize,
    pub path: PathBuf,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestIssue {
    /// 缺少路径和标签之间的空格
    Malformed { line: usize, content: String },
    /// 图片文件不存在
    MissingFile { line: usize, path: PathBuf },
}

impl fmt::Display for ManifestIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { line, content } => {
                write!(f, "行 {}: 格式错误，应为 '路径 标签': {:?}", line, content)
            }
            Self::MissingFile { line, path } => {
                write!(f, "行 {}: 图片不存在 {}", line, path.display())
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
    pub issues: Vec<ManifestIssue>,
}

impl Manifest {
    pub fn parse(text: &str) -> Self {
        let mut manifest = Self::default();
        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((path, label)) = line.split_once(' ') else {
                manifest.issues.push(ManifestIssue::Malformed { line: line_no, content: line.to_owned() });
                continue;
            };
            let path = PathBuf::from(path);
            if !path.exists() {
                manifest.issues.push(ManifestIssue::MissingFile { line: line_no, path });
                continue;
            }
            manifest.entries.push(ManifestEntry { line: line_no, path, label: label.to_owned() });
        }
        manifest
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("无法读取清单文件 {}", path.display()))?;
        Ok(Self::parse(&text))
    }
}
