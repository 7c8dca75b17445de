use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use serde::Serialize;

use crate::error::{Result, StoreError};

/// 图像尺寸，宽 × 高
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Size {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s.split_once(['x', 'X']).ok_or_else(|| format!("无效的尺寸: {}", s))?;
        let width: u32 = w.trim().parse().map_err(|_| format!("无效的宽度: {}", s))?;
        let height: u32 = h.trim().parse().map_err(|_| format!("无效的高度: {}", s))?;
        if width == 0 || height == 0 {
            return Err(format!("尺寸不能为 0: {}", s));
        }
        Ok(Self { width, height })
    }
}

/// HR/LR 两种输出尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PairSizes {
    pub hr: Size,
    pub lr: Size,
}

impl Default for PairSizes {
    fn default() -> Self {
        Self { hr: Size::new(128, 32), lr: Size::new(64, 16) }
    }
}

/// 编码后的 HR/LR 图像对（PNG）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub hr: Vec<u8>,
    pub lr: Vec<u8>,
}

/// 检查图像数据是否可以解码，并且宽高均不为 0
///
/// 所有解码错误都返回 false，不会向上抛出。与 [`encode_pair`] 使用同一套判定规则。
pub fn validate(raw: &[u8]) -> bool {
    decode_valid(raw).is_ok()
}

/// 从一张原图生成 HR 和 LR 两个版本
///
/// 原图只解码一次，无法通过 [`validate`] 的输入返回 [`StoreError::InvalidImage`]。
/// 两个版本都由原图独立缩放得到（CatmullRom，即双三次插值），再编码为 PNG。
/// 相同输入总是得到完全相同的字节。
pub fn encode_pair(raw: &[u8], sizes: PairSizes) -> Result<ImagePair> {
    let img = normalize(decode_valid(raw)?);
    Ok(ImagePair { hr: encode_resized(&img, sizes.hr)?, lr: encode_resized(&img, sizes.lr)? })
}

/// 转换为灰度图不会改变尺寸，所以这里直接检查解码结果
fn decode_valid(raw: &[u8]) -> Result<DynamicImage> {
    if raw.is_empty() {
        return Err(StoreError::InvalidImage("图像数据为空".to_string()));
    }
    let img = decode(raw).map_err(|e| StoreError::InvalidImage(e.to_string()))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(StoreError::InvalidImage(format!("图像尺寸为 0: {}x{}", img.width(), img.height())));
    }
    Ok(img)
}

/// 解码图像并返回其尺寸
pub fn decode_dimensions(data: &[u8]) -> Result<Size> {
    let img = decode(data).map_err(|e| StoreError::InvalidImage(e.to_string()))?;
    Ok(Size::new(img.width(), img.height()))
}

fn decode(data: &[u8]) -> image::ImageResult<DynamicImage> {
    ImageReader::new(Cursor::new(data)).with_guessed_format()?.decode()
}

/// PNG 不支持浮点像素，统一转换为 8 位
fn normalize(img: DynamicImage) -> DynamicImage {
    if matches!(img, DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)) {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        img
    }
}

fn encode_resized(img: &DynamicImage, size: Size) -> Result<Vec<u8>> {
    let resized = img.resize_exact(size.width, size.height, FilterType::CatmullRom);
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Default, PngFilter::Adaptive);
    resized.write_with_encoder(encoder).map_err(StoreError::Encode)?;
    Ok(buf)
}
