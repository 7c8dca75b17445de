use indicatif::ProgressStyle;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .expect("invalid progress bar template")
        .progress_chars("#>-")
}

/// 将标签转换为可以用作文件名的形式
///
/// 只保留字母、数字、空格、`-` 和 `_`，空格替换为 `_`，最多 50 个字符。
pub fn sanitize_label(label: &str, index: u64) -> String {
    let kept: String =
        label.chars().filter(|&c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_')).collect();
    let safe: String = kept.trim().replace(' ', "_").chars().take(50).collect();
    if safe.is_empty() { format!("sample_{}", index) } else { safe }
}
