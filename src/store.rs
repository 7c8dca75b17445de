//! 基于 LMDB 的 HR/LR 样本库
//!
//! 所有写入都在单个写事务中完成：读取计数器、分配序号、写入三个键、更新计数器，
//! 然后一次性提交。因此任何读者看到的 `num-samples` 都不会超过完整写入的样本数，
//! 中途被打断的写入不会留下任何可见数据。
//!
//! 跨进程只支持单写多读，写锁由 LMDB 自身保证。

use std::collections::BTreeMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvFlags, EnvOpenOptions, RoTxn, WithoutTls};
use log::{debug, info, warn};
use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::imaging::{self, ImagePair, PairSizes, Size};
use crate::key::{COUNTER_KEY, MAX_INDEX, RecordKind, SampleKeys, check_index, parse_key};

/// 默认直接分配 1TiB 的映射空间，LMDB 只会按需占用磁盘
pub const DEFAULT_MAP_SIZE: usize = 1 << 40;

const DATA_FILE: &str = "data.mdb";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// 从数据集中读出的一个完整样本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub index: u64,
    pub label: String,
    pub hr_image: Vec<u8>,
    pub lr_image: Vec<u8>,
}

pub struct SampleStoreBuilder {
    path: PathBuf,
    map_size: usize,
}

impl SampleStoreBuilder {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf(), map_size: DEFAULT_MAP_SIZE }
    }

    /// LMDB 的最大映射空间
    pub fn map_size(mut self, map_size: usize) -> Self {
        self.map_size = map_size;
        self
    }

    /// 以读写模式打开数据集，不存在时创建，并在计数器缺失时将其初始化为 0
    pub fn create(self) -> Result<SampleStore> {
        fs::create_dir_all(&self.path)?;
        let env = open_env(&self.path, self.map_size, AccessMode::ReadWrite)?;

        let mut wtxn = env.write_txn().map_err(StoreError::Write)?;
        let db: Database<Str, Bytes> =
            env.create_database(&mut wtxn, None).map_err(StoreError::Write)?;
        if db.get(&wtxn, COUNTER_KEY).map_err(StoreError::Read)?.is_none() {
            info!("初始化数据集: {}", self.path.display());
            db.put(&mut wtxn, COUNTER_KEY, b"0").map_err(StoreError::Write)?;
        }
        wtxn.commit().map_err(StoreError::Write)?;

        Ok(SampleStore { path: self.path, mode: AccessMode::ReadWrite, handle: Some(Handle { env, db }) })
    }

    /// 打开已存在的数据集
    pub fn open(self, mode: AccessMode) -> Result<SampleStore> {
        if !self.path.join(DATA_FILE).is_file() {
            return Err(StoreError::NotFound(format!("数据集不存在: {}", self.path.display())));
        }
        let env = open_env(&self.path, self.map_size, mode)?;

        let db = match mode {
            AccessMode::ReadOnly => {
                let rtxn = env.read_txn().map_err(StoreError::Read)?;
                let db = env
                    .open_database::<Str, Bytes>(&rtxn, None)
                    .map_err(StoreError::Read)?
                    .ok_or_else(|| StoreError::Schema("缺少主数据库".to_string()))?;
                rtxn.commit().map_err(StoreError::Read)?;
                db
            }
            AccessMode::ReadWrite => {
                let mut wtxn = env.write_txn().map_err(StoreError::Write)?;
                let db = env.create_database(&mut wtxn, None).map_err(StoreError::Write)?;
                wtxn.commit().map_err(StoreError::Write)?;
                db
            }
        };
        debug!("打开数据集 {} ({:?})", self.path.display(), mode);

        Ok(SampleStore { path: self.path, mode, handle: Some(Handle { env, db }) })
    }
}

fn open_env(path: &Path, map_size: usize, mode: AccessMode) -> Result<Env<WithoutTls>> {
    let env = unsafe {
        // 不使用线程本地的读槽位，同一线程可以同时持有多个读事务
        let mut options = EnvOpenOptions::new().read_txn_without_tls();
        options.map_size(map_size);
        if mode == AccessMode::ReadOnly {
            options.flags(EnvFlags::READ_ONLY);
        }
        options.open(path)
    };
    env.map_err(|e| match e {
        heed::Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
            StoreError::NotFound(format!("数据集不存在: {}", path.display()))
        }
        e => StoreError::Read(e),
    })
}

struct Handle {
    env: Env<WithoutTls>,
    db: Database<Str, Bytes>,
}

pub struct SampleStore {
    path: PathBuf,
    mode: AccessMode,
    handle: Option<Handle>,
}

impl SampleStore {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        SampleStoreBuilder::new(path).create()
    }

    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self> {
        SampleStoreBuilder::new(path).open(mode)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// 关闭数据集并释放所有资源，可以重复调用
    pub fn close(&mut self) {
        if let Some(Handle { env, .. }) = self.handle.take() {
            env.prepare_for_closing().wait();
            debug!("关闭数据集 {}", self.path.display());
        }
    }

    fn handle(&self) -> Result<&Handle> {
        self.handle.as_ref().ok_or(StoreError::Closed)
    }

    fn writable(&self) -> Result<&Handle> {
        let handle = self.handle()?;
        match self.mode {
            AccessMode::ReadWrite => Ok(handle),
            AccessMode::ReadOnly => Err(StoreError::ReadOnly),
        }
    }

    /// 读取样本总数
    pub fn read_count(&self) -> Result<u64> {
        let handle = self.handle()?;
        let rtxn = handle.env.read_txn().map_err(StoreError::Read)?;
        read_count_in(handle.db, &rtxn)
    }

    /// 校验、编码并追加一个样本，返回分配到的序号
    pub fn append_sample(&self, label: &str, raw: &[u8], sizes: PairSizes) -> Result<u64> {
        self.writable()?;
        let pending = PendingSample::prepare(label, raw, sizes)?;
        let range = self.commit(std::slice::from_ref(&pending))?;
        Ok(range.start)
    }

    /// 创建写入批次，每攒够 `capacity` 个样本提交一次
    pub fn batch(&self, sizes: PairSizes, capacity: usize) -> Result<SampleBatch<'_>> {
        self.writable()?;
        Ok(SampleBatch { store: self, sizes, capacity: capacity.max(1), pending: Vec::new() })
    }

    /// 在一个写事务中追加若干已编码的样本并更新计数器
    fn commit(&self, samples: &[PendingSample]) -> Result<Range<u64>> {
        let handle = self.writable()?;
        let mut wtxn = handle.env.write_txn().map_err(StoreError::Write)?;

        // 计数器必须在同一个事务中读取，否则两个写者可能分配到相同的序号
        let count = decode_count(handle.db.get(&wtxn, COUNTER_KEY).map_err(StoreError::Read)?)?;
        let start = count + 1;
        for (offset, sample) in samples.iter().enumerate() {
            let keys = SampleKeys::new(start + offset as u64)?;
            handle.db.put(&mut wtxn, &keys.hr, &sample.pair.hr).map_err(StoreError::Write)?;
            handle.db.put(&mut wtxn, &keys.lr, &sample.pair.lr).map_err(StoreError::Write)?;
            handle
                .db
                .put(&mut wtxn, &keys.label, sample.label.as_bytes())
                .map_err(StoreError::Write)?;
        }
        let end = start + samples.len() as u64;
        let total = (end - 1).to_string();
        handle.db.put(&mut wtxn, COUNTER_KEY, total.as_bytes()).map_err(StoreError::Write)?;
        wtxn.commit().map_err(StoreError::Write)?;

        debug!("提交 {} 个样本: {}..{}", samples.len(), start, end);
        Ok(start..end)
    }

    /// 读取序号为 `index` 的样本，任何一个键缺失都视为损坏
    pub fn read_sample(&self, index: u64) -> Result<Sample> {
        let handle = self.handle()?;
        let rtxn = handle.env.read_txn().map_err(StoreError::Read)?;
        let count = read_count_in(handle.db, &rtxn)?;
        fetch_sample(handle.db, &rtxn, index, count)
    }

    /// 从 `start` 开始按序号升序读取至多 `max_count` 个样本
    ///
    /// 迭代器持有一个读事务，看到的是创建时的快照。
    pub fn iter_samples(&self, start: u64, max_count: u64) -> Result<SampleIter<'_>> {
        check_index(start)?;
        let handle = self.handle()?;
        let txn = handle.env.read_txn().map_err(StoreError::Read)?;
        let count = read_count_in(handle.db, &txn)?;
        let end = if start > count { start } else { start.saturating_add(max_count).min(count + 1) };
        Ok(SampleIter { txn, db: handle.db, count, next: start, end })
    }

    /// 扫描所有键，检查数据集是否完整
    ///
    /// 如果给出了 `sizes`，还会解码每张图片并检查尺寸。
    pub fn check_integrity(&self, sizes: Option<PairSizes>) -> Result<IntegrityReport> {
        let handle = self.handle()?;
        let rtxn = handle.env.read_txn().map_err(StoreError::Read)?;
        let count = read_count_in(handle.db, &rtxn)?;

        let mut report = IntegrityReport { count, ..Default::default() };
        // 只记录实际存在的序号，内存占用与 count 无关
        let mut seen: BTreeMap<u64, u8> = BTreeMap::new();

        let raw_db = handle.db.remap_key_type::<Bytes>();
        for item in raw_db.iter(&rtxn).map_err(StoreError::Read)? {
            let (key, value) = item.map_err(StoreError::Read)?;
            let Ok(key) = std::str::from_utf8(key) else {
                report.unknown_keys.push(String::from_utf8_lossy(key).into_owned());
                continue;
            };
            if key == COUNTER_KEY {
                continue;
            }
            let (kind, index) = match parse_key(key) {
                Ok(parsed) => parsed,
                Err(_) => {
                    report.unknown_keys.push(key.to_owned());
                    continue;
                }
            };
            if index > count {
                report.orphan_keys.push(key.to_owned());
                continue;
            }
            *seen.entry(index).or_default() |= kind_bit(kind);

            let expected = match (kind, sizes) {
                (RecordKind::Hr, Some(sizes)) => sizes.hr,
                (RecordKind::Lr, Some(sizes)) => sizes.lr,
                _ => continue,
            };
            let actual = imaging::decode_dimensions(value).ok();
            if actual != Some(expected) {
                report.size_mismatches.push(SizeMismatch { index, kind, expected, actual });
            }
        }

        for kind in RecordKind::ALL {
            let mut expected = 1;
            for (&index, _) in seen.iter().filter(|&(_, flags)| flags & kind_bit(kind) != 0) {
                if index > expected {
                    report.missing.push(MissingRange { kind, start: expected, end: index - 1 });
                }
                expected = index + 1;
            }
            if expected <= count {
                report.missing.push(MissingRange { kind, start: expected, end: count });
            }
        }
        Ok(report)
    }
}

impl Drop for SampleStore {
    fn drop(&mut self) {
        self.close();
    }
}

fn kind_bit(kind: RecordKind) -> u8 {
    match kind {
        RecordKind::Hr => 0b001,
        RecordKind::Lr => 0b010,
        RecordKind::Label => 0b100,
    }
}

fn read_count_in(db: Database<Str, Bytes>, txn: &RoTxn<'_, WithoutTls>) -> Result<u64> {
    decode_count(db.get(txn, COUNTER_KEY).map_err(StoreError::Read)?)
}

/// 计数器以 ASCII 十进制整数存储
fn decode_count(raw: Option<&[u8]>) -> Result<u64> {
    let raw = raw.ok_or_else(|| StoreError::Schema(format!("缺少计数器 {}", COUNTER_KEY)))?;
    let invalid = || StoreError::Schema(format!("计数器不是合法的非负整数: {:?}", String::from_utf8_lossy(raw)));
    if raw.is_empty() || !raw.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    let count: u64 = std::str::from_utf8(raw).map_err(|_| invalid())?.parse().map_err(|_| invalid())?;
    if count >= MAX_INDEX {
        return Err(invalid());
    }
    Ok(count)
}

fn fetch_sample(
    db: Database<Str, Bytes>,
    txn: &RoTxn<'_, WithoutTls>,
    index: u64,
    count: u64,
) -> Result<Sample> {
    if index == 0 || index > count {
        return Err(StoreError::NotFound(format!("样本 {} 不在 1..={} 范围内", index, count)));
    }
    let keys = SampleKeys::new(index)?;
    let get = |key: &str| -> Result<Vec<u8>> {
        db.get(txn, key)
            .map_err(StoreError::Read)?
            .map(<[u8]>::to_vec)
            .ok_or_else(|| StoreError::NotFound(format!("样本 {} 缺少键 {}", index, key)))
    };

    let label = String::from_utf8(get(&keys.label)?)
        .map_err(|_| StoreError::Schema(format!("{} 不是合法的 UTF-8", keys.label)))?;
    Ok(Sample { index, label, hr_image: get(&keys.hr)?, lr_image: get(&keys.lr)? })
}

pub struct SampleIter<'a> {
    txn: RoTxn<'a, WithoutTls>,
    db: Database<Str, Bytes>,
    count: u64,
    next: u64,
    end: u64,
}

impl Iterator for SampleIter<'_> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let result = fetch_sample(self.db, &self.txn, self.next, self.count);
        // 数据损坏时立即终止，不尝试跳过
        self.next = if result.is_ok() { self.next + 1 } else { self.end };
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.end - self.next) as usize;
        (0, Some(n))
    }
}

struct PendingSample {
    label: String,
    pair: ImagePair,
}

impl PendingSample {
    fn prepare(label: &str, raw: &[u8], sizes: PairSizes) -> Result<Self> {
        // 校验和编码共用一次解码
        let pair = imaging::encode_pair(raw, sizes)?;
        Ok(Self { label: label.to_owned(), pair })
    }
}

/// 写入批次
///
/// 样本在 `push` 时完成校验和编码，攒满后在一个事务里连同计数器一起提交。
/// 未提交的样本对读者不可见，批次被丢弃时它们也随之丢弃。
pub struct SampleBatch<'s> {
    store: &'s SampleStore,
    sizes: PairSizes,
    capacity: usize,
    pending: Vec<PendingSample>,
}

impl SampleBatch<'_> {
    /// 添加一个样本，如果触发了提交则返回本次提交的序号范围
    pub fn push(&mut self, label: &str, raw: &[u8]) -> Result<Option<Range<u64>>> {
        self.pending.push(PendingSample::prepare(label, raw, self.sizes)?);
        if self.pending.len() >= self.capacity {
            return self.flush().map(Some);
        }
        Ok(None)
    }

    /// 提交所有缓冲的样本
    pub fn flush(&mut self) -> Result<Range<u64>> {
        if self.pending.is_empty() {
            let next = self.store.read_count()? + 1;
            return Ok(next..next);
        }
        let range = self.store.commit(&self.pending)?;
        self.pending.clear();
        Ok(range)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for SampleBatch<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            warn!("丢弃 {} 个未提交的样本", self.pending.len());
        }
    }
}

/// 某一类记录连续缺失的序号区间，两端都包含在内
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingRange {
    pub kind: RecordKind,
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SizeMismatch {
    pub index: u64,
    pub kind: RecordKind,
    pub expected: Size,
    /// 图片无法解码时为 None
    pub actual: Option<Size>,
}

/// 完整性检查的结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    pub count: u64,
    /// `1..=count` 内缺失的键，按记录类型分组并合并成区间
    pub missing: Vec<MissingRange>,
    /// 序号大于 count 的键，通常是写入被中断留下的
    pub orphan_keys: Vec<String>,
    /// 无法解析的键
    pub unknown_keys: Vec<String>,
    pub size_mismatches: Vec<SizeMismatch>,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty()
            && self.orphan_keys.is_empty()
            && self.unknown_keys.is_empty()
            && self.size_mismatches.is_empty()
    }
}

#[cfg(test)]
impl SampleStore {
    pub(crate) fn put_raw(&self, key: &str, value: &[u8]) {
        let handle = self.writable().unwrap();
        let mut wtxn = handle.env.write_txn().unwrap();
        handle.db.put(&mut wtxn, key, value).unwrap();
        wtxn.commit().unwrap();
    }

    pub(crate) fn delete_raw(&self, key: &str) {
        let handle = self.writable().unwrap();
        let mut wtxn = handle.env.write_txn().unwrap();
        handle.db.delete(&mut wtxn, key).unwrap();
        wtxn.commit().unwrap();
    }
}
