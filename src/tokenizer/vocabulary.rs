//! 词表模块
//!
//! 从 Marian 的 `vocab.json` 加载子词到 id 的双向映射。JSON 对象的
//! 值给出 token id；缺少数值时按对象内的出现顺序编号（`serde_json`
//! 开启 `preserve_order`）。加载后不可变。

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use tracing::info;

use crate::error::{TranslationError, TranslationResult};

/// 未知 token
pub const UNKNOWN_TOKEN: &str = "<unk>";
/// 序列结束 token
pub const EOS_TOKEN: &str = "</s>";
/// 填充 token
pub const PAD_TOKEN: &str = "<pad>";

/// 子词 ↔ id 双向词表
#[derive(Debug, Clone)]
pub struct Vocabulary {
    pieces: Vec<String>,
    ids: HashMap<String, i64>,
    unk_id: i64,
    eos_id: i64,
    pad_id: i64,
    language_codes: Vec<String>,
}

impl Vocabulary {
    /// 从 JSON 字节加载词表
    pub fn from_json_slice(bytes: &[u8]) -> TranslationResult<Self> {
        let entries: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(bytes)
            .map_err(|e| TranslationError::VocabularyLoad(format!("解析词表 JSON 失败: {e}")))?;

        if entries.is_empty() {
            return Err(TranslationError::VocabularyLoad("词表为空".to_string()));
        }

        let mut ids = HashMap::with_capacity(entries.len());
        let mut max_id = 0i64;
        for (index, (piece, value)) in entries.iter().enumerate() {
            let id = value.as_i64().unwrap_or(index as i64);
            if id < 0 {
                return Err(TranslationError::VocabularyLoad(format!(
                    "token id 不能为负数: {piece} => {id}"
                )));
            }
            max_id = max_id.max(id);
            ids.insert(piece.clone(), id);
        }

        let mut pieces = vec![UNKNOWN_TOKEN.to_string(); (max_id + 1) as usize];
        for (piece, &id) in &ids {
            pieces[id as usize] = piece.clone();
        }

        let unk_id = Self::required_id(&ids, UNKNOWN_TOKEN)?;
        let eos_id = Self::required_id(&ids, EOS_TOKEN)?;
        let pad_id = Self::required_id(&ids, PAD_TOKEN)?;

        let language_codes = ids
            .keys()
            .filter(|piece| piece.starts_with(">>") && piece.ends_with("<<"))
            .cloned()
            .collect();

        Ok(Self {
            pieces,
            ids,
            unk_id,
            eos_id,
            pad_id,
            language_codes,
        })
    }

    /// 从 JSON 文件加载词表
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref();
        let started = Instant::now();
        let bytes = std::fs::read(path).map_err(|e| {
            TranslationError::VocabularyLoad(format!("读取词表文件 {} 失败: {e}", path.display()))
        })?;

        let vocabulary = Self::from_json_slice(&bytes)?;
        info!(
            path = %path.display(),
            size = vocabulary.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "词表加载完成"
        );
        Ok(vocabulary)
    }

    /// 词表大小
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn unk_id(&self) -> i64 {
        self.unk_id
    }

    pub fn eos_id(&self) -> i64 {
        self.eos_id
    }

    pub fn pad_id(&self) -> i64 {
        self.pad_id
    }

    /// 词表里出现的 `>>lang<<` 目标语言代码
    pub fn language_codes(&self) -> &[String] {
        &self.language_codes
    }

    /// 子词转 id，未收录的子词映射为未知 id
    pub fn id_for_piece(&self, piece: &str) -> i64 {
        self.ids.get(piece).copied().unwrap_or(self.unk_id)
    }

    /// id 转子词，越界 id 映射为未知 token
    pub fn piece_for_id(&self, id: i64) -> &str {
        if id < 0 || id as usize >= self.pieces.len() {
            return UNKNOWN_TOKEN;
        }
        &self.pieces[id as usize]
    }

    /// 判断 id 是否为特殊 token（unk/eos/pad）
    pub fn is_special_id(&self, id: i64) -> bool {
        id == self.unk_id || id == self.eos_id || id == self.pad_id
    }

    /// 遍历全部子词
    pub fn pieces(&self) -> impl Iterator<Item = &str> {
        self.ids.keys().map(String::as_str)
    }

    fn required_id(ids: &HashMap<String, i64>, token: &str) -> TranslationResult<i64> {
        ids.get(token).copied().ok_or_else(|| {
            TranslationError::VocabularyLoad(format!("词表缺少必需的特殊 token: {token}"))
        })
    }
}
