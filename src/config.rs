//! 翻译配置模块
//!
//! 提供翻译引擎的运行配置：序列长度上限、句子分组、缓存容量、
//! 推理线程数等，支持从 TOML 配置文件加载。

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TranslationError, TranslationResult};

/// 配置常量
pub mod constants {
    /// 编码输入的最大 token 数，超出部分截断
    pub const MAX_INPUT_LENGTH: usize = 512;

    /// 自回归解码的最大步数
    pub const MAX_SEQUENCE_LENGTH: usize = 128;

    /// 句子分组的默认子词数上限
    pub const SENTENCE_GROUP_LENGTH: usize = 192;

    /// 翻译缓存的默认容量
    pub const TRANSLATION_CACHE_SIZE: usize = 64;

    /// 推理会话的默认线程数
    pub const INFERENCE_THREADS: usize = 4;
}

/// 翻译引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// 编码输入的最大 token 数
    pub max_input_length: usize,
    /// 自回归解码的最大步数
    pub max_sequence_length: usize,
    /// 是否按句子分组后分批翻译
    pub sentence_batching: bool,
    /// 句子分组的子词数上限
    pub sentence_group_length: usize,
    /// 翻译缓存容量（条目数）
    pub cache_size: usize,
    /// 推理会话的 intra-op 线程数
    pub intra_threads: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            max_input_length: constants::MAX_INPUT_LENGTH,
            max_sequence_length: constants::MAX_SEQUENCE_LENGTH,
            sentence_batching: true,
            sentence_group_length: constants::SENTENCE_GROUP_LENGTH,
            cache_size: constants::TRANSLATION_CACHE_SIZE,
            intra_threads: constants::INFERENCE_THREADS,
        }
    }
}

impl TranslationConfig {
    /// 从 TOML 配置文件加载
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| TranslationError::InvalidConfig(format!("读取配置文件失败: {e}")))?;

        let config: Self = toml::from_str(&raw)
            .map_err(|e| TranslationError::InvalidConfig(format!("解析配置文件失败: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.max_input_length == 0 {
            return Err(TranslationError::InvalidConfig(
                "max_input_length 必须大于 0".to_string(),
            ));
        }
        if self.max_sequence_length == 0 {
            return Err(TranslationError::InvalidConfig(
                "max_sequence_length 必须大于 0".to_string(),
            ));
        }
        if self.sentence_group_length == 0 {
            return Err(TranslationError::InvalidConfig(
                "sentence_group_length 必须大于 0".to_string(),
            ));
        }
        if self.cache_size == 0 {
            return Err(TranslationError::InvalidConfig(
                "cache_size 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }
}
