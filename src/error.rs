//! 翻译引擎统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use thiserror::Error;

/// 翻译操作的结果类型
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 词表加载错误
    #[error("词表加载错误: {0}")]
    VocabularyLoad(String),

    /// 模型加载错误
    #[error("模型加载错误: {0}")]
    ModelLoad(String),

    /// 子词切分模型错误
    #[error("子词切分模型错误: {0}")]
    SegmenterLoad(String),

    /// 推理错误
    #[error("推理错误: {0}")]
    Inference(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    InvalidConfig(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    ///
    /// 加载类错误是致命的，重试同一批产物不会改变结果；推理错误
    /// 允许调用方重试整个 `translate` 调用。
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::VocabularyLoad(_) => false,
            TranslationError::ModelLoad(_) => false,
            TranslationError::SegmenterLoad(_) => false,
            TranslationError::Inference(_) => true,
            TranslationError::InvalidConfig(_) => false,
        }
    }

    /// 检查错误是否属于产物加载阶段
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            TranslationError::VocabularyLoad(_)
                | TranslationError::ModelLoad(_)
                | TranslationError::SegmenterLoad(_)
        )
    }
}
