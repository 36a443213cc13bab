//! # Opus Translate
//!
//! 端侧神经机器翻译引擎库：输入源语言文本，经子词分词、编码-解码
//! 推理，输出目标语言译文。依赖外部提供的 Marian/Opus-MT 编码器与
//! 解码器 ONNX 产物及配套词表。
//!
//! ## 模块组织
//!
//! - `normalizer` - Moses 风格标点归一化
//! - `tokenizer` - 词表、SentencePiece 风格子词切分与编解码
//! - `inference` - ONNX 编码器/解码器会话与自回归解码
//! - `cache` - 有界 LRU 翻译缓存
//! - `service` - 单飞编排的翻译服务
//! - `config` - 运行配置
//! - `error` - 统一错误处理
//!
//! ## 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use opus_translate::{
//!     LanguagePair, MarianTokenizer, OrtTranslationModel, TokenizerFiles,
//!     TranslationConfig, TranslatorService,
//! };
//!
//! # async fn example() -> opus_translate::TranslationResult<()> {
//! let config = TranslationConfig::default();
//!
//! let files = TokenizerFiles {
//!     source_vocabulary: "opus-mt-ja-nl-vocab.json".into(),
//!     target_vocabulary: None,
//!     segmenter: None,
//! };
//! let tokenizer = MarianTokenizer::from_files(&files, &LanguagePair::new("ja", "nl"))?;
//!
//! let mut model = OrtTranslationModel::new(&config);
//! model.load_from_files("encoder_model.onnx", "decoder_model.onnx")?;
//!
//! let service = TranslatorService::new(Arc::new(tokenizer), Arc::new(model), config);
//! let translated = service.translate("これはテストです。").await?;
//! # let _ = translated;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod inference;
pub mod normalizer;
pub mod service;
pub mod tokenizer;

// Re-export commonly used items for convenience
pub use cache::{CacheLookup, CacheStats, TranslationCache};
pub use config::{constants, TranslationConfig};
pub use error::{TranslationError, TranslationResult};
pub use inference::{
    top_k_indices, EncoderOutput, GreedySelector, OrtTranslationModel, TokenSelector,
    TranslationModel,
};
pub use normalizer::{NormalizerConfig, PunctuationNormalizer};
pub use service::TranslatorService;
pub use tokenizer::{
    LanguagePair, MarianTokenizer, SentencePieceModel, TokenBatch, Tokenizer, TokenizerFiles,
    Vocabulary,
};
