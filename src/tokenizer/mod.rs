//! 分词模块
//!
//! 提供面向 Marian/Opus-MT 模型的子词分词能力：
//! - **vocabulary**: 子词 ↔ id 双向词表
//! - **sentencepiece**: 进程内的 SentencePiece 风格切分
//! - `MarianTokenizer`: 编码/解码/分句的生产实现，统一在
//!   [`Tokenizer`] trait 之后，便于在测试里替换。

pub mod sentencepiece;
pub mod vocabulary;

use std::path::PathBuf;

use regex::Regex;

use crate::config::constants;
use crate::error::TranslationResult;
use crate::normalizer::{NormalizerConfig, PunctuationNormalizer};

pub use sentencepiece::{detokenize, SentencePieceModel, WORD_BOUNDARY};
pub use vocabulary::{Vocabulary, EOS_TOKEN, PAD_TOKEN, UNKNOWN_TOKEN};

/// 句末边界字符
const SENTENCE_BOUNDARIES: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// 语言对（ISO 代码）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

/// 分词器的模型产物文件
#[derive(Debug, Clone)]
pub struct TokenizerFiles {
    /// 源端词表 JSON
    pub source_vocabulary: PathBuf,
    /// 独立的目标端词表 JSON（多数 Opus 模型与源端共用）
    pub target_vocabulary: Option<PathBuf>,
    /// SentencePiece `.vocab` TSV；缺省时由词表推导均匀得分模型
    pub segmenter: Option<PathBuf>,
}

/// 批量编码结果：等长的 id 矩阵与注意力掩码矩阵
///
/// 不变式：两个矩阵形状一致；掩码为 0 的位置 id 必为 pad。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBatch {
    pub input_ids: Vec<Vec<i64>>,
    pub attention_mask: Vec<Vec<i64>>,
}

impl TokenBatch {
    pub fn batch_size(&self) -> usize {
        self.input_ids.len()
    }

    pub fn sequence_length(&self) -> usize {
        self.input_ids.first().map_or(0, Vec::len)
    }
}

/// 分词能力集
///
/// 生产实现为 [`MarianTokenizer`]；测试可提供替身实现。
pub trait Tokenizer: Send + Sync {
    /// 词表大小
    fn vocab_size(&self) -> usize;
    /// 序列结束 id
    fn eos_id(&self) -> i64;
    /// 填充 id
    fn pad_id(&self) -> i64;
    /// 未知 id
    fn unk_id(&self) -> i64;

    /// 归一化源文本
    fn normalize(&self, text: &str) -> String;

    /// 把文本切分为子词序列
    fn tokenize(&self, text: &str) -> TranslationResult<Vec<String>>;

    /// 编码单条文本为 (ids, attention_mask)
    ///
    /// 追加 eos；`pad_tokens` 为 true 时右填充到输入长度上限。
    fn encode(&self, text: &str, pad_tokens: bool) -> TranslationResult<(Vec<i64>, Vec<i64>)>;

    /// 批量编码，右填充到批内最大长度
    fn encode_batch(&self, texts: &[String]) -> TranslationResult<TokenBatch>;

    /// 把 id 序列解码回文本，在首个 eos 处停止
    fn decode(&self, ids: &[i64], filter_special_tokens: bool) -> String;

    /// 批量解码
    fn decode_batch(&self, ids: &[Vec<i64>], filter_special_tokens: bool) -> Vec<String> {
        ids.iter()
            .map(|row| self.decode(row, filter_special_tokens))
            .collect()
    }

    /// 分句并按子词数贪心重组
    fn split_sentences(&self, text: &str, group_length: usize) -> Vec<String>;
}

/// Marian/Opus-MT 分词器
pub struct MarianTokenizer {
    vocabulary: Vocabulary,
    target_vocabulary: Option<Vocabulary>,
    model: SentencePieceModel,
    normalizer: PunctuationNormalizer,
    language_code: Regex,
    max_input_length: usize,
}

impl MarianTokenizer {
    /// 从已加载的词表与切分模型构造
    pub fn new(
        vocabulary: Vocabulary,
        target_vocabulary: Option<Vocabulary>,
        model: SentencePieceModel,
        languages: &LanguagePair,
    ) -> Self {
        Self {
            vocabulary,
            target_vocabulary,
            model,
            normalizer: PunctuationNormalizer::new(NormalizerConfig::for_lang(&languages.source)),
            language_code: Regex::new(r"^>>[^<>]+<<\s*").expect("language code pattern"),
            max_input_length: constants::MAX_INPUT_LENGTH,
        }
    }

    /// 从模型产物文件加载
    pub fn from_files(files: &TokenizerFiles, languages: &LanguagePair) -> TranslationResult<Self> {
        let vocabulary = Vocabulary::from_json_file(&files.source_vocabulary)?;

        let target_vocabulary = match &files.target_vocabulary {
            Some(path) => Some(Vocabulary::from_json_file(path)?),
            None => None,
        };

        let model = match &files.segmenter {
            Some(path) => SentencePieceModel::from_tsv_file(path)?,
            None => SentencePieceModel::from_vocabulary(&vocabulary)?,
        };

        Ok(Self::new(vocabulary, target_vocabulary, model, languages))
    }

    /// 覆盖输入长度上限
    pub fn with_max_input_length(mut self, max_input_length: usize) -> Self {
        self.max_input_length = max_input_length;
        self
    }

    /// 源端词表
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// 剥离 `>>lang<<` 目标语言前缀
    fn split_language_code<'a>(&self, text: &'a str) -> (Option<String>, &'a str) {
        match self.language_code.find(text) {
            Some(found) => {
                let code = found.as_str().trim_end().to_string();
                (Some(code), &text[found.end()..])
            }
            None => (None, text),
        }
    }

    /// 解码使用的词表：独立目标词表缺省时回退到源端
    fn decode_vocabulary(&self) -> &Vocabulary {
        self.target_vocabulary.as_ref().unwrap_or(&self.vocabulary)
    }

    /// 按句末标点切开文本，边界为标点后跟空白
    fn split_on_boundaries(text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut current = String::new();
        let mut chars = text.trim().chars().peekable();

        while let Some(c) = chars.next() {
            current.push(c);
            if SENTENCE_BOUNDARIES.contains(&c)
                && chars.peek().is_some_and(|next| next.is_whitespace())
            {
                while chars.peek().is_some_and(|next| next.is_whitespace()) {
                    chars.next();
                }
                sentences.push(std::mem::take(&mut current));
            }
        }

        if !current.trim().is_empty() {
            sentences.push(current);
        }
        sentences
    }
}

impl Tokenizer for MarianTokenizer {
    fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    fn eos_id(&self) -> i64 {
        self.vocabulary.eos_id()
    }

    fn pad_id(&self) -> i64 {
        self.vocabulary.pad_id()
    }

    fn unk_id(&self) -> i64 {
        self.vocabulary.unk_id()
    }

    fn normalize(&self, text: &str) -> String {
        self.normalizer.normalize(text)
    }

    fn tokenize(&self, text: &str) -> TranslationResult<Vec<String>> {
        let (code, remainder) = self.split_language_code(text);

        let mut tokens = Vec::new();
        if let Some(code) = code {
            tokens.push(code);
        }
        tokens.extend(self.model.segment(remainder));
        Ok(tokens)
    }

    fn encode(&self, text: &str, pad_tokens: bool) -> TranslationResult<(Vec<i64>, Vec<i64>)> {
        let tokens = self.tokenize(text)?;

        // 零子词输入编码为仅含 eos 的合法序列
        let mut input_ids: Vec<i64> = tokens
            .iter()
            .map(|token| self.vocabulary.id_for_piece(token))
            .collect();
        input_ids.push(self.vocabulary.eos_id());

        if input_ids.len() > self.max_input_length {
            input_ids.truncate(self.max_input_length);
        }

        let real_length = input_ids.len();
        if pad_tokens && real_length < self.max_input_length {
            input_ids.resize(self.max_input_length, self.vocabulary.pad_id());
        }

        let mut attention_mask = vec![1i64; real_length];
        attention_mask.resize(input_ids.len(), 0);

        Ok((input_ids, attention_mask))
    }

    fn encode_batch(&self, texts: &[String]) -> TranslationResult<TokenBatch> {
        let mut rows = Vec::with_capacity(texts.len());
        for text in texts {
            rows.push(self.encode(text, false)?);
        }

        let max_length = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0);

        let mut input_ids = Vec::with_capacity(rows.len());
        let mut attention_mask = Vec::with_capacity(rows.len());
        for (mut ids, mut mask) in rows {
            ids.resize(max_length, self.vocabulary.pad_id());
            mask.resize(max_length, 0);
            input_ids.push(ids);
            attention_mask.push(mask);
        }

        Ok(TokenBatch {
            input_ids,
            attention_mask,
        })
    }

    fn decode(&self, ids: &[i64], filter_special_tokens: bool) -> String {
        let vocabulary = self.decode_vocabulary();

        let mut pieces = Vec::new();
        for &id in ids {
            if !(filter_special_tokens && self.vocabulary.is_special_id(id)) {
                pieces.push(vocabulary.piece_for_id(id).to_string());
            }
            if id == self.vocabulary.eos_id() {
                break;
            }
        }

        detokenize(&pieces)
    }

    fn split_sentences(&self, text: &str, group_length: usize) -> Vec<String> {
        let sentences = Self::split_on_boundaries(text);

        let mut result = Vec::new();
        let mut group = String::new();
        let mut group_pieces = 0usize;

        for sentence in sentences {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }

            let piece_count = self.model.segment(sentence).len();
            if group_pieces + piece_count > group_length {
                if !group.is_empty() {
                    result.push(group.trim().to_string());
                    group.clear();
                    group_pieces = 0;
                }

                result.push(sentence.to_string());
                continue;
            }

            group.push_str(sentence);
            group.push(' ');
            group_pieces += piece_count;
        }

        if !group.is_empty() {
            result.push(group.trim().to_string());
        }

        result
    }
}
