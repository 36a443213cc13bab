//! SentencePiece 风格子词切分
//!
//! 以纯算法在进程内复现 SentencePiece 的切分行为：空白预切分加
//! `▁` 词首标记，随后在子词得分（对数概率）上做 Viterbi 最优路径
//! 搜索。未收录字符按单字符子词回退，带固定惩罚分。

use std::collections::HashMap;
use std::path::Path;

use crate::error::{TranslationError, TranslationResult};
use crate::tokenizer::vocabulary::Vocabulary;

/// SentencePiece 的词首标记字符（U+2581）
pub const WORD_BOUNDARY: char = '\u{2581}';

/// 未收录单字符子词的回退得分
const UNKNOWN_PIECE_SCORE: f32 = -100.0;

/// 均匀得分模式下每个子词的得分（等价于最少子词数切分）
const UNIFORM_PIECE_SCORE: f32 = -1.0;

/// 子词切分模型：子词清单及其得分
#[derive(Debug, Clone)]
pub struct SentencePieceModel {
    scores: HashMap<String, f32>,
    max_piece_chars: usize,
}

impl SentencePieceModel {
    /// 从子词与得分对构造模型
    pub fn new(pieces: Vec<(String, f32)>) -> TranslationResult<Self> {
        if pieces.is_empty() {
            return Err(TranslationError::SegmenterLoad(
                "子词清单为空".to_string(),
            ));
        }

        let max_piece_chars = pieces
            .iter()
            .map(|(piece, _)| piece.chars().count())
            .max()
            .unwrap_or(1);

        let scores = pieces.into_iter().collect();
        Ok(Self {
            scores,
            max_piece_chars,
        })
    }

    /// 从 SentencePiece 导出的 `.vocab` TSV（子词<TAB>得分）加载
    pub fn from_tsv_slice(bytes: &[u8]) -> TranslationResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| TranslationError::SegmenterLoad(format!("TSV 不是合法 UTF-8: {e}")))?;

        let mut pieces = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(2, '\t');
            let piece = parts.next().unwrap_or_default();
            if piece.is_empty() {
                continue;
            }
            let score = match parts.next() {
                Some(raw) => raw.trim().parse::<f32>().map_err(|e| {
                    TranslationError::SegmenterLoad(format!(
                        "第 {} 行的得分不可解析: {e}",
                        line_no + 1
                    ))
                })?,
                None => UNIFORM_PIECE_SCORE,
            };
            pieces.push((piece.to_string(), score));
        }

        Self::new(pieces)
    }

    /// 从 `.vocab` TSV 文件加载
    pub fn from_tsv_file<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            TranslationError::SegmenterLoad(format!(
                "读取切分模型 {} 失败: {e}",
                path.display()
            ))
        })?;
        Self::from_tsv_slice(&bytes)
    }

    /// 用 id 词表的子词清单构造均匀得分模型
    ///
    /// 没有独立切分模型文件时的回退路径：均匀得分使 Viterbi 退化为
    /// 最少子词数切分。
    pub fn from_vocabulary(vocabulary: &Vocabulary) -> TranslationResult<Self> {
        let pieces = vocabulary
            .pieces()
            .map(|piece| (piece.to_string(), UNIFORM_PIECE_SCORE))
            .collect();
        Self::new(pieces)
    }

    /// 把文本切分为子词序列
    ///
    /// 空白切分出的每个词前置 `▁`，再对词内字符序列做 Viterbi 最优
    /// 路径。空输入返回空序列。
    pub fn segment(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        for word in text.split_whitespace() {
            let marked: Vec<char> = std::iter::once(WORD_BOUNDARY)
                .chain(word.chars())
                .collect();
            self.segment_word(&marked, &mut pieces);
        }
        pieces
    }

    /// 单个词的 Viterbi 前向 + 回溯
    fn segment_word(&self, chars: &[char], out: &mut Vec<String>) {
        let n = chars.len();
        let mut best_score = vec![f32::NEG_INFINITY; n + 1];
        let mut best_start = vec![usize::MAX; n + 1];
        best_score[0] = 0.0;

        for end in 1..=n {
            let min_start = end.saturating_sub(self.max_piece_chars);
            for start in min_start..end {
                if best_score[start] == f32::NEG_INFINITY {
                    continue;
                }
                let candidate: String = chars[start..end].iter().collect();
                let piece_score = match self.scores.get(&candidate) {
                    Some(score) => *score,
                    // 单字符回退，保证任何输入都有可行路径
                    None if end - start == 1 => UNKNOWN_PIECE_SCORE,
                    None => continue,
                };
                let score = best_score[start] + piece_score;
                if score > best_score[end] {
                    best_score[end] = score;
                    best_start[end] = start;
                }
            }
        }

        let mut boundaries = Vec::new();
        let mut position = n;
        while position > 0 {
            let start = best_start[position];
            boundaries.push((start, position));
            position = start;
        }

        for (start, end) in boundaries.into_iter().rev() {
            out.push(chars[start..end].iter().collect());
        }
    }

    /// 判断子词是否在清单内
    pub fn contains(&self, piece: &str) -> bool {
        self.scores.contains_key(piece)
    }

    /// 子词清单大小
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// 把子词序列拼回文本：直接连接并把 `▁` 还原为空格
pub fn detokenize(pieces: &[String]) -> String {
    pieces
        .concat()
        .replace(WORD_BOUNDARY, " ")
        .trim()
        .to_string()
}
