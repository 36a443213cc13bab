//! 推理引擎模块
//!
//! 管理编码器/解码器两个 ONNX 会话，执行一次前向编码与带逐条提前
//! 终止的自回归贪心解码。会话在 `Mutex` 之后（`Session::run` 需要
//! `&mut`），加载后只读共享。一次调用内创建的张量在调用返回前全部
//! 释放（RAII）。

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use ndarray::{Array2, Array3};
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use crate::config::TranslationConfig;
use crate::error::{TranslationError, TranslationResult};
use crate::tokenizer::TokenBatch;

/// 编码器输出：隐状态张量（batch × sequence × hidden）与对应掩码
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    pub hidden_states: Array3<f32>,
    pub attention_mask: Array2<i64>,
}

impl EncoderOutput {
    pub fn batch_size(&self) -> usize {
        self.hidden_states.shape()[0]
    }
}

/// 编码-解码模型能力集
///
/// 生产实现为 [`OrtTranslationModel`]；测试可提供替身实现。
pub trait TranslationModel: Send + Sync {
    /// 一次前向编码整个批
    fn encode(&self, batch: &TokenBatch) -> TranslationResult<EncoderOutput>;

    /// 自回归解码整个批，返回各行累计的 id 序列（含起始种子与尾部填充）
    fn decode(
        &self,
        encoder_output: &EncoderOutput,
        eos_id: i64,
        pad_id: i64,
    ) -> TranslationResult<Vec<Vec<i64>>>;
}

/// token 选择策略
///
/// 解码循环只依赖这个 trait，贪心 argmax 之外的策略（如 top-k 束
/// 搜索）可以在不改动批次/完成簿记的情况下替换进来。
pub trait TokenSelector: Send + Sync {
    /// 在末位 logits 上选出下一个 token id
    fn select(&self, logits: &[f32]) -> i64;
}

/// 贪心 argmax：并列时取最先出现的最大值
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySelector;

impl TokenSelector for GreedySelector {
    fn select(&self, logits: &[f32]) -> i64 {
        let mut best_index = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for (index, &score) in logits.iter().enumerate() {
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }
        best_index as i64
    }
}

/// 取 logits 中得分最高的 k 个 id，不排序整个数组
///
/// 束搜索策略的构件：每行取 top-k 候选后对部分假设打分。
pub fn top_k_indices(logits: &[f32], k: usize) -> Vec<i64> {
    if k == 0 {
        return Vec::new();
    }

    // (id, score) 的有界选择，容量 k，淘汰当前最小值
    let mut selected: Vec<(usize, f32)> = Vec::with_capacity(k);
    for (index, &score) in logits.iter().enumerate() {
        if selected.len() < k {
            selected.push((index, score));
            continue;
        }
        let (min_position, &(_, min_score)) = selected
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.1.total_cmp(&b.1))
            .unwrap_or((0, &(0, f32::NEG_INFINITY)));
        if score > min_score {
            selected[min_position] = (index, score);
        }
    }

    selected.sort_by(|a, b| b.1.total_cmp(&a.1));
    selected.into_iter().map(|(index, _)| index as i64).collect()
}

/// 单次解码调用的批内状态
///
/// 每行一条生成序列、一个完成标记，以及完成行计数。
struct DecoderState {
    sequences: Vec<Vec<i64>>,
    complete: Vec<bool>,
    completed_count: usize,
}

impl DecoderState {
    /// 以填充 id 作为每行的起始种子
    fn new(batch_size: usize, pad_id: i64) -> Self {
        Self {
            sequences: vec![vec![pad_id]; batch_size],
            complete: vec![false; batch_size],
            completed_count: 0,
        }
    }

    fn is_complete(&self, index: usize) -> bool {
        self.complete[index]
    }

    fn is_done(&self) -> bool {
        self.completed_count == self.sequences.len()
    }

    fn mark_complete(&mut self, index: usize) {
        if !self.complete[index] {
            self.complete[index] = true;
            self.completed_count += 1;
        }
    }

    fn push(&mut self, index: usize, token: i64) {
        self.sequences[index].push(token);
    }

    /// 当前各行序列长度（矩形不变式下全行一致）
    fn sequence_length(&self) -> usize {
        self.sequences.first().map_or(0, Vec::len)
    }

    /// 展平成行主序，供张量构造
    fn flattened(&self) -> Vec<i64> {
        self.sequences.iter().flatten().copied().collect()
    }

    fn into_sequences(self) -> Vec<Vec<i64>> {
        self.sequences
    }
}

/// 基于 ONNX Runtime 的编码-解码模型
pub struct OrtTranslationModel {
    encoder: Option<Mutex<Session>>,
    decoder: Option<Mutex<Session>>,
    selector: Box<dyn TokenSelector>,
    max_sequence_length: usize,
    intra_threads: usize,
}

impl OrtTranslationModel {
    /// 构造未加载的模型
    pub fn new(config: &TranslationConfig) -> Self {
        Self {
            encoder: None,
            decoder: None,
            selector: Box::new(GreedySelector),
            max_sequence_length: config.max_sequence_length,
            intra_threads: config.intra_threads,
        }
    }

    /// 替换 token 选择策略
    pub fn with_selector(mut self, selector: Box<dyn TokenSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// 从字节数组加载编码器/解码器会话
    pub fn load_from_bytes(&mut self, encoder: &[u8], decoder: &[u8]) -> TranslationResult<()> {
        let started = Instant::now();

        self.encoder = Some(Mutex::new(Self::build_session_from_bytes(
            encoder,
            self.intra_threads,
            "编码器",
        )?));
        self.decoder = Some(Mutex::new(Self::build_session_from_bytes(
            decoder,
            self.intra_threads,
            "解码器",
        )?));

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "推理会话加载完成"
        );
        Ok(())
    }

    /// 从文件加载编码器/解码器会话
    pub fn load_from_files<P: AsRef<Path>>(
        &mut self,
        encoder: P,
        decoder: P,
    ) -> TranslationResult<()> {
        let encoder_bytes = std::fs::read(encoder.as_ref()).map_err(|e| {
            TranslationError::ModelLoad(format!(
                "读取编码器模型 {} 失败: {e}",
                encoder.as_ref().display()
            ))
        })?;
        let decoder_bytes = std::fs::read(decoder.as_ref()).map_err(|e| {
            TranslationError::ModelLoad(format!(
                "读取解码器模型 {} 失败: {e}",
                decoder.as_ref().display()
            ))
        })?;

        self.load_from_bytes(&encoder_bytes, &decoder_bytes)
    }

    /// 两个会话是否均已就绪
    pub fn is_loaded(&self) -> bool {
        self.encoder.is_some() && self.decoder.is_some()
    }

    fn build_session_from_bytes(
        bytes: &[u8],
        intra_threads: usize,
        label: &str,
    ) -> TranslationResult<Session> {
        Session::builder()
            .map_err(|e| TranslationError::ModelLoad(format!("创建{label}会话失败: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| TranslationError::ModelLoad(format!("设置{label}线程数失败: {e}")))?
            .commit_from_memory(bytes)
            .map_err(|e| TranslationError::ModelLoad(format!("加载{label}模型失败: {e}")))
    }
}

impl TranslationModel for OrtTranslationModel {
    fn encode(&self, batch: &TokenBatch) -> TranslationResult<EncoderOutput> {
        // 编码器会话不可用对调用方是致命前置条件
        let session_lock = self
            .encoder
            .as_ref()
            .ok_or_else(|| TranslationError::ModelLoad("编码器会话未加载".to_string()))?;

        let batch_size = batch.batch_size();
        let sequence_length = batch.sequence_length();

        let ids_flat: Vec<i64> = batch.input_ids.iter().flatten().copied().collect();
        let mask_flat: Vec<i64> = batch.attention_mask.iter().flatten().copied().collect();

        let input_ids =
            Tensor::from_array(([batch_size as i64, sequence_length as i64], ids_flat))
                .map_err(|e| TranslationError::Inference(format!("构造 input_ids 张量失败: {e}")))?;
        let attention_mask = Tensor::from_array((
            [batch_size as i64, sequence_length as i64],
            mask_flat.clone(),
        ))
        .map_err(|e| TranslationError::Inference(format!("构造 attention_mask 张量失败: {e}")))?;

        let mut session = session_lock
            .lock()
            .map_err(|_| TranslationError::Inference("编码器会话锁中毒".to_string()))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
            ])
            .map_err(|e| TranslationError::Inference(format!("编码器前向失败: {e}")))?;

        let (shape, data) = outputs["last_hidden_state"]
            .try_extract_tensor::<f32>()
            .map_err(|e| TranslationError::Inference(format!("提取编码器隐状态失败: {e}")))?;

        let hidden_states = Array3::from_shape_vec(
            (shape[0] as usize, shape[1] as usize, shape[2] as usize),
            data.to_vec(),
        )
        .map_err(|e| TranslationError::Inference(format!("编码器隐状态形状不合法: {e}")))?;

        let attention_mask = Array2::from_shape_vec((batch_size, sequence_length), mask_flat)
            .map_err(|e| TranslationError::Inference(format!("注意力掩码形状不合法: {e}")))?;

        debug!(
            batch = batch_size,
            sequence = sequence_length,
            hidden = hidden_states.shape()[2],
            "编码完成"
        );

        Ok(EncoderOutput {
            hidden_states,
            attention_mask,
        })
    }

    fn decode(
        &self,
        encoder_output: &EncoderOutput,
        eos_id: i64,
        pad_id: i64,
    ) -> TranslationResult<Vec<Vec<i64>>> {
        let batch_size = encoder_output.batch_size();
        let mut state = DecoderState::new(batch_size, pad_id);

        // 解码器会话不可用时退化为返回已累计的结果
        let Some(session_lock) = self.decoder.as_ref() else {
            return Ok(state.into_sequences());
        };
        let mut session = session_lock
            .lock()
            .map_err(|_| TranslationError::Inference("解码器会话锁中毒".to_string()))?;

        let enc_shape = encoder_output.hidden_states.shape();
        let (enc_batch, enc_sequence, hidden) = (enc_shape[0], enc_shape[1], enc_shape[2]);
        let hidden_flat: Vec<f32> = encoder_output.hidden_states.iter().copied().collect();
        let mask_flat: Vec<i64> = encoder_output.attention_mask.iter().copied().collect();

        let started = Instant::now();
        let mut steps_made = 0usize;

        for _step in 0..self.max_sequence_length {
            if state.is_done() {
                break;
            }

            let sequence_length = state.sequence_length();
            let input_ids = Tensor::from_array((
                [batch_size as i64, sequence_length as i64],
                state.flattened(),
            ))
            .map_err(|e| TranslationError::Inference(format!("构造解码输入张量失败: {e}")))?;
            let encoder_hidden_states = Tensor::from_array((
                [enc_batch as i64, enc_sequence as i64, hidden as i64],
                hidden_flat.clone(),
            ))
            .map_err(|e| TranslationError::Inference(format!("构造隐状态张量失败: {e}")))?;
            let encoder_attention_mask = Tensor::from_array((
                [enc_batch as i64, enc_sequence as i64],
                mask_flat.clone(),
            ))
            .map_err(|e| TranslationError::Inference(format!("构造掩码张量失败: {e}")))?;
            let use_cache_branch = Tensor::from_array(([1i64], vec![false]))
                .map_err(|e| TranslationError::Inference(format!("构造缓存开关张量失败: {e}")))?;

            let outputs = session
                .run(ort::inputs![
                    "input_ids" => input_ids,
                    "encoder_attention_mask" => encoder_attention_mask,
                    "encoder_hidden_states" => encoder_hidden_states,
                    "use_cache_branch" => use_cache_branch,
                ])
                .map_err(|e| TranslationError::Inference(format!("解码器前向失败: {e}")))?;

            let (shape, logits) = outputs["logits"]
                .try_extract_tensor::<f32>()
                .map_err(|e| TranslationError::Inference(format!("提取 logits 失败: {e}")))?;
            let out_sequence = shape[1] as usize;
            let vocab_size = shape[2] as usize;

            for row in 0..batch_size {
                // 已完成的行追加填充，保持整批矩形
                if state.is_complete(row) {
                    state.push(row, pad_id);
                    continue;
                }

                let offset = (row * out_sequence + (out_sequence - 1)) * vocab_size;
                let row_logits = &logits[offset..offset + vocab_size];
                let token = self.selector.select(row_logits);

                state.push(row, token);
                if token == eos_id {
                    state.mark_complete(row);
                }
            }

            steps_made += 1;
        }

        debug!(
            steps = steps_made,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "解码完成"
        );

        Ok(state.into_sequences())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greedy_selector_first_max_wins() {
        let selector = GreedySelector;
        assert_eq!(selector.select(&[0.1, 0.9, 0.3]), 1);
        // 并列时取最先出现的最大值
        assert_eq!(selector.select(&[0.5, 0.5, 0.5]), 0);
        assert_eq!(selector.select(&[-3.0, -1.0, -1.0]), 1);
    }

    #[test]
    fn test_top_k_indices() {
        let ids = top_k_indices(&[0.1, 0.9, 0.3, 0.7], 2);
        assert_eq!(ids, vec![1, 3]);
        assert!(top_k_indices(&[0.1, 0.2], 0).is_empty());
        assert_eq!(top_k_indices(&[0.2, 0.1], 5).len(), 2);
    }

    #[test]
    fn test_decoder_state_bookkeeping() {
        let mut state = DecoderState::new(3, 60_000);
        assert!(!state.is_done());
        assert_eq!(state.sequence_length(), 1);

        state.push(0, 7);
        state.push(1, 8);
        state.push(2, 9);
        assert_eq!(state.sequence_length(), 2);

        state.mark_complete(0);
        state.mark_complete(0);
        state.mark_complete(1);
        state.mark_complete(2);
        assert!(state.is_done());

        let sequences = state.into_sequences();
        assert_eq!(sequences[0], vec![60_000, 7]);
    }

    #[test]
    fn test_unloaded_decoder_returns_seed_rows() {
        let model = OrtTranslationModel::new(&TranslationConfig::default());
        let encoder_output = EncoderOutput {
            hidden_states: Array3::zeros((2, 3, 4)),
            attention_mask: Array2::ones((2, 3)),
        };
        let rows = model.decode(&encoder_output, 0, 65_000).unwrap();
        assert_eq!(rows, vec![vec![65_000], vec![65_000]]);
    }

    #[test]
    fn test_unloaded_encoder_is_fatal() {
        let model = OrtTranslationModel::new(&TranslationConfig::default());
        let batch = TokenBatch {
            input_ids: vec![vec![1, 0]],
            attention_mask: vec![vec![1, 1]],
        };
        assert!(matches!(
            model.encode(&batch),
            Err(TranslationError::ModelLoad(_))
        ));
    }
}
