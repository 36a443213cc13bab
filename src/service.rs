//! 翻译服务模块
//!
//! 组合归一化、分句、缓存与推理：缓存命中即时返回，未命中在全局
//! 单飞锁内完成 编码 → 推理 → 解码 → 回填缓存。锁内二次探查避免
//! 并发调用对同一批句子的重复推理；输出顺序始终与输入一致。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cache::TranslationCache;
use crate::config::TranslationConfig;
use crate::error::{TranslationError, TranslationResult};
use crate::inference::TranslationModel;
use crate::tokenizer::Tokenizer;

/// 翻译服务
pub struct TranslatorService {
    tokenizer: Arc<dyn Tokenizer>,
    model: Arc<dyn TranslationModel>,
    cache: Arc<TranslationCache>,
    flight: Mutex<()>,
    config: TranslationConfig,
}

impl TranslatorService {
    /// 创建翻译服务
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        model: Arc<dyn TranslationModel>,
        config: TranslationConfig,
    ) -> Self {
        let cache = Arc::new(TranslationCache::new(config.cache_size));
        Self {
            tokenizer,
            model,
            cache,
            flight: Mutex::new(()),
            config,
        }
    }

    /// 翻译单段文本
    ///
    /// 归一化后按句子分组翻译，逐组结果以单个空格拼接。空输入返回
    /// 空串。
    pub async fn translate(&self, input: &str) -> TranslationResult<String> {
        let normalized = self.tokenizer.normalize(input);
        if normalized.is_empty() {
            return Ok(String::new());
        }

        let sentences = if self.config.sentence_batching {
            self.tokenizer
                .split_sentences(&normalized, self.config.sentence_group_length)
        } else {
            vec![normalized]
        };

        let translations = self.translate_batch(&sentences).await?;
        Ok(translations.join(" "))
    }

    /// 翻译有序的句子序列，输出顺序与输入一一对应
    pub async fn translate_batch(&self, sentences: &[String]) -> TranslationResult<Vec<String>> {
        if sentences.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();

        // 锁外探查：全部命中时不触碰单飞锁
        let first_pass = self.cache.lookup(sentences);
        if first_pass.is_complete() {
            debug!(sentences = sentences.len(), "翻译全部命中缓存");
            return Ok(Self::collapse(first_pass.resolved));
        }

        let _flight = self.flight.lock().await;

        // 二次探查：等待锁期间其它调用可能已补齐这批句子
        let second_pass = self.cache.lookup(sentences);
        if second_pass.is_complete() {
            debug!(
                sentences = sentences.len(),
                "等待单飞锁期间缓存已补齐"
            );
            return Ok(Self::collapse(second_pass.resolved));
        }

        let missing = second_pass.missing;
        let translated = self.run_inference(&missing).await?;

        // 按输入顺序装配：命中槽位直接取值，未命中槽位用本批结果回填
        let fresh: HashMap<String, String> = missing
            .iter()
            .map(|sentence| TranslationCache::cache_key(sentence))
            .zip(translated)
            .collect();

        let mut output = Vec::with_capacity(sentences.len());
        for (sentence, resolved) in sentences.iter().zip(second_pass.resolved) {
            match resolved {
                Some(translation) => output.push(translation),
                None => {
                    let translation = fresh
                        .get(&TranslationCache::cache_key(sentence))
                        .cloned()
                        .ok_or_else(|| {
                            TranslationError::Inference("未命中句子缺少翻译结果".to_string())
                        })?;
                    output.push(translation);
                }
            }
        }

        info!(
            sentences = sentences.len(),
            misses = missing.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "翻译完成"
        );

        Ok(output)
    }

    /// 缓存统计
    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.stats()
    }

    /// 清空翻译缓存
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// 未命中批的推理路径：编码 → 前向 → 解码 → 反分词 → 回填缓存
    ///
    /// CPU 密集的模型调用放到 blocking 线程，避免阻塞异步运行时。
    /// 缓存回填也发生在该线程内：即使调用方在等待期间被取消，已经
    /// 触发的临界区仍会跑完并为其它等待者补齐缓存。整批解码成功后
    /// 才写缓存，失败不产生部分提交。
    async fn run_inference(&self, sentences: &[String]) -> TranslationResult<Vec<String>> {
        let tokenizer = Arc::clone(&self.tokenizer);
        let model = Arc::clone(&self.model);
        let cache = Arc::clone(&self.cache);
        let batch_sentences = sentences.to_vec();

        tokio::task::spawn_blocking(move || -> TranslationResult<Vec<String>> {
            let batch = tokenizer.encode_batch(&batch_sentences)?;
            let encoder_output = model.encode(&batch)?;
            let token_ids =
                model.decode(&encoder_output, tokenizer.eos_id(), tokenizer.pad_id())?;
            let translated = tokenizer.decode_batch(&token_ids, true);

            if translated.len() != batch_sentences.len() {
                return Err(TranslationError::Inference(format!(
                    "推理结果数量与未命中句子数不一致: {} != {}",
                    translated.len(),
                    batch_sentences.len()
                )));
            }

            cache.put_batch(&batch_sentences, &translated);
            Ok(translated)
        })
        .await
        .map_err(|e| TranslationError::Inference(format!("推理任务中断: {e}")))?
    }

    /// 全命中结果的展开
    fn collapse(resolved: Vec<Option<String>>) -> Vec<String> {
        resolved
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect()
    }
}
