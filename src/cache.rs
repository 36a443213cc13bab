//! 翻译缓存模块
//!
//! 有界 LRU 缓存，键为净化后句子文本（小写化、空白收敛）的 blake3
//! 摘要。内部自带同步：服务在单飞锁之外的首次探查也依赖 `get`/`put`
//! 的原子性。

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

/// 缓存容量兜底值
const FALLBACK_CAPACITY: usize = 64;

/// 批量查询结果
///
/// `resolved` 与输入一一对应（命中为 `Some`），`missing` 按首次出现
/// 顺序收集未命中的原句（按净化键去重）。
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub resolved: Vec<Option<String>>,
    pub missing: Vec<String>,
}

impl CacheLookup {
    /// 是否全部命中
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// 缓存统计信息
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// 计算缓存命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }

    /// 重置统计信息
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 有界 LRU 翻译缓存
pub struct TranslationCache {
    entries: Mutex<LruCache<String, String>>,
    stats: Mutex<CacheStats>,
}

impl TranslationCache {
    /// 创建指定容量的缓存
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::new(FALLBACK_CAPACITY).unwrap());
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// 句子的缓存键：净化文本的 blake3 摘要
    pub fn cache_key(sentence: &str) -> String {
        let sanitized = Self::sanitize(sentence);
        blake3::hash(sanitized.as_bytes()).to_hex().to_string()
    }

    /// 键净化：空白收敛为单个空格并小写化
    fn sanitize(sentence: &str) -> String {
        sentence
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// 查询单个句子
    pub fn get(&self, sentence: &str) -> Option<String> {
        let key = Self::cache_key(sentence);
        let mut entries = self.entries.lock().unwrap();
        let mut stats = self.stats.lock().unwrap();

        stats.total_requests += 1;
        match entries.get(&key) {
            Some(translation) => {
                stats.cache_hits += 1;
                Some(translation.clone())
            }
            None => {
                stats.cache_misses += 1;
                None
            }
        }
    }

    /// 批量查询，保持输入顺序
    pub fn lookup(&self, sentences: &[String]) -> CacheLookup {
        let mut entries = self.entries.lock().unwrap();
        let mut stats = self.stats.lock().unwrap();

        let mut resolved = Vec::with_capacity(sentences.len());
        let mut missing = Vec::new();
        let mut missing_keys = HashSet::new();

        for sentence in sentences {
            let key = Self::cache_key(sentence);
            stats.total_requests += 1;

            match entries.get(&key) {
                Some(translation) => {
                    stats.cache_hits += 1;
                    resolved.push(Some(translation.clone()));
                }
                None => {
                    stats.cache_misses += 1;
                    resolved.push(None);
                    if missing_keys.insert(key) {
                        missing.push(sentence.clone());
                    }
                }
            }
        }

        CacheLookup { resolved, missing }
    }

    /// 写入单个条目
    pub fn put(&self, sentence: &str, translation: &str) {
        let key = Self::cache_key(sentence);
        let mut entries = self.entries.lock().unwrap();

        if let Some((evicted_key, _)) = entries.push(key.clone(), translation.to_string()) {
            if evicted_key != key {
                self.stats.lock().unwrap().evictions += 1;
            }
        }
    }

    /// 成对写入批量条目
    pub fn put_batch(&self, sentences: &[String], translations: &[String]) {
        for (sentence, translation) in sentences.iter().zip(translations) {
            self.put(sentence, translation);
        }
    }

    /// 当前条目数
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// 获取统计信息快照
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().unwrap().clone()
    }

    /// 重置统计信息
    pub fn reset_stats(&self) {
        self.stats.lock().unwrap().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_basic_operations() {
        let cache = TranslationCache::new(16);

        cache.put("Hello world", "Hallo wereld");
        assert_eq!(cache.get("Hello world"), Some("Hallo wereld".to_string()));
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sanitized_keys_collapse_case_and_whitespace() {
        let cache = TranslationCache::new(16);
        cache.put("Hello   world", "Hallo wereld");

        // 大小写与空白差异命中同一条目
        assert_eq!(cache.get("hello world"), Some("Hallo wereld".to_string()));
        assert_eq!(cache.get("HELLO\tWORLD"), Some("Hallo wereld".to_string()));
    }

    #[test]
    fn test_lookup_preserves_order_and_dedups_missing() {
        let cache = TranslationCache::new(16);
        cache.put("b", "B");

        let sentences = vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
            "c".to_string(),
        ];
        let lookup = cache.lookup(&sentences);

        assert_eq!(lookup.resolved[0], None);
        assert_eq!(lookup.resolved[1], Some("B".to_string()));
        assert_eq!(lookup.resolved[2], None);
        assert_eq!(lookup.resolved[3], None);
        // 未命中按首次出现顺序去重
        assert_eq!(lookup.missing, vec!["a".to_string(), "c".to_string()]);
        assert!(!lookup.is_complete());
    }

    #[test]
    fn test_lru_eviction_at_capacity() {
        let cache = TranslationCache::new(2);

        cache.put("one", "1");
        cache.put("two", "2");
        // 访问 one 使其成为最近使用
        cache.get("one");
        cache.put("three", "3");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("one"), Some("1".to_string()));
        assert_eq!(cache.get("two"), None);
        assert_eq!(cache.get("three"), Some("3".to_string()));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_cache_stats() {
        let cache = TranslationCache::new(16);
        cache.put("hello", "hallo");

        cache.get("hello");
        cache.get("world");

        let stats = cache.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);

        cache.reset_stats();
        assert_eq!(cache.stats().total_requests, 0);
    }

    #[test]
    fn test_put_overwrites_same_key() {
        let cache = TranslationCache::new(4);
        cache.put("hello", "first");
        cache.put("Hello", "second");

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("hello"), Some("second".to_string()));
        // 同键覆盖不算驱逐
        assert_eq!(cache.stats().evictions, 0);
    }
}
