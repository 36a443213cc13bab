//! 分词器编解码一致性测试
//!
//! 使用 Opus ja→nl 风格的合成词表验证切分、编码、解码与批量填充
//! 行为，固定值对照。

use opus_translate::tokenizer::{LanguagePair, MarianTokenizer, Tokenizer, TokenizerFiles};

/// Opus ja→nl 风格的合成词表（含真实 id 布局：eos=0、pad=65000）
const VOCAB_JSON: &str = r#"{
    "</s>": 0,
    "<unk>": 1,
    ".": 2,
    "▁een": 15,
    "▁is": 24,
    "▁Dit": 231,
    "▁これは": 650,
    "です": 207,
    "。": 8,
    "▁test": 6811,
    "テスト": 9528,
    "<pad>": 65000
}"#;

fn load_tokenizer() -> MarianTokenizer {
    let dir = tempfile::tempdir().unwrap();
    let vocab_path = dir.path().join("opus-mt-ja-nl-vocab.json");
    std::fs::write(&vocab_path, VOCAB_JSON).unwrap();

    let files = TokenizerFiles {
        source_vocabulary: vocab_path,
        target_vocabulary: None,
        segmenter: None,
    };
    MarianTokenizer::from_files(&files, &LanguagePair::new("ja", "nl")).unwrap()
}

/// 日语句子的子词切分
#[test]
fn test_tokenize_japanese_sentence() {
    let tokenizer = load_tokenizer();

    let output = tokenizer.tokenize("これはテストです。").unwrap();
    assert_eq!(output, vec!["▁これは", "テスト", "です", "。"]);
}

/// 切分结果经词表映射为 id 并追加 eos
#[test]
fn test_encode_japanese_sentence() {
    let tokenizer = load_tokenizer();

    let (input_ids, attention_mask) = tokenizer.encode("これはテストです。", false).unwrap();
    assert_eq!(input_ids, vec![650, 9528, 207, 8, 0]);
    assert_eq!(attention_mask, vec![1, 1, 1, 1, 1]);
}

/// 解码目标端 id 序列，剥除特殊 token
#[test]
fn test_decode_target_ids() {
    let tokenizer = load_tokenizer();

    let input = [65000, 231, 24, 15, 6811, 2, 0];
    assert_eq!(tokenizer.decode(&input, true), "Dit is een test.");
}

/// 保留特殊 token 的解码在首个 eos 处停止
#[test]
fn test_decode_keeps_specials_when_not_filtering() {
    let tokenizer = load_tokenizer();

    let input = [231, 0, 231, 231];
    assert_eq!(tokenizer.decode(&input, false), "Dit</s>");
}

/// 批量编码的矩形与填充不变式
#[test]
fn test_encode_batch_rectangular_with_padding() {
    let tokenizer = load_tokenizer();

    let batch = tokenizer
        .encode_batch(&[
            "これはテストです。".to_string(),
            "Dit is een test.".to_string(),
            "テスト".to_string(),
        ])
        .unwrap();

    assert_eq!(batch.batch_size(), 3);
    let sequence_length = batch.sequence_length();
    let pad_id = tokenizer.pad_id();

    for (ids, mask) in batch.input_ids.iter().zip(&batch.attention_mask) {
        assert_eq!(ids.len(), sequence_length);
        assert_eq!(mask.len(), sequence_length);
        for (&id, &m) in ids.iter().zip(mask) {
            assert!(m == 0 || m == 1);
            if m == 0 {
                assert_eq!(id, pad_id, "mask zero must align with pad id");
            } else {
                assert_ne!(id, pad_id, "real positions must not hold pad id");
            }
        }
    }

    // 最短行必然带填充
    assert!(batch.attention_mask[2].contains(&0));
}

/// 词表外文本：未知子词映射到 unk，仍产生合法编码
#[test]
fn test_out_of_vocabulary_text_encodes_to_unk() {
    let tokenizer = load_tokenizer();

    let (input_ids, _) = tokenizer.encode("xyz", false).unwrap();
    assert!(input_ids.len() > 1);
    assert_eq!(*input_ids.last().unwrap(), tokenizer.eos_id());
    assert!(input_ids[..input_ids.len() - 1]
        .iter()
        .all(|&id| id == tokenizer.unk_id()));
}

/// 空输入编码为仅含 eos 的合法序列
#[test]
fn test_empty_input_is_eos_only() {
    let tokenizer = load_tokenizer();

    let (input_ids, attention_mask) = tokenizer.encode("", false).unwrap();
    assert_eq!(input_ids, vec![tokenizer.eos_id()]);
    assert_eq!(attention_mask, vec![1]);
}
