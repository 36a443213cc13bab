//! Moses 标点归一化一致性测试
//!
//! 固定输入/输出对照，覆盖空白收敛、引号逗号、数字、撇号、全角
//! 标点与 Perl 对齐模式。

use opus_translate::{NormalizerConfig, PunctuationNormalizer};

/// 文档类文本的空白与括号收敛
#[test]
fn test_normalize_documents() {
    let normalizer = PunctuationNormalizer::default();

    let inputs = [
        "The United States in 1805 (color map)                 _Facing_     193",
        "=Formation of the Constitution.=--(1) The plans before the convention,",
        "directions--(1) The infective element must be eliminated. When the ulcer",
        "College of Surgeons, Edinburgh.)]",
    ];
    let expected = [
        "The United States in 1805 (color map) _Facing_ 193",
        "=Formation of the Constitution.=-- (1) The plans before the convention,",
        "directions-- (1) The infective element must be eliminated. When the ulcer",
        "College of Surgeons, Edinburgh.) ]",
    ];

    for (text, expect) in inputs.iter().zip(expected) {
        assert_eq!(normalizer.normalize(text), expect);
    }
}

/// 英语引号内句点规则的开关对比
#[test]
fn test_normalize_quote_comma() {
    let with_quotes = PunctuationNormalizer::new(NormalizerConfig {
        norm_quote_commas: true,
        ..NormalizerConfig::for_lang("en")
    });
    let without_quotes = PunctuationNormalizer::new(NormalizerConfig {
        norm_quote_commas: false,
        ..NormalizerConfig::for_lang("en")
    });

    let text = "THIS EBOOK IS OTHERWISE PROVIDED TO YOU \"AS-IS\".";

    assert_eq!(
        with_quotes.normalize(text),
        "THIS EBOOK IS OTHERWISE PROVIDED TO YOU \"AS-IS.\""
    );
    assert_eq!(
        without_quotes.normalize(text),
        "THIS EBOOK IS OTHERWISE PROVIDED TO YOU \"AS-IS\"."
    );
}

/// 数字间不间断空格作为千位分隔符的改写
#[test]
fn test_normalize_numbers() {
    let with_numbers = PunctuationNormalizer::new(NormalizerConfig {
        norm_numbers: true,
        ..NormalizerConfig::for_lang("en")
    });
    let without_numbers = PunctuationNormalizer::new(NormalizerConfig {
        norm_numbers: false,
        ..NormalizerConfig::for_lang("en")
    });

    assert_eq!(with_numbers.normalize("12\u{a0}123"), "12.123");
    assert_eq!(without_numbers.normalize("12 123"), "12 123");
}

/// 德/西/法语按逗号改写
#[test]
fn test_normalize_numbers_comma_languages() {
    let german = PunctuationNormalizer::new(NormalizerConfig::for_lang("de"));
    assert_eq!(german.normalize("12\u{a0}123"), "12,123");
}

/// 空格后的弯撇号归一为直撇号
#[test]
fn test_normalize_single_apostrophe() {
    let normalizer = PunctuationNormalizer::default();
    assert_eq!(
        normalizer.normalize("yesterday ’s reception"),
        "yesterday 's reception"
    );
}

/// 全角折叠 + 控制字符剥除的完整管线
#[test]
fn test_normalization_pipeline() {
    let normalizer = PunctuationNormalizer::new(NormalizerConfig {
        pre_replace_unicode_punct: true,
        post_remove_control_chars: true,
        ..Default::default()
    });

    let text = "０《１２３》      ４５６％  '' 【７８９】";
    assert_eq!(normalizer.normalize(text), "0\"123\" 456% \" [789]");
}

/// Perl 参照实现对齐模式：混合弯引号与书名号的非对称折叠
#[test]
fn test_normalize_with_perl_parity() {
    let normalizer = PunctuationNormalizer::new(NormalizerConfig {
        perl_parity: true,
        ..Default::default()
    });

    let text = "from the ‘bad bank’, Northern, wala\u{a0}«\u{a0}dox ci jawwu Les «\u{a0}wagonways\u{a0}»\u{a0}étaient construits";
    let expected = "from the 'bad bank,\" Northern, wala \"dox ci jawwu Les \"wagonways\" étaient construits";
    assert_eq!(normalizer.normalize(text), expected);
}

/// 归一化幂等：normalize(normalize(x)) == normalize(x)
#[test]
fn test_idempotence_over_fixture_corpus() {
    let configs = [
        NormalizerConfig::default(),
        NormalizerConfig {
            pre_replace_unicode_punct: true,
            post_remove_control_chars: true,
            ..Default::default()
        },
        NormalizerConfig {
            perl_parity: true,
            ..Default::default()
        },
    ];

    let samples = [
        "",
        "Plain text with no changes.",
        "The United States in 1805 (color map)                 _Facing_     193",
        "=Formation of the Constitution.=--(1) The plans before the convention,",
        "College of Surgeons, Edinburgh.)]",
        "THIS EBOOK IS OTHERWISE PROVIDED TO YOU \"AS-IS\".",
        "12\u{a0}123 and 12 123",
        "yesterday ’s reception",
        "０《１２３》      ４５６％  '' 【７８９】",
        "from the ‘bad bank’, Northern «\u{a0}wagonways\u{a0}»",
    ];

    for config in configs {
        let normalizer = PunctuationNormalizer::new(config);
        for sample in samples {
            let once = normalizer.normalize(sample);
            let twice = normalizer.normalize(&once);
            assert_eq!(once, twice, "idempotence violated for: {sample:?}");
        }
    }
}
