//! 标点归一化模块
//!
//! 对源文本做 Moses 风格的标点归一化：全角/弯引号折叠、空白收敛、
//! 不间断空格处理、语言相关的引号逗号与数字规则。替换表在构造时
//! 编译为固定顺序的正则序列，`normalize` 是无失败路径的纯函数。

use regex::Regex;

/// 空白与括号收敛规则
const EXTRA_WHITESPACE: &[(&str, &str)] = &[
    (r"\r", ""),
    (r"\(", " ("),
    (r"\)", ") "),
    (r" +", " "),
    (r"\) ([.!:?;,])", ")$1"),
    (r"\( ", "("),
    (r" \)", ")"),
    (r"(\d) %", "$1%"),
    (r" :", ":"),
    (r" ;", ";"),
];

/// Penn Treebank 风格的补充规则，启用时插入到第 1 位之后
const PENN_SUBSTITUTIONS: &[(&str, &str)] = &[("`", "'"), ("''", " \" ")];

/// 不间断空格（伪空格）处理规则
const PSEUDO_SPACES: &[(&str, &str)] = &[
    ("\u{a0}%", "%"),
    ("nº\u{a0}", "nº "),
    ("\u{a0}:", ":"),
    ("\u{a0}ºC", " ºC"),
    ("\u{a0}cm", " cm"),
    ("\u{a0}\\?", "?"),
    ("\u{a0}!", "!"),
    ("\u{a0};", ";"),
    (",\u{a0}", ", "),
    (r" +", " "),
];

/// 英语：引号后跟随的逗号/句点移入引号内
const EN_QUOTE_COMMA: &[(&str, &str)] = &[("\"([,.]+)", "$1\"")];

/// 德/西/法语：逗号移到引号外
const DE_ES_FR_QUOTE_COMMA: &[(&str, &str)] = &[
    (",\"", "\","),
    // 句末的句点保持原位
    ("(\\.+)\"(\\s*[^<])", "\"$1$2"),
];

/// 全角与 CJK 标点折叠表（pre 阶段）
const UNICODE_PUNCTUATION: &[(&str, &str)] = &[
    ("，", ","),
    ("。\\s*", ". "),
    ("、", ","),
    ("”", "\""),
    ("“", "\""),
    ("∶", ":"),
    ("：", ":"),
    ("？", "?"),
    ("《", "\""),
    ("》", "\""),
    ("）", ")"),
    ("！", "!"),
    ("（", "("),
    ("；", ";"),
    ("」", "\""),
    ("「", "\""),
    ("０", "0"),
    ("１", "1"),
    ("２", "2"),
    ("３", "3"),
    ("４", "4"),
    ("５", "5"),
    ("６", "6"),
    ("７", "7"),
    ("８", "8"),
    ("９", "9"),
    ("．\\s*", ". "),
    ("～", "~"),
    ("’", "'"),
    ("…", "..."),
    ("━", "-"),
    ("〈", "<"),
    ("〉", ">"),
    ("【", "["),
    ("】", "]"),
    ("％", "%"),
];

/// 归一化配置
///
/// 每个归一化器实例构造一次，之后不可变。
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// 源语言 ISO 代码，影响引号逗号与数字规则
    pub lang: String,
    /// 启用 Penn Treebank 补充规则
    pub penn: bool,
    /// 启用语言相关的引号逗号规则
    pub norm_quote_commas: bool,
    /// 启用数字间不间断空格的千位分隔符改写
    pub norm_numbers: bool,
    /// 在其它规则之前折叠全角/CJK 标点
    pub pre_replace_unicode_punct: bool,
    /// 在全部改写之后剥除控制字符
    pub post_remove_control_chars: bool,
    /// 与遗留 Perl 实现逐字符对齐的严格模式
    pub perl_parity: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
            penn: true,
            norm_quote_commas: true,
            norm_numbers: true,
            pre_replace_unicode_punct: false,
            post_remove_control_chars: false,
            perl_parity: false,
        }
    }
}

impl NormalizerConfig {
    /// 以指定源语言构造默认配置
    pub fn for_lang(lang: &str) -> Self {
        Self {
            lang: lang.to_string(),
            ..Default::default()
        }
    }
}

/// Moses 风格标点归一化器
pub struct PunctuationNormalizer {
    substitutions: Vec<(Regex, &'static str)>,
    pre_substitutions: Vec<(Regex, &'static str)>,
    control_chars: Regex,
    pre_replace_unicode_punct: bool,
    post_remove_control_chars: bool,
}

impl PunctuationNormalizer {
    /// 构造归一化器并编译替换表
    pub fn new(config: NormalizerConfig) -> Self {
        let mut rules: Vec<(&'static str, &'static str)> = Vec::new();
        rules.extend_from_slice(EXTRA_WHITESPACE);
        rules.extend(Self::unicode_rules(config.perl_parity));
        rules.extend(Self::guillemet_rules(config.perl_parity));
        rules.extend_from_slice(PSEUDO_SPACES);

        if config.penn {
            for (offset, rule) in PENN_SUBSTITUTIONS.iter().enumerate() {
                rules.insert(1 + offset, *rule);
            }
        }

        if config.norm_quote_commas {
            match config.lang.as_str() {
                "en" => rules.extend_from_slice(EN_QUOTE_COMMA),
                "de" | "es" | "fr" => rules.extend_from_slice(DE_ES_FR_QUOTE_COMMA),
                _ => {}
            }
        }

        if config.norm_numbers {
            // 不间断空格作为千位分隔符：大部分语言改写为句点，
            // 德/西/捷/法语改写为逗号
            match config.lang.as_str() {
                "de" | "es" | "cz" | "cs" | "fr" => {
                    rules.push(("(\\d)\u{a0}(\\d)", "$1,$2"));
                }
                _ => rules.push(("(\\d)\u{a0}(\\d)", "$1.$2")),
            }
        }

        let substitutions = rules
            .into_iter()
            .map(|(pattern, replacement)| (Self::compile(pattern), replacement))
            .collect();

        let pre_substitutions = UNICODE_PUNCTUATION
            .iter()
            .map(|(pattern, replacement)| (Self::compile(pattern), *replacement))
            .collect();

        Self {
            substitutions,
            pre_substitutions,
            control_chars: Self::compile(r"[\p{Cc}\p{Cf}]"),
            pre_replace_unicode_punct: config.pre_replace_unicode_punct,
            post_remove_control_chars: config.post_remove_control_chars,
        }
    }

    /// 归一化文本
    ///
    /// 全函数：任何输入都返回字符串，空输入返回空串，无匹配时原样
    /// 返回。归一化满足幂等性。
    pub fn normalize(&self, text: &str) -> String {
        let mut normalized = text.to_string();

        if self.pre_replace_unicode_punct {
            for (pattern, replacement) in &self.pre_substitutions {
                normalized = pattern.replace_all(&normalized, *replacement).into_owned();
            }
        }

        for (pattern, replacement) in &self.substitutions {
            normalized = pattern.replace_all(&normalized, *replacement).into_owned();
        }

        if self.post_remove_control_chars {
            normalized = self.control_chars.replace_all(&normalized, "").into_owned();
        }

        normalized.trim().to_string()
    }

    /// 弯引号、破折号等 Unicode 标点折叠规则
    fn unicode_rules(perl_parity: bool) -> Vec<(&'static str, &'static str)> {
        vec![
            ("„", "\""),
            ("“", "\""),
            ("”", "\""),
            ("–", "-"),
            ("—", " - "),
            (r" +", " "),
            ("´", "'"),
            ("([a-zA-Z])‘([a-zA-Z])", "$1'$2"),
            ("([a-zA-Z])’([a-zA-Z])", "$1'$2"),
            ("‘", "'"),
            ("‚", "'"),
            // Perl 参照实现把右单引号折叠为双引号
            ("’", if perl_parity { "\"" } else { "'" }),
            ("''", "\""),
            ("´´", "\""),
            ("…", "..."),
        ]
    }

    /// 法语书名号折叠规则，Perl 模式保留一侧空格
    fn guillemet_rules(perl_parity: bool) -> Vec<(&'static str, &'static str)> {
        vec![
            ("\u{a0}«\u{a0}", if perl_parity { " \"" } else { "\"" }),
            ("«\u{a0}", "\""),
            ("«", "\""),
            ("\u{a0}»\u{a0}", if perl_parity { "\" " } else { "\"" }),
            ("\u{a0}»", "\""),
            ("»", "\""),
        ]
    }

    fn compile(pattern: &str) -> Regex {
        Regex::new(pattern).expect("builtin substitution pattern")
    }
}

impl Default for PunctuationNormalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}
