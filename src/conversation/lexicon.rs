//! Keyword tables and text helpers for the fortune-telling companion domain.
//!
//! Everything here is lexical: substring presence, occurrence counts, and a
//! tokenizer that turns ASCII words into lowercase tokens and runs of CJK
//! characters into overlapping bigrams.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

pub const DIVINATION_BASIC: &[&str] = &[
    "八字", "五行", "命盘", "流年", "大运", "天干", "地支", "纳音", "神煞",
];
pub const DIVINATION_PREDICTION: &[&str] =
    &["运势", "财运", "事业运", "桃花运", "健康运", "学业运"];
pub const DIVINATION_GUIDANCE: &[&str] = &["建议", "注意", "宜", "忌", "化解", "改善", "调理"];
pub const DIVINATION_TIME: &[&str] = &["今年", "明年", "下半年", "近期", "长远", "流年", "月运"];

pub const QUESTION_INDICATORS: &[&str] = &["什么", "怎么", "如何", "为什么", "能否", "可以"];
pub const ANSWER_INDICATORS: &[&str] = &["是", "可以", "建议", "应该", "需要"];

/// Coarse topics used for input/response topical overlap.
pub const RELEVANCE_TOPICS: &[(&str, &[&str])] = &[
    ("事业", &["工作", "职业", "事业", "升职", "跳槽", "同事"]),
    ("感情", &["恋爱", "结婚", "分手", "感情", "爱情", "对象"]),
    ("财运", &["钱", "财运", "投资", "理财", "收入", "财富"]),
    ("健康", &["健康", "身体", "生病", "医院", "保养", "养生"]),
];

/// Topic taxonomy for conversation analysis. Text matching none is "其他".
pub const TOPIC_TAXONOMY: &[(&str, &[&str])] = &[
    ("事业发展", &["工作", "职业", "事业", "升职", "跳槽", "同事", "老板", "公司"]),
    ("感情关系", &["恋爱", "结婚", "分手", "感情", "爱情", "对象", "夫妻", "伴侣"]),
    ("财富运势", &["钱", "财运", "投资", "理财", "收入", "财富", "买房", "股票"]),
    ("健康养生", &["健康", "身体", "生病", "医院", "保养", "养生", "锻炼", "饮食"]),
    ("学习成长", &["学习", "考试", "技能", "知识", "成长", "进修", "培训", "书籍"]),
    ("人际关系", &["朋友", "人际", "社交", "交往", "沟通", "关系", "合作", "团队"]),
    ("家庭生活", &["家庭", "父母", "子女", "孩子", "家人", "亲情", "教育", "照顾"]),
];
pub const OTHER_TOPIC: &str = "其他";

pub const POSITIVE_EMOTION: &[&str] = &[
    "开心", "高兴", "满意", "喜欢", "好", "棒", "赞", "感谢", "期待",
];
pub const NEGATIVE_EMOTION: &[&str] = &[
    "担心", "焦虑", "烦恼", "困扰", "不好", "失望", "沮丧", "害怕", "难过",
];
pub const NEUTRAL_EMOTION: &[&str] = &[
    "了解", "知道", "明白", "清楚", "认为", "觉得", "可能", "也许", "或许",
];

pub const SEEKING_HELP: &[&str] = &["请帮助", "怎么办", "求指导", "给建议", "不知道怎么"];
pub const VERIFYING: &[&str] = &["是否", "对吗", "准确吗", "会不会", "有可能"];
pub const EXPLORING: &[&str] = &["为什么", "如何", "什么原因", "怎么样", "详细说说"];
pub const CONFIRMING: &[&str] = &["确实", "果然", "正如", "你说得对", "很准确"];

pub const PHASE_OPENING: &[&str] = &["你好", "想问", "咨询", "请教"];
pub const PHASE_DEEPENING: &[&str] = &["详细", "具体", "为什么", "如何"];
pub const PHASE_VERIFICATION: &[&str] = &["是否", "对吗", "准确", "确认"];
pub const PHASE_CLOSING: &[&str] = &["谢谢", "明白", "了解", "总的来说"];

pub const CONNECTORS: &[&str] = &["因为", "所以", "但是", "然而", "另外", "同时", "此外", "因此"];
pub const ADVICE_MARKERS: &[&str] = &["建议", "应该", "可以", "需要", "注意", "避免", "建议您"];
pub const DEPTH_MARKERS: &[&str] = &["原因", "影响", "关系", "分析", "解释", "机制"];
pub const POLITE_TERMS: &[&str] = &["您", "请", "谢谢", "不好意思", "抱歉"];
pub const NEGATIVE_TONE: &[&str] = &["不行", "不可能", "绝对不", "肯定不"];
pub const SENSITIVE_TERMS: &[&str] = &["死", "灾祸", "破财", "血光", "凶险"];

/// Phrases by which a response refers back to remembered facts.
pub const MEMORY_REFERENCES: &[&str] = &["之前", "上次", "根据您的", "如您所说", "您提到的"];
/// Shorter reference set used for memory relevance.
pub const MEMORY_INDICATORS: &[&str] = &["之前", "上次", "根据您", "如您所说"];

/// Advice pairs that contradict each other when both sides appear.
pub const CONTRADICTORY_PAIRS: &[(&[&str], &[&str])] = &[
    (&["宜", "应该"], &["忌", "不应该"]),
    (&["有利", "良好"], &["不利", "不好"]),
    (&["积极", "正面"], &["消极", "负面"]),
];

pub const POLITE_INPUT: &[&str] = &["请", "谢谢", "您"];
pub const URGENT_TERMS: &[&str] = &["急", "尽快", "马上"];
pub const FOLLOW_UP_TERMS: &[&str] = &["还有", "另外", "再"];

/// All divination term groups, for occurrence counting.
pub fn divination_terms() -> impl Iterator<Item = &'static str> {
    DIVINATION_BASIC
        .iter()
        .chain(DIVINATION_PREDICTION)
        .chain(DIVINATION_GUIDANCE)
        .chain(DIVINATION_TIME)
        .copied()
}

/// Total non-overlapping occurrences of divination terms.
pub fn count_professional_terms(text: &str) -> usize {
    divination_terms().map(|term| text.matches(term).count()).sum()
}

/// Number of distinct terms present in `text`.
pub fn count_present(text: &str, terms: &[&str]) -> usize {
    terms.iter().filter(|term| text.contains(*term)).count()
}

pub fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| text.contains(term))
}

/// Length in characters.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Whitespace-separated word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF)
}

/// Lowercase ASCII words plus CJK bigrams (a lone CJK character is kept as a
/// unigram).
pub fn tokenize(text: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();
    let mut word = String::new();
    let mut run: Vec<char> = Vec::new();

    let flush_run = |run: &mut Vec<char>, tokens: &mut HashSet<String>| {
        match run.len() {
            0 => {}
            1 => {
                tokens.insert(run[0].to_string());
            }
            _ => {
                for pair in run.windows(2) {
                    tokens.insert(pair.iter().collect());
                }
            }
        }
        run.clear();
    };

    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            flush_run(&mut run, &mut tokens);
            word.push(c.to_ascii_lowercase());
        } else if is_cjk(c) {
            if !word.is_empty() {
                tokens.insert(std::mem::take(&mut word));
            }
            run.push(c);
        } else {
            if !word.is_empty() {
                tokens.insert(std::mem::take(&mut word));
            }
            flush_run(&mut run, &mut tokens);
        }
    }
    if !word.is_empty() {
        tokens.insert(word);
    }
    flush_run(&mut run, &mut tokens);
    tokens
}

/// Split on Chinese and ASCII sentence terminators, dropping blank pieces.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['。', '！', '？', '.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

const SPECIFICITY_PATTERNS: [&str; 3] = [r"\d+", r"今年|明年|下半年|\d+月|\d+日", r"具体|详细|准确|明确"];

fn specificity_regexes() -> &'static [Option<Regex>] {
    static PATTERNS: OnceLock<Vec<Option<Regex>>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        SPECIFICITY_PATTERNS
            .iter()
            .map(|p| Regex::new(p).ok())
            .collect()
    })
}

/// Counts of (numbers, time expressions, precision words).
pub fn specificity_markers(text: &str) -> (usize, usize, usize) {
    let count = |idx: usize| {
        specificity_regexes()
            .get(idx)
            .and_then(Option::as_ref)
            .map_or(0, |re| re.find_iter(text).count())
    };
    (count(0), count(1), count(2))
}

/// Topics from `taxonomy` whose keywords appear in `text`, in table order.
pub fn matching_topics(text: &str, taxonomy: &[(&'static str, &[&str])]) -> Vec<&'static str> {
    let lowered = text.to_lowercase();
    taxonomy
        .iter()
        .filter(|(_, keywords)| contains_any(&lowered, keywords))
        .map(|(topic, _)| *topic)
        .collect()
}

/// Topics of the analysis taxonomy, `["其他"]` when nothing matches.
pub fn classify_topics(text: &str) -> Vec<&'static str> {
    let topics = matching_topics(text, TOPIC_TAXONOMY);
    if topics.is_empty() {
        vec![OTHER_TOPIC]
    } else {
        topics
    }
}

/// The label with the most keyword hits; first label wins ties. `None` when
/// nothing matches.
pub fn best_match<'a, T: Copy>(text: &str, table: &[(T, &'a [&'a str])]) -> Option<T> {
    let lowered = text.to_lowercase();
    let mut best: Option<(T, usize)> = None;
    for (label, keywords) in table {
        let hits = count_present(&lowered, keywords);
        if hits > 0 && best.map_or(true, |(_, top)| hits > top) {
            best = Some((*label, hits));
        }
    }
    best.map(|(label, _)| label)
}
