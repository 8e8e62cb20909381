//! Best-effort extraction of a 0-10 score from judge prose.
//!
//! Judges are free-text LLMs. Patterns are tried in order and the first
//! pattern that matches anywhere in the text wins; within a pattern the
//! leftmost match wins. No match yields 0.0 with `matched = false`.

use std::sync::OnceLock;

use regex::Regex;

/// Maximum judge score.
pub const MAX_JUDGE_SCORE: f64 = 10.0;

/// Label patterns, in priority order. A leading `-` is kept so negative
/// scores clamp to 0; in the unlabelled forms it must start the number, so a
/// range such as "7-8分" still reads as 8.
const SCORE_PATTERNS: &[&str] = &[
    // "score: 7", "评分：8", "Score (0-10): 6.5"
    r"(?i)(?:score|rating|评分|分数|得分)(?:\s*[(（][^)）\n]*[)）])?[^0-9\n]{0,10}?(-?\d+(?:\.\d+)?)",
    // "7/10", "7.5 / 10"
    r"(?:^|[^\d.])(-?\d+(?:\.\d+)?)\s*/\s*10\b",
    // "8分", "8 分"
    r"(?:^|[^\d.])(-?\d+(?:\.\d+)?)\s*分",
];

fn score_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        SCORE_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

/// Outcome of parsing a judge response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedScore {
    /// Score clamped to [0, 10].
    pub score: f64,
    /// Whether any pattern matched.
    pub matched: bool,
}

/// Extract the judge score from free text.
pub fn parse_judge_score(text: &str) -> ParsedScore {
    for pattern in score_patterns() {
        let parsed = pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok());
        if let Some(value) = parsed {
            return ParsedScore {
                score: clamp_score(value),
                matched: true,
            };
        }
    }

    ParsedScore {
        score: 0.0,
        matched: false,
    }
}

/// Clamp to [0, 10]; non-finite values collapse to 0.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, MAX_JUDGE_SCORE)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(score_patterns().len(), SCORE_PATTERNS.len());
    }

    #[test]
    fn test_labelled_scores() {
        assert_eq!(parse_judge_score("评分: 8\n理由: 基本匹配").score, 8.0);
        assert_eq!(parse_judge_score("评分：7.5分").score, 7.5);
        assert_eq!(parse_judge_score("Score: 6").score, 6.0);
        assert_eq!(parse_judge_score("Score (0-10): 9").score, 9.0);
    }

    #[test]
    fn test_fraction_and_suffix_scores() {
        assert_eq!(parse_judge_score("I would give this 7/10.").score, 7.0);
        assert_eq!(parse_judge_score("给 9 分，内容完整").score, 9.0);
        assert_eq!(parse_judge_score("整体给10分").score, 10.0);
    }

    #[test]
    fn test_label_pattern_has_priority() {
        // The labelled score wins even though a fraction appears first.
        let parsed = parse_judge_score("Compared with 3/10 last time. Score: 8");
        assert_eq!(parsed.score, 8.0);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let parsed = parse_judge_score("评分: 15");
        assert!(parsed.matched);
        assert_eq!(parsed.score, 10.0);
    }

    #[test]
    fn test_negative_score_clamps_to_zero() {
        for text in ["score: -3", "评分：-2分", "-4/10"] {
            let parsed = parse_judge_score(text);
            assert!(parsed.matched, "{}", text);
            assert_eq!(parsed.score, 0.0, "{}", text);
        }
        // A hyphen separator or range is not a sign.
        assert_eq!(parse_judge_score("Score - 7").score, 7.0);
        assert_eq!(parse_judge_score("大约7-8分").score, 8.0);
        assert_eq!(parse_judge_score("7-8/10").score, 8.0);
    }

    #[test]
    fn test_unparseable_defaults_to_zero() {
        let parsed = parse_judge_score("The retrieved content is unrelated.");
        assert_eq!(
            parsed,
            ParsedScore {
                score: 0.0,
                matched: false
            }
        );
    }

    #[test]
    fn test_clamp_non_finite() {
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(-2.0), 0.0);
        assert_eq!(clamp_score(f64::INFINITY), 0.0);
    }
}
