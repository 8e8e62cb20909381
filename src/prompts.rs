//! Prompt definitions for the similarity judge.
//!
//! Kept in one place so the rubric and the score parser stay in sync: the
//! rubric asks for a 0-10 score written as `评分: X`, which is the first
//! pattern [`crate::judge::parse_judge_score`] looks for.

/// Marker shown to the judge in place of an empty retrieval.
pub const EMPTY_RETRIEVAL_MARKER: &str = "（无检索结果）";

/// System prompt for the retrieval similarity judge.
pub const JUDGE_SYSTEM_PROMPT: &str = r#"你是一个专业的记忆系统评测专家。请评估检索到的内容与预期内容的语义相似度。

评分标准 (0-10分):
- 10分：检索内容完全匹配预期，包含所有关键信息且准确
- 8-9分：检索内容基本匹配预期，包含大部分关键信息，细节略有差异
- 6-7分：检索内容部分匹配预期，包含主要信息，但缺少一些重要细节
- 4-5分：检索内容与预期有一定关联，但信息不完整或有明显偏差
- 2-3分：检索内容与预期关联度较低，大部分信息不匹配
- 0-1分：检索内容与预期完全不匹配或为空

输出格式：
评分: <0-10之间的数字>
理由: <一到两句话>"#;

/// Build the per-case user prompt.
pub fn build_judge_prompt(
    query: &str,
    method_label: &str,
    retrieved_content: &str,
    expected_content: &str,
) -> String {
    let retrieved = if retrieved_content.trim().is_empty() {
        EMPTY_RETRIEVAL_MARKER
    } else {
        retrieved_content
    };

    format!(
        "用户查询: {}\n检索类型: {}\n\n检索到的内容:\n{}\n\n预期内容:\n{}\n\n请给出评分 (0-10) 和简要理由：",
        query, method_label, retrieved, expected_content
    )
}
