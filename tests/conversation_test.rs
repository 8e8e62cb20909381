//! Conversation track tests: transcript loading, turn scoring, memory
//! impact and the full analysis, driven from transcript files on disk.

use std::io::Write;

use serde_json::json;
use tempfile::NamedTempFile;

use memory_bench::conversation::{
    load_turns, ConversationAnalyzer, ConversationSummary, ResponseQualityEvaluator, Trend,
};
use memory_bench::error::{AppError, EvalError};

fn memory_turn(input: &str, response: &str, seconds: f64) -> serde_json::Value {
    json!({
        "user_input": input,
        "ai_response": response,
        "response_time": seconds,
        "memory_context": {
            "context_summary": "用户是程序员，最近在考虑跳槽，关心财运",
            "relevance_scores": {"m1": 0.8, "m2": 0.6},
            "memory_types": ["profile", "event"],
            "total_memories": 2,
            "user_profile": {"communication_style": "简洁"}
        },
        "token_usage": {"input_tokens": 40, "output_tokens": 120}
    })
}

fn plain_turn(input: &str, response: &str, seconds: f64) -> serde_json::Value {
    json!({
        "user_input": input,
        "agent_response": response,
        "response_time": seconds
    })
}

fn write_transcript(value: serde_json::Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(value.to_string().as_bytes()).unwrap();
    file
}

#[test]
fn test_mixed_transcript_is_comparable() {
    let file = write_transcript(json!({
        "turns": [
            plain_turn("你好，想问问今年的工作运势", "您好，今年工作整体平稳，上半年机会较多。", 2.0),
            memory_turn("我之前说过想跳槽，现在合适吗", "根据您之前提到的跳槽打算，结合您程序员的背景，下半年更合适。", 4.0),
            plain_turn("那财运呢", "财运中等，注意控制支出。", 2.5),
            memory_turn("具体哪个月比较好", "结合您关心的财运和跳槽计划，建议九月前后行动。", 4.5),
        ]
    }));

    let turns = load_turns(file.path()).unwrap();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[1].tokens("output_tokens"), 120);

    let summary =
        ConversationSummary::build("memobase", &turns, &ResponseQualityEvaluator::new()).unwrap();
    let impact = &summary.impact;

    assert_eq!(summary.framework, "memobase");
    assert_eq!(impact.total_turns, 4);
    assert_eq!(impact.turns_with_memory, 2);
    assert_eq!(impact.turns_without_memory, 2);
    assert!(impact.is_comparable());
    assert!((impact.avg_time_with_memory - 4.25).abs() < 1e-9);
    assert!((impact.avg_time_without_memory - 2.25).abs() < 1e-9);
    assert!((impact.time_overhead - 2.0).abs() < 1e-9);
    assert!((0.0..=1.0).contains(&impact.memory_relevance_score));
    assert_eq!(impact.memory_utilization_rate, 0.5);
    assert!(
        (impact.quality_improvement
            - (impact.avg_quality_with_memory - impact.avg_quality_without_memory))
            .abs()
            < 1e-12
    );

    let eval = &summary.evaluation;
    assert_eq!(eval.turn_qualities.len(), 4);
    for score in [
        eval.overall_score,
        eval.flow_score,
        eval.memory_utilization_score,
        eval.consistency_score,
        eval.user_satisfaction_estimate,
    ] {
        assert!((0.0..=1.0).contains(&score), "score out of range: {}", score);
    }
}

#[test]
fn test_all_memory_transcript_is_flagged() {
    let file = write_transcript(json!([
        memory_turn("我最近运势怎么样", "根据您之前的情况，最近整体不错。", 3.0),
        memory_turn("工作方面呢", "结合您提到的跳槽想法，工作上有新机会。", 3.0),
    ]));

    let turns = load_turns(file.path()).unwrap();
    let summary =
        ConversationSummary::build("mem0", &turns, &ResponseQualityEvaluator::new()).unwrap();

    assert!(summary.impact.partition_imbalanced);
    assert!(!summary.impact.is_comparable());
    assert_eq!(summary.impact.turns_without_memory, 0);
    assert_eq!(summary.impact.avg_quality_without_memory, 0.0);
    assert_eq!(summary.impact.avg_time_without_memory, 0.0);
}

#[test]
fn test_empty_memory_context_counts_as_absent() {
    let file = write_transcript(json!([
        {"user_input": "你好", "agent_response": "您好。", "memory_context": {}},
        {"user_input": "谢谢", "agent_response": "不客气。", "memory_context": null}
    ]));

    let turns = load_turns(file.path()).unwrap();
    assert!(turns.iter().all(|t| !t.has_memory()));

    let summary =
        ConversationSummary::build("zep", &turns, &ResponseQualityEvaluator::new()).unwrap();
    assert_eq!(summary.impact.turns_with_memory, 0);
    assert!(summary.impact.partition_imbalanced);
}

#[test]
fn test_two_turn_analysis_reports_no_trends() {
    let file = write_transcript(json!([
        memory_turn("我很担心今年的工作", "别担心，根据您之前的情况，今年工作会有转机。", 3.0),
        plain_turn("谢谢，我明白了", "不客气，祝您顺利。", 2.0),
    ]));

    let turns = load_turns(file.path()).unwrap();
    let analysis = ConversationAnalyzer::new().analyze(&turns).unwrap();

    assert_eq!(analysis.basic.total_turns, 2);
    assert_eq!(analysis.basic.memory_usage_rate, 0.5);
    assert_eq!(analysis.memory.turns_with_memory, 1);
    assert_eq!(analysis.memory.usage_trend.trend, Trend::InsufficientData);
    assert_eq!(analysis.quality.trend.trend, Trend::InsufficientData);
    assert_eq!(analysis.quality.scores.len(), 2);
    assert_eq!(analysis.emotions.user_progression.len(), 2);

    let json = serde_json::to_value(&analysis).unwrap();
    assert!(json.get("insights").is_some());
    assert!(json.get("flow").is_some());
}

#[test]
fn test_empty_transcript_is_rejected() {
    let file = write_transcript(json!([]));
    let turns = load_turns(file.path()).unwrap();

    let err = ConversationAnalyzer::new().analyze(&turns).unwrap_err();
    assert!(matches!(err, EvalError::EmptyConversation));

    let err = ConversationSummary::build("x", &turns, &ResponseQualityEvaluator::new()).unwrap_err();
    assert!(matches!(err, EvalError::EmptyConversation));
}

#[test]
fn test_unreadable_transcript_is_configuration_error() {
    let file = write_transcript(json!({"not_turns": 1}));
    let err = load_turns(file.path()).unwrap_err();
    assert!(matches!(err, AppError::Config { .. }));
    assert!(err.is_configuration());
}
