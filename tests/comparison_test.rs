//! Head-to-head comparison tests, with and without conversation summaries.

mod common;

use memory_bench::comparison::{
    Bucket, ComparativeAnalyzer, ExpectedFitness, Side, WinnerWeights, DEFAULT_FITNESS,
    MAX_RECOMMENDATIONS,
};
use memory_bench::conversation::{
    ConversationSummary, ConversationTurn, MemoryContext, ResponseQualityEvaluator,
};
use memory_bench::corpus::SCENARIO_PREFERENCE_TIMELINE;
use memory_bench::error::EvalError;
use memory_bench::evaluation::FrameworkAggregate;

use common::aggregate;

fn strong() -> FrameworkAggregate {
    aggregate(
        "memobase",
        "context",
        &[
            (SCENARIO_PREFERENCE_TIMELINE, vec![("context", 8.0), ("profile", 7.0)]),
            ("人际关系", vec![("context", 8.0), ("profile", 9.0)]),
        ],
    )
}

fn weak() -> FrameworkAggregate {
    aggregate(
        "mem0",
        "memory_items",
        &[
            (SCENARIO_PREFERENCE_TIMELINE, vec![("memory_items", 5.0), ("clustered", 6.0)]),
            ("人际关系", vec![("memory_items", 5.0), ("clustered", 4.0)]),
        ],
    )
}

fn context() -> MemoryContext {
    MemoryContext {
        context_summary: "用户是程序员，关心跳槽与财运".to_string(),
        relevance_scores: [("m1".to_string(), 0.8)].into_iter().collect(),
        memory_types: vec!["profile".to_string(), "event".to_string()],
        total_memories: 3,
        ..Default::default()
    }
}

fn summary(framework: &str) -> ConversationSummary {
    let turns = vec![
        ConversationTurn::new("你好，想问问工作", "您好，今年工作平稳。").with_response_time(2.0),
        ConversationTurn::new("我之前说的跳槽呢", "根据您之前提到的跳槽计划，下半年更合适。")
            .with_memory(context())
            .with_response_time(3.5),
        ConversationTurn::new("谢谢", "不客气。").with_response_time(1.5),
    ];
    ConversationSummary::build(framework, &turns, &ResponseQualityEvaluator::new()).unwrap()
}

#[test]
fn test_quality_only_vote_uses_full_weight() {
    let result = ComparativeAnalyzer::default()
        .compare(&strong(), &weak(), None)
        .unwrap();

    assert_eq!(result.vote.buckets.len(), 1);
    assert_eq!(result.vote.buckets[0].bucket, Bucket::Quality);
    assert!((result.vote.buckets[0].effective_weight - 1.0).abs() < 1e-12);
    assert_eq!(result.overall_winner, "memobase");
    assert!((result.overall_confidence - 1.0).abs() < 1e-12);
}

#[test]
fn test_vote_with_conversations_covers_every_bucket() {
    let (a, b) = (summary("memobase"), summary("mem0"));
    let result = ComparativeAnalyzer::default()
        .compare(&strong(), &weak(), Some((&a, &b)))
        .unwrap();

    let buckets: Vec<Bucket> = result.vote.buckets.iter().map(|b| b.bucket).collect();
    assert_eq!(
        buckets,
        vec![
            Bucket::Quality,
            Bucket::Performance,
            Bucket::MemoryEffectiveness,
            Bucket::UserExperience
        ]
    );
    let weight_sum: f64 = result.vote.buckets.iter().map(|b| b.effective_weight).sum();
    assert!((weight_sum - 1.0).abs() < 1e-9);
    assert!((result.vote.score_a + result.vote.score_b - 1.0).abs() < 1e-9);

    // Identical transcripts tie every conversation metric, so quality decides.
    assert_eq!(result.overall_winner, "memobase");
    assert!(result.overall_confidence > 0.0 && result.overall_confidence < 1.0);
    assert!(result.recommendations.len() <= MAX_RECOMMENDATIONS);
}

#[test]
fn test_zero_weights_drop_conversation_buckets() {
    let weights = WinnerWeights {
        quality: 1.0,
        performance: 0.0,
        memory_effectiveness: 0.0,
        user_experience: 0.0,
    };
    let (a, b) = (summary("memobase"), summary("mem0"));
    let result = ComparativeAnalyzer::new(weights, None)
        .compare(&strong(), &weak(), Some((&a, &b)))
        .unwrap();

    for bucket in &result.vote.buckets[1..] {
        assert_eq!(bucket.effective_weight, 0.0);
        assert_eq!(bucket.score_a + bucket.score_b, 0.0);
    }
    // Quality: two wins for A, three tied conversation metrics. A takes the
    // whole bucket.
    let quality = &result.vote.buckets[0];
    assert_eq!(quality.metrics.len(), 5);
    assert_eq!(quality.winner(), Some(Side::A));
    assert!((quality.score_a - 1.0).abs() < 1e-12);
    assert_eq!(quality.score_b, 0.0);
    assert!((result.vote.score_a - 1.0).abs() < 1e-12);
    assert!((result.overall_confidence - 1.0).abs() < 1e-12);
}

/// Buckets won by different frameworks: A takes quality and memory
/// effectiveness (0.35 + 0.25), B takes performance and user experience
/// (0.20 + 0.20).
#[test]
fn test_bucket_winners_take_whole_weight() {
    let mut a = summary("memobase");
    let mut b = summary("mem0");
    assert!(a.impact.is_comparable() && b.impact.is_comparable());

    // Quality: A wins overall/core averages and quality_improvement (3 of 5).
    a.impact.quality_improvement = 0.3;
    b.impact.quality_improvement = 0.1;
    a.impact.avg_quality_with_memory = 0.6;
    b.impact.avg_quality_with_memory = 0.7;
    a.evaluation.overall_score = 0.6;
    b.evaluation.overall_score = 0.7;

    // Performance: B wins all three.
    a.impact.time_overhead = 1.5;
    b.impact.time_overhead = 0.5;
    a.impact.memory_utilization_rate = 0.4;
    b.impact.memory_utilization_rate = 0.8;
    a.impact.length_difference = 10.0;
    b.impact.length_difference = 30.0;

    // Memory: A wins relevance and consistency; B wins efficiency
    // (0.4 × 0.9 = 0.36 < 0.8 × 0.5 = 0.40).
    a.impact.memory_relevance_score = 0.9;
    b.impact.memory_relevance_score = 0.5;
    a.impact.memory_consistency_score = 0.8;
    b.impact.memory_consistency_score = 0.6;

    // Experience: B wins engagement and length; A wins time satisfaction.
    a.experience.engagement = 3.0;
    b.experience.engagement = 5.0;
    a.experience.avg_response_length = 40.0;
    b.experience.avg_response_length = 80.0;
    a.experience.time_satisfaction = 0.9;
    b.experience.time_satisfaction = 0.5;

    let result = ComparativeAnalyzer::default()
        .compare(&strong(), &weak(), Some((&a, &b)))
        .unwrap();

    let expected = [
        (Bucket::Quality, Side::A, 0.35),
        (Bucket::Performance, Side::B, 0.20),
        (Bucket::MemoryEffectiveness, Side::A, 0.25),
        (Bucket::UserExperience, Side::B, 0.20),
    ];
    assert_eq!(result.vote.buckets.len(), expected.len());
    for (vote, (bucket, side, weight)) in result.vote.buckets.iter().zip(expected) {
        assert_eq!(vote.bucket, bucket);
        assert_eq!(vote.winner(), Some(side), "{:?}", bucket);
        assert!((vote.effective_weight - weight).abs() < 1e-9);
        let (won, lost) = match side {
            Side::A => (vote.score_a, vote.score_b),
            Side::B => (vote.score_b, vote.score_a),
        };
        assert!((won - weight).abs() < 1e-9, "{:?}", bucket);
        assert_eq!(lost, 0.0);
    }

    assert!((result.vote.score_a - 0.60).abs() < 1e-9);
    assert!((result.vote.score_b - 0.40).abs() < 1e-9);
    assert_eq!(result.vote.winner, Side::A);
    assert_eq!(result.overall_winner, "memobase");
    assert!((result.overall_confidence - 0.20).abs() < 1e-9);
}

#[test]
fn test_tied_bucket_is_split() {
    let (a, b) = (summary("memobase"), summary("mem0"));
    let result = ComparativeAnalyzer::default()
        .compare(&strong(), &weak(), Some((&a, &b)))
        .unwrap();

    // Identical transcripts: every conversation bucket ties and is halved.
    for vote in &result.vote.buckets[1..] {
        assert_eq!(vote.winner(), None);
        assert!((vote.score_a - vote.effective_weight / 2.0).abs() < 1e-12);
        assert!((vote.score_b - vote.effective_weight / 2.0).abs() < 1e-12);
    }
    // 0.35 + 0.65 / 2 against 0.65 / 2.
    assert!((result.vote.score_a - 0.675).abs() < 1e-9);
    assert!((result.overall_confidence - 0.35).abs() < 1e-9);
}

#[test]
fn test_expected_fitness_is_attached_not_scored() {
    let analyzer =
        ComparativeAnalyzer::new(WinnerWeights::default(), Some(ExpectedFitness::builtin()));
    let with_table = analyzer.compare(&strong(), &weak(), None).unwrap();
    let without_table = ComparativeAnalyzer::default()
        .compare(&strong(), &weak(), None)
        .unwrap();

    let row = &with_table.scenario_method_matrix["人际关系"];
    assert!(row.entries.iter().all(|e| e.expected_fitness.is_some()));
    // Unknown scenario names fall back to the default fitness.
    assert!(row
        .entries
        .iter()
        .all(|e| e.expected_fitness == Some(DEFAULT_FITNESS)));

    let timeline = &with_table.scenario_method_matrix[SCENARIO_PREFERENCE_TIMELINE];
    let context = timeline
        .entries
        .iter()
        .find(|e| e.method_id == "context")
        .unwrap();
    assert_eq!(context.expected_fitness, Some(8.0));
    assert!(without_table
        .scenario_method_matrix
        .values()
        .flat_map(|row| &row.entries)
        .all(|e| e.expected_fitness.is_none()));

    assert_eq!(with_table.vote, without_table.vote);
    assert_eq!(with_table.overall_winner, without_table.overall_winner);
    assert_eq!(
        with_table.specialized_method_ranking,
        without_table.specialized_method_ranking
    );
}

#[test]
fn test_disjoint_frameworks_cannot_be_compared() {
    let other = aggregate("zep", "search", &[("情境感知", vec![("search", 7.0)])]);
    let err = ComparativeAnalyzer::default()
        .compare(&strong(), &other, None)
        .unwrap_err();

    assert!(matches!(err, EvalError::DisjointScenarios { .. }));
    assert!(err.is_configuration());
}

#[test]
fn test_partial_overlap_restricts_matrix() {
    let partial = aggregate(
        "zep",
        "search",
        &[
            (SCENARIO_PREFERENCE_TIMELINE, vec![("search", 7.0)]),
            ("情境感知", vec![("search", 6.0)]),
        ],
    );
    let result = ComparativeAnalyzer::default()
        .compare(&strong(), &partial, None)
        .unwrap();

    let scenarios: Vec<&str> = result
        .scenario_method_matrix
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(scenarios, vec![SCENARIO_PREFERENCE_TIMELINE]);
    let best = result.scenario_method_matrix[SCENARIO_PREFERENCE_TIMELINE]
        .best
        .as_ref()
        .unwrap();
    assert_eq!(best.framework, "memobase");
    assert_eq!(best.method_id, "context");
}
