use super::BenchmarkReport;
use crate::comparison::{ComparisonResult, Side};
use crate::conversation::ConversationSummary;
use crate::evaluation::{CaseEvaluation, FrameworkAggregate};

/// Letter grade of a 0–10 score.
pub fn grade(score: f64) -> &'static str {
    if score >= 9.0 {
        "A+"
    } else if score >= 8.0 {
        "A"
    } else if score >= 7.0 {
        "B"
    } else if score >= 6.0 {
        "C"
    } else {
        "D"
    }
}

/// Table-safe, shortened cell text.
fn cell(text: &str, max_chars: usize) -> String {
    let flat = text.replace('|', "\\|").replace('\n', " ");
    if flat.chars().count() > max_chars {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    } else {
        flat
    }
}

fn case_cell(case: Option<&CaseEvaluation>) -> String {
    case.map(|c| format!("{} ({:.2})", cell(&c.case.query, 24), c.overall_average))
        .unwrap_or_else(|| "-".to_string())
}

pub(super) fn render(report: &BenchmarkReport) -> String {
    let mut out = Vec::new();
    out.push("# 记忆框架评测报告".to_string());
    out.push(String::new());
    out.push(format!("- 运行 ID: `{}`", report.run_id));
    out.push(format!("- 语料: {}", report.corpus_name));
    out.push(format!(
        "- 生成时间: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push(String::new());

    overview(&mut out, &report.frameworks);
    for framework in &report.frameworks {
        framework_detail(&mut out, framework);
    }
    if let Some(comparison) = &report.comparison {
        comparison_section(&mut out, comparison);
    }
    if !report.conversations.is_empty() {
        conversation_section(&mut out, &report.conversations);
    }
    if let Some(comparison) = &report.comparison {
        out.push("## 建议".to_string());
        out.push(String::new());
        for line in &comparison.recommendations {
            out.push(format!("- {}", line));
        }
        out.push(String::new());
    }

    out.join("\n")
}

fn overview(out: &mut Vec<String>, frameworks: &[FrameworkAggregate]) {
    out.push("## 总体得分".to_string());
    out.push(String::new());
    out.push("| 框架 | 核心方法 | 核心得分 | 总体得分 | 等级 | 用例数 | 失败结果 |".to_string());
    out.push("|---|---|---|---|---|---|---|".to_string());
    for fw in frameworks {
        out.push(format!(
            "| {} | {} | {:.2} | {:.2} | {} | {} | {} |",
            fw.framework_name,
            fw.core_method_id,
            fw.core_method_average,
            fw.overall_average,
            grade(fw.overall_average),
            fw.total_cases,
            fw.failure_count()
        ));
    }
    out.push(String::new());
}

fn framework_detail(out: &mut Vec<String>, fw: &FrameworkAggregate) {
    out.push(format!("## {}", fw.framework_name));
    out.push(String::new());
    out.push("| 方法 | 平均分 | 等级 |".to_string());
    out.push("|---|---|---|".to_string());
    for (method, score) in &fw.per_method_average {
        let marker = if *method == fw.core_method_id { "（核心）" } else { "" };
        out.push(format!("| {}{} | {:.2} | {} |", method, marker, score, grade(*score)));
    }
    out.push(String::new());

    out.push("| 场景 | 总体 | 核心 | 最佳用例 | 最差用例 |".to_string());
    out.push("|---|---|---|---|---|".to_string());
    for (name, scenario) in &fw.scenario_aggregates {
        out.push(format!(
            "| {} | {:.2} | {:.2} | {} | {} |",
            cell(name, 40),
            scenario.overall_average,
            scenario.core_method_average(),
            case_cell(scenario.best_case()),
            case_cell(scenario.worst_case())
        ));
    }
    out.push(String::new());
}

fn comparison_section(out: &mut Vec<String>, cmp: &ComparisonResult) {
    let core = &cmp.core;
    out.push(format!("## 框架对比: {} vs {}", cmp.framework_a, cmp.framework_b));
    out.push(String::new());

    out.push("### 核心方法对比".to_string());
    out.push(String::new());
    out.push(format!(
        "- {} `{}`: {:.2}/10",
        cmp.framework_a, core.core_method_a, core.score_a
    ));
    out.push(format!(
        "- {} `{}`: {:.2}/10",
        cmp.framework_b, core.core_method_b, core.score_b
    ));
    out.push(format!(
        "- 差距: {:.2} 分 ({:.1}%)，{}",
        core.gap,
        core.advantage_percentage,
        core.class.label()
    ));
    out.push(format!("- 核心方法优胜: **{}**", core.winner));
    out.push(String::new());

    out.push("### 专用方法排名".to_string());
    out.push(String::new());
    if cmp.specialized_method_ranking.is_empty() {
        out.push("（无专用方法）".to_string());
    }
    for (i, method) in cmp.specialized_method_ranking.iter().enumerate() {
        out.push(format!(
            "{}. {} / {}: {:.2}/10",
            i + 1,
            method.framework,
            method.method_id,
            method.score
        ));
    }
    out.push(String::new());

    out.push("### 场景-方法适配矩阵".to_string());
    out.push(String::new());
    out.push("| 场景 | 框架 | 方法 | 实际得分 | 预期适配度 |".to_string());
    out.push("|---|---|---|---|---|".to_string());
    for (scenario, row) in &cmp.scenario_method_matrix {
        for entry in &row.entries {
            out.push(format!(
                "| {} | {} | {} | {:.1} | {} |",
                cell(scenario, 20),
                entry.framework,
                entry.method_id,
                entry.score,
                entry
                    .expected_fitness
                    .map(|f| format!("{:.0}", f))
                    .unwrap_or_else(|| "-".to_string())
            ));
        }
    }
    out.push(String::new());

    out.push("### 场景最佳方法".to_string());
    out.push(String::new());
    for (scenario, row) in &cmp.scenario_method_matrix {
        if let Some(best) = &row.best {
            out.push(format!(
                "- {}: {} / {} ({:.2})",
                cell(scenario, 40),
                best.framework,
                best.method_id,
                best.score
            ));
        }
    }
    out.push(String::new());

    out.push("### 加权投票".to_string());
    out.push(String::new());
    out.push(format!(
        "| 维度 | 权重 | {} | {} | 胜者 |",
        cmp.framework_a, cmp.framework_b
    ));
    out.push("|---|---|---|---|---|".to_string());
    for bucket in &cmp.vote.buckets {
        let winner = match bucket.winner() {
            Some(Side::A) => cmp.framework_a.as_str(),
            Some(Side::B) => cmp.framework_b.as_str(),
            None => "平局",
        };
        out.push(format!(
            "| {} | {:.2} | {:.3} | {:.3} | {} |",
            bucket.bucket.label(),
            bucket.effective_weight,
            bucket.score_a,
            bucket.score_b,
            winner
        ));
    }
    out.push(String::new());
    out.push(format!(
        "**总体优胜: {}**（置信度 {:.2}）",
        cmp.overall_winner, cmp.overall_confidence
    ));
    out.push(String::new());
}

fn conversation_section(out: &mut Vec<String>, summaries: &[ConversationSummary]) {
    out.push("## 对话质量".to_string());
    out.push(String::new());
    out.push(
        "| 框架 | 总分 | 流畅度 | 记忆利用 | 一致性 | 满意度 | 记忆质量提升 | 记忆耗时开销 |"
            .to_string(),
    );
    out.push("|---|---|---|---|---|---|---|---|".to_string());
    for summary in summaries {
        let eval = &summary.evaluation;
        let impact = &summary.impact;
        let flag = if impact.is_comparable() { "" } else { " ⚠" };
        out.push(format!(
            "| {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:+.2}{} | {:+.2}s{} |",
            summary.framework,
            eval.overall_score,
            eval.flow_score,
            eval.memory_utilization_score,
            eval.consistency_score,
            eval.user_satisfaction_estimate,
            impact.quality_improvement,
            flag,
            impact.time_overhead,
            flag
        ));
    }
    out.push(String::new());

    // Imbalanced partitions are explained by the first impact insight.
    for summary in summaries {
        for insight in &summary.impact.insights {
            out.push(format!("- {}: {}", summary.framework, insight));
        }
    }
    out.push(String::new());
}
