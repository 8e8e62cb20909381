use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use memory_bench::{
    comparison::{ComparativeAnalyzer, ExpectedFitness},
    config::{
        BenchmarkPlan, Config, DatabaseConfig, EvaluationConfig, FrameworkPlan, LogFormat,
        LoggingConfig,
    },
    conversation::{load_turns, ConversationAnalyzer, ConversationSummary, ResponseQualityEvaluator},
    corpus::{builtin_corpus, ScenarioCorpus},
    error::{AppError, EvalError},
    evaluation::{cancellation, CaseEvaluator, FrameworkAggregate, FrameworkRunner},
    judge::{LangbaseJudge, SimilarityJudge},
    langbase::LangbaseClient,
    report::{grade, BenchmarkReport},
    retrieval::{HttpRetrievalAdapter, RetrievalAdapter},
    storage::{RunStore, SqliteRunStore},
};

#[derive(Parser)]
#[command(name = "memory-bench", version)]
#[command(about = "Benchmark conversational memory backends with an LLM judge")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the frameworks of a plan and write the report
    Run(RunArgs),

    /// Analyze a recorded conversation transcript
    Analyze {
        /// Transcript file (JSON list of turns)
        #[arg(long)]
        turns: PathBuf,

        /// Write the analysis here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show stored runs
    History {
        /// Maximum number of rows to show
        #[arg(long, default_value = "20")]
        limit: u32,

        /// Show one framework's results instead of whole runs
        #[arg(long)]
        framework: Option<String>,
    },

    /// List the scenarios of a corpus
    Corpus {
        /// Corpus file; the built-in corpus when omitted
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Benchmark plan (frameworks, methods, endpoints)
    #[arg(long)]
    plan: PathBuf,

    /// Corpus file; overrides the plan's corpus
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Only run these scenarios (repeatable)
    #[arg(long = "scenario")]
    scenarios: Vec<String>,

    /// Only run these frameworks (repeatable)
    #[arg(long = "framework")]
    frameworks: Vec<String>,

    /// Directory receiving report.json and report.md
    #[arg(short, long, default_value = "./reports")]
    output: PathBuf,

    /// Do not record the run in the history database
    #[arg(long)]
    no_store: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (ignore errors if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(&LoggingConfig::from_env());

    let result = match cli.command {
        Commands::Run(args) => run_benchmark(args).await,
        Commands::Analyze { turns, output } => analyze_conversation(&turns, output.as_deref()),
        Commands::History { limit, framework } => show_history(limit, framework.as_deref()).await,
        Commands::Corpus { corpus } => list_corpus(corpus.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// 2 for configuration mistakes, 1 for everything else.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(app) = cause.downcast_ref::<AppError>() {
            return if app.is_configuration() { 2 } else { 1 };
        }
        if let Some(eval) = cause.downcast_ref::<EvalError>() {
            return if eval.is_configuration() { 2 } else { 1 };
        }
    }
    1
}

/// Initialize tracing/logging
fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

async fn run_benchmark(args: RunArgs) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let plan = BenchmarkPlan::load(&args.plan)?;
    let frameworks = plan.select_frameworks(&args.frameworks)?;

    let corpus = match args.corpus.as_ref().or(plan.corpus.as_ref()) {
        Some(path) => ScenarioCorpus::load(path)?,
        None => builtin_corpus()?,
    };
    let corpus = corpus.select(&args.scenarios)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        corpus = %corpus.name(),
        scenarios = corpus.scenarios().len(),
        frameworks = frameworks.len(),
        "Memory benchmark starting"
    );

    // Everything that can be misconfigured is checked before the first
    // external call.
    let mut options = config.evaluation.clone();
    if plan.identity.is_some() {
        options.identity = plan.identity.clone();
    }

    let langbase = LangbaseClient::new(&config.langbase, config.request.clone())?;
    let judge = LangbaseJudge::new(langbase, &config.pipes.judge);
    let shared_judge: Arc<dyn SimilarityJudge> = Arc::new(judge.clone());

    let mut evaluators = Vec::with_capacity(frameworks.len());
    for framework in &frameworks {
        evaluators.push(build_evaluator(
            framework,
            &config,
            &options,
            Arc::clone(&shared_judge),
        )?);
    }

    let quality = ResponseQualityEvaluator::new();
    let mut conversations = Vec::new();
    for framework in &frameworks {
        if let Some(path) = &framework.conversation {
            let turns = load_turns(path)?;
            conversations.push(ConversationSummary::build(&framework.name, &turns, &quality)?);
        }
    }

    info!(pipe = %judge.pipe_name(), "Ensuring judge pipe exists...");
    judge
        .ensure_pipe()
        .await
        .context("failed to prepare the judge pipe")?;

    let (cancel_tx, cancel_rx) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current scenario");
            let _ = cancel_tx.send(true);
        }
    });

    let mut aggregates: Vec<FrameworkAggregate> = Vec::with_capacity(evaluators.len());
    for evaluator in evaluators {
        let runner = FrameworkRunner::new(evaluator).with_cancellation(cancel_rx.clone());
        aggregates.push(runner.run(&corpus).await?);
    }

    let comparison = match aggregates.as_slice() {
        [a, b, ..] => {
            let weights = plan.weights.unwrap_or(config.weights);
            let fitness = plan
                .expected_fitness
                .clone()
                .or_else(|| Some(ExpectedFitness::builtin()));
            let analyzer = ComparativeAnalyzer::new(weights, fitness);

            let pair = summary_of(&conversations, &a.framework_name)
                .zip(summary_of(&conversations, &b.framework_name));
            Some(analyzer.compare(a, b, pair)?)
        }
        _ => None,
    };

    let mut report = BenchmarkReport::new(corpus.name(), aggregates);
    if let Some(comparison) = comparison {
        report = report.with_comparison(comparison);
    }
    let report = report.with_conversations(conversations);

    let paths = report.write_to(&args.output)?;

    if args.no_store {
        info!("Skipping run history (--no-store)");
    } else {
        let store = SqliteRunStore::new(&config.database).await?;
        store.save_report(&report).await?;
        info!(run_id = %report.run_id, path = %config.database.path.display(), "Run recorded");
    }

    print_summary(&report);
    println!();
    println!("JSON:     {}", paths.json.display());
    println!("Markdown: {}", paths.markdown.display());
    Ok(())
}

fn build_evaluator(
    framework: &FrameworkPlan,
    config: &Config,
    options: &EvaluationConfig,
    judge: Arc<dyn SimilarityJudge>,
) -> anyhow::Result<CaseEvaluator> {
    let mut methods: Vec<Arc<dyn RetrievalAdapter>> = Vec::with_capacity(framework.methods.len());
    for method in &framework.methods {
        let adapter = HttpRetrievalAdapter::from_plan(method, config.request.clone())
            .with_context(|| format!("cannot build method {}/{}", framework.name, method.id))?;
        methods.push(Arc::new(adapter));
    }

    Ok(CaseEvaluator::new(
        &framework.name,
        &framework.core_method,
        methods,
        judge,
        options.clone(),
    )?)
}

fn summary_of<'a>(
    summaries: &'a [ConversationSummary],
    framework: &str,
) -> Option<&'a ConversationSummary> {
    summaries.iter().find(|s| s.framework == framework)
}

fn print_summary(report: &BenchmarkReport) {
    println!("Run {} ({})", report.run_id, report.corpus_name);
    for framework in &report.frameworks {
        println!(
            "  {:<16} overall {:>5.2} ({})  core {} {:>5.2}  failures {}",
            framework.framework_name,
            framework.overall_average,
            grade(framework.overall_average),
            framework.core_method_id,
            framework.core_method_average,
            framework.failure_count()
        );
    }
    if let Some(comparison) = &report.comparison {
        println!(
            "  winner: {} (confidence {:.2})",
            comparison.overall_winner, comparison.overall_confidence
        );
    }
}

fn analyze_conversation(turns: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let turns = load_turns(turns)?;
    let analysis = ConversationAnalyzer::new().analyze(&turns)?;
    let json = serde_json::to_string_pretty(&analysis)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("cannot write {}", path.display()))?;
            info!(path = %path.display(), turns = turns.len(), "Analysis written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn show_history(limit: u32, framework: Option<&str>) -> anyhow::Result<()> {
    let store = SqliteRunStore::new(&DatabaseConfig::from_env()).await?;

    match framework {
        Some(name) => {
            let entries = store.framework_history(name, limit).await?;
            if entries.is_empty() {
                println!("No stored results for {}", name);
            }
            for entry in entries {
                println!(
                    "{}  {}  overall {:.2}  core {} {:.2}  cases {}  failures {}",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.run_id,
                    entry.overall_average,
                    entry.core_method,
                    entry.core_method_average,
                    entry.total_cases,
                    entry.failures
                );
            }
        }
        None => {
            let runs = store.list_runs(limit).await?;
            if runs.is_empty() {
                println!("No stored runs");
            }
            for run in runs {
                let winner = match (&run.overall_winner, run.overall_confidence) {
                    (Some(w), Some(c)) => format!("winner {} ({:.2})", w, c),
                    _ => "no comparison".to_string(),
                };
                println!(
                    "{}  {}  {}  [{}]  {}",
                    run.created_at.format("%Y-%m-%d %H:%M"),
                    run.run_id,
                    run.corpus_name,
                    run.frameworks.join(", "),
                    winner
                );
            }
        }
    }
    Ok(())
}

fn list_corpus(path: Option<&Path>) -> anyhow::Result<()> {
    let corpus = match path {
        Some(path) => ScenarioCorpus::load(path)?,
        None => builtin_corpus()?,
    };

    println!("{} ({} cases)", corpus.name(), corpus.case_count());
    for scenario in corpus.scenarios() {
        println!("  {:<32} {:>3} cases", scenario.name, scenario.cases.len());
    }
    Ok(())
}
