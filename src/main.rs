//! elicit CLI
//!
//! Adaptive requirements interviews from the terminal.
//!
//! Run with: elicit interview <topic>
//! Logs go to stderr; set RUST_LOG=elicit=debug to watch selection scoring.

use anyhow::{bail, Context, Result};
use elicit::{
    clarification_question, first_hedge, Answer, BuiltinSource, ConfidenceCalculator,
    ConfidenceResult, EngineConfig, JsonFileSource, Priority, Question, QuestionContext,
    QuestionStore, QuestioningEngine, QuestioningStats, SqliteStore, TemplateSource,
};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_PHASE: &str = "specify";
const DEFAULT_ANSWER_CONFIDENCE: f64 = 0.7;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let rest = &args[2..];
    match args[1].as_str() {
        "interview" => run_interview(rest).await,
        "--questions" => {
            // --questions <phase> <count> <topic...>
            let words = positional(rest);
            if words.len() < 3 {
                bail!("Usage: elicit --questions <phase> <count> <topic>");
            }
            let count: usize = words[1]
                .parse()
                .with_context(|| format!("count must be a number, got '{}'", words[1]))?;
            run_questions(words[0], count, &words[2..].join(" "), rest).await
        }
        "--score" => {
            let path = rest.first().context("Usage: elicit --score <answers.json> [--json]")?;
            let json_output = rest.iter().any(|a| a == "--json");
            run_score(Path::new(path), json_output, rest)
        }
        "--ambiguity" => {
            let text = positional(rest).join(" ");
            if text.is_empty() {
                bail!("Usage: elicit --ambiguity <text>");
            }
            run_ambiguity(&text, rest).await
        }
        "--history" => {
            let session_id = rest.first().context("Usage: elicit --history <session_id>")?;
            run_history(session_id, rest)
        }
        "--phases" => run_phases(rest).await,
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            bail!("Unknown command: {}", other)
        }
    }
}

fn print_usage() {
    println!("elicit - adaptive requirements elicitation");
    println!();
    println!("Usage:");
    println!("  elicit interview <topic> [--phase=P] [--target=T] [--persist] [--resume=ID]");
    println!("  elicit --questions <phase> <count> <topic>");
    println!("  elicit --score <answers.json> [--json]");
    println!("  elicit --ambiguity <text>");
    println!("  elicit --history <session_id>");
    println!("  elicit --phases");
    println!();
    println!("Common options:");
    println!("  --config=PATH      Config file (default: {})", EngineConfig::default_path().display());
    println!("  --templates=PATH   Template catalog JSON (default: built-in)");
}

/// Value of a `--name=value` flag
fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    let prefix = format!("--{}=", name);
    args.iter().find_map(|a| a.strip_prefix(prefix.as_str()))
}

fn positional(args: &[String]) -> Vec<&str> {
    args.iter()
        .filter(|a| !a.starts_with("--"))
        .map(|a| a.as_str())
        .collect()
}

fn load_config(args: &[String]) -> Result<EngineConfig> {
    let path = flag_value(args, "config")
        .map(PathBuf::from)
        .unwrap_or_else(EngineConfig::default_path);
    let mut config = EngineConfig::load_or_default(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Some(templates) = flag_value(args, "templates") {
        config.templates_path = Some(PathBuf::from(templates));
    }
    if args.iter().any(|a| a == "--persist") {
        config.persist_questions = true;
    }
    Ok(config)
}

fn template_source(config: &EngineConfig) -> Box<dyn TemplateSource> {
    match &config.templates_path {
        Some(path) => Box::new(JsonFileSource::new(path.clone())),
        None => Box::new(BuiltinSource),
    }
}

fn open_store(config: &EngineConfig) -> Result<SqliteStore> {
    let db_path = config.database_path();
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open session database {}", db_path.display()))?;
    tracing::info!("Database initialized at {:?}", db_path);
    Ok(store)
}

/// One line from stdin; `None` at end of input
fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

async fn run_interview(args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let source = template_source(&config);
    let phase = flag_value(args, "phase").unwrap_or(DEFAULT_PHASE).to_string();
    let mut topic = positional(args).join(" ");

    let mut engine = match flag_value(args, "resume") {
        Some(session_id) => {
            let store = open_store(&config)?;
            let record = store
                .session(session_id)?
                .with_context(|| format!("No recorded session {}", session_id))?;
            if topic.is_empty() {
                topic = record.topic;
            }
            QuestioningEngine::resume(session_id, source.as_ref(), config, Box::new(store))
                .await
                .context("Failed to resume session")?
        }
        None => {
            if topic.is_empty() {
                bail!("Usage: elicit interview <topic> [--phase=P] [--target=T]");
            }
            let session_id = uuid::Uuid::new_v4().to_string();
            let persist = config.persist_questions;
            let store = if persist { Some(open_store(&config)?) } else { None };
            let mut engine = QuestioningEngine::with_source(&session_id, source.as_ref(), config)
                .await
                .with_context(|| format!("Failed to load templates from {}", source.describe()))?;
            if let Some(store) = store {
                engine.attach_store(Box::new(store), &topic)?;
            }
            engine
        }
    };

    let mut context = QuestionContext::new(&topic, &phase);
    if let Some(target) = flag_value(args, "target") {
        let target: f64 = target
            .parse()
            .with_context(|| format!("target must be a number, got '{}'", target))?;
        context = context.with_target(target);
    }
    // Fail on an unknown phase before the first prompt
    engine.catalog().phase(&phase)?;

    println!("Requirements interview: {} ({} phase)", topic, phase);
    println!("Session: {}", engine.session_id());
    println!("Answer each question. Commands: /followups, /stats, /help, quit\n");

    let mut queue: VecDeque<Question> = VecDeque::new();
    let mut last_answer: Option<Answer> = None;

    'interview: loop {
        let question = match queue.pop_front() {
            Some(q) => q,
            None => match engine.generate_next_question(&context)? {
                Some(q) => q,
                None => break,
            },
        };

        let marker = if question.follow_up_to.is_some() { "  ↳" } else { "?" };
        println!("\n{} [{}|{}] {}", marker, question.priority.name(), question.category, question.text);

        let text = loop {
            let Some(line) = read_line("> ")? else {
                break 'interview;
            };
            match line.as_str() {
                "" => continue,
                "quit" | "exit" => break 'interview,
                "/stats" => print_stats(&engine.get_stats()),
                "/followups" => match &last_answer {
                    Some(answer) => {
                        let follow_ups = engine.get_follow_up_questions(answer);
                        if follow_ups.is_empty() {
                            println!("No follow-ups for the previous answer.");
                        } else {
                            println!("Queued {} follow-up(s) after this question.", follow_ups.len());
                            queue.extend(follow_ups);
                        }
                    }
                    None => println!("Answer a question first."),
                },
                "/help" => {
                    println!("Commands:");
                    println!("  <text>       Answer the current question");
                    println!("  /followups   Drill into the previous answer");
                    println!("  /stats       Show session statistics");
                    println!("  quit         End the interview");
                }
                cmd if cmd.starts_with('/') => println!("Unknown command: {}. Try /help", cmd),
                answer => break answer.to_string(),
            }
        };

        let confidence = match read_line(&format!(
            "confidence 0-1 [{}]: ",
            DEFAULT_ANSWER_CONFIDENCE
        ))? {
            Some(value) if !value.is_empty() => value.parse().unwrap_or_else(|_| {
                println!("Not a number, using {}", DEFAULT_ANSWER_CONFIDENCE);
                DEFAULT_ANSWER_CONFIDENCE
            }),
            _ => DEFAULT_ANSWER_CONFIDENCE,
        };

        let answer = Answer::new(&question.id, &text, confidence);
        let overall = engine.process_answer(answer.clone());
        println!("Confidence: {:.0}% ({})", overall * 100.0, engine.status().name());
        if let Some(result) = engine.last_result() {
            if let Some(insight) = result.insights.first() {
                println!("  {}", insight);
            }
        }
        last_answer = Some(answer);
    }

    let session_id = engine.session_id().to_string();
    let persisted = engine.config().persist_questions;
    let stats = engine.close();
    print_stats(&stats);
    if persisted {
        println!("\nResume with: elicit interview --resume={}", session_id);
    }
    Ok(())
}

fn print_stats(stats: &QuestioningStats) {
    println!("\nSession {} [{}]", stats.session_id, stats.status.name());
    println!(
        "  Questions: {} asked, {} answered, {} follow-ups",
        stats.total_questions, stats.answered, stats.follow_ups
    );
    println!("  Confidence: {:.0}%", stats.current_confidence * 100.0);
    if stats.ambiguous_answers > 0 {
        println!("  Ambiguous answers: {}", stats.ambiguous_answers);
    }
    if !stats.questions_by_category.is_empty() {
        let categories: Vec<String> = stats
            .questions_by_category
            .iter()
            .map(|(c, n)| format!("{}={}", c, n))
            .collect();
        println!("  By category: {}", categories.join(", "));
    }
    if let Some(coverage) = &stats.coverage {
        println!(
            "  Coverage ({}): {:.0}% of required categories",
            coverage.phase,
            coverage.satisfied_ratio * 100.0
        );
        if !coverage.gaps.is_empty() {
            println!("  Gaps: {}", coverage.gaps.join(", "));
        }
    }
    if stats.persistence_failures > 0 {
        println!("  Persistence failures: {}", stats.persistence_failures);
    }
}

async fn run_questions(phase: &str, count: usize, topic: &str, args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let source = template_source(&config);
    let engine = QuestioningEngine::with_source("preview", source.as_ref(), config).await?;

    let questions = engine.generate_questions(topic, phase, count)?;
    println!("{} question(s) for {} ({} phase):\n", questions.len(), topic, phase);
    for (i, q) in questions.iter().enumerate() {
        println!("{:>2}. [{}|{}] {}", i + 1, q.priority.name(), q.category, q.text);
    }
    Ok(())
}

/// One row of a `--score` input file
#[derive(Debug, Deserialize)]
struct ScoredAnswer {
    question: String,
    #[serde(default = "default_category")]
    category: String,
    answer: String,
    #[serde(default = "default_answer_confidence")]
    confidence: f64,
}

fn default_category() -> String {
    "requirements".to_string()
}

fn default_answer_confidence() -> f64 {
    DEFAULT_ANSWER_CONFIDENCE
}

fn run_score(path: &Path, json_output: bool, args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let rows: Vec<ScoredAnswer> = serde_json::from_str(&content)
        .with_context(|| format!("Expected a JSON array of answers in {}", path.display()))?;

    let mut questions = Vec::with_capacity(rows.len());
    let mut answers = Vec::with_capacity(rows.len());
    for row in rows {
        let question = Question::new(None, "score", row.question, &row.category, Priority::Medium);
        let mut answer = Answer::new(&question.id, &row.answer, row.confidence);
        if elicit::detect_ambiguity(&answer.text) {
            answer.confidence = elicit::ambiguity::penalize(answer.confidence, config.ambiguity_penalty);
        }
        questions.push(question);
        answers.push(answer);
    }

    let result = ConfidenceCalculator::new(config.weights)
        .with_min_answers_for_consistency(config.min_answers_for_consistency)
        .with_threshold(config.target_confidence)
        .calculate(&answers, &questions);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_confidence(&result, answers.len());
    }
    Ok(())
}

fn print_confidence(result: &ConfidenceResult, answer_count: usize) {
    println!("Scored {} answer(s): {:.0}% confidence\n", answer_count, result.overall * 100.0);
    for (name, value) in result.factors.named() {
        let filled = (value * 10.0).round() as usize;
        println!(
            "  {:<13} [{}{}] {:.2}",
            name,
            "█".repeat(filled.min(10)),
            "░".repeat(10 - filled.min(10)),
            value
        );
    }
    if !result.missing.is_empty() {
        println!("\nMissing critical categories: {}", result.missing.join(", "));
    }
    if !result.insights.is_empty() {
        println!("\nInsights:");
        for insight in &result.insights {
            println!("  • {}", insight);
        }
    }
}

async fn run_ambiguity(text: &str, args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let catalog = template_source(&config).load().await?;

    let Some(hedge) = first_hedge(text) else {
        println!("No hedging detected.");
        return Ok(());
    };
    println!("Ambiguous: \"{}\" in \"{}\"", hedge.phrase, hedge.context);

    let original = Question::new(None, DEFAULT_PHASE, String::new(), "requirements", Priority::Medium);
    let answer = Answer::new(&original.id, text, DEFAULT_ANSWER_CONFIDENCE);
    let topic = flag_value(args, "topic").unwrap_or("this");
    if let Some(q) = clarification_question(
        &answer,
        &original,
        topic,
        catalog.adaptive_rules.clarification_template.as_deref(),
    ) {
        println!("Clarification: {}", q.text);
    }
    Ok(())
}

fn run_history(session_id: &str, args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let store = open_store(&config)?;
    let record = store
        .session(session_id)?
        .with_context(|| format!("No recorded session {}", session_id))?;

    println!("Session {}: {}", record.id, record.topic);
    println!(
        "  started {}{}",
        record.created_at,
        record
            .closed_at
            .as_ref()
            .map(|c| format!(", closed {}", c))
            .unwrap_or_default()
    );

    let mut depths: HashMap<String, usize> = HashMap::new();
    for entry in store.load_history(session_id)? {
        let q = &entry.question;
        let depth = q
            .follow_up_to
            .as_ref()
            .and_then(|p| depths.get(p))
            .map_or(0, |d| d + 1);
        depths.insert(q.id.clone(), depth);
        let indent = "  ".repeat(depth + 1);

        println!("\n{}[{}|{}] {}", indent, q.phase, q.category, q.text);
        match &entry.answer {
            Some(a) => println!("{}  → {} ({:.2})", indent, a.text, a.confidence),
            None => println!("{}  → (unanswered)", indent),
        }
    }
    Ok(())
}

async fn run_phases(args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let source = template_source(&config);
    let catalog = source.load().await?;

    println!("Phases in {}:\n", source.describe());
    for name in catalog.phase_names() {
        let phase = catalog.phase(name)?;
        let target = phase.target_confidence.unwrap_or(config.target_confidence);
        println!(
            "  {:<11} min {} questions, target {:.0}%, {} templates",
            name,
            phase.min_questions,
            target * 100.0,
            catalog.for_phase(name).count()
        );
        if !phase.min_coverage.is_empty() {
            let coverage: Vec<String> = phase
                .min_coverage
                .iter()
                .map(|(c, n)| format!("{}≥{}", c, n))
                .collect();
            println!("              coverage: {}", coverage.join(", "));
        }
    }
    Ok(())
}
