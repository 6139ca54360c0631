//! Offline judge-scored evaluation.
//!
//! For each test item: retrieve → generate → score with a second model
//! against a fixed rubric → append to the result table → rewrite the whole
//! table on disk. The loop is strictly sequential with fixed pauses between
//! remote calls (backpressure against rate limits) and an extended cooldown
//! after a per-item failure. Progress is never lost: persistence happens
//! after every scored item, and a restart resumes from the first unscored
//! index as long as the existing table carries the expected score columns.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::llm::{ChatClient, OpenAiChatClient};
use crate::models::{EvalRecord, TestItem};
use crate::prompt::{self, PromptMessage};
use crate::retriever::{build_retriever, Retriever};

/// CoT scoring rubric. Scores are quantized to {0.0, 0.3, 0.5, 0.8, 1.0} to
/// spread the distribution; the judge must answer in JSON.
const JUDGE_TEMPLATE: &str = "\
你是一位极其严格的 NLP 评估专家。请基于参考资料和标准答案，对考生回答进行“找茬”式评分。

【参考资料 (Context)】：
{context}

【标准答案 (Ground Truth)】：
{ground_truth}

【考生回答 (Answer)】：
{answer}

---
请按照以下步骤思考（不要跳过！）：
1. 检查 **准确性**：考生回答是否遗漏了标准答案里的关键点？(遗漏了就扣分)
2. 检查 **忠实度**：考生回答里有没有参考资料里没提到的废话？(有废话必须扣分，哪怕是对的也要扣！)
3. 检查 **引用**：考生是否充分利用了资料？

最后输出 JSON。

请严格按照以下 JSON 格式输出（分数必须是 0.0, 0.3, 0.5, 0.8, 1.0 中的一个，以此拉开差距）：
{
    \"reasoning\": \"简短的一句话，指出具体哪里扣分了\",
    \"accuracy\": 0.x,
    \"faithfulness\": 0.x,
    \"citation_f1\": 0.x
}";

/// Parsed judge verdict.
#[derive(Debug, Deserialize)]
pub struct JudgeScores {
    #[serde(default)]
    pub reasoning: String,
    pub accuracy: f64,
    pub faithfulness: f64,
    pub citation_f1: f64,
}

impl JudgeScores {
    /// Neutral fallback when the judge reply does not parse. The run never
    /// aborts on a malformed verdict.
    pub fn neutral() -> Self {
        Self {
            reasoning: "解析失败".to_string(),
            accuracy: 0.5,
            faithfulness: 0.5,
            citation_f1: 0.5,
        }
    }
}

pub async fn run_eval(config: &Config, limit: Option<usize>) -> Result<()> {
    let test_items = load_test_set(&config.eval.test_set)?;
    let total = limit.unwrap_or(test_items.len()).min(test_items.len());

    let retriever = build_retriever(config, config.eval.top_k).await?;
    let generator = OpenAiChatClient::new(&config.generation)?;
    let judge = OpenAiChatClient::for_judge(&config.generation, &config.judge)?;

    // Resume from a previous partial run when the schema matches.
    let mut results = match load_existing_results(&config.eval.output)? {
        Some(rows) => {
            println!("resuming: {} items already scored", rows.len());
            rows
        }
        None => Vec::new(),
    };

    let start_index = results.len();
    println!("evaluating items {}..{}", start_index + 1, total);

    let pause = Duration::from_secs(config.eval.request_pause_secs);
    let cooldown = Duration::from_secs(config.eval.error_cooldown_secs);

    for (i, item) in test_items.iter().enumerate().take(total).skip(start_index) {
        println!("-------- item {}/{} --------", i + 1, total);
        println!("question: {}", item.question);

        match score_item(&retriever, &generator, &judge, item, pause).await {
            Ok(record) => {
                println!(
                    "scores: accuracy {} / faithfulness {} / citation_f1 {}",
                    record.accuracy, record.faithfulness, record.citation_f1
                );
                results.push(record);
                write_results(&config.eval.output, &results)?;
                println!("progress saved ({} rows)", results.len());
                tokio::time::sleep(pause).await;
            }
            Err(e) => {
                // Per-item boundary: log, cool down, move on. The failed
                // item stays unscored rather than killing the run.
                eprintln!("item {} failed: {:#}", i + 1, e);
                tokio::time::sleep(cooldown).await;
            }
        }
    }

    println!(
        "evaluation complete: {} rows in {}",
        results.len(),
        config.eval.output.display()
    );
    Ok(())
}

/// Retrieve, generate, pause, judge. Returns the persisted row.
pub async fn score_item(
    retriever: &Retriever,
    generator: &dyn ChatClient,
    judge: &dyn ChatClient,
    item: &TestItem,
    pause: Duration,
) -> Result<EvalRecord> {
    let chunks = retriever.retrieve(&item.question).await?;
    let context = prompt::format_context(&chunks);

    let messages = prompt::assemble(&context, &[], &item.question);
    let answer = generator.complete(&messages).await?;
    println!("answer preview: {}...", preview(&answer, 20));

    // Fixed inter-request delay between generate and judge calls.
    tokio::time::sleep(pause).await;

    let verdict = judge
        .complete(&[PromptMessage {
            role: "user".to_string(),
            content: render_judge_prompt(&context, &item.ground_truth, &answer),
        }])
        .await?;

    let scores = match parse_judge_output(&verdict) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{:#} — substituting neutral scores", e);
            JudgeScores::neutral()
        }
    };

    Ok(EvalRecord {
        question: item.question.clone(),
        ground_truth: item.ground_truth.clone(),
        answer,
        contexts: context,
        accuracy: scores.accuracy,
        citation_f1: scores.citation_f1,
        faithfulness: scores.faithfulness,
        hallucination_rate: 1.0 - scores.faithfulness,
        reason: scores.reasoning,
    })
}

pub fn render_judge_prompt(context: &str, ground_truth: &str, answer: &str) -> String {
    JUDGE_TEMPLATE
        .replace("{context}", context)
        .replace("{ground_truth}", ground_truth)
        .replace("{answer}", answer)
}

/// Parse the judge's reply as rubric JSON. Models often wrap the JSON in
/// ``` fences; strip them before parsing. A non-parseable reply is a
/// recoverable `MalformedJudgeOutput`.
pub fn parse_judge_output(raw: &str) -> Result<JudgeScores, crate::error::RagError> {
    let cleaned = raw
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string();

    serde_json::from_str(&cleaned).map_err(|e| {
        crate::error::RagError::MalformedJudgeOutput(format!("{}; raw reply: {}", e, preview(raw, 120)))
    })
}

pub fn load_test_set(path: &Path) -> Result<Vec<TestItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read test set: {}", path.display()))?;
    let items: Vec<TestItem> =
        serde_json::from_str(&content).context("Failed to parse test set JSON")?;
    Ok(items)
}

/// Load a previous run's rows for resume. Returns `None` (start from zero)
/// when the file is absent, unreadable, or carries a stale schema without
/// the score columns. Row content is trusted as-is — only the header is
/// checked.
pub fn load_existing_results(path: &Path) -> Result<Option<Vec<EvalRecord>>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut reader = match csv::Reader::from_path(path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("could not read previous results ({}); starting over", e);
            return Ok(None);
        }
    };

    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(_) => return Ok(None),
    };
    if !headers.iter().any(|h| h == "accuracy") {
        println!("previous results use a stale schema; starting over");
        return Ok(None);
    }

    let mut rows = Vec::new();
    for row in reader.deserialize::<EvalRecord>() {
        match row {
            Ok(r) => rows.push(r),
            Err(e) => {
                eprintln!("could not parse previous results ({}); starting over", e);
                return Ok(None);
            }
        }
    }
    Ok(Some(rows))
}

/// Rewrite the whole result table. Called after every scored item so a crash
/// loses at most the in-flight item.
pub fn write_results(path: &Path, results: &[EvalRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open results file: {}", path.display()))?;
    for record in results {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
