//! Corpus and test-set preparation.
//!
//! Joins the raw cMedQA-style CSVs — headerless `question.csv`
//! (`qid, content`) and `answer.csv` (`aid, qid, content`) — into either the
//! chunk-ready corpus CSV (`content, source`) or a JSON test set of
//! `{question, ground_truth}` records. Sampling is seeded so both outputs
//! are reproducible, with different seeds so the test set diverges from the
//! corpus sample.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::Path;

use crate::error::RagError;
use crate::models::TestItem;

/// One joined question/answer pair.
#[derive(Debug, Clone)]
struct QaPair {
    qid: String,
    question: String,
    answer: String,
}

/// Join answers to their questions on `qid`. Input files are headerless.
fn load_qa_pairs(question_file: &Path, answer_file: &Path) -> Result<Vec<QaPair>> {
    for path in [question_file, answer_file] {
        if !path.exists() {
            return Err(RagError::Configuration(format!(
                "input file not found: {}",
                path.display()
            ))
            .into());
        }
    }

    let mut questions: HashMap<String, String> = HashMap::new();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(question_file)
        .with_context(|| format!("Failed to open {}", question_file.display()))?;
    for row in reader.records() {
        let row = row.context("Failed to parse question row")?;
        if let (Some(qid), Some(content)) = (row.get(0), row.get(1)) {
            questions.insert(qid.to_string(), content.to_string());
        }
    }

    let mut pairs = Vec::new();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(answer_file)
        .with_context(|| format!("Failed to open {}", answer_file.display()))?;
    for row in reader.records() {
        let row = row.context("Failed to parse answer row")?;
        let (Some(qid), Some(answer)) = (row.get(1), row.get(2)) else {
            continue;
        };
        if let Some(question) = questions.get(qid) {
            pairs.push(QaPair {
                qid: qid.to_string(),
                question: question.clone(),
                answer: answer.to_string(),
            });
        }
    }

    Ok(pairs)
}

/// Deterministically sample up to `n` items, preserving the original
/// relative order of the picked indices.
fn sample_pairs(pairs: Vec<QaPair>, n: usize, seed: u64) -> Vec<QaPair> {
    if pairs.len() <= n {
        return pairs;
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked: Vec<usize> = sample(&mut rng, pairs.len(), n).into_vec();
    picked.sort_unstable();

    let mut out = Vec::with_capacity(n);
    let mut iter = pairs.into_iter();
    let mut next_index = 0usize;
    for idx in picked {
        // nth consumes up to and including the picked element.
        if let Some(pair) = iter.nth(idx - next_index) {
            out.push(pair);
        }
        next_index = idx + 1;
    }
    out
}

/// Build the chunk-ready corpus CSV: filter out throwaway answers, format
/// each pair as one retrieval record, sample, and write `content,source`
/// rows where `source` is the provenance id used for citations.
pub fn run_prepare(
    question_file: &Path,
    answer_file: &Path,
    output: &Path,
    sample_size: usize,
    seed: u64,
) -> Result<()> {
    let pairs = load_qa_pairs(question_file, answer_file)?;
    println!("joined {} question/answer pairs", pairs.len());

    // Short answers ("好的", "谢谢") carry nothing retrievable.
    let pairs: Vec<QaPair> = pairs
        .into_iter()
        .filter(|p| p.answer.chars().count() > 10)
        .collect();

    let sampled = sample_pairs(pairs, sample_size, seed);
    println!("sampled {} records", sampled.len());

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to open output: {}", output.display()))?;
    writer.write_record(["content", "source"])?;
    for pair in &sampled {
        writer.write_record([
            format_rag_content(&pair.question, &pair.answer),
            format!("cMedQA2_ID_{}", pair.qid),
        ])?;
    }
    writer.flush()?;

    println!("corpus written to {}", output.display());
    Ok(())
}

/// Build the evaluation test set: the same join with a stricter length
/// filter (ground truths should be substantial) and a different seed so the
/// sample diverges from the corpus.
pub fn run_testset(
    question_file: &Path,
    answer_file: &Path,
    output: &Path,
    sample_size: usize,
    seed: u64,
) -> Result<()> {
    let pairs = load_qa_pairs(question_file, answer_file)?;

    let pairs: Vec<QaPair> = pairs
        .into_iter()
        .filter(|p| p.answer.chars().count() > 20)
        .collect();

    let sampled = sample_pairs(pairs, sample_size, seed);

    let items: Vec<TestItem> = sampled
        .into_iter()
        .map(|p| TestItem {
            question: p.question,
            ground_truth: p.answer,
        })
        .collect();

    let json = serde_json::to_string_pretty(&items)?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write test set: {}", output.display()))?;

    println!("test set written to {} ({} items)", output.display(), items.len());
    Ok(())
}

/// Retrieval record format: question and answer together, so a query can
/// match the question's keywords while the chunk carries the answer.
fn format_rag_content(question: &str, answer: &str) -> String {
    format!("【患者提问】：{}\n【医生回答】：{}", question, answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_inputs(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let q_path = dir.join("question.csv");
        let a_path = dir.join("answer.csv");

        let mut q = std::fs::File::create(&q_path).unwrap();
        writeln!(q, "1,头痛怎么办").unwrap();
        writeln!(q, "2,失眠吃什么药").unwrap();
        writeln!(q, "3,胃疼").unwrap();

        let mut a = std::fs::File::create(&a_path).unwrap();
        writeln!(a, "10,1,建议多休息多喝水保持充足睡眠").unwrap();
        writeln!(a, "11,2,好的").unwrap();
        writeln!(a, "12,3,清淡饮食，按时作息，避免辛辣刺激食物，必要时到医院消化内科就诊").unwrap();
        writeln!(a, "13,9,孤儿回答没有对应问题").unwrap();

        (q_path, a_path)
    }

    #[test]
    fn test_prepare_joins_filters_and_formats() {
        let dir = tempfile::tempdir().unwrap();
        let (q, a) = write_inputs(dir.path());
        let out = dir.path().join("corpus.csv");

        run_prepare(&q, &a, &out, 100, 42).unwrap();

        let docs = crate::corpus::load_corpus(&out).unwrap();
        // Answer "好的" is filtered (too short); orphan answer has no join.
        assert_eq!(docs.len(), 2);
        assert!(docs[0].text.starts_with("【患者提问】："));
        assert!(docs[0].text.contains("【医生回答】："));
        assert!(docs.iter().any(|d| d.source == "cMedQA2_ID_1"));
        assert!(docs.iter().any(|d| d.source == "cMedQA2_ID_3"));
    }

    #[test]
    fn test_prepare_sampling_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let (q, a) = write_inputs(dir.path());

        let out1 = dir.path().join("corpus1.csv");
        let out2 = dir.path().join("corpus2.csv");
        run_prepare(&q, &a, &out1, 1, 42).unwrap();
        run_prepare(&q, &a, &out2, 1, 42).unwrap();

        let d1 = crate::corpus::load_corpus(&out1).unwrap();
        let d2 = crate::corpus::load_corpus(&out2).unwrap();
        assert_eq!(d1.len(), 1);
        assert_eq!(d1[0].source, d2[0].source);
    }

    #[test]
    fn test_testset_produces_json_items() {
        let dir = tempfile::tempdir().unwrap();
        let (q, a) = write_inputs(dir.path());
        let out = dir.path().join("test_dataset.json");

        run_testset(&q, &a, &out, 10, 999).unwrap();

        let items = crate::eval::load_test_set(&out).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].question, "胃疼");
        assert!(items[0].ground_truth.contains("清淡饮食"));
    }

    #[test]
    fn test_missing_input_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.csv");
        let err = run_prepare(&missing, &missing, &dir.path().join("o.csv"), 10, 42).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::Configuration(_))
        ));
    }
}
