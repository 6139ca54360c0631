//! # medrag CLI
//!
//! Command-line interface for the medical RAG assistant. All commands accept
//! a `--config` flag pointing to a TOML configuration file; see
//! `config/medrag.example.toml` for a full example. The generation and
//! embedding backends authenticate via the `OPENAI_API_KEY` environment
//! variable.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `medrag prepare <question.csv> <answer.csv>` | Build the chunk-ready corpus CSV |
//! | `medrag testset <question.csv> <answer.csv>` | Build the evaluation test set |
//! | `medrag chat` | Interactive chat with streamed answers and citations |
//! | `medrag ask "<question>"` | One-shot question |
//! | `medrag eval` | Judge-scored offline evaluation with crash/resume |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use medrag::{chat, config, eval, prepare};

/// medrag — a retrieval-augmented chat assistant over a medical
/// question-answer corpus.
#[derive(Parser)]
#[command(
    name = "medrag",
    about = "medrag — a retrieval-augmented chat assistant over a medical question-answer corpus",
    version,
    long_about = "medrag chunks and embeds a medical question-answer corpus into an in-memory \
    vector index, answers questions grounded in retrieved context with streamed output and \
    citations, and scores the pipeline offline with a judge model."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/medrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build the chunk-ready corpus CSV from raw question/answer files.
    ///
    /// Joins answers to questions, drops throwaway answers, formats each
    /// pair as one retrieval record, and writes a deterministic sample.
    Prepare {
        /// Headerless question CSV (`qid, content`).
        question_file: PathBuf,

        /// Headerless answer CSV (`aid, qid, content`).
        answer_file: PathBuf,

        /// Output corpus CSV path.
        #[arg(long, default_value = "./data/clean_medical_knowledge.csv")]
        output: PathBuf,

        /// Number of records to sample.
        #[arg(long, default_value_t = 10_000)]
        sample: usize,

        /// RNG seed for the sample.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Build the evaluation test set from raw question/answer files.
    ///
    /// Uses a different seed than `prepare` so test questions mostly fall
    /// outside the indexed sample.
    Testset {
        /// Headerless question CSV (`qid, content`).
        question_file: PathBuf,

        /// Headerless answer CSV (`aid, qid, content`).
        answer_file: PathBuf,

        /// Output test-set JSON path.
        #[arg(long, default_value = "./test_dataset.json")]
        output: PathBuf,

        /// Number of test items to sample.
        #[arg(long, default_value_t = 20)]
        sample: usize,

        /// RNG seed for the sample.
        #[arg(long, default_value_t = 999)]
        seed: u64,
    },

    /// Start an interactive chat session.
    ///
    /// Builds the index from the configured corpus, then answers each
    /// question from retrieved context with streamed output and a citation
    /// list. `:reset` clears the conversation; `:quit` exits.
    Chat,

    /// Ask a single question and print the grounded answer with citations.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Run the judge-scored offline evaluation.
    ///
    /// Processes the configured test set sequentially, persisting the result
    /// table after every item. Re-running resumes from the first unscored
    /// item when the existing table's schema matches.
    Eval {
        /// Maximum number of test items to process.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // prepare/testset read raw inputs from their arguments and need no config.
    match &cli.command {
        Commands::Prepare {
            question_file,
            answer_file,
            output,
            sample,
            seed,
        } => {
            return prepare::run_prepare(question_file, answer_file, output, *sample, *seed);
        }
        Commands::Testset {
            question_file,
            answer_file,
            output,
            sample,
            seed,
        } => {
            return prepare::run_testset(question_file, answer_file, output, *sample, *seed);
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Chat => chat::run_chat(&cfg).await?,
        Commands::Ask { question } => chat::run_ask(&cfg, &question).await?,
        Commands::Eval { limit } => eval::run_eval(&cfg, limit).await?,
        Commands::Prepare { .. } | Commands::Testset { .. } => unreachable!(),
    }

    Ok(())
}
