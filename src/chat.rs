//! Interactive chat and one-shot ask commands.
//!
//! `chat` runs a REPL over stdin: each turn retrieves context, streams the
//! answer token by token, prints the citation list, and appends both turns
//! to the session. One query is fully processed before the next is read. A
//! generation failure is recovered at the session boundary with the fixed
//! apology string; any other per-turn failure is reported and the turn is
//! skipped. The conversation continues either way.

use anyhow::Result;
use futures::StreamExt;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::citations;
use crate::config::Config;
use crate::llm::{ChatClient, OpenAiChatClient};
use crate::models::ChatMessage;
use crate::prompt;
use crate::retriever::{build_retriever, Retriever};
use crate::session::ConversationSession;

pub async fn run_chat(config: &Config) -> Result<()> {
    let retriever = build_retriever(config, config.retrieval.top_k).await?;
    let client = OpenAiChatClient::new(&config.generation)?;

    println!("model: {}", client.model_name());
    println!("commands: :reset clears the session, :quit exits");
    println!();

    let mut session = ConversationSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            ":quit" | ":q" | ":exit" => break,
            ":reset" => {
                session.reset();
                println!("session cleared");
                continue;
            }
            _ => {}
        }

        // A failed turn (backend hiccup, rate limit) must not kill the
        // session; report it and read the next question.
        if let Err(e) = run_turn(&retriever, &client, &mut session, input).await {
            eprintln!("turn failed: {:#}", e);
        }
    }

    Ok(())
}

/// One full turn: retrieve → assemble → stream → cite → record.
pub async fn run_turn(
    retriever: &Retriever,
    client: &dyn ChatClient,
    session: &mut ConversationSession,
    question: &str,
) -> Result<()> {
    // Retrieve before recording the question: a retrieval failure leaves
    // the session exactly as it was, with no unanswered user turn.
    let chunks = retriever.retrieve(question).await?;
    session.append(ChatMessage::user(question));
    let sources = citations::dedupe_sources(&chunks);
    let context = prompt::format_context(&chunks);
    let messages = prompt::assemble(&context, session.history_excluding_last(), question);

    let answer = match stream_answer(client, &messages).await {
        Ok(text) => text,
        Err(e) => {
            eprintln!("generation error: {:#}", e);
            println!("{}", prompt::GENERATION_APOLOGY);
            prompt::GENERATION_APOLOGY.to_string()
        }
    };

    if !sources.is_empty() {
        println!("参考来源:");
        println!("{}", citations::render(&sources));
    }
    println!();

    session.append(ChatMessage::assistant(answer, sources));
    Ok(())
}

/// Print fragments as they arrive and return the concatenated response. A
/// mid-stream error discards the partial text so the caller can substitute
/// the apology instead of recording an unlabeled fragment.
async fn stream_answer(
    client: &dyn ChatClient,
    messages: &[prompt::PromptMessage],
) -> Result<String> {
    let mut stream = client.complete_stream(messages).await?;
    let mut full = String::new();

    while let Some(fragment) = stream.next().await {
        match fragment {
            Ok(text) => {
                print!("{}", text);
                std::io::stdout().flush()?;
                full.push_str(&text);
            }
            Err(e) => {
                println!();
                return Err(e);
            }
        }
    }
    println!();
    Ok(full)
}

/// One-shot question: batch generation, then answer and citations on stdout.
pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let retriever = build_retriever(config, config.retrieval.top_k).await?;
    let client = OpenAiChatClient::new(&config.generation)?;

    let chunks = retriever.retrieve(question).await?;
    let sources = citations::dedupe_sources(&chunks);
    let context = prompt::format_context(&chunks);
    let messages = prompt::assemble(&context, &[], question);

    let answer = client.complete(&messages).await?;
    println!("{}", answer);
    if !sources.is_empty() {
        println!();
        println!("参考来源:");
        println!("{}", citations::render(&sources));
    }

    Ok(())
}
