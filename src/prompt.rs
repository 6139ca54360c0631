//! Grounded prompt assembly.
//!
//! Pure transformation from retrieved chunks + conversation history + the
//! in-flight question to the role-tagged message list the completion API
//! expects. The system region always instructs the model to answer only
//! from the supplied context and to emit [`REFUSAL`] verbatim when the
//! context is insufficient — that refusal string is a hard content contract,
//! because it is what makes the hallucination rate measurable downstream.

use serde::Serialize;

use crate::models::{ChatMessage, Chunk};

/// Fixed refusal the model must emit when the context cannot answer the
/// question.
pub const REFUSAL: &str = "抱歉，目前的医疗数据库中没有关于该问题的记录。";

/// Fixed user-visible apology substituted when generation fails. The session
/// records this instead of a partial, unlabeled response.
pub const GENERATION_APOLOGY: &str = "抱歉，系统生成回答时遇到故障。";

const SYSTEM_TEMPLATE: &str = "\
你是一位经验丰富的【三甲医院主治医师】。请基于以下【参考资料】和【对话历史】回答患者的问题。

要求：
1. 回答必须基于提供的参考资料，严禁编造。
2. 如果参考资料中没有答案，请直接回答：“抱歉，目前的医疗数据库中没有关于该问题的记录。”
3. 语气要专业、亲切、富有同理心。

【参考资料】：
{context}";

/// One role-tagged message on the completion API wire.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Join retrieved chunks into a single context block, each prefixed with a
/// `[n]` index marker for traceability.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{}] {}", i + 1, c.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assemble the full prompt: system instructions with the context folded in,
/// prior history turns in chronological order, then the current question.
pub fn assemble(context: &str, history: &[ChatMessage], question: &str) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::new(
        "system",
        SYSTEM_TEMPLATE.replace("{context}", context),
    ));
    for turn in history {
        messages.push(PromptMessage::new(turn.role.as_str(), turn.content.clone()));
    }
    messages.push(PromptMessage::new("user", question));
    messages
}
