//! Chat completion client.
//!
//! Defines the [`ChatClient`] capability trait with batch and streaming
//! generation, plus [`OpenAiChatClient`] for OpenAI-compatible
//! `/chat/completions` endpoints. Streaming parses server-sent `data:`
//! frames in arrival order; fragments concatenate to the full response with
//! no reordering or buffering beyond network delivery.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;

use crate::config::{GenerationConfig, JudgeConfig};
use crate::error::RagError;
use crate::prompt::PromptMessage;

/// Ordered sequence of response fragments. Dropping the stream abandons the
/// request; there is no separate cancellation path.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Generate the full response in one call.
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String>;

    /// Generate incrementally. The caller is suspended at each fragment
    /// boundary, which is what lets the UI render a typewriter effect.
    async fn complete_stream(&self, messages: &[PromptMessage]) -> Result<TokenStream>;

    fn model_name(&self) -> &str;
}

/// Client for OpenAI-compatible chat completion APIs. The API key is read
/// from `OPENAI_API_KEY` at construction.
pub struct OpenAiChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
}

impl OpenAiChatClient {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Self::with_params(
            &config.base_url,
            &config.model,
            config.temperature,
            config.timeout_secs,
        )
    }

    /// The judge shares the generation endpoint unless overridden, and runs
    /// at its own (near-zero) temperature to keep rubric JSON stable.
    pub fn for_judge(generation: &GenerationConfig, judge: &JudgeConfig) -> Result<Self> {
        Self::with_params(
            judge.base_url.as_deref().unwrap_or(&generation.base_url),
            judge.model.as_deref().unwrap_or(&generation.model),
            judge.temperature,
            generation.timeout_secs,
        )
    }

    fn with_params(base_url: &str, model: &str, temperature: f64, timeout_secs: u64) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::Configuration("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            temperature,
        })
    }

    async fn send(&self, messages: &[PromptMessage], stream: bool) -> Result<reqwest::Response> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "stream": stream,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::backend_unavailable("generation", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::Generation(format!(
                "completion API error {}: {}",
                status, body_text
            ))
            .into());
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
        let response = self.send(messages, false).await?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::Generation(format!("invalid completion response: {}", e)))?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                RagError::Generation("completion response missing message content".to_string())
                    .into()
            })
    }

    async fn complete_stream(&self, messages: &[PromptMessage]) -> Result<TokenStream> {
        let response = self.send(messages, true).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::try_stream! {
            let mut decoder = SseDecoder::new();
            while let Some(piece) = bytes.next().await {
                let piece = piece
                    .map_err(|e| RagError::Generation(format!("stream error: {}", e)))?;
                for fragment in decoder.feed(&piece) {
                    yield fragment;
                }
                if decoder.is_done() {
                    break;
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Incremental SSE frame decoder.
///
/// Network chunks arrive at arbitrary byte boundaries — a frame, or even a
/// single UTF-8 codepoint, can straddle two chunks. Raw bytes accumulate in
/// the buffer and only complete newline-terminated lines are decoded, so a
/// partial trailing line (and any split codepoint in it) stays buffered
/// until the rest arrives.
struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    fn new() -> Self {
        Self {
            buffer: Vec::new(),
            done: false,
        }
    }

    /// Feed one network chunk; returns the content fragments of the `data:`
    /// lines it completed, in arrival order.
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut fragments = Vec::new();
        while !self.done {
            let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            // A complete line is whole codepoints; the payload JSON never
            // contains a raw newline.
            let line = String::from_utf8_lossy(&line);

            let Some(payload) = line.trim().strip_prefix("data:") else {
                continue;
            };
            let payload = payload.trim();
            if payload == "[DONE]" {
                self.done = true;
                break;
            }
            if let Some(fragment) = parse_stream_fragment(payload) {
                if !fragment.is_empty() {
                    fragments.push(fragment);
                }
            }
        }
        fragments
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

/// Extract the delta content from one streamed completion frame. Frames
/// without content (role announcements, finish markers) yield nothing.
fn parse_stream_fragment(payload: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(payload).ok()?;
    json.get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stream_fragment_with_content() {
        let payload = r#"{"choices":[{"delta":{"content":"建议"}}]}"#;
        assert_eq!(parse_stream_fragment(payload), Some("建议".to_string()));
    }

    #[test]
    fn test_parse_stream_fragment_role_only() {
        let payload = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_stream_fragment(payload), None);
    }

    #[test]
    fn test_parse_stream_fragment_invalid_json() {
        assert_eq!(parse_stream_fragment("not json"), None);
    }

    fn collect(decoder: &mut SseDecoder, chunks: &[&[u8]]) -> String {
        let mut out = String::new();
        for chunk in chunks {
            for fragment in decoder.feed(chunk) {
                out.push_str(&fragment);
            }
        }
        out
    }

    #[test]
    fn test_decoder_whole_frame() {
        let mut decoder = SseDecoder::new();
        let frame = "data: {\"choices\":[{\"delta\":{\"content\":\"建议\"}}]}\n\n";
        assert_eq!(collect(&mut decoder, &[frame.as_bytes()]), "建议");
        assert!(!decoder.is_done());
    }

    #[test]
    fn test_decoder_codepoint_split_across_chunks() {
        // Cut one byte into the three-byte 建: the partial codepoint must
        // stay buffered, not decode to replacement characters.
        let frame = "data: {\"choices\":[{\"delta\":{\"content\":\"建议\"}}]}\n\n";
        let cut = frame.find('建').unwrap() + 1;
        let bytes = frame.as_bytes();

        let mut decoder = SseDecoder::new();
        let out = collect(&mut decoder, &[&bytes[..cut], &bytes[cut..]]);
        assert_eq!(out, "建议");
        assert!(!out.contains('\u{FFFD}'));
    }

    #[test]
    fn test_decoder_frame_split_mid_line() {
        let frame = "data: {\"choices\":[{\"delta\":{\"content\":\"多喝水\"}}]}\n";
        let bytes = frame.as_bytes();

        // Every byte-level split point must reassemble to the same text.
        for cut in 1..bytes.len() {
            let mut decoder = SseDecoder::new();
            let out = collect(&mut decoder, &[&bytes[..cut], &bytes[cut..]]);
            assert_eq!(out, "多喝水", "split at byte {}", cut);
        }
    }

    #[test]
    fn test_decoder_multiple_frames_in_one_chunk() {
        let chunk = "data: {\"choices\":[{\"delta\":{\"content\":\"建议\"}}]}\n\n\
                     data: {\"choices\":[{\"delta\":{\"content\":\"多休息\"}}]}\n\n";
        let mut decoder = SseDecoder::new();
        assert_eq!(collect(&mut decoder, &[chunk.as_bytes()]), "建议多休息");
    }

    #[test]
    fn test_decoder_done_stops_decoding() {
        let chunk = "data: {\"choices\":[{\"delta\":{\"content\":\"建议\"}}]}\n\
                     data: [DONE]\n\
                     data: {\"choices\":[{\"delta\":{\"content\":\"多余\"}}]}\n";
        let mut decoder = SseDecoder::new();
        assert_eq!(collect(&mut decoder, &[chunk.as_bytes()]), "建议");
        assert!(decoder.is_done());
        assert!(decoder
            .feed("data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n".as_bytes())
            .is_empty());
    }

    #[test]
    fn test_decoder_skips_role_and_blank_lines() {
        let chunk = "\n\
                     data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\
                     : keep-alive comment\n\
                     data: {\"choices\":[{\"delta\":{\"content\":\"好\"}}]}\n";
        let mut decoder = SseDecoder::new();
        assert_eq!(collect(&mut decoder, &[chunk.as_bytes()]), "好");
    }
}
