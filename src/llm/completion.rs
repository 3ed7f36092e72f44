use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::config::LlmConfig;
use crate::llm::history::Conversation;
use crate::llm::prompt::{build_context, sanitize_for_prompt};
use crate::models::{Answer, ChatMessage, SearchHit};
use crate::state::AppState;

/// An answer together with the chunks it was generated from.
#[derive(Debug, Clone)]
pub struct AnswerWithContext {
    pub answer: Answer,
    pub context: Vec<SearchHit>,
}

/// Retrieve context for `question`, ask the model and split out its citations.
///
/// When the model cites nothing, the distinct sources of the retrieved
/// context are reported instead.
pub async fn answer_question(
    state: &AppState,
    question: &str,
    topics: Option<&[String]>,
) -> Result<AnswerWithContext> {
    answer_in_conversation(state, question, topics, &Conversation::default()).await
}

/// Like [`answer_question`], for a follow-up in an ongoing session.
///
/// Retrieval searches the previous question together with this one, and
/// earlier exchanges are sent ahead of the filled template.
pub async fn answer_in_conversation(
    state: &AppState,
    question: &str,
    topics: Option<&[String]>,
    conversation: &Conversation,
) -> Result<AnswerWithContext> {
    let hits = state
        .retriever
        .retrieve(&conversation.retrieval_query(question), topics)
        .await
        .context("Retrieval failed")?;
    if hits.is_empty() {
        tracing::warn!("No context retrieved for question; asking the model anyway");
    }

    let prompt = state
        .prompt
        .render(&build_context(&hits), &sanitize_for_prompt(question));
    let mut messages = conversation.messages();
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: prompt,
    });
    let raw = complete_chat(&state.retriever.http_client, &state.config.llm, messages).await?;

    let mut answer = split_sources(&raw);
    if answer.sources.is_empty() {
        answer.sources = distinct_sources(&hits);
    }

    tracing::info!(
        "Answered with {} context chunks, {} sources",
        hits.len(),
        answer.sources.len()
    );

    Ok(AnswerWithContext {
        answer,
        context: hits,
    })
}

/// Single-turn, non-streaming completion at the configured temperature.
pub async fn complete(
    client: &reqwest::Client,
    config: &LlmConfig,
    prompt: &str,
) -> Result<String> {
    let messages = vec![ChatMessage {
        role: "user".to_string(),
        content: prompt.to_string(),
    }];
    complete_chat(client, config, messages).await
}

/// Non-streaming completion over a full message list.
pub async fn complete_chat(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: Vec<ChatMessage>,
) -> Result<String> {
    match config.provider.as_str() {
        "ollama" => call_ollama(client, config, messages).await,
        "openai" => call_openai(client, config, messages).await,
        other => anyhow::bail!("Unknown LLM provider: {other}"),
    }
}

fn sources_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"(?im)^[ \t]*\**SOURCES?\**[ \t]*:\**").expect("static regex is valid")
    })
}

/// Split a raw completion at its last line-starting `SOURCES:` marker.
///
/// Inline mentions such as "(Source: a.md)" stay in the answer text.
pub fn split_sources(raw: &str) -> Answer {
    let Some(marker) = sources_marker().find_iter(raw).last() else {
        return Answer {
            text: raw.trim().to_string(),
            sources: Vec::new(),
        };
    };

    let text = raw[..marker.start()].trim().to_string();
    let mut sources: Vec<String> = Vec::new();
    for item in raw[marker.end()..].split([',', '\n']) {
        let item = item.trim().trim_start_matches(['-', '*']).trim();
        if !item.is_empty() && !sources.iter().any(|s| s == item) {
            sources.push(item.to_string());
        }
    }

    Answer { text, sources }
}

fn distinct_sources(hits: &[SearchHit]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for hit in hits {
        if !sources.contains(&hit.source) {
            sources.push(hit.source.clone());
        }
    }
    sources
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

async fn call_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: Vec<ChatMessage>,
) -> Result<String> {
    let url = format!("{}/api/chat", config.base_url);

    let req = OllamaChatRequest {
        model: config.chat_model.clone(),
        messages,
        stream: false,
        options: OllamaOptions {
            temperature: config.temperature,
        },
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .context("Failed to call Ollama chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama chat API returned {status}: {body}");
    }

    let body: OllamaChatResponse = resp
        .json()
        .await
        .context("Failed to parse Ollama chat response")?;
    Ok(body.message.content)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

async fn call_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: Vec<ChatMessage>,
) -> Result<String> {
    let url = format!("{}/v1/chat/completions", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiChatRequest {
        model: config.chat_model.clone(),
        messages,
        temperature: config.temperature,
    };

    let resp = client
        .post(&url)
        .bearer_auth(api_key)
        .json(&req)
        .send()
        .await
        .context("Failed to call OpenAI chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI chat API returned {status}: {body}");
    }

    let body: OpenAiChatResponse = resp
        .json()
        .await
        .context("Failed to parse OpenAI chat response")?;
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .context("OpenAI chat API returned no content")
}
