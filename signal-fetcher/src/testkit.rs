//! Deterministic stand-ins for the chat backend and the pacer.
//!
//! Enabled for this crate's tests and, through the `testkit` feature, for
//! downstream crates.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::llm::{BackendTurn, ChatBackend, ChatMessage, ToolCall, WEB_SEARCH_TOOL};
use crate::pacing::Pacer;

/// One canned backend reply
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Turn(BackendTurn),
    Fail(String),
}

impl ScriptedReply {
    /// A final turn whose content is `value` serialized
    pub fn json(value: Value) -> Self {
        ScriptedReply::Turn(BackendTurn::stop(value.to_string()))
    }

    /// A final turn with arbitrary text content
    pub fn text(content: &str) -> Self {
        ScriptedReply::Turn(BackendTurn::stop(content))
    }

    /// A turn asking for one web search with `arguments` as raw JSON text
    pub fn search(arguments: &str) -> Self {
        ScriptedReply::Turn(BackendTurn::tool_calls(vec![ToolCall {
            id: "call_0".to_string(),
            name: WEB_SEARCH_TOOL.to_string(),
            arguments: arguments.to_string(),
        }]))
    }

    /// A transport-level failure
    pub fn fail(message: &str) -> Self {
        ScriptedReply::Fail(message.to_string())
    }
}

struct Rule {
    needle: String,
    replies: VecDeque<ScriptedReply>,
}

/// Backend that answers from per-prompt scripts.
///
/// A rule matches when the user message contains its needle. Replies are
/// consumed in order and the last one repeats forever.
pub struct ScriptedBackend {
    rules: Mutex<Vec<Rule>>,
    fallback: ScriptedReply,
    latency: Duration,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            fallback: ScriptedReply::fail("no scripted reply"),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on(self, needle: &str, replies: Vec<ScriptedReply>) -> Self {
        lock(&self.rules).push(Rule {
            needle: needle.to_string(),
            replies: replies.into(),
        });
        self
    }

    pub fn with_fallback(mut self, reply: ScriptedReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Hold every reply for `latency`, so concurrent callers overlap
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every conversation sent so far, one entry per turn
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Turns whose user message contains `needle`
    pub fn calls_mentioning(&self, needle: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|messages| user_text(messages).is_some_and(|text| text.contains(needle)))
            .count()
    }

    fn next_reply(&self, messages: &[ChatMessage]) -> ScriptedReply {
        let text = user_text(messages).unwrap_or_default();
        let mut rules = lock(&self.rules);

        for rule in rules.iter_mut() {
            if !text.contains(&rule.needle) {
                continue;
            }
            if rule.replies.len() > 1 {
                if let Some(reply) = rule.replies.pop_front() {
                    return reply;
                }
            }
            if let Some(reply) = rule.replies.front() {
                return reply.clone();
            }
        }

        self.fallback.clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<BackendTurn> {
        lock(&self.calls).push(messages.to_vec());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.next_reply(messages) {
            ScriptedReply::Turn(turn) => Ok(turn),
            ScriptedReply::Fail(message) => Err(anyhow!(message)),
        }
    }
}

/// Pacer that records requested pauses and returns at once
#[derive(Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn pauses(&self) -> Vec<Duration> {
        lock(&self.pauses).clone()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, duration: Duration) {
        lock(&self.pauses).push(duration);
    }
}

fn user_text(messages: &[ChatMessage]) -> Option<&str> {
    messages.iter().find_map(|message| match message {
        ChatMessage::User(text) => Some(text.as_str()),
        _ => None,
    })
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
