//! Conversation-window decorator.
//!
//! [`MemoryProvider`] wraps any [`LLMProvider`] and renders each prompt into a
//! short chatbot template that carries the last few exchanges, so the model
//! sees recent context while callers keep sending bare prompts.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::LLMProvider;
use crate::error::Result;

const PREAMBLE: &str = "You are a helpful and concise chatbot.\n\
Keep your answers brief and to the point, ideally under 30 words.";

/// Render the upstream prompt for `input` given prior `(human, ai)` turns.
pub fn render_prompt<'a, I>(history: I, input: &str) -> String
where
    I: IntoIterator<Item = &'a (String, String)>,
{
    let transcript = history
        .into_iter()
        .map(|(human, ai)| format!("Human: {}\nAI: {}", human, ai))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{}\n\nCurrent conversation:\n{}\n\nHuman: {}\nAI:",
        PREAMBLE, transcript, input
    )
}

/// Decorator that keeps a sliding window of the last `window` exchanges.
///
/// Only successful calls are remembered. The window lock is never held
/// across the upstream call.
pub struct MemoryProvider {
    inner: Box<dyn LLMProvider>,
    window: usize,
    turns: Mutex<VecDeque<(String, String)>>,
}

impl MemoryProvider {
    pub fn new(inner: Box<dyn LLMProvider>, window: usize) -> Self {
        Self {
            inner,
            window,
            turns: Mutex::new(VecDeque::with_capacity(window)),
        }
    }

    /// Number of exchanges currently remembered.
    pub fn remembered(&self) -> usize {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn forget(&self) {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn remember(&self, prompt: &str, answer: &str) {
        if self.window == 0 {
            return;
        }
        let mut turns = self.turns.lock().unwrap_or_else(PoisonError::into_inner);
        while turns.len() >= self.window {
            turns.pop_front();
        }
        turns.push_back((prompt.to_string(), answer.to_string()));
    }
}

#[async_trait]
impl LLMProvider for MemoryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn chat(&self, prompt: &str) -> Result<String> {
        let rendered = {
            let turns = self.turns.lock().unwrap_or_else(PoisonError::into_inner);
            render_prompt(turns.iter(), prompt)
        };
        let answer = self.inner.chat(&rendered).await?;
        self.remember(prompt, &answer);
        Ok(answer)
    }
}
