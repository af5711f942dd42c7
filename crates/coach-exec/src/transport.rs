use std::collections::VecDeque;
use std::path::Path;

use thiserror::Error;

use crate::contracts::ReplyScript;
use crate::contracts::CONNECTION_ERROR_REPLY;
use crate::contracts::INTERRUPTION_REPLY;
use crate::contracts::NOT_INITIALIZED_REPLY;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport used before a system instruction was set")]
    NotInitialized,

    #[error("reply script exhausted after {0} replies")]
    ScriptExhausted(usize),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("script parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Conversation channel to the language model.
pub trait ChatTransport {
    fn name(&self) -> &'static str;

    /// Starts a new conversation governed by `system_instruction`.
    fn reset(&mut self, system_instruction: &str);

    fn send(&mut self, message: &str) -> Result<String, TransportError>;
}

/// Replays replies from a [`ReplyScript`], one per sent message.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    replies: VecDeque<String>,
    fallback: Option<String>,
    system_instruction: Option<String>,
    sent: Vec<String>,
    served: usize,
}

impl ScriptedTransport {
    pub fn new(script: ReplyScript) -> Self {
        Self {
            replies: script.replies.into(),
            fallback: script.fallback,
            ..Self::default()
        }
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, TransportError> {
        let script: ReplyScript = serde_yaml::from_str(source)?;
        Ok(Self::new(script))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }

    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub fn system_instruction(&self) -> Option<&str> {
        self.system_instruction.as_deref()
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.replies.is_empty() && self.fallback.is_none()
    }
}

impl ChatTransport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn reset(&mut self, system_instruction: &str) {
        self.system_instruction = Some(system_instruction.to_string());
    }

    fn send(&mut self, message: &str) -> Result<String, TransportError> {
        if self.system_instruction.is_none() {
            return Err(TransportError::NotInitialized);
        }
        self.sent.push(message.to_string());

        if let Some(reply) = self.replies.pop_front() {
            self.served += 1;
            return Ok(reply);
        }
        self.fallback
            .clone()
            .ok_or(TransportError::ScriptExhausted(self.served))
    }
}

/// Wraps a transport so a failed send is retried once on a fresh conversation.
///
/// Failures never reach the caller as errors: the reply becomes a short
/// notice the chat can display like any other model text.
#[derive(Debug)]
pub struct RetryingTransport<T> {
    inner: T,
    system_instruction: Option<String>,
}

impl<T: ChatTransport> RetryingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            system_instruction: None,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: ChatTransport> ChatTransport for RetryingTransport<T> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn reset(&mut self, system_instruction: &str) {
        tracing::debug!(
            transport = self.inner.name(),
            instruction_len = system_instruction.len(),
            "initializing chat transport"
        );
        self.system_instruction = Some(system_instruction.to_string());
        self.inner.reset(system_instruction);
    }

    fn send(&mut self, message: &str) -> Result<String, TransportError> {
        let Some(instruction) = self.system_instruction.clone() else {
            return Ok(NOT_INITIALIZED_REPLY.to_string());
        };

        let err = match self.inner.send(message) {
            Ok(reply) => return Ok(reply),
            Err(err) => err,
        };
        tracing::warn!(transport = self.inner.name(), %err, "chat send failed");

        if instruction.trim().is_empty() {
            return Ok(CONNECTION_ERROR_REPLY.to_string());
        }

        self.inner.reset(&instruction);
        match self.inner.send(message) {
            Ok(reply) => Ok(reply),
            Err(retry_err) => {
                tracing::warn!(transport = self.inner.name(), %retry_err, "chat retry failed");
                Ok(INTERRUPTION_REPLY.to_string())
            }
        }
    }
}
