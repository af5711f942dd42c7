use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::config::Config;
use super::directive::ExtractOptions;
use super::directive::UiAction;
use super::form::InteractionForm;

pub const LOG_CAPACITY: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Arc<[UiAction]>>,
}

impl Message {
    pub fn has_actions(&self) -> bool {
        self.actions.as_ref().is_some_and(|actions| !actions.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    SessionReset,
    UserRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    App,
    Extractor,
    Form,
    Transport,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub seq: u64,
    pub level: LogLevel,
    pub ts_ms: Option<i64>,
    pub source: LogSource,
    pub context: Option<String>,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, source: LogSource, message: impl Into<String>) -> Self {
        Self {
            seq: 0,
            level,
            ts_ms: Some(Utc::now().timestamp_millis()),
            source,
            context: None,
            message: message.into(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Session log shown by `/logs`. Holds at most `capacity` entries, dropping
/// the oldest first; sequence numbers restart when the log is cleared.
#[derive(Debug, Clone)]
pub struct SessionLog {
    capacity: usize,
    next_seq: u64,
    entries: VecDeque<LogEntry>,
}

impl SessionLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            next_seq: 1,
            entries: VecDeque::with_capacity(capacity.min(LOG_CAPACITY)),
        }
    }

    /// Stores `entry` and returns the sequence number it was given.
    pub fn push(&mut self, mut entry: LogEntry) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        entry.seq = seq;

        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        seq
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_seq = 1;
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }
}

#[derive(Debug, Clone)]
pub struct ChatState {
    pub agent_name: Arc<str>,
    pub extract_options: ExtractOptions,
    pub messages: Vec<Message>,
    pub forms: BTreeMap<MessageId, InteractionForm>,
    pub awaiting_reply: bool,
    pub logs: SessionLog,
    next_message_id: u64,
}

impl ChatState {
    pub fn new(config: &Config) -> Self {
        Self {
            agent_name: config.agent.name.as_str().into(),
            extract_options: ExtractOptions {
                order: config.directives.order,
            },
            messages: Vec::new(),
            forms: BTreeMap::new(),
            awaiting_reply: false,
            logs: SessionLog::default(),
            next_message_id: 1,
        }
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn form(&self, id: MessageId) -> Option<&InteractionForm> {
        self.forms.get(&id)
    }

    /// The newest message whose form still accepts input.
    pub fn pending_form(&self) -> Option<(MessageId, &InteractionForm)> {
        self.messages
            .iter()
            .rev()
            .filter_map(|message| self.forms.get(&message.id).map(|form| (message.id, form)))
            .find(|(_, form)| !form.is_submitted())
    }

    pub(crate) fn push_message(
        &mut self,
        role: Role,
        content: String,
        actions: Option<Vec<UiAction>>,
    ) -> MessageId {
        let id = MessageId(self.next_message_id);
        self.next_message_id += 1;

        let actions: Option<Arc<[UiAction]>> = actions.map(Into::into);
        if let Some(actions) = actions.as_ref().filter(|actions| !actions.is_empty()) {
            self.forms
                .insert(id, InteractionForm::new(Arc::clone(actions)));
        }
        self.messages.push(Message {
            id,
            role,
            content,
            timestamp: Utc::now(),
            actions,
        });
        id
    }

    pub(crate) fn clear_conversation(&mut self) {
        self.messages.clear();
        self.forms.clear();
        self.awaiting_reply = false;
    }
}
