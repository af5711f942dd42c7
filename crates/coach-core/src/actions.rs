use super::state::ClearReason;
use super::state::LogEntry;
use super::state::MessageId;

#[derive(Debug, Clone)]
pub enum ChatAction {
    User(UserAction),
    Runtime(RuntimeAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    SendMessage(String),
    FormInput {
        message_id: MessageId,
        action_id: String,
        value: String,
    },
    SubmitForm {
        message_id: MessageId,
    },
    NewSession,
}

#[derive(Debug, Clone)]
pub enum RuntimeAction {
    /// Greeting shown when a conversation starts.
    Greet,
    ReceiveModelReply(String),
    AppendStructuredLog(LogEntry),
    AppendLog(String),
    ClearLogs(ClearReason),
}
