use super::actions::ChatAction;
use super::actions::RuntimeAction;
use super::actions::UserAction;
use super::directive::extract_directives_with;
use super::directive::unparsed_directives;
use super::directive::UiAction;
use super::form::FormEvent;
use super::form::FormOutcome;
use super::state::ChatState;
use super::state::ClearReason;
use super::state::LogEntry;
use super::state::LogLevel;
use super::state::LogSource;
use super::state::MessageId;
use super::state::Role;

pub const INIT_CHOICE_ID: &str = "init_choice";
pub const GREETING_OPTIONS: [&str; 3] = ["Morning Brief", "Status Report", "Skip"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoachEffect {
    RequestFrame,
    SubmitChat { message: String },
    /// The transport should start a fresh conversation.
    ResetTransport,
}

pub fn reduce(state: &mut ChatState, action: ChatAction) -> Vec<CoachEffect> {
    match action {
        ChatAction::User(user) => reduce_user(state, user),
        ChatAction::Runtime(runtime) => {
            reduce_runtime(state, runtime);
            Vec::new()
        }
    }
}

pub fn greeting_text(agent_name: &str) -> String {
    format!("**{agent_name} Active.**\nReady for morning brief?")
}

pub fn session_reset_text(agent_name: &str) -> String {
    format!("**Session Reset.**\nProtocol \"{agent_name}\" re-initialized.")
}

fn reduce_user(state: &mut ChatState, action: UserAction) -> Vec<CoachEffect> {
    match action {
        UserAction::SendMessage(input) => {
            if input.trim().is_empty() {
                return Vec::new();
            }
            submit_user_message(state, input)
        }
        UserAction::FormInput {
            message_id,
            action_id,
            value,
        } => apply_form_event(state, message_id, FormEvent::Input { action_id, value }),
        UserAction::SubmitForm { message_id } => {
            apply_form_event(state, message_id, FormEvent::Submit)
        }
        UserAction::NewSession => {
            state.clear_conversation();
            reduce_runtime(state, RuntimeAction::ClearLogs(ClearReason::SessionReset));
            let notice = session_reset_text(&state.agent_name);
            state.push_message(Role::Model, notice, None);
            reduce_runtime(
                state,
                RuntimeAction::AppendLog("[meta] Session reset".to_string()),
            );
            vec![CoachEffect::RequestFrame, CoachEffect::ResetTransport]
        }
    }
}

fn reduce_runtime(state: &mut ChatState, action: RuntimeAction) {
    match action {
        RuntimeAction::Greet => {
            let greeting = greeting_text(&state.agent_name);
            state.push_message(
                Role::Model,
                greeting,
                Some(vec![UiAction::choice(INIT_CHOICE_ID, GREETING_OPTIONS)]),
            );
        }
        RuntimeAction::ReceiveModelReply(raw) => {
            let parsed = extract_directives_with(&raw, &state.extract_options);
            let leftover = unparsed_directives(&parsed.content);
            let action_count = parsed.actions.as_ref().map_or(0, Vec::len);

            let id = state.push_message(Role::Model, parsed.content, parsed.actions);
            state.awaiting_reply = false;

            if leftover > 0 {
                log_for_message(
                    state,
                    id,
                    LogEntry::new(
                        LogLevel::Warn,
                        LogSource::Extractor,
                        format!("{leftover} directive tag(s) could not be parsed"),
                    ),
                );
            }
            if action_count > 0 {
                log_for_message(
                    state,
                    id,
                    LogEntry::new(
                        LogLevel::Debug,
                        LogSource::Extractor,
                        format!("extracted {action_count} action(s)"),
                    ),
                );
            }
        }
        RuntimeAction::AppendStructuredLog(entry) => {
            state.logs.push(entry);
        }
        RuntimeAction::AppendLog(message) => {
            state
                .logs
                .push(LogEntry::new(LogLevel::Info, LogSource::App, message));
        }
        RuntimeAction::ClearLogs(reason) => {
            tracing::debug!(?reason, "clearing session log");
            state.logs.clear();
        }
    }
}

fn apply_form_event(
    state: &mut ChatState,
    message_id: MessageId,
    event: FormEvent,
) -> Vec<CoachEffect> {
    let Some(form) = state.forms.get_mut(&message_id) else {
        tracing::warn!(message_id = message_id.0, "form event for message without actions");
        reduce_runtime(
            state,
            RuntimeAction::AppendStructuredLog(LogEntry::new(
                LogLevel::Warn,
                LogSource::Form,
                format!("message {} has no form", message_id.0),
            )),
        );
        return vec![CoachEffect::RequestFrame];
    };

    match form.apply(event) {
        Ok(FormOutcome::Updated) => vec![CoachEffect::RequestFrame],
        Ok(FormOutcome::Committed(reply)) => {
            tracing::info!(message_id = message_id.0, "form committed");
            log_for_message(
                state,
                message_id,
                LogEntry::new(LogLevel::Info, LogSource::Form, "response logged"),
            );
            submit_user_message(state, reply)
        }
        Err(rejection) => {
            tracing::warn!(message_id = message_id.0, %rejection, "form event rejected");
            log_for_message(
                state,
                message_id,
                LogEntry::new(LogLevel::Warn, LogSource::Form, rejection.to_string()),
            );
            vec![CoachEffect::RequestFrame]
        }
    }
}

fn log_for_message(state: &mut ChatState, message_id: MessageId, entry: LogEntry) {
    let entry = entry.with_context(format!("message {}", message_id.0));
    reduce_runtime(state, RuntimeAction::AppendStructuredLog(entry));
}

fn submit_user_message(state: &mut ChatState, input: String) -> Vec<CoachEffect> {
    state.push_message(Role::User, input.clone(), None);
    state.awaiting_reply = true;
    reduce_runtime(state, RuntimeAction::AppendLog(format!("> {}", input)));
    vec![
        CoachEffect::RequestFrame,
        CoachEffect::SubmitChat { message: input },
    ]
}

#[cfg(test)]
mod tests;
