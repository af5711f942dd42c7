use pretty_assertions::assert_eq;

pub(super) use super::reduce;
pub(super) use super::CoachEffect;
pub(super) use super::INIT_CHOICE_ID;
pub(super) use crate::actions::ChatAction;
pub(super) use crate::actions::RuntimeAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::config::Config;
pub(super) use crate::directive::ActionKind;
pub(super) use crate::directive::DirectiveOrder;
pub(super) use crate::form::FormState;
pub(super) use crate::state::ChatState;
pub(super) use crate::state::ClearReason;
pub(super) use crate::state::SessionLog;
pub(super) use crate::state::LogEntry;
pub(super) use crate::state::LogLevel;
pub(super) use crate::state::LogSource;
pub(super) use crate::state::MessageId;
pub(super) use crate::state::Role;

mod session_log;

const CHECK_IN_REPLY: &str =
    "Evening check-in.\n[CHOICE: Good | Bad]\nHow drained are you?\n[SLIDER: Energy | 1 | 10]";

fn state() -> ChatState {
    ChatState::new(&Config::default())
}

fn run_runtime(state: &mut ChatState, action: RuntimeAction) {
    let effects = reduce(state, ChatAction::Runtime(action));
    assert!(effects.is_empty());
}

fn run_user(state: &mut ChatState, action: UserAction) -> Vec<CoachEffect> {
    reduce(state, ChatAction::User(action))
}

fn receive(state: &mut ChatState, raw: &str) -> MessageId {
    run_runtime(state, RuntimeAction::ReceiveModelReply(raw.to_string()));
    state.messages.last().expect("model message").id
}

fn form_input(message_id: MessageId, action_id: &str, value: &str) -> UserAction {
    UserAction::FormInput {
        message_id,
        action_id: action_id.to_string(),
        value: value.to_string(),
    }
}

fn submitted_messages(effects: &[CoachEffect]) -> Vec<String> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            CoachEffect::SubmitChat { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

fn assert_last_message(state: &ChatState, role: Role, content: &str) {
    let last = state.messages.last().expect("message");
    assert_eq!(last.role, role);
    assert_eq!(last.content, content);
}
