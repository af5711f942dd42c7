use super::*;
use pretty_assertions::assert_eq;

fn summary(state: &ChatState) -> Vec<(u64, LogLevel, LogSource, Option<String>, String)> {
    state
        .logs
        .iter()
        .map(|entry| {
            (
                entry.seq,
                entry.level,
                entry.source,
                entry.context.clone(),
                entry.message.clone(),
            )
        })
        .collect()
}

fn context(id: MessageId) -> Option<String> {
    Some(format!("message {}", id.0))
}

#[test]
fn model_replies_log_extraction_per_message() {
    let mut state = state();
    let check_in = receive(&mut state, CHECK_IN_REPLY);
    let broken = receive(&mut state, "Rate it [SLIDER: Energy | low | high]");

    assert_eq!(
        summary(&state),
        vec![
            (
                1,
                LogLevel::Debug,
                LogSource::Extractor,
                context(check_in),
                "extracted 2 action(s)".to_string(),
            ),
            (
                2,
                LogLevel::Warn,
                LogSource::Extractor,
                context(broken),
                "1 directive tag(s) could not be parsed".to_string(),
            ),
        ]
    );
}

#[test]
fn rejected_pick_is_logged_against_its_message() {
    let mut state = state();
    let id = receive(&mut state, "[CHOICE: Yes | No]");

    run_user(&mut state, form_input(id, "Yes_1", "Maybe"));

    let latest = state.logs.latest().expect("entry");
    assert_eq!(latest.seq, 2);
    assert_eq!(latest.level, LogLevel::Warn);
    assert_eq!(latest.source, LogSource::Form);
    assert_eq!(latest.context, context(id));
    assert_eq!(latest.message, "value \"Maybe\" is not valid for Yes_1");
}

#[test]
fn commit_logs_response_then_user_line() {
    let mut state = state();
    let id = receive(&mut state, "[CHOICE: Yes | No]");

    run_user(&mut state, form_input(id, "Yes_1", "No"));

    let tail: Vec<_> = summary(&state).into_iter().skip(1).collect();
    assert_eq!(
        tail,
        vec![
            (
                2,
                LogLevel::Info,
                LogSource::Form,
                context(id),
                "response logged".to_string(),
            ),
            (3, LogLevel::Info, LogSource::App, None, "> No".to_string()),
        ]
    );
}

#[test]
fn new_session_starts_a_fresh_log() {
    let mut state = state();
    receive(&mut state, CHECK_IN_REPLY);
    run_user(&mut state, UserAction::SendMessage("hi".to_string()));

    run_user(&mut state, UserAction::NewSession);

    assert_eq!(
        summary(&state),
        vec![(
            1,
            LogLevel::Info,
            LogSource::App,
            None,
            "[meta] Session reset".to_string(),
        )]
    );
}

#[test]
fn user_clear_keeps_conversation() {
    let mut state = state();
    let id = receive(&mut state, CHECK_IN_REPLY);

    run_runtime(
        &mut state,
        RuntimeAction::ClearLogs(ClearReason::UserRequest),
    );

    assert!(state.logs.latest().is_none());
    assert!(state.form(id).is_some());
    run_runtime(&mut state, RuntimeAction::AppendLog("after".to_string()));
    assert_eq!(state.logs.latest().map(|entry| entry.seq), Some(1));
}

#[test]
fn transport_entries_keep_source_and_context() {
    let mut state = state();
    run_runtime(
        &mut state,
        RuntimeAction::AppendStructuredLog(
            LogEntry::new(LogLevel::Error, LogSource::Transport, "reply script exhausted")
                .with_context("scripted"),
        ),
    );

    assert_eq!(
        summary(&state),
        vec![(
            1,
            LogLevel::Error,
            LogSource::Transport,
            Some("scripted".to_string()),
            "reply script exhausted".to_string(),
        )]
    );
}

#[test]
fn full_log_drops_oldest_replies_first() {
    let mut state = state();
    state.logs = SessionLog::with_capacity(2);

    for _ in 0..3 {
        receive(&mut state, "[CHOICE: Yes | No]");
    }

    let seqs: Vec<u64> = state.logs.iter().map(|entry| entry.seq).collect();
    assert_eq!(seqs, vec![2, 3]);
}

#[test]
fn zero_capacity_log_still_keeps_the_latest_entry() {
    let mut log = SessionLog::with_capacity(0);
    for message in ["one", "two", "three"] {
        log.push(LogEntry::new(LogLevel::Info, LogSource::App, message));
    }

    assert_eq!(log.iter().count(), 1);
    assert_eq!(log.latest().map(|entry| entry.message.as_str()), Some("three"));
}
