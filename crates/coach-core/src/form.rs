use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::directive::ActionKind;
use super::directive::UiAction;

pub const SKIPPED: &str = "Skipped";
pub const RESPONSE_LOGGED: &str = "Response Logged";
pub const REPORT_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    /// A lone CHOICE: picking an option is the reply.
    SingleChoice,
    /// Everything else: values are buffered until an explicit submit.
    MultiField,
}

impl FormMode {
    pub fn of(actions: &[UiAction]) -> Self {
        match actions {
            [only] if only.kind == ActionKind::Choice => Self::SingleChoice,
            _ => Self::MultiField,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::SingleChoice => "single-choice",
            Self::MultiField => "multi-field",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    Active { values: BTreeMap<String, String> },
    Submitted { reply: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    Input { action_id: String, value: String },
    Submit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    Updated,
    Committed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormRejection {
    AlreadySubmitted,
    UnknownAction(String),
    InvalidValue { action_id: String, value: String },
    SubmitNotAvailable,
}

impl fmt::Display for FormRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadySubmitted => f.write_str("form already submitted"),
            Self::UnknownAction(id) => write!(f, "no action with id {id}"),
            Self::InvalidValue { action_id, value } => {
                write!(f, "value {value:?} is not valid for {action_id}")
            }
            Self::SubmitNotAvailable => f.write_str("single-choice forms commit on selection"),
        }
    }
}

/// Interaction state for the actions attached to one message.
///
/// The form starts `Active` and moves to `Submitted` exactly once, through
/// [`InteractionForm::apply`]. A submitted form rejects every further event.
#[derive(Debug, Clone)]
pub struct InteractionForm {
    actions: Arc<[UiAction]>,
    mode: FormMode,
    state: FormState,
}

impl InteractionForm {
    pub fn new(actions: Arc<[UiAction]>) -> Self {
        let mode = FormMode::of(&actions);
        Self {
            actions,
            mode,
            state: FormState::Active {
                values: BTreeMap::new(),
            },
        }
    }

    pub fn actions(&self) -> &[UiAction] {
        &self.actions
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.state, FormState::Submitted { .. })
    }

    pub fn shows_submit(&self) -> bool {
        self.mode == FormMode::MultiField && !self.is_submitted()
    }

    /// Text shown in place of the widgets once the form is done.
    pub fn confirmation(&self) -> Option<&'static str> {
        self.is_submitted().then_some(RESPONSE_LOGGED)
    }

    /// Actions that get a widget. Choices and selects without options are
    /// skipped, and a submitted form has none.
    pub fn renderable_actions(&self) -> impl Iterator<Item = &UiAction> {
        let live: &[UiAction] = if self.is_submitted() {
            &[]
        } else {
            &self.actions[..]
        };
        live.iter().filter(|action| match action.kind {
            ActionKind::Slider => true,
            ActionKind::Choice | ActionKind::Select => !action.options().is_empty(),
        })
    }

    pub fn recorded_value(&self, action_id: &str) -> Option<&str> {
        match &self.state {
            FormState::Active { values } => values.get(action_id).map(String::as_str),
            FormState::Submitted { .. } => None,
        }
    }

    /// The value a live widget shows: the recorded one, or the slider midpoint.
    pub fn display_value(&self, action: &UiAction) -> Option<String> {
        if self.is_submitted() {
            return None;
        }
        self.recorded_value(&action.id)
            .map(str::to_string)
            .or_else(|| action.slider_midpoint().map(|mid| mid.to_string()))
    }

    pub fn apply(&mut self, event: FormEvent) -> Result<FormOutcome, FormRejection> {
        let FormState::Active { values } = &mut self.state else {
            return Err(FormRejection::AlreadySubmitted);
        };

        let reply = match event {
            FormEvent::Input { action_id, value } => {
                let Some(action) = self.actions.iter().find(|action| action.id == action_id)
                else {
                    return Err(FormRejection::UnknownAction(action_id));
                };
                let Some(value) = normalize_value(action, &value) else {
                    return Err(FormRejection::InvalidValue { action_id, value });
                };
                if self.mode == FormMode::MultiField {
                    values.insert(action_id, value);
                    return Ok(FormOutcome::Updated);
                }
                value
            }
            FormEvent::Submit => {
                if self.mode == FormMode::SingleChoice {
                    return Err(FormRejection::SubmitNotAvailable);
                }
                compose_report(&self.actions, values)
            }
        };

        self.state = FormState::Submitted {
            reply: reply.clone(),
        };
        Ok(FormOutcome::Committed(reply))
    }
}

/// Joins every action, in stored order, as `label: value`. A blank value
/// reports as skipped.
pub fn compose_report(actions: &[UiAction], values: &BTreeMap<String, String>) -> String {
    actions
        .iter()
        .map(|action| {
            let value = values
                .get(&action.id)
                .filter(|value| !value.is_empty())
                .cloned()
                .or_else(|| action.slider_midpoint().map(|mid| mid.to_string()))
                .unwrap_or_else(|| SKIPPED.to_string());
            format!("{}: {}", action.display_label(), value)
        })
        .collect::<Vec<_>>()
        .join(REPORT_SEPARATOR)
}

fn normalize_value(action: &UiAction, value: &str) -> Option<String> {
    match action.kind {
        ActionKind::Slider => {
            let (low, high) = action.slider_bounds()?;
            let parsed = value.trim().parse::<i64>().ok()?;
            (low..=high).contains(&parsed).then(|| parsed.to_string())
        }
        ActionKind::Choice | ActionKind::Select => action
            .options()
            .iter()
            .find(|option| option.as_str() == value)
            .cloned(),
    }
}
