//! Extraction of UI directives embedded in model replies.
//!
//! The model is prompted to append bracketed tags such as
//! `[SLIDER: Energy | 1 | 10]`, `[CHOICE: Yes | No]` or
//! `[SELECT: Status | Progress | Blocked]` to its prose. [`extract_directives`]
//! turns every well-formed tag into a [`UiAction`] and returns the prose with
//! those tags removed. Tags that do not fit the grammar stay in the text.

use std::sync::OnceLock;

use regex::Captures;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

const SLIDER_BODY: &str =
    r"SLIDER:\s*(?P<slider_label>[^\[\]\n]*?)\s*\|\s*(?P<min>\d+)\s*\|\s*(?P<max>\d+)\s*";
const CHOICE_BODY: &str = r"CHOICE:\s*(?P<choice>[^\]\n]*)";
const SELECT_BODY: &str = r"SELECT:\s*(?P<select>[^\]\n]*)";

const DEFAULT_SLIDER_MIN: i64 = 0;
const DEFAULT_SLIDER_MAX: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Slider,
    Choice,
    Select,
}

/// One interactive widget requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiAction {
    pub id: String,
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

impl UiAction {
    pub fn slider(id: impl Into<String>, label: impl Into<String>, min: i64, max: i64) -> Self {
        Self {
            id: id.into(),
            kind: ActionKind::Slider,
            label: Some(label.into()),
            options: None,
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn choice<I, S>(id: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            kind: ActionKind::Choice,
            label: None,
            options: Some(options.into_iter().map(Into::into).collect()),
            min: None,
            max: None,
        }
    }

    pub fn select<I, S>(id: impl Into<String>, label: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            kind: ActionKind::Select,
            label: Some(label.into()),
            options: Some(options.into_iter().map(Into::into).collect()),
            min: None,
            max: None,
        }
    }

    /// Label used when the action is rendered into a report line.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("Input")
    }

    pub fn options(&self) -> &[String] {
        self.options.as_deref().unwrap_or(&[])
    }

    /// Inclusive slider bounds, ordered low to high.
    pub fn slider_bounds(&self) -> Option<(i64, i64)> {
        if self.kind != ActionKind::Slider {
            return None;
        }
        let min = self.min.unwrap_or(DEFAULT_SLIDER_MIN);
        let max = self.max.unwrap_or(DEFAULT_SLIDER_MAX);
        Some((min.min(max), min.max(max)))
    }

    /// `floor((min + max) / 2)`, the value an untouched slider reports.
    pub fn slider_midpoint(&self) -> Option<i64> {
        if self.kind != ActionKind::Slider {
            return None;
        }
        let min = i128::from(self.min.unwrap_or(DEFAULT_SLIDER_MIN));
        let max = i128::from(self.max.unwrap_or(DEFAULT_SLIDER_MAX));
        // The mean of two i64 values always fits back into i64.
        Some((min + max).div_euclid(2) as i64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveOrder {
    /// Sliders first, then choices, then selects.
    #[default]
    KindGrouped,
    /// Order of appearance in the reply, across kinds.
    Textual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    pub order: DirectiveOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReply {
    pub content: String,
    /// `None` when no directive matched; never an empty list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<UiAction>>,
}

/// Hands out action ids for a single extraction call.
#[derive(Debug, Default)]
pub struct IdSequence {
    issued: u32,
}

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, hint: Option<&str>) -> String {
        self.issued = self.issued.saturating_add(1);
        match hint.map(slug).filter(|slug| !slug.is_empty()) {
            Some(slug) => format!("{slug}_{}", self.issued),
            None => format!("action_{}", self.issued),
        }
    }
}

fn slug(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join("_")
}

pub fn extract_directives(raw: &str) -> ParsedReply {
    extract_directives_with(raw, &ExtractOptions::default())
}

/// Every pass matches against `raw`, so stripping one tag can never splice
/// the text around it into a new directive.
pub fn extract_directives_with(raw: &str, options: &ExtractOptions) -> ParsedReply {
    let mut ids = IdSequence::new();
    let mut actions = Vec::new();

    let patterns = match options.order {
        DirectiveOrder::KindGrouped => vec![slider_regex(), choice_regex(), select_regex()],
        DirectiveOrder::Textual => vec![any_directive_regex()],
    };
    let mut cleaned = raw.to_string();
    for re in patterns {
        collect_actions(raw, re, &mut ids, &mut actions);
        cleaned = strip_directives(&cleaned, re);
    }
    let content = cleaned.trim().to_string();

    let leftover = unparsed_directives(&content);
    if leftover > 0 {
        tracing::warn!(leftover, "directive tags left unparsed in model reply");
    }
    tracing::debug!(
        actions = actions.len(),
        order = ?options.order,
        "extracted directives"
    );

    ParsedReply {
        content,
        actions: if actions.is_empty() { None } else { Some(actions) },
    }
}

/// Counts directive openers still present in `text`.
pub fn unparsed_directives(text: &str) -> usize {
    opener_regex().find_iter(text).count()
}

fn collect_actions(raw: &str, re: &Regex, ids: &mut IdSequence, actions: &mut Vec<UiAction>) {
    for caps in re.captures_iter(raw) {
        let Some(mut action) = action_from_captures(&caps) else {
            continue;
        };
        action.id = ids.next_id(id_hint(&action));
        actions.push(action);
    }
}

/// Removes every tag `re` would turn into an action; malformed tags stay.
fn strip_directives(text: &str, re: &Regex) -> String {
    re.replace_all(text, |caps: &Captures<'_>| {
        if action_from_captures(caps).is_some() {
            String::new()
        } else {
            caps[0].to_string()
        }
    })
    .into_owned()
}

fn id_hint(action: &UiAction) -> Option<&str> {
    match action.kind {
        ActionKind::Slider | ActionKind::Select => action.label.as_deref(),
        ActionKind::Choice => action.options().first().map(String::as_str),
    }
}

/// Builds the action for one match, without an id.
fn action_from_captures(caps: &Captures<'_>) -> Option<UiAction> {
    if let Some(label) = caps.name("slider_label") {
        // Digit runs past i64 are treated like any other malformed bound.
        let min = caps.name("min")?.as_str().parse::<i64>().ok()?;
        let max = caps.name("max")?.as_str().parse::<i64>().ok()?;
        return Some(UiAction {
            id: String::new(),
            kind: ActionKind::Slider,
            label: non_empty(label.as_str()),
            options: None,
            min: Some(min),
            max: Some(max),
        });
    }

    if let Some(body) = caps.name("choice") {
        return Some(UiAction {
            id: String::new(),
            kind: ActionKind::Choice,
            label: None,
            options: Some(segments(body.as_str())),
            min: None,
            max: None,
        });
    }

    if let Some(body) = caps.name("select") {
        let mut parts = segments(body.as_str()).into_iter();
        let label = parts.next().as_deref().and_then(non_empty);
        return Some(UiAction {
            id: String::new(),
            kind: ActionKind::Select,
            label,
            options: Some(parts.collect()),
            min: None,
            max: None,
        });
    }

    None
}

/// One trimmed option per `|` segment, blanks included. A blank body has none.
fn segments(body: &str) -> Vec<String> {
    if body.trim().is_empty() {
        return Vec::new();
    }
    body.split('|').map(|segment| segment.trim().to_string()).collect()
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn compile(body: &str) -> Regex {
    Regex::new(&format!(r"(?i)\[{body}\]")).expect("directive pattern must compile")
}

fn slider_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(SLIDER_BODY))
}

fn choice_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(CHOICE_BODY))
}

fn select_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(SELECT_BODY))
}

fn any_directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(&format!("(?:{SLIDER_BODY}|{CHOICE_BODY}|{SELECT_BODY})")))
}

fn opener_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\[(?:SLIDER|CHOICE|SELECT):").expect("opener pattern must compile")
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const MORNING_BRIEF: &str = "Good morning. Bio-Optimization Check.\n\n### 1. READINESS\n[SLIDER: Sleep Quality | 1 | 10]\n[SLIDER: Energy | 1 | 10]\n\n### 2. PLAN\nTarget: 90-min Deep Work Sprint.\n[CHOICE: Committed | Adjusting]\n\n### 3. IDENTITY\nWhat is the 'One Thing' that aligns with your vision today?";

    fn actions(reply: &ParsedReply) -> &[UiAction] {
        reply.actions.as_deref().expect("actions")
    }

    fn kinds(reply: &ParsedReply) -> Vec<ActionKind> {
        actions(reply).iter().map(|action| action.kind).collect()
    }

    #[test]
    fn plain_text_passes_through_without_actions() {
        let parsed = extract_directives("  Keep going, you are on track.\n");
        assert_eq!(parsed.content, "Keep going, you are on track.");
        assert!(parsed.actions.is_none());
    }

    #[test]
    fn well_formed_slider_becomes_action() {
        let parsed = extract_directives("How is your energy? [SLIDER: Energy | 1 | 10]");
        assert_eq!(parsed.content, "How is your energy?");
        assert_eq!(
            actions(&parsed),
            &[UiAction::slider("Energy_1", "Energy", 1, 10)]
        );
    }

    #[test]
    fn slider_tolerates_whitespace_and_lowercase_keyword() {
        let parsed = extract_directives("[slider:   Focus Level|0 |  100  ]");
        assert_eq!(parsed.content, "");
        assert_eq!(
            actions(&parsed),
            &[UiAction::slider("Focus_Level_1", "Focus Level", 0, 100)]
        );
    }

    #[test]
    fn kind_grouped_order_puts_sliders_before_choices() {
        let parsed = extract_directives("[CHOICE: Good | Bad] then [SLIDER: Energy | 1 | 10]");
        assert_eq!(kinds(&parsed), vec![ActionKind::Slider, ActionKind::Choice]);
        let ids: Vec<&str> = actions(&parsed).iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["Energy_1", "Good_2"]);
        assert_eq!(parsed.content, "then");
    }

    #[test]
    fn textual_order_follows_appearance() {
        let options = ExtractOptions {
            order: DirectiveOrder::Textual,
        };
        let parsed = extract_directives_with(
            "[SELECT: Status | Progress | Blocked] [CHOICE: Good | Bad] [SLIDER: Energy | 1 | 10]",
            &options,
        );
        assert_eq!(
            kinds(&parsed),
            vec![ActionKind::Select, ActionKind::Choice, ActionKind::Slider]
        );
        let ids: Vec<&str> = actions(&parsed).iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["Status_1", "Good_2", "Energy_3"]);
        assert_eq!(parsed.content, "");
    }

    #[test]
    fn choice_options_are_trimmed_and_id_uses_first_option() {
        let parsed = extract_directives("Plan?\n[CHOICE:  On Track |Stalled  ]");
        assert_eq!(
            actions(&parsed),
            &[UiAction::choice("On_Track_1", ["On Track", "Stalled"])]
        );
        assert_eq!(parsed.content, "Plan?");
    }

    #[test]
    fn select_splits_label_from_options() {
        let parsed = extract_directives("[SELECT: Lab Status | Progress | Blocked | Not Started]");
        assert_eq!(
            actions(&parsed),
            &[UiAction::select(
                "Lab_Status_1",
                "Lab Status",
                ["Progress", "Blocked", "Not Started"]
            )]
        );
    }

    #[test]
    fn empty_choice_yields_action_without_options() {
        let parsed = extract_directives("Pick one [CHOICE:]");
        let action = &actions(&parsed)[0];
        assert_eq!(action.kind, ActionKind::Choice);
        assert_eq!(action.id, "action_1");
        assert!(action.options().is_empty());
        assert_eq!(parsed.content, "Pick one");
    }

    #[test]
    fn lowercase_choice_and_select_keywords_match() {
        let parsed = extract_directives("[choice: Yes | No] [Select: Status | Done | Blocked]");
        assert_eq!(
            actions(&parsed),
            &[
                UiAction::choice("Yes_1", ["Yes", "No"]),
                UiAction::select("Status_2", "Status", ["Done", "Blocked"]),
            ]
        );
        assert_eq!(parsed.content, "");
    }

    #[test]
    fn blank_segments_stay_as_options() {
        let parsed = extract_directives("[CHOICE: | A] [SELECT: | B | ]");
        let choice = &actions(&parsed)[0];
        assert_eq!(choice.id, "action_1");
        assert_eq!(choice.options(), &["", "A"]);

        let select = &actions(&parsed)[1];
        assert_eq!(select.id, "action_2");
        assert_eq!(select.label, None);
        assert_eq!(select.options(), &["B", ""]);
    }

    #[test]
    fn stripping_a_tag_never_creates_a_new_directive() {
        let parsed = extract_directives("[CHO[SLIDER: a | 1 | 2]ICE: x | y]");
        assert_eq!(actions(&parsed), &[UiAction::slider("a_1", "a", 1, 2)]);
        assert_eq!(parsed.content, "");
    }

    #[test]
    fn malformed_slider_stays_verbatim() {
        let parsed = extract_directives("Rate it [SLIDER: Bad | x | 10] please");
        assert_eq!(parsed.content, "Rate it [SLIDER: Bad | x | 10] please");
        assert!(parsed.actions.is_none());
        assert_eq!(unparsed_directives(&parsed.content), 1);
    }

    #[test]
    fn malformed_slider_does_not_swallow_later_slider() {
        let parsed = extract_directives("[SLIDER: Bad | x | 10] and [SLIDER: Mood | 1 | 5]");
        assert_eq!(parsed.content, "[SLIDER: Bad | x | 10] and");
        assert_eq!(actions(&parsed), &[UiAction::slider("Mood_1", "Mood", 1, 5)]);
    }

    #[test]
    fn overflowing_slider_bound_is_malformed() {
        let raw = "[SLIDER: Huge | 1 | 99999999999999999999999]";
        let parsed = extract_directives(raw);
        assert_eq!(parsed.content, raw);
        assert!(parsed.actions.is_none());
    }

    #[test]
    fn identical_labels_receive_distinct_ids() {
        let parsed = extract_directives("[SLIDER: Energy | 1 | 10] [SLIDER: Energy | 1 | 10]");
        let ids: Vec<&str> = actions(&parsed).iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["Energy_1", "Energy_2"]);
    }

    #[test]
    fn counter_restarts_for_each_call() {
        let first = extract_directives("[CHOICE: Yes | No]");
        let second = extract_directives("[CHOICE: Yes | No]");
        assert_eq!(actions(&first)[0].id, "Yes_1");
        assert_eq!(actions(&second)[0].id, "Yes_1");
    }

    #[test]
    fn interior_whitespace_is_kept_after_stripping() {
        let parsed = extract_directives("Line one\n[CHOICE: A | B]\nLine two");
        assert_eq!(parsed.content, "Line one\n\nLine two");
    }

    #[test]
    fn morning_brief_extracts_in_kind_groups() {
        let parsed = extract_directives(MORNING_BRIEF);
        let ids: Vec<&str> = actions(&parsed).iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["Sleep_Quality_1", "Energy_2", "Committed_3"]);
        assert_eq!(unparsed_directives(&parsed.content), 0);
        assert!(parsed.content.starts_with("Good morning."));
        assert!(parsed.content.ends_with("today?"));
    }

    #[test]
    fn cleaned_output_is_a_fixed_point() {
        let first = extract_directives(MORNING_BRIEF);
        let second = extract_directives(&first.content);
        assert_eq!(second.content, first.content);
        assert!(second.actions.is_none());
    }

    #[test]
    fn slider_midpoint_floors() {
        assert_eq!(UiAction::slider("a", "A", 1, 10).slider_midpoint(), Some(5));
        assert_eq!(UiAction::slider("a", "A", 0, 5).slider_midpoint(), Some(2));
        assert_eq!(
            UiAction::slider("a", "A", i64::MAX, i64::MAX).slider_midpoint(),
            Some(i64::MAX)
        );
        assert_eq!(UiAction::choice("c", ["x"]).slider_midpoint(), None);
    }

    #[test]
    fn parsed_reply_serializes_without_absent_fields() {
        let parsed = extract_directives("Ready? [CHOICE: Yes | No]");
        let json = serde_json::to_value(&parsed).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "content": "Ready?",
                "actions": [{ "id": "Yes_1", "kind": "CHOICE", "options": ["Yes", "No"] }]
            })
        );
    }
}
