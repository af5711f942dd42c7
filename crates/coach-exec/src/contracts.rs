use serde::Deserialize;
use serde::Serialize;

pub const NOT_INITIALIZED_REPLY: &str = "Error: Protocol Engine not initialized. Please refresh.";
pub const INTERRUPTION_REPLY: &str = "Protocol interruption detected. Please try again.";
pub const CONNECTION_ERROR_REPLY: &str = "Connection error.";

/// Canned model replies, read from YAML:
///
/// ```yaml
/// replies:
///   - "Morning. [SLIDER: Energy | 1 | 10]"
///   - "Logged."
/// fallback: "Noted."
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyScript {
    #[serde(default)]
    pub replies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}
