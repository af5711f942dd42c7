use serde::{Deserialize, Serialize};

use crate::directive::DirectiveOrder;

pub const DEFAULT_AGENT_NAME: &str = "Executive OS";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "Act as a high-performance executive coach.";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub directives: DirectiveConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub system_instruction: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            system_instruction: None,
        }
    }
}

impl AgentConfig {
    pub fn system_instruction(&self) -> &str {
        self.system_instruction
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_INSTRUCTION)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DirectiveConfig {
    pub order: DirectiveOrder,
}
