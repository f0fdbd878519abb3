use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::report::ToolResult;
use crate::request::{BackendSelection, Domain};

/// Work handed to a specialist worker by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerTask {
    pub request_id: Uuid,
    pub ticker: String,
    pub selection: BackendSelection,
    /// Wall-clock budget for the whole analysis, tool rounds included.
    pub time_budget: Duration,
}

/// An operation advertised to the reasoning backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the accepted parameters.
    pub input_schema: serde_json::Value,
}

/// A backend's request to run one tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    pub tool: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// One completed tool round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub invocation: ToolInvocation,
    pub result: ToolResult,
}

/// State threaded through successive backend calls for one worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub request_id: Uuid,
    pub ticker: String,
    pub domain: Domain,
    pub selection: BackendSelection,
    pub turns: Vec<ConversationTurn>,
    /// Set once the round ceiling is reached; the backend must answer without tools.
    #[serde(default)]
    pub tools_exhausted: bool,
}

impl Conversation {
    pub fn new(task: &WorkerTask, domain: Domain) -> Self {
        Self {
            request_id: task.request_id,
            ticker: task.ticker.clone(),
            domain,
            selection: task.selection.clone(),
            turns: Vec::new(),
            tools_exhausted: false,
        }
    }

    /// Whether the named tool has already been run in this conversation.
    pub fn has_invoked(&self, tool: &str) -> bool {
        self.turns.iter().any(|t| t.invocation.tool == tool)
    }

    /// Result of the most recent invocation of `tool`, if any.
    pub fn result_of(&self, tool: &str) -> Option<&ToolResult> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.invocation.tool == tool)
            .map(|t| &t.result)
    }
}

/// What a reasoning backend returns from one `complete` call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendReply {
    /// Structured final answer, parsed into a DomainReport by the worker.
    Final(serde_json::Value),
    /// Run this tool and call back with its result.
    Invoke(ToolInvocation),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> WorkerTask {
        WorkerTask {
            request_id: Uuid::new_v4(),
            ticker: "TSLA".to_string(),
            selection: BackendSelection::default(),
            time_budget: Duration::from_secs(5),
        }
    }

    #[test]
    fn conversation_tracks_invocations() {
        let mut conversation = Conversation::new(&task(), Domain::Risk);
        assert!(!conversation.has_invoked("calculate_risk_metrics"));

        conversation.turns.push(ConversationTurn {
            invocation: ToolInvocation {
                tool: "calculate_risk_metrics".to_string(),
                params: serde_json::json!({"ticker": "TSLA"}),
            },
            result: ToolResult::success(serde_json::json!({"beta": 1.9}), "Beta 1.90"),
        });

        assert!(conversation.has_invoked("calculate_risk_metrics"));
        let result = conversation.result_of("calculate_risk_metrics").unwrap();
        assert_eq!(result.payload["beta"], 1.9);
    }

    #[test]
    fn roundtrip_conversation() {
        let conversation = Conversation::new(&task(), Domain::Technical);
        let json = serde_json::to_string(&conversation).unwrap();
        let deserialized: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(conversation, deserialized);
    }

    #[test]
    fn invocation_params_default_to_null() {
        let invocation: ToolInvocation =
            serde_json::from_str(r#"{"tool": "get_price_history"}"#).unwrap();
        assert!(invocation.params.is_null());
    }
}
