use std::time::Duration;

use advisor_models::{BackendReply, BackendSelection, Conversation, OperationSpec};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::backend::ReasoningBackend;
use crate::error::AgentError;
use crate::parser::parse_backend_reply;
use crate::prompts::render_system_prompt;

/// Configuration for a Claude CLI invocation.
#[derive(Debug, Clone)]
pub struct ClaudeCliConfig {
    pub model: String,
    pub timeout: Duration,
    /// Exported as `AWS_REGION` for region-scoped deployments.
    pub region: Option<String>,
    pub program: String,
}

pub const DEFAULT_PROGRAM: &str = "claude";

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            timeout: Duration::from_secs(45),
            region: None,
            program: DEFAULT_PROGRAM.to_string(),
        }
    }
}

impl ClaudeCliConfig {
    /// Apply a per-request selection on top of the configured defaults.
    pub fn for_selection(&self, selection: &BackendSelection) -> Self {
        Self {
            model: selection.model.clone().unwrap_or_else(|| self.model.clone()),
            timeout: self.timeout,
            region: selection.region.clone().or_else(|| self.region.clone()),
            program: self.program.clone(),
        }
    }
}

/// Invoke the `claude` CLI with a system prompt and user prompt.
/// Returns the raw stdout text.
pub async fn invoke_claude(
    system_prompt: &str,
    user_prompt: &str,
    config: &ClaudeCliConfig,
) -> Result<String, AgentError> {
    debug!(model = %config.model, region = ?config.region, "Invoking claude CLI");

    let mut command = Command::new(&config.program);
    command
        .args([
            "-p",
            user_prompt,
            "--system-prompt",
            system_prompt,
            "--model",
            &config.model,
            "--output-format",
            "text",
        ])
        .kill_on_drop(true);
    if let Some(region) = &config.region {
        command.env("AWS_REGION", region);
    }

    let output = tokio::time::timeout(config.timeout, command.output())
        .await
        .map_err(|_| AgentError::Timeout(config.timeout.as_secs()))?
        .map_err(|e| AgentError::Cli(format!("Failed to spawn {}: {e}", config.program)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(status = %output.status, stderr = %stderr, "Claude CLI failed");
        return Err(AgentError::Cli(format!(
            "claude exited {}: {}",
            output.status, stderr
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if stdout.trim().is_empty() {
        return Err(AgentError::Cli("Claude returned empty response".to_string()));
    }

    Ok(stdout)
}

/// Check if the `claude` CLI is available on the system.
pub async fn check_cli_available() -> bool {
    check_program_available(DEFAULT_PROGRAM).await
}

/// True when `program --version` runs and exits successfully.
pub async fn check_program_available(program: &str) -> bool {
    match Command::new(program).arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// A reasoning backend that shells out to the `claude` CLI once per round.
pub struct ClaudeCliBackend {
    config: ClaudeCliConfig,
}

impl ClaudeCliBackend {
    pub fn new(config: ClaudeCliConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ReasoningBackend for ClaudeCliBackend {
    fn name(&self) -> &str {
        "claude_cli"
    }

    async fn complete(
        &self,
        instructions: &str,
        operations: &[OperationSpec],
        conversation: &Conversation,
    ) -> Result<BackendReply, AgentError> {
        let system_prompt =
            render_system_prompt(instructions, operations, conversation.tools_exhausted);
        let user_prompt = serde_json::to_string_pretty(conversation)?;
        let config = self.config.for_selection(&conversation.selection);

        let raw_output = invoke_claude(&system_prompt, &user_prompt, &config).await?;
        parse_backend_reply(&raw_output)
    }
}
