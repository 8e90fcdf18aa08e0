use super::spec::AgentSpec;
use crate::context::Turn;
use crate::error::FlowError;
use crate::llm::{LlmClient, Message, ToolCall, ToolChoice, Usage};
use crate::template::{truncate_str, TemplateParams};
use crate::tools::{ToolDefinition, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// What an agent does when one of its tools fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolFailurePolicy {
    /// Report the failure to the model and carry on.
    #[default]
    Degrade,
    /// Fail the agent turn with the tool's error.
    Abort,
}

/// Everything an agent gets to see for one turn.
#[derive(Debug, Clone, Copy)]
pub struct AgentInput<'a> {
    pub messages: &'a [Turn],
    pub params: &'a TemplateParams,
}

#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub tool_name: String,
    pub params: Value,
    pub success: bool,
    pub result_summary: String,
}

#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    pub content: String,
    pub tool_calls: Vec<ToolExecution>,
    pub iterations: usize,
    /// Summed over every model call of the turn; zero when the provider reports none.
    pub usage: Usage,
}

impl AgentOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            iterations: 1,
            usage: Usage::default(),
        }
    }

    pub fn failed_tool_calls(&self) -> usize {
        self.tool_calls.iter().filter(|t| !t.success).count()
    }
}

/// A participant in an orchestration run.
#[async_trait::async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;

    /// Check that every template the agent renders can be filled from `params`.
    fn validate(&self, _params: &TemplateParams) -> Result<(), FlowError> {
        Ok(())
    }

    async fn invoke(&self, input: AgentInput<'_>) -> Result<AgentOutput, FlowError>;
}

/// An agent backed by a language model and an optional tool set.
pub struct LlmAgent {
    spec: AgentSpec,
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    max_iterations: usize,
    tool_failure: ToolFailurePolicy,
}

impl LlmAgent {
    pub fn new(spec: AgentSpec, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            spec,
            llm,
            tools: ToolRegistry::new(),
            max_iterations: 15,
            tool_failure: ToolFailurePolicy::Degrade,
        }
    }

    /// Build an agent holding the tools its spec names, taken from `available`.
    pub fn from_registry(
        spec: AgentSpec,
        llm: Arc<dyn LlmClient>,
        available: &ToolRegistry,
    ) -> Result<Self, FlowError> {
        let tools = available
            .subset(spec.tools())
            .map_err(|e| FlowError::config(format!("agent '{}': {e}", spec.id())))?;
        Ok(Self::new(spec, llm).with_tools(tools))
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_tool_failure(mut self, policy: ToolFailurePolicy) -> Self {
        self.tool_failure = policy;
        self
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    async fn execute_tool(&self, tool_call: &ToolCall) -> Result<String, FlowError> {
        let tool_name = &tool_call.function.name;

        let params = tool_call.parse_arguments().map_err(|e| {
            FlowError::tool(tool_name.as_str(), format!("Failed to parse tool arguments: {e}"))
        })?;

        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| FlowError::tool(tool_name.as_str(), "tool not available to this agent"))?;

        let value = tool.execute(params).await?;
        Ok(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

#[async_trait::async_trait]
impl Agent for LlmAgent {
    fn id(&self) -> &str {
        self.spec.id()
    }

    fn validate(&self, params: &TemplateParams) -> Result<(), FlowError> {
        self.spec.validate(params)
    }

    async fn invoke(&self, input: AgentInput<'_>) -> Result<AgentOutput, FlowError> {
        let id = self.spec.id();
        let mut messages = Vec::with_capacity(input.messages.len() + 1);
        messages.push(Message::system(self.spec.system_prompt(input.params)?));
        messages.extend(input.messages.iter().map(Turn::to_message));

        let all_tools: Vec<ToolDefinition> = self.tools.definitions();
        let mut tool_executions = Vec::new();
        let mut iterations = 0;
        let mut usage = Usage::default();

        loop {
            iterations += 1;
            // The last round offers no tools so the model has to answer.
            let tools: &[ToolDefinition] = if iterations >= self.max_iterations {
                &[]
            } else {
                &all_tools
            };

            let response = self
                .llm
                .chat(&messages, tools, &ToolChoice::Auto)
                .await
                .map_err(|e| match e {
                    FlowError::Model(msg) => FlowError::Model(format!("agent '{id}': {msg}")),
                    other => FlowError::Model(format!("agent '{id}': {other}")),
                })?;

            if let Some(reported) = response.usage {
                usage += reported;
            }

            let tool_calls = response.message.tool_calls.clone().unwrap_or_default();
            if tool_calls.is_empty() || tools.is_empty() {
                tracing::debug!(
                    agent = id,
                    iterations,
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "agent produced final answer"
                );
                return Ok(AgentOutput {
                    content: response.message.content,
                    tool_calls: tool_executions,
                    iterations,
                    usage,
                });
            }

            messages.push(Message::assistant_with_tools(
                response.message.content.clone(),
                tool_calls.clone(),
            ));

            for tool_call in &tool_calls {
                let tool_name = tool_call.function.name.clone();
                let params = tool_call.parse_arguments().unwrap_or(Value::Null);

                let (success, result_str) = match self.execute_tool(tool_call).await {
                    Ok(result) => (true, result),
                    Err(e) if self.tool_failure == ToolFailurePolicy::Abort => return Err(e),
                    Err(e) => {
                        tracing::warn!(agent = id, tool = %tool_name, error = %e, "tool call failed, continuing without it");
                        (false, format!("Error: {e}"))
                    }
                };

                tool_executions.push(ToolExecution {
                    tool_name,
                    params,
                    success,
                    result_summary: truncate_str(&result_str, 200),
                });
                messages.push(Message::tool_result(&tool_call.id, result_str));
            }
        }
    }
}
