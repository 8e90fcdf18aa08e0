pub mod error;
pub mod template;
pub mod llm;
pub mod tools;
pub mod context;
pub mod config;
pub mod agent;
pub mod orchestrator;
pub mod presets;

// Re-export key types
pub use error::{ErrorKind, FlowError};
pub use template::{Template, TemplateParams};
pub use agent::{
    Agent, AgentInput, AgentOutput, AgentSpec, Decision, LlmAgent, LlmRouteStrategy,
    RouteStrategy, Router, TaskSpec, ToolFailurePolicy, FINISH,
};
pub use llm::{LlmClient, LlmResponse, Message, OpenAIClient, Role};
pub use tools::{Tool, ToolDefinition, ToolRegistry, ToolResult};
pub use context::{Author, InMemorySessionStore, Next, SessionStore, SharedState, Turn};
pub use config::Settings;
pub use orchestrator::{
    AgentGraph, Crew, Execution, OrchestrationPolicy, Orchestrator, RunError, RunRequest,
    RunResult, StepRecord,
};
