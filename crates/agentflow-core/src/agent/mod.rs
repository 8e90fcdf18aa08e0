mod core;
mod spec;
pub mod router;
pub mod task;

pub use core::{Agent, AgentInput, AgentOutput, LlmAgent, ToolExecution, ToolFailurePolicy};
pub use router::{Decision, LlmRouteStrategy, RouteStrategy, Router, FINISH};
pub use spec::AgentSpec;
pub use task::TaskSpec;
