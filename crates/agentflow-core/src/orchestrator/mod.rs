//! Drives agents to completion under a pluggable orchestration policy.
//!
//! Two policies ship with the crate: [`AgentGraph`], where a router picks the
//! next agent after every turn, and [`Crew`], which walks a dependency-ordered
//! task list. Both are driven by the same [`Orchestrator`], which owns the
//! step ceiling, cancellation and session handling.

mod crew;
mod graph;
mod run;

pub use crew::{Crew, CrewBuilder};
pub use graph::{AgentGraph, AgentGraphBuilder};
pub use run::{Execution, RunContext, RunError, RunRequest, RunResult, StepRecord};

use crate::context::{SessionStore, SharedState};
use crate::error::FlowError;
use crate::template::TemplateParams;
use std::sync::Arc;

pub const DEFAULT_CEILING: usize = 150;

/// Decides what happens at each advance of a run.
#[async_trait::async_trait]
pub trait OrchestrationPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Reject the run up front if any template cannot be rendered from `params`.
    fn validate(&self, params: &TemplateParams) -> Result<(), FlowError>;

    /// Perform one advance. `Ok(None)` means the run reached its terminal state.
    async fn advance(&self, run: &mut RunContext) -> Result<Option<StepRecord>, FlowError>;
}

pub struct Orchestrator {
    policy: Arc<dyn OrchestrationPolicy>,
    ceiling: usize,
    sessions: Option<Arc<dyn SessionStore>>,
}

impl Orchestrator {
    pub fn new(policy: Arc<dyn OrchestrationPolicy>) -> Self {
        Self {
            policy,
            ceiling: DEFAULT_CEILING,
            sessions: None,
        }
    }

    /// Default ceiling for requests that do not set their own.
    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    pub fn policy(&self) -> &dyn OrchestrationPolicy {
        self.policy.as_ref()
    }

    pub fn sessions(&self) -> Option<&dyn SessionStore> {
        self.sessions.as_deref()
    }

    /// Validate the request and set up a run without taking any step yet.
    pub async fn start(&self, request: RunRequest) -> Result<Execution<'_>, RunError> {
        let RunRequest {
            request,
            params,
            ceiling,
            session_id,
            cancel,
        } = request;
        let ceiling = ceiling.unwrap_or(self.ceiling);

        let loaded = match (&session_id, &self.sessions) {
            (Some(id), Some(store)) => store.load(id).await,
            _ => Ok(Vec::new()),
        };
        let (history, load_error) = match loaded {
            Ok(history) => (history, None),
            Err(e) => (Vec::new(), Some(e)),
        };

        let ctx = RunContext::new(SharedState::with_history(history, request), params, ceiling, cancel);
        let setup = match load_error {
            Some(e) => Err(e),
            None if ceiling == 0 => Err(FlowError::config("ceiling must be at least 1")),
            None => self.policy.validate(ctx.params()),
        };
        if let Err(e) = setup {
            return Err(ctx.failure(e));
        }

        tracing::debug!(
            run_id = %ctx.run_id(),
            policy = self.policy.name(),
            ceiling,
            session = session_id.as_deref().unwrap_or("-"),
            "run started"
        );
        Ok(Execution::new(self, ctx, session_id))
    }

    pub async fn run(&self, request: RunRequest) -> Result<RunResult, RunError> {
        self.start(request).await?.finish().await
    }
}
