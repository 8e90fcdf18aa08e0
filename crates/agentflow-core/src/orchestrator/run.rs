use super::Orchestrator;
use crate::agent::AgentOutput;
use crate::context::{Next, SharedState, Turn};
use crate::error::{ErrorKind, FlowError};
use crate::template::TemplateParams;
use chrono::{DateTime, Utc};
use futures::Stream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How a caller starts a run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub request: String,
    pub params: TemplateParams,
    pub ceiling: Option<usize>,
    pub session_id: Option<String>,
    pub cancel: Option<CancellationToken>,
}

impl RunRequest {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            params: TemplateParams::new(),
            ceiling: None,
            session_id: None,
            cancel: None,
        }
    }

    /// A request about `topic`, also exposed to templates as `{topic}`.
    pub fn topic(topic: impl Into<String>) -> Self {
        let topic = topic.into();
        Self::new(topic.clone()).with_param("topic", topic)
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key, value);
        self
    }

    pub fn with_params(mut self, params: TemplateParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// One completed agent turn.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub index: usize,
    pub agent: String,
    pub task: Option<String>,
    /// Rendered task prompt; `None` for router-driven steps.
    pub prompt: Option<String>,
    pub output: String,
    pub failed_tool_calls: usize,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: Uuid,
    /// Output of the last step; `None` when the run finished before any agent acted.
    pub final_output: Option<String>,
    pub steps: Vec<StepRecord>,
    pub messages: Vec<Turn>,
    /// Task outputs in completion order (sequential runs only).
    pub task_outputs: Vec<(String, String)>,
}

impl RunResult {
    pub fn task_output(&self, task_id: &str) -> Option<&str> {
        self.task_outputs
            .iter()
            .find(|(id, _)| id == task_id)
            .map(|(_, output)| output.as_str())
    }
}

/// A failed run: the reason plus everything produced before it stopped.
#[derive(Debug, Clone, thiserror::Error)]
#[error("run {run_id} stopped after {} step(s): {error}", steps.len())]
pub struct RunError {
    pub run_id: Uuid,
    pub error: FlowError,
    pub steps: Vec<StepRecord>,
    pub messages: Vec<Turn>,
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// Mutable state of one run, handed to the orchestration policy at each advance.
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    state: SharedState,
    params: TemplateParams,
    ceiling: usize,
    advances: usize,
    cancel: Option<CancellationToken>,
    steps: Vec<StepRecord>,
    task_outputs: Vec<(String, String)>,
}

impl RunContext {
    pub(crate) fn new(
        state: SharedState,
        params: TemplateParams,
        ceiling: usize,
        cancel: Option<CancellationToken>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state,
            params,
            ceiling,
            advances: 0,
            cancel,
            steps: Vec::new(),
            task_outputs: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn params(&self) -> &TemplateParams {
        &self.params
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn advances(&self) -> usize {
        self.advances
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn completed_tasks(&self) -> usize {
        self.task_outputs.len()
    }

    pub fn task_output(&self, task_id: &str) -> Option<&str> {
        self.task_outputs
            .iter()
            .find(|(id, _)| id == task_id)
            .map(|(_, output)| output.as_str())
    }

    /// Claim one routing decision or task advance.
    ///
    /// This is the run's only cancellation point and the only place the ceiling
    /// is counted, so policies call it exactly once before each decision.
    pub fn begin_advance(&mut self) -> Result<(), FlowError> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(FlowError::Cancelled);
        }
        if self.advances >= self.ceiling {
            return Err(FlowError::CeilingExceeded(self.ceiling));
        }
        self.advances += 1;
        Ok(())
    }

    pub fn set_next(&mut self, next: Next) {
        self.state.set_next(next);
    }

    /// Append an agent's output to the shared state and record it as a step.
    pub fn record(
        &mut self,
        agent: &str,
        task: Option<&str>,
        prompt: Option<String>,
        output: AgentOutput,
    ) -> StepRecord {
        let failed_tool_calls = output.failed_tool_calls();
        self.state.append(Turn::agent(agent, output.content.clone()));
        if let Some(task) = task {
            self.task_outputs
                .push((task.to_string(), output.content.clone()));
        }

        let step = StepRecord {
            index: self.steps.len(),
            agent: agent.to_string(),
            task: task.map(str::to_string),
            prompt,
            output: output.content,
            failed_tool_calls,
            completed_at: Utc::now(),
        };
        self.steps.push(step.clone());
        step
    }

    pub(crate) fn failure(&self, error: FlowError) -> RunError {
        RunError {
            run_id: self.run_id,
            error,
            steps: self.steps.clone(),
            messages: self.state.messages().to_vec(),
        }
    }

    fn into_result(self) -> RunResult {
        RunResult {
            run_id: self.run_id,
            final_output: self.steps.last().map(|s| s.output.clone()),
            steps: self.steps,
            messages: self.state.into_messages(),
            task_outputs: self.task_outputs,
        }
    }
}

enum Status {
    Running,
    Completed,
    Failed(RunError),
}

/// A run in progress. Steps are produced one at a time, only when asked for.
pub struct Execution<'a> {
    orchestrator: &'a Orchestrator,
    ctx: RunContext,
    session_id: Option<String>,
    status: Status,
}

impl<'a> Execution<'a> {
    pub(crate) fn new(orchestrator: &'a Orchestrator, ctx: RunContext, session_id: Option<String>) -> Self {
        Self {
            orchestrator,
            ctx,
            session_id,
            status: Status::Running,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.ctx.run_id
    }

    pub fn state(&self) -> &SharedState {
        &self.ctx.state
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.ctx.steps
    }

    /// Drive the run until the next step completes.
    ///
    /// Returns `None` once the run reached its terminal state or after a failure
    /// has been returned.
    pub async fn next_step(&mut self) -> Option<Result<StepRecord, RunError>> {
        if !matches!(self.status, Status::Running) {
            return None;
        }

        match self.orchestrator.policy().advance(&mut self.ctx).await {
            Ok(Some(step)) => {
                tracing::info!(
                    run_id = %self.ctx.run_id,
                    step = step.index,
                    agent = %step.agent,
                    task = step.task.as_deref().unwrap_or("-"),
                    "step completed"
                );
                Some(Ok(step))
            }
            Ok(None) => match self.save_session().await {
                Ok(()) => {
                    tracing::info!(run_id = %self.ctx.run_id, steps = self.ctx.steps.len(), "run completed");
                    self.status = Status::Completed;
                    None
                }
                Err(e) => Some(Err(self.fail(e))),
            },
            Err(e) => Some(Err(self.fail(e))),
        }
    }

    fn fail(&mut self, error: FlowError) -> RunError {
        tracing::warn!(run_id = %self.ctx.run_id, error = %error, steps = self.ctx.steps.len(), "run stopped");
        let failure = self.ctx.failure(error);
        self.status = Status::Failed(failure.clone());
        failure
    }

    async fn save_session(&self) -> Result<(), FlowError> {
        match (&self.session_id, self.orchestrator.sessions()) {
            (Some(id), Some(store)) => store.save(id, self.ctx.state.messages()).await,
            _ => Ok(()),
        }
    }

    /// Run to the end and return the result, or the error that stopped it.
    pub async fn finish(mut self) -> Result<RunResult, RunError> {
        while let Some(step) = self.next_step().await {
            if step.is_err() {
                break;
            }
        }
        match self.status {
            Status::Completed => Ok(self.ctx.into_result()),
            Status::Failed(failure) => Err(failure),
            Status::Running => Err(self.ctx.failure(FlowError::config("run ended without reaching a terminal state"))),
        }
    }

    /// The run as a lazy stream of steps. A failure is the last item.
    pub fn into_stream(self) -> impl Stream<Item = Result<StepRecord, RunError>> + 'a {
        futures::stream::unfold(self, |mut execution| async move {
            let item = execution.next_step().await?;
            Some((item, execution))
        })
    }
}
