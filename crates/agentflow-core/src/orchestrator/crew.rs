use super::{OrchestrationPolicy, RunContext, StepRecord};
use crate::agent::{Agent, AgentInput, TaskSpec};
use crate::context::{Next, Turn};
use crate::error::FlowError;
use crate::template::TemplateParams;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Sequential policy: each task runs once, after all of its upstream tasks,
/// in declaration order wherever dependencies allow.
pub struct Crew {
    agents: HashMap<String, Arc<dyn Agent>>,
    tasks: Vec<TaskSpec>,
}

impl Crew {
    pub fn builder() -> CrewBuilder {
        CrewBuilder::default()
    }

    /// Task ids in the order they will run.
    pub fn execution_order(&self) -> Vec<&str> {
        self.tasks.iter().map(TaskSpec::id).collect()
    }
}

#[derive(Default)]
pub struct CrewBuilder {
    agents: Vec<Arc<dyn Agent>>,
    tasks: Vec<TaskSpec>,
}

impl CrewBuilder {
    pub fn agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn task(mut self, task: TaskSpec) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn build(self) -> Result<Crew, FlowError> {
        if self.tasks.is_empty() {
            return Err(FlowError::config("a crew needs at least one task"));
        }

        let mut agents: HashMap<String, Arc<dyn Agent>> = HashMap::new();
        for agent in self.agents {
            let id = agent.id().to_string();
            if agents.insert(id.clone(), agent).is_some() {
                return Err(FlowError::config(format!("duplicate agent id '{id}'")));
            }
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id()) {
                return Err(FlowError::config(format!("duplicate task id '{}'", task.id())));
            }
            if !agents.contains_key(task.agent()) {
                return Err(FlowError::config(format!(
                    "task '{}' is assigned to unknown agent '{}'",
                    task.id(),
                    task.agent()
                )));
            }
        }
        for task in &self.tasks {
            if let Some(missing) = task.context().iter().find(|up| !seen.contains(up.as_str())) {
                return Err(FlowError::config(format!(
                    "task '{}' depends on unknown task '{}'",
                    task.id(),
                    missing
                )));
            }
        }

        let tasks = topological_order(self.tasks)?;
        Ok(Crew { agents, tasks })
    }
}

/// Kahn's algorithm, always picking the earliest-declared ready task.
fn topological_order(tasks: Vec<TaskSpec>) -> Result<Vec<TaskSpec>, FlowError> {
    let mut pending: Vec<Option<TaskSpec>> = tasks.into_iter().map(Some).collect();
    let mut done: HashSet<String> = HashSet::new();
    let mut ordered = Vec::with_capacity(pending.len());

    while ordered.len() < pending.len() {
        let ready = pending.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|task| task.context().iter().all(|up| done.contains(up)))
        });

        let Some(index) = ready else {
            let stuck: Vec<&str> = pending.iter().flatten().map(TaskSpec::id).collect();
            return Err(FlowError::config(format!(
                "task dependencies form a cycle among: {}",
                stuck.join(", ")
            )));
        };

        if let Some(task) = pending[index].take() {
            done.insert(task.id().to_string());
            ordered.push(task);
        }
    }

    Ok(ordered)
}

#[async_trait::async_trait]
impl OrchestrationPolicy for Crew {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn validate(&self, params: &TemplateParams) -> Result<(), FlowError> {
        for agent in self.agents.values() {
            agent.validate(params)?;
        }
        self.tasks.iter().try_for_each(|task| task.validate(params))
    }

    async fn advance(&self, run: &mut RunContext) -> Result<Option<StepRecord>, FlowError> {
        let Some(task) = self.tasks.get(run.completed_tasks()) else {
            run.set_next(Next::Terminal);
            return Ok(None);
        };

        run.begin_advance()?;

        let prompt = task.build_prompt(run.params(), |id| run.task_output(id))?;
        let agent = self.agents.get(task.agent()).ok_or_else(|| {
            FlowError::config(format!("task '{}' has no agent '{}'", task.id(), task.agent()))
        })?;
        run.set_next(Next::Agent(task.agent().to_string()));

        let turns = [Turn::user(prompt.clone())];
        let output = agent
            .invoke(AgentInput {
                messages: &turns,
                params: run.params(),
            })
            .await?;

        let step = run.record(task.agent(), Some(task.id()), Some(prompt), output);
        match self.tasks.get(run.completed_tasks()) {
            Some(next) => run.set_next(Next::Agent(next.agent().to_string())),
            None => run.set_next(Next::Terminal),
        }
        Ok(Some(step))
    }
}
