use super::{OrchestrationPolicy, RunContext, StepRecord};
use crate::agent::{Agent, AgentInput, Decision, RouteStrategy, Router, FINISH};
use crate::context::Next;
use crate::error::FlowError;
use crate::template::TemplateParams;
use std::sync::Arc;

/// Router-driven policy: after every agent turn control returns to the router,
/// which sees the whole conversation and picks the next agent or finishes.
pub struct AgentGraph {
    agents: Vec<Arc<dyn Agent>>,
    router: Router,
}

impl AgentGraph {
    pub fn builder(strategy: Arc<dyn RouteStrategy>) -> AgentGraphBuilder {
        AgentGraphBuilder {
            agents: Vec::new(),
            strategy,
        }
    }

    pub fn agent_ids(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.id()).collect()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    fn agent(&self, id: &str) -> Option<&Arc<dyn Agent>> {
        self.agents.iter().find(|a| a.id() == id)
    }
}

pub struct AgentGraphBuilder {
    agents: Vec<Arc<dyn Agent>>,
    strategy: Arc<dyn RouteStrategy>,
}

impl AgentGraphBuilder {
    pub fn agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn agents(mut self, agents: impl IntoIterator<Item = Arc<dyn Agent>>) -> Self {
        self.agents.extend(agents);
        self
    }

    pub fn build(self) -> Result<AgentGraph, FlowError> {
        if self.agents.is_empty() {
            return Err(FlowError::config("an agent graph needs at least one agent"));
        }

        let mut roster: Vec<String> = Vec::with_capacity(self.agents.len());
        for agent in &self.agents {
            let id = agent.id();
            if id.trim().is_empty() {
                return Err(FlowError::config("agent id must not be empty"));
            }
            if !is_routable_id(id) {
                return Err(FlowError::config(format!(
                    "agent id '{id}' may only contain ASCII letters, digits, '_' and '-'"
                )));
            }
            if id.eq_ignore_ascii_case(FINISH) {
                return Err(FlowError::config(format!(
                    "agent id '{id}' collides with the router's finish value"
                )));
            }
            if roster.iter().any(|r| r.eq_ignore_ascii_case(id)) {
                return Err(FlowError::config(format!("duplicate agent id '{id}'")));
            }
            roster.push(id.to_string());
        }

        let mut router = Router::new(self.strategy);
        router.set_roster(roster);

        Ok(AgentGraph {
            agents: self.agents,
            router,
        })
    }
}

/// Ids the router can echo back unchanged; also the set OpenAI accepts as a message name.
fn is_routable_id(id: &str) -> bool {
    id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[async_trait::async_trait]
impl OrchestrationPolicy for AgentGraph {
    fn name(&self) -> &'static str {
        "graph"
    }

    fn validate(&self, params: &TemplateParams) -> Result<(), FlowError> {
        self.agents.iter().try_for_each(|agent| agent.validate(params))
    }

    async fn advance(&self, run: &mut RunContext) -> Result<Option<StepRecord>, FlowError> {
        run.begin_advance()?;

        let decision = self.router.decide(run.state()).await?;
        tracing::debug!(run_id = %run.run_id(), decision = ?decision, "router decided");

        let id = match decision {
            Decision::Finish => {
                run.set_next(Next::Terminal);
                return Ok(None);
            }
            Decision::Agent(id) => id,
        };

        let agent = self
            .agent(&id)
            .ok_or_else(|| FlowError::Routing(format!("router chose unregistered agent '{id}'")))?;
        run.set_next(Next::Agent(id.clone()));

        let output = agent
            .invoke(AgentInput {
                messages: run.state().messages(),
                params: run.params(),
            })
            .await?;

        let step = run.record(&id, None, None, output);
        run.set_next(Next::Router);
        Ok(Some(step))
    }
}
