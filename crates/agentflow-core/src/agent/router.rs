use crate::context::{SharedState, Turn};
use crate::error::FlowError;
use crate::llm::{LlmClient, Message, ToolChoice};
use crate::tools::ToolDefinition;
use std::sync::Arc;

/// The value a router returns to signal completion.
pub const FINISH: &str = "FINISH";

const ROUTE_FUNCTION: &str = "route";

/// A routing decision: hand the turn to an agent or finish the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Agent(String),
    Finish,
}

/// The model-facing half of routing: produce a raw choice for the router to validate.
///
/// `correction` is set when the previous proposal was rejected, and carries the
/// message the strategy should show the model on its second attempt.
#[async_trait::async_trait]
pub trait RouteStrategy: Send + Sync {
    async fn propose(
        &self,
        history: &[Turn],
        options: &[String],
        correction: Option<&str>,
    ) -> Result<String, FlowError>;
}

/// Validates strategy output against the roster and retries once on garbage.
pub struct Router {
    strategy: Arc<dyn RouteStrategy>,
    roster: Vec<String>,
}

impl Router {
    pub fn new(strategy: Arc<dyn RouteStrategy>) -> Self {
        Self {
            strategy,
            roster: Vec::new(),
        }
    }

    pub(crate) fn set_roster(&mut self, roster: Vec<String>) {
        self.roster = roster;
    }

    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    /// Every value `decide` may return: `FINISH` first, then the agent ids.
    pub fn options(&self) -> Vec<String> {
        std::iter::once(FINISH.to_string())
            .chain(self.roster.iter().cloned())
            .collect()
    }

    pub fn parse(&self, raw: &str) -> Option<Decision> {
        let exact = self
            .roster
            .iter()
            .find(|id| id.as_str() == raw || id.as_str() == raw.trim());
        if let Some(id) = exact {
            return Some(Decision::Agent(id.clone()));
        }
        let cleaned = raw
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
            .trim();
        if cleaned.eq_ignore_ascii_case(FINISH) {
            return Some(Decision::Finish);
        }
        self.roster
            .iter()
            .find(|id| id.as_str() == cleaned)
            .or_else(|| self.roster.iter().find(|id| id.eq_ignore_ascii_case(cleaned)))
            .map(|id| Decision::Agent(id.clone()))
    }

    pub async fn decide(&self, state: &SharedState) -> Result<Decision, FlowError> {
        let options = self.options();

        let first = self.strategy.propose(state.messages(), &options, None).await?;
        if let Some(decision) = self.parse(&first) {
            return Ok(decision);
        }

        tracing::warn!(proposal = %first, "router proposal invalid, retrying once");
        let correction = format!(
            "Your previous answer {:?} is not a valid choice. Respond with exactly one of: {}.",
            first,
            options.join(", ")
        );
        let second = self
            .strategy
            .propose(state.messages(), &options, Some(&correction))
            .await?;

        self.parse(&second).ok_or_else(|| {
            FlowError::Routing(format!(
                "router returned {:?} then {:?}; expected one of: {}",
                first,
                second,
                options.join(", ")
            ))
        })
    }
}

/// Routes by asking a language model to call a `route` function whose only
/// argument is constrained to the option list.
pub struct LlmRouteStrategy {
    llm: Arc<dyn LlmClient>,
    manager_role: String,
}

impl LlmRouteStrategy {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            manager_role: "the team manager".to_string(),
        }
    }

    pub fn with_manager_role(mut self, role: impl Into<String>) -> Self {
        self.manager_role = role.into();
        self
    }

    fn route_definition(options: &[String]) -> ToolDefinition {
        ToolDefinition {
            name: ROUTE_FUNCTION.to_string(),
            description: "Select the next role.".to_string(),
            parameters: serde_json::json!({
                "title": "routeSchema",
                "type": "object",
                "properties": {
                    "next": {
                        "title": "Next",
                        "anyOf": [{ "enum": options }]
                    }
                },
                "required": ["next"]
            }),
        }
    }
}

#[async_trait::async_trait]
impl RouteStrategy for LlmRouteStrategy {
    async fn propose(
        &self,
        history: &[Turn],
        options: &[String],
        correction: Option<&str>,
    ) -> Result<String, FlowError> {
        let team: Vec<&str> = options
            .iter()
            .map(String::as_str)
            .filter(|o| *o != FINISH)
            .collect();

        let mut messages = vec![Message::system(format!(
            "As {}, your role is to oversee these agents: {}. \
             Based on the user's request, determine the next best action. \
             Respond with only one of: {:?}. When all tasks are complete, respond with '{FINISH}'.",
            self.manager_role,
            team.join(", "),
            options
        ))];
        messages.extend(history.iter().map(Turn::to_message));
        messages.push(Message::system(format!(
            "Who should act next? Choose from: {options:?}"
        )));
        if let Some(correction) = correction {
            messages.push(Message::system(correction));
        }

        let response = self
            .llm
            .chat(
                &messages,
                &[Self::route_definition(options)],
                &ToolChoice::Function(ROUTE_FUNCTION.to_string()),
            )
            .await
            .map_err(|e| match e {
                FlowError::Model(msg) => FlowError::Model(format!("router: {msg}")),
                other => FlowError::Model(format!("router: {other}")),
            })?;

        let route_call = response
            .message
            .tool_calls
            .iter()
            .flatten()
            .find(|call| call.function.name == ROUTE_FUNCTION);

        if let Some(call) = route_call {
            // Malformed arguments are handed back raw; the router rejects them.
            return Ok(match call.parse_arguments() {
                Ok(args) => match args.get("next").and_then(|v| v.as_str()) {
                    Some(next) => next.to_string(),
                    None => call.function.arguments.clone(),
                },
                Err(_) => call.function.arguments.clone(),
            });
        }

        Ok(response.message.content)
    }
}
