use crate::error::{FlowError, Result};
use crate::template::{Template, TemplateParams};

/// Static description of an agent: who it is, what it is for, which tools it may use.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    id: String,
    role: String,
    goal: Template,
    backstory: String,
    allow_delegation: bool,
    tools: Vec<String>,
}

impl AgentSpec {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            goal: Template::parse(""),
            backstory: String::new(),
            allow_delegation: false,
            tools: Vec::new(),
        }
    }

    /// Goal text; may contain `{param}` placeholders filled per run.
    pub fn with_goal(mut self, goal: impl Into<Template>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn with_delegation(mut self, allow: bool) -> Self {
        self.allow_delegation = allow;
        self
    }

    pub fn with_tools<S: Into<String>>(mut self, tools: impl IntoIterator<Item = S>) -> Self {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn goal(&self) -> &Template {
        &self.goal
    }

    pub fn backstory(&self) -> &str {
        &self.backstory
    }

    pub fn allow_delegation(&self) -> bool {
        self.allow_delegation
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn validate(&self, params: &TemplateParams) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(FlowError::config("agent id must not be empty"));
        }
        self.goal.validate(params).map_err(|e| match e {
            FlowError::Configuration(msg) => {
                FlowError::config(format!("agent '{}': {msg}", self.id))
            }
            other => other,
        })
    }

    pub fn system_prompt(&self, params: &TemplateParams) -> Result<String> {
        self.validate(params)?;
        let goal = self.goal.render(params)?;

        let mut prompt = format!("You are {}.", self.role);
        if !self.backstory.is_empty() {
            prompt.push(' ');
            prompt.push_str(&self.backstory);
        }
        if !goal.is_empty() {
            prompt.push_str("\nYour personal goal is: ");
            prompt.push_str(&goal);
        }
        if !self.allow_delegation {
            prompt.push_str("\nComplete the work yourself; do not hand it off to anyone else.");
        }
        Ok(prompt)
    }
}
