use crate::error::{FlowError, Result};
use crate::template::{Template, TemplateParams};

const CONTEXT_SEPARATOR: &str = "\n\n----------\n\n";

/// A declarative unit of work handed to one agent.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    id: String,
    description: Template,
    expected_output: Template,
    agent: String,
    context: Vec<String>,
}

impl TaskSpec {
    pub fn new(
        id: impl Into<String>,
        agent: impl Into<String>,
        description: impl Into<Template>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            expected_output: Template::parse(""),
            agent: agent.into(),
            context: Vec::new(),
        }
    }

    pub fn with_expected_output(mut self, expected_output: impl Into<Template>) -> Self {
        self.expected_output = expected_output.into();
        self
    }

    /// Tasks whose outputs are spliced into this task's prompt, in this order.
    pub fn with_context<S: Into<String>>(mut self, upstream: impl IntoIterator<Item = S>) -> Self {
        self.context = upstream.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }

    pub fn validate(&self, params: &TemplateParams) -> Result<()> {
        for template in [&self.description, &self.expected_output] {
            template.validate(params).map_err(|e| match e {
                FlowError::Configuration(msg) => {
                    FlowError::config(format!("task '{}': {msg}", self.id))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Render the prompt for this task.
    ///
    /// `upstream_outputs` is looked up by task id and must hold an output for
    /// every task in [`TaskSpec::context`]; they are appended in declared order.
    pub fn build_prompt<'a, F>(&self, params: &TemplateParams, upstream_outputs: F) -> Result<String>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        self.validate(params)?;

        let mut prompt = self.description.render(params)?;

        let expected = self.expected_output.render(params)?;
        if !expected.is_empty() {
            prompt.push_str("\n\nThis is the expected criteria for your final answer: ");
            prompt.push_str(&expected);
        }

        if !self.context.is_empty() {
            let mut outputs = Vec::with_capacity(self.context.len());
            for upstream in &self.context {
                let output = upstream_outputs(upstream).ok_or_else(|| {
                    FlowError::config(format!(
                        "task '{}' needs the output of '{}', which has not run",
                        self.id, upstream
                    ))
                })?;
                outputs.push(output);
            }
            prompt.push_str("\n\nThis is the context you're working with:\n");
            prompt.push_str(&outputs.join(CONTEXT_SEPARATOR));
        }

        Ok(prompt)
    }
}
