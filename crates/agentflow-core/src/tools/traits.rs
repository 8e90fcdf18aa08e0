use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type ToolResult = Result<Value, FlowError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// An external collaborator an agent may call. Failures are reported as
/// [`FlowError::Tool`] and are absorbed by the calling agent.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, params: Value) -> ToolResult;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `web_search` and `page_fetch`.
    pub fn web(search_max_results: usize, fetch_timeout_secs: u64) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(
            super::WebSearchTool::default().with_max_results(search_max_results),
        ));
        registry.register(Arc::new(
            super::PageFetchTool::default().with_timeout_secs(fetch_timeout_secs),
        ));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// A registry holding only the named tools. Unknown names are a configuration error.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, FlowError> {
        let mut subset = Self::new();
        for name in names {
            let name = name.as_ref();
            let tool = self
                .tools
                .get(name)
                .ok_or_else(|| {
                    FlowError::config(format!(
                        "unknown tool '{name}' (available: {})",
                        self.names().join(", ")
                    ))
                })?;
            subset.tools.insert(name.to_string(), Arc::clone(tool));
        }
        Ok(subset)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tools.keys()).finish()
    }
}
