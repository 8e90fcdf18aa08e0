use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agent::ToolFailurePolicy;
use crate::error::FlowError;
use crate::llm::{LlmClient, OpenAIClient};
use crate::orchestrator::DEFAULT_CEILING;
use crate::tools::ToolRegistry;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub orchestration: OrchestrationSettings,
    #[serde(default)]
    pub tools: ToolSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationSettings {
    /// Maximum router decisions or task advances per run.
    pub ceiling: usize,
    /// Model round trips an agent may spend on tool calls in one turn.
    pub agent_max_iterations: usize,
    pub tool_failure: ToolFailurePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub web_search_max_results: usize,
    pub fetch_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            temperature: 0.0,
        }
    }
}

impl Default for OrchestrationSettings {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_CEILING,
            agent_max_iterations: 15,
            tool_failure: ToolFailurePolicy::Degrade,
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            web_search_max_results: 1,
            fetch_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agentflow")
            .join("config.toml")
    }

    /// Load from the default location, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, FlowError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| FlowError::config(format!("{}: {e}", path.display())))
    }

    pub fn save(&self) -> Result<(), FlowError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), FlowError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| FlowError::config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the API key from the environment variable named in settings.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    pub fn build_llm_client(&self) -> Result<Arc<dyn LlmClient>, FlowError> {
        let api_key = self.api_key().ok_or_else(|| {
            FlowError::config(format!("environment variable {} is not set", self.llm.api_key_env))
        })?;

        let mut client = OpenAIClient::new(api_key)
            .with_model(&self.llm.model)
            .with_temperature(self.llm.temperature);
        if let Some(ref base_url) = self.llm.base_url {
            client = client.with_base_url(base_url);
        }
        Ok(Arc::new(client))
    }

    pub fn build_tool_registry(&self) -> ToolRegistry {
        ToolRegistry::web(self.tools.web_search_max_results, self.tools.fetch_timeout_secs)
    }
}
