use super::web::{decode_entities, fetch_text, tags};
use crate::error::FlowError;
use crate::tools::traits::{Tool, ToolResult};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;

const MAX_TEXT_CHARS: usize = 50_000;

/// Fetches a web page and returns its readable text with markup removed.
pub struct PageFetchTool {
    timeout_secs: u64,
}

impl Default for PageFetchTool {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl PageFetchTool {
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[async_trait::async_trait]
impl Tool for PageFetchTool {
    fn name(&self) -> &str {
        "page_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a web page by URL and return its visible text. Use this to read a search result in full. Text is truncated to 50,000 characters."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let url = params
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FlowError::tool("page_fetch", "Missing required parameter: url"))?;

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FlowError::tool(
                "page_fetch",
                format!("Unsupported URL scheme: {url}"),
            ));
        }

        let (status, body) =
            fetch_text(self.name(), url, Duration::from_secs(self.timeout_secs)).await?;

        let text = visible_text(&body);
        let truncated = text.chars().count() > MAX_TEXT_CHARS;
        let text = if truncated {
            text.chars().take(MAX_TEXT_CHARS).collect()
        } else {
            text
        };

        Ok(serde_json::json!({
            "url": url,
            "status": status,
            "text": text,
            "truncated": truncated,
        }))
    }
}

fn hidden_blocks() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript|head)\b[^>]*>.*?</(script|style|noscript|head)>")
            .expect("hidden block regex is valid")
    })
}

/// Strip markup and collapse whitespace, keeping one line per text block.
fn visible_text(html: &str) -> String {
    let without_hidden = hidden_blocks().replace_all(html, " ");
    let without_tags = tags().replace_all(&without_hidden, "\n");
    let decoded = decode_entities(&without_tags);

    decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
