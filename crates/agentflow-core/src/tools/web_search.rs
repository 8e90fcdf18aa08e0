use super::web::{decode_entities, fetch_text, inline_text};
use crate::error::FlowError;
use crate::tools::traits::{Tool, ToolResult};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;

const ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const TIMEOUT: Duration = Duration::from_secs(15);

/// Searches the web through the DuckDuckGo HTML endpoint (no API key needed).
pub struct WebSearchTool {
    max_results: usize,
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self { max_results: 1 }
    }
}

impl WebSearchTool {
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct SearchHit {
    title: String,
    url: String,
    snippet: String,
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the internet. Returns a list of results with titles, URLs, and snippets. Use this to find current information on a topic."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let query = params
            .get("query")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| FlowError::tool(self.name(), "Missing required parameter: query"))?;
        let limit = params
            .get("max_results")
            .and_then(Value::as_u64)
            .map_or(self.max_results, |n| (n as usize).max(1));

        let url = format!("{ENDPOINT}?q={}", urlencoding::encode(query));
        let (_, page) = fetch_text(self.name(), &url, TIMEOUT).await?;
        let hits = scan_results(&page, limit);
        tracing::debug!(query, hits = hits.len(), "web search finished");

        Ok(serde_json::json!({
            "query": query,
            "count": hits.len(),
            "results": hits,
        }))
    }
}

fn anchors() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").expect("anchor regex is valid"))
}

fn attribute(attrs: &str, name: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"\b([a-zA-Z-]+)\s*=\s*"([^"]*)""#).expect("attribute regex is valid")
    });
    re.captures_iter(attrs)
        .find(|caps| caps[1].eq_ignore_ascii_case(name))
        .map(|caps| caps[2].to_string())
}

fn has_class(attrs: &str, class: &str) -> bool {
    attribute(attrs, "class").is_some_and(|value| value.split_whitespace().any(|c| c == class))
}

/// Result links go through a `/l/?uddg=<target>` redirect; other site-relative links are chrome.
fn result_target(href: &str) -> Option<String> {
    let href = decode_entities(href);
    let query = href.split_once('?').map_or("", |(_, q)| q);
    let redirect = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("uddg="));
    match redirect {
        Some(encoded) => urlencoding::decode(encoded).ok().map(|d| d.into_owned()),
        None if href.starts_with('/') || href.is_empty() => None,
        None => Some(href),
    }
}

/// Walk the result page's anchors in order. A snippet belongs to the title link before it.
fn scan_results(page: &str, limit: usize) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = Vec::new();
    let mut open = false;

    for anchor in anchors().captures_iter(page) {
        let attrs = &anchor[1];
        if has_class(attrs, "result__a") {
            if hits.len() == limit {
                break;
            }
            open = false;
            let Some(url) = attribute(attrs, "href").and_then(|h| result_target(&h)) else {
                continue;
            };
            hits.push(SearchHit {
                title: inline_text(&anchor[2]),
                url,
                snippet: String::new(),
            });
            open = true;
        } else if open && has_class(attrs, "result__snippet") {
            if let Some(hit) = hits.last_mut() {
                hit.snippet = inline_text(&anchor[2]);
            }
            open = false;
        }
    }

    hits
}
