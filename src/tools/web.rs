use super::http::HttpClient;
use super::traits::{ExecutionContext, Tool, ToolArgs, ToolResult, required_str};
use crate::error::SecurityError;
use crate::security::RateLimiter;
use serde_json::{Value, json};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.duckduckgo.com/";
const MAX_RESULTS_CAP: usize = 20;

/// Web search against a DuckDuckGo Instant Answer compatible endpoint.
pub struct WebSearchTool {
    http: HttpClient,
    endpoint: String,
    max_results: usize,
    limiter: Arc<RateLimiter>,
}

impl WebSearchTool {
    pub fn new(
        http: HttpClient,
        endpoint: impl Into<String>,
        max_results: usize,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            max_results: max_results.clamp(1, MAX_RESULTS_CAP),
            limiter,
        }
    }
}

impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return titles, URLs and snippets"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results"
                }
            },
            "required": ["query"]
        })
    }

    fn execute<'a>(
        &'a self,
        args: ToolArgs,
        _ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ToolResult>> + Send + 'a>> {
        Box::pin(async move {
            let query = required_str(&args, "query")?.trim();
            if query.is_empty() {
                return Ok(ToolResult::error("query must not be empty"));
            }
            let limit = args
                .get("max_results")
                .and_then(Value::as_u64)
                .and_then(|n| usize::try_from(n).ok())
                .map_or(self.max_results, |n| n.clamp(1, MAX_RESULTS_CAP));

            if let Err(error) = self.limiter.check() {
                return Ok(rate_limited_result(&error));
            }

            let body = self
                .http
                .get_json(
                    &self.endpoint,
                    &[
                        ("q", query),
                        ("format", "json"),
                        ("no_html", "1"),
                        ("skip_disambig", "1"),
                    ],
                )
                .await?;

            let results = extract_results(&body, limit);
            Ok(ToolResult::from_value(json!({
                "query": query,
                "count": results.len(),
                "results": results,
            })))
        })
    }
}

fn rate_limited_result(error: &SecurityError) -> ToolResult {
    let mut result = ToolResult::error(error.to_string());
    if let Some(wait) = error.retry_after() {
        result
            .as_map_mut()
            .insert("retry_after_secs".into(), json!(wait.as_secs_f64()));
    }
    result
}

/// Flatten an Instant Answer payload into `{title, url, snippet}` records.
fn extract_results(body: &Value, limit: usize) -> Vec<Value> {
    let mut results = Vec::new();

    let abstract_text = body["AbstractText"].as_str().unwrap_or_default();
    if !abstract_text.is_empty() {
        results.push(json!({
            "title": body["Heading"].as_str().unwrap_or_default(),
            "url": body["AbstractURL"].as_str().unwrap_or_default(),
            "snippet": abstract_text,
        }));
    }

    let mut stack: Vec<&Value> = body["RelatedTopics"]
        .as_array()
        .map(|topics| topics.iter().rev().collect())
        .unwrap_or_default();
    while let Some(topic) = stack.pop() {
        if results.len() >= limit {
            break;
        }
        // Grouped topics nest their entries under `Topics`
        if let Some(nested) = topic["Topics"].as_array() {
            stack.extend(nested.iter().rev());
            continue;
        }
        let (Some(text), Some(url)) = (topic["Text"].as_str(), topic["FirstURL"].as_str()) else {
            continue;
        };
        let title = text.split(" - ").next().unwrap_or(text);
        results.push(json!({"title": title, "url": url, "snippet": text}));
    }

    results.truncate(limit);
    results
}
