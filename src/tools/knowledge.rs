use super::traits::{ExecutionContext, Tool, ToolArgs, ToolResult, required_str};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

const MAX_KNOWLEDGE_RESULTS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeHit {
    pub id: String,
    pub content: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// External knowledge store (embedding index, document DB, ...).
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<KnowledgeHit>>;
}

pub struct KnowledgeSearchTool {
    knowledge: Arc<dyn KnowledgeBase>,
    default_limit: usize,
}

impl KnowledgeSearchTool {
    pub fn new(knowledge: Arc<dyn KnowledgeBase>, default_limit: usize) -> Self {
        Self {
            knowledge,
            default_limit: default_limit.clamp(1, MAX_KNOWLEDGE_RESULTS),
        }
    }
}

impl Tool for KnowledgeSearchTool {
    fn name(&self) -> &str {
        "knowledge_search"
    }

    fn description(&self) -> &str {
        "Search the project knowledge base for relevant passages"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "What to look for"},
                "limit": {"type": "integer", "description": "Maximum number of passages"}
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
            let query = required_str(&args, "query")?;
            let limit = args
                .get("limit")
                .and_then(Value::as_u64)
                .and_then(|n| usize::try_from(n).ok())
                .map_or(self.default_limit, |n| n.clamp(1, MAX_KNOWLEDGE_RESULTS));

            let mut hits = self.knowledge.search(query, limit).await?;
            hits.truncate(limit);
            Ok(ToolResult::from_value(json!({
                "query": query,
                "count": hits.len(),
                "results": hits,
            })))
        })
    }
}
