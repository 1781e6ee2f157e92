pub mod call;
pub mod factory;
pub mod file;
pub mod git;
pub mod http;
pub mod knowledge;
pub mod middleware;
pub mod registry;
pub mod shell;
pub mod traits;
pub mod web;

pub use call::{RawToolCall, ToolCall, ToolCallError, ToolCallInput};
pub use factory::{command_validator, default_registry, default_tools, execution_context};
pub use file::{ListDirectoryTool, ReadFileTool, WriteFileTool};
pub use git::{GitDiffTool, GitLogTool, GitStatusTool};
pub use http::HttpClient;
pub use knowledge::{KnowledgeBase, KnowledgeHit, KnowledgeSearchTool};
pub use middleware::{
    AuditMiddleware, MiddlewareDecision, OutputSizeLimitMiddleware, ToolMiddleware,
    default_middleware_chain,
};
pub use registry::ToolRegistry;
pub use shell::ShellTool;
pub use traits::{ExecutionContext, Tool, ToolArgs, ToolResult, ToolSpec};
pub use web::WebSearchTool;
