use super::traits::{ExecutionContext, Tool, ToolArgs, ToolResult, optional_str, required_str};
use crate::error::SecurityError;
use serde_json::{Map, Value, json};
use std::future::Future;
use std::pin::Pin;

/// Maximum number of entries `list_directory` returns.
const MAX_DIRECTORY_ENTRIES: usize = 1_000;

/// Read a UTF-8 text file from the workspace.
pub struct ReadFileTool;

impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file in the workspace"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path relative to the workspace root"
                }
            },
            "required": ["path"]
        })
    }

    fn execute<'a>(
        &'a self,
        args: ToolArgs,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ToolResult>> + Send + 'a>> {
        Box::pin(async move {
            let path = required_str(&args, "path")?;
            let resolved = match ctx.sandbox.validate_read(path) {
                Ok(resolved) => resolved,
                Err(e) => return Ok(ToolResult::error(e.to_string())),
            };

            let bytes = tokio::fs::read(&resolved).await?;
            let size = bytes.len();
            let Ok(content) = String::from_utf8(bytes) else {
                return Ok(ToolResult::error(
                    SecurityError::BinaryContent { path: resolved }.to_string(),
                ));
            };

            let mut payload = Map::new();
            payload.insert("path".into(), Value::String(ctx.display_path(&resolved)));
            payload.insert("content".into(), Value::String(content));
            payload.insert("size".into(), json!(size));
            Ok(ToolResult::ok(payload))
        })
    }
}

/// Write (or append to) a text file in the workspace.
pub struct WriteFileTool;

impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write text to a file in the workspace, creating parent directories as needed"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path relative to the workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "Text to write"
                },
                "append": {
                    "type": "boolean",
                    "description": "Append instead of overwriting",
                    "default": false
                }
            },
            "required": ["path", "content"]
        })
    }

    fn execute<'a>(
        &'a self,
        args: ToolArgs,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ToolResult>> + Send + 'a>> {
        Box::pin(async move {
            let path = required_str(&args, "path")?;
            let content = required_str(&args, "content")?;
            let append = args.get("append").and_then(Value::as_bool).unwrap_or(false);

            let resolved = match ctx.sandbox.validate_write(path) {
                Ok(resolved) => resolved,
                Err(e) => return Ok(ToolResult::error(e.to_string())),
            };

            if append {
                use tokio::io::AsyncWriteExt;
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&resolved)
                    .await?;
                file.write_all(content.as_bytes()).await?;
                file.flush().await?;
            } else {
                tokio::fs::write(&resolved, content).await?;
            }

            Ok(ToolResult::from_value(json!({
                "path": ctx.display_path(&resolved),
                "bytes_written": content.len(),
                "appended": append,
            })))
        })
    }
}

/// List the entries of a workspace directory.
pub struct ListDirectoryTool;

impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and subdirectories of a workspace directory"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory relative to the workspace root (default: root)"
                }
            }
        })
    }

    fn execute<'a>(
        &'a self,
        args: ToolArgs,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ToolResult>> + Send + 'a>> {
        Box::pin(async move {
            let path = optional_str(&args, "path").unwrap_or(".");
            let resolved = match ctx.sandbox.validate(path) {
                Ok(resolved) => resolved,
                Err(e) => return Ok(ToolResult::error(e.to_string())),
            };
            if !resolved.is_dir() {
                return Ok(ToolResult::error(format!("Not a directory: {path}")));
            }

            let mut entries = Vec::new();
            let mut reader = tokio::fs::read_dir(&resolved).await?;
            while let Some(entry) = reader.next_entry().await? {
                let file_type = entry.file_type().await?;
                let kind = if file_type.is_symlink() {
                    "symlink"
                } else if file_type.is_dir() {
                    "dir"
                } else {
                    "file"
                };
                let size = if file_type.is_file() {
                    entry.metadata().await.map(|m| m.len()).unwrap_or(0)
                } else {
                    0
                };
                entries.push((entry.file_name().to_string_lossy().into_owned(), kind, size));
            }
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let total = entries.len();
            let listed: Vec<Value> = entries
                .into_iter()
                .take(MAX_DIRECTORY_ENTRIES)
                .map(|(name, kind, size)| json!({"name": name, "type": kind, "size": size}))
                .collect();

            Ok(ToolResult::from_value(json!({
                "path": ctx.display_path(&resolved),
                "entries": listed,
                "total": total,
                "truncated": total > MAX_DIRECTORY_ENTRIES,
            })))
        })
    }
}
