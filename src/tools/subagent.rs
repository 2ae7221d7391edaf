//! `subagent` tool (§6): runs a nested prompt through a named sub-agent
//! slug and surfaces the raw content items back to the caller.

use super::{ToolContent, ToolContext, ToolOutput};
use crate::collaborators::model::ContentItem;
use crate::error::{ForgeError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Input {
    pub slug: String,
    pub prompt: String,
}

fn render_items(items: Vec<ContentItem>) -> Vec<ToolContent> {
    items
        .into_iter()
        .map(|item| match item {
            ContentItem::Text { text } => ToolContent::text(text),
            ContentItem::ToolUse { id, name, input } => {
                ToolContent::text(format!("[tool_use {id} {name}: {input}]"))
            }
        })
        .collect()
}

pub async fn run(ctx: &ToolContext, raw_input: serde_json::Value) -> Result<ToolOutput> {
    let input: Input = serde_json::from_value(raw_input).map_err(|e| ForgeError::invalid(e.to_string()))?;
    let items = ctx.subagent.run(&input.slug, &input.prompt).await?;
    Ok(ToolOutput {
        content: render_items(items),
        display: None,
        is_error: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_items_flattens_text_content() {
        let out = render_items(vec![ContentItem::Text { text: "hello".to_string() }]);
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], ToolContent::Text { text } if text == "hello"));
    }

    #[test]
    fn render_items_summarizes_tool_use() {
        let out = render_items(vec![ContentItem::ToolUse {
            id: "1".to_string(),
            name: "read_file".to_string(),
            input: serde_json::json!({"path": "x"}),
        }]);
        assert!(matches!(&out[0], ToolContent::Text { text } if text.starts_with("[tool_use 1 read_file")));
    }
}
