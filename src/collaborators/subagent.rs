//! `subagent` tool (§6): dispatches a nested prompt through a
//! `ModelClient` and returns the response as tool-use/tool-result content
//! items rather than flattened text, since the caller may chain further
//! tool calls off the sub-agent's reply.

use super::model::{ContentItem, Message, ModelClient, ModelRequest};
use crate::error::Result;
use std::sync::Arc;

pub struct SubagentTool {
    model: Arc<dyn ModelClient>,
}

impl SubagentTool {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }

    pub async fn run(&self, slug: &str, prompt: &str) -> Result<Vec<ContentItem>> {
        let request = ModelRequest {
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            system: vec![format!("You are the '{slug}' sub-agent.")],
            ..Default::default()
        };
        let response = self.model.do_completion(request).await?;
        Ok(response.content)
    }
}
