//! `keyword_search` tool (§6). §1 places the search index itself outside
//! this core as an external collaborator; this just dispatches to
//! whichever `KeywordSearchClient` the node was configured with, and
//! errors clearly when none is wired up rather than silently no-opping.

use super::{ToolContext, ToolOutput};
use crate::error::{ForgeError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Input {
    pub query: String,
    #[serde(default)]
    pub search_terms: Vec<String>,
}

pub async fn run(ctx: &ToolContext, raw_input: serde_json::Value) -> Result<ToolOutput> {
    let input: Input = serde_json::from_value(raw_input).map_err(|e| ForgeError::invalid(e.to_string()))?;
    let Some(client) = ctx.keyword_search.as_ref() else {
        return Err(ForgeError::invalid("no keyword_search collaborator configured"));
    };
    let hits = client.search(&input.query, &input.search_terms).await?;
    Ok(ToolOutput::ok(hits.join("\n")))
}
