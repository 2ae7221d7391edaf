//! `keyword_search` and browser-automation collaborator contracts. Trait
//! stubs only: §1 places search and browser tooling outside this core, so
//! no implementation logic lives here, just the shape a future adapter
//! must satisfy to plug into the tool registry.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait KeywordSearchClient: Send + Sync {
    async fn search(&self, query: &str, search_terms: &[String]) -> Result<Vec<String>>;
}

#[async_trait]
pub trait BrowserAutomationClient: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<String>;
}
