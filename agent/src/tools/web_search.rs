use crate::llm::Message;
use crate::tools::{FunctionalTool, ToolCall, ToolDefinition};
use crate::{Error, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";
const MAX_RESULTS: usize = 5;

/// Web search backed by the Tavily search API.
pub struct TavilySearch {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    title: String,
    url: String,
    content: String,
}

#[derive(Deserialize, JsonSchema)]
struct SearchArgs {
    /// The search query.
    query: String,
}

impl TavilySearch {
    pub fn new(api_key: String) -> Box<Self> {
        Box::new(Self {
            api_key,
            client: reqwest::Client::new(),
        })
    }

    async fn search(&self, query: &str) -> Result<String> {
        let response = self
            .client
            .post(TAVILY_ENDPOINT)
            .timeout(Duration::from_secs(60))
            .json(&SearchRequest {
                api_key: &self.api_key,
                query,
                max_results: MAX_RESULTS,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::SearchError(format!(
                "tavily returned status {} for query `{}`",
                response.status(),
                query
            )));
        }

        let response: SearchResponse = response.json().await?;

        if response.results.is_empty() {
            return Ok(format!("No search results for `{}`", query));
        }

        let mut s = format!("Search results for `{}`:\n", query);
        for result in &response.results {
            s.push_str(&format!(
                "- {} ({})\n  {}\n",
                result.title, result.url, result.content
            ));
        }
        Ok(s)
    }
}

#[async_trait]
impl FunctionalTool for TavilySearch {
    fn definition(&self) -> Result<ToolDefinition> {
        ToolDefinition::new::<SearchArgs>(
            "tavily_search",
            "search the web for information, returns result snippets with source URLs",
        )
    }

    async fn invoke_fn(&mut self, call: &ToolCall) -> Result<Message> {
        let args: SearchArgs = call.args()?;

        tracing::debug!(query = %args.query, "tavily search");

        Ok(Message::Tool {
            id: call.id.clone(),
            name: "tavily_search".to_string(),
            result: self.search(&args.query).await?,
        })
    }
}
