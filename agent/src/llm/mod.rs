use crate::tools::{ToolCall, ToolDefinition};
use crate::{Error, Result};
use async_trait::async_trait;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::time::Duration;

mod openai;
pub use openai::OpenAI;

#[derive(Clone, Hash)]
pub enum Message {
    User(String),
    Assistant(String, Vec<ToolCall>),
    System(String),
    Tool {
        id: String,
        name: String,
        result: String,
    },
}

impl Message {
    pub fn digest(&self) -> u64 {
        let mut hasher = std::hash::DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::System(content) => write!(f, "**system**\n\n{}\n\n", content),
            Message::User(content) => write!(f, "**user**\n\n{}\n\n", content),
            Message::Assistant(content, tool_calls) => {
                write!(f, "**assistant**\n\n{}\n\n", content)?;
                for call in tool_calls {
                    write!(f, "{}", call)?;
                }
                Ok(())
            }
            Message::Tool { name, result, .. } => {
                write!(f, "**tool: {}**\n\n{}\n\n", name, result)
            }
        }
    }
}

pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolDefinition],
    pub web_search_tool: bool,
}

pub struct CompletionResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait LLM {
    async fn completion<'a>(&self, request: CompletionRequest<'a>) -> Result<CompletionResponse>;
}

/// Bounds a backend request so a stalled upstream cannot block a fetch
/// forever.
pub(crate) async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::RequestTimeout(deadline)),
    }
}
