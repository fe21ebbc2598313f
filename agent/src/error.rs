use async_openai::error::OpenAIError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Openai error: {0}")]
    OpenaiError(#[from] OpenAIError),

    #[error("No response from llm: {0}")]
    LLMResponseError(String),

    #[error("LLM request timed out after {}s", .0.as_secs())]
    RequestTimeout(std::time::Duration),

    #[error("Tool {0} does not exist")]
    ToolDoesNotExist(String),

    #[error("Missing arg: {0}")]
    MissingArg(String),

    #[error("Agent exceeded turn budget of {0}")]
    TurnBudgetExceeded(usize),

    #[error("Structured output error: {0}")]
    ParseError(String),

    #[error("Search error: {0}")]
    SearchError(String),

    #[error("Http error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}
