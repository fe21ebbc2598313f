use crate::category::{Category, Descriptor, RetryPolicy};
use crate::store::RecordStore;
use crate::{Error, Result};
use agent::callbacks::MessageLogger;
use agent::llm::{LLM, Message};
use agent::structured::ResponseFormat;
use agent::tools::{FunctionalTool, TavilySearch, ToolCall, ToolDefinition};
use agent::{AgentBuilder, StopCondition};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const MAX_TURNS: usize = 15;

/// Outcome of one category fetch. Parse failures, tool failures, and upstream
/// errors all fold into `Failed`; no partial field maps escape.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(serde_json::Map<String, serde_json::Value>),
    Failed { reason: String, rate_limited: bool },
}

/// One agent parametrized by a category descriptor, replacing the three
/// near-identical per-category bots.
pub struct CategoryAgent {
    llm: Arc<dyn LLM + Send + Sync>,
    store: Arc<Mutex<RecordStore>>,
    tavily_key: String,
    log_dir: Option<PathBuf>,
}

impl CategoryAgent {
    pub fn new(
        llm: Arc<dyn LLM + Send + Sync>,
        store: Arc<Mutex<RecordStore>>,
        tavily_key: String,
        log_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            llm,
            store,
            tavily_key,
            log_dir,
        }
    }

    pub async fn fetch(&self, satellite_name: &str, category: Category) -> FetchOutcome {
        let descriptor = category.descriptor();

        let result = match descriptor.retry {
            Some(policy) => {
                self.attempt_with_retry(satellite_name, category, &descriptor, policy)
                    .await
            }
            None => self.attempt(satellite_name, category, &descriptor).await,
        };

        match result {
            Ok(data) => {
                tracing::info!(satellite = satellite_name, %category, "fetch succeeded");
                FetchOutcome::Fetched(data)
            }
            Err(err) => {
                let mut reason = format!(
                    "error processing satellite {} ({}): {}",
                    satellite_name, category, err
                );
                let rate_limited = is_rate_limited(&reason);
                if rate_limited {
                    reason.push_str("; API rate limit reached, try again in a few minutes");
                }
                tracing::error!(satellite = satellite_name, %category, rate_limited, "{reason}");
                FetchOutcome::Failed {
                    reason,
                    rate_limited,
                }
            }
        }
    }

    async fn attempt_with_retry(
        &self,
        satellite_name: &str,
        category: Category,
        descriptor: &Descriptor,
        policy: RetryPolicy,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        let mut delay = policy.base;

        for attempt in 1..=policy.attempts {
            match self.attempt(satellite_name, category, descriptor).await {
                Ok(data) => return Ok(data),
                Err(err) if attempt < policy.attempts => {
                    tracing::warn!(
                        satellite = satellite_name,
                        %category,
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "fetch attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, policy.cap);
                }
                Err(err) => return Err(err),
            }
        }

        unreachable!("retry loop returns on the last attempt")
    }

    async fn attempt(
        &self,
        satellite_name: &str,
        category: Category,
        descriptor: &Descriptor,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        let format = ResponseFormat::new(descriptor.fields.clone());

        let mut builder = AgentBuilder::new()
            .llm(self.llm.clone())
            .system_prompt(system_prompt(descriptor))
            .user_prompt(user_prompt(satellite_name, &format))
            .tool(TavilySearch::new(self.tavily_key.clone()))
            .tool(Box::new(StoreLookup::new(self.store.clone())))
            .stop_condition(Box::new(FinalAnswer))
            .max_turns(MAX_TURNS);

        if descriptor.provider_web_search {
            builder = builder.llm_websearch();
        }

        if let Some(dir) = &self.log_dir {
            let file = std::fs::File::create(
                dir.join(format!("{}_{}.md", file_stem(satellite_name), category)),
            )?;
            builder = builder.callback(MessageLogger::new(
                &format!("{}: {}", category, satellite_name),
                file,
            )?);
        }

        let history = builder.build()?.run().await?;
        let answer = final_answer(&history)?;

        let mut data = format.parse(answer).map_err(Error::from)?;
        data.insert(
            "satellite_name".to_string(),
            serde_json::Value::String(satellite_name.to_string()),
        );

        Ok(data)
    }
}

/// Done once the model answers without requesting any tool.
struct FinalAnswer;

impl StopCondition for FinalAnswer {
    fn done(&self, history: &[Message]) -> bool {
        matches!(
            history.last(),
            Some(Message::Assistant(content, tool_calls))
                if tool_calls.is_empty() && !content.is_empty()
        )
    }
}

fn final_answer(history: &[Message]) -> Result<&str> {
    match history.last() {
        Some(Message::Assistant(content, _)) => Ok(content),
        _ => Err(Error::Agent(agent::Error::LLMResponseError(
            "agent stopped without a final assistant message".to_string(),
        ))),
    }
}

fn system_prompt(descriptor: &Descriptor) -> String {
    let mut tools = String::from(
        "1. tavily_search - For getting information from the web\n\
         2. satellite_records - For getting previously stored satellite data\n",
    );
    if descriptor.provider_web_search {
        tools.push_str("3. web search - The model provider's built-in web search\n");
    }

    format!(
        "You are a {} who can search and analyze satellite information using available tools.\n\
         You need to find {}.\n\n\
         Available tools:\n\
         {}\n\
         IMPORTANT: Do not attempt to use any tools that are not listed above. \
         If a tool is not available, do not try to use it.",
        descriptor.expertise, descriptor.goal, tools
    )
}

fn user_prompt(satellite_name: &str, format: &ResponseFormat) -> String {
    format!(
        "Take the input below delimited by triple backticks and use it to search and analyze \
         using the available tools.\n\
         Input: ```{}```\n\n\
         {}\n\n\
         Make sure to:\n\
         1. Use the available tools (tavily_search) to find accurate information\n\
         2. Include URLs for all source information\n\
         3. Format the output exactly as specified in the format instructions\n\
         4. Provide detailed and specific information\n\
         5. Use reliable sources for all information",
        satellite_name,
        format.format_instructions()
    )
}

fn is_rate_limited(reason: &str) -> bool {
    let lower = reason.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("resource has been exhausted")
        || lower.contains("too many requests")
        || lower.contains("429")
}

fn file_stem(satellite_name: &str) -> String {
    satellite_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Exposes already-stored records to the model, the way the original bots
/// attached their data manager as a tool.
struct StoreLookup {
    store: Arc<Mutex<RecordStore>>,
}

#[derive(Deserialize, JsonSchema)]
struct StoreLookupArgs {
    /// Name of the satellite to look up.
    satellite_name: String,
    /// One of basic_info, technical_specs, launch_cost_info.
    category: String,
}

impl StoreLookup {
    fn new(store: Arc<Mutex<RecordStore>>) -> Self {
        Self { store }
    }

    fn lookup(&self, satellite_name: &str, category: &str) -> String {
        let category: Category = match category.parse() {
            Ok(category) => category,
            Err(err) => return err.to_string(),
        };

        match self.store.lock().unwrap().get(satellite_name, category) {
            Some(record) => serde_json::to_string_pretty(&record.data)
                .unwrap_or_else(|err| format!("failed to render stored record: {}", err)),
            None => format!(
                "no stored {} record for satellite {}",
                category, satellite_name
            ),
        }
    }
}

#[async_trait]
impl FunctionalTool for StoreLookup {
    fn definition(&self) -> agent::Result<ToolDefinition> {
        ToolDefinition::new::<StoreLookupArgs>(
            "satellite_records",
            "get previously stored satellite data for a satellite name and category",
        )
    }

    async fn invoke_fn(&mut self, call: &ToolCall) -> agent::Result<Message> {
        let args: StoreLookupArgs = call.args()?;
        Ok(Message::Tool {
            id: call.id.clone(),
            name: "satellite_records".to_string(),
            result: self.lookup(&args.satellite_name, &args.category),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent::llm::{CompletionRequest, CompletionResponse};
    use serde_json::json;

    fn basic_info_answer() -> String {
        let body = json!({
            "altitude": "540",
            "altitude_source": "http://x",
            "orbital_life_years": "30",
            "orbital_life_source": "http://x",
            "launch_orbit_classification": "LEO",
            "orbit_classification_source": "http://x",
            "number_of_payloads": "5",
            "payloads_source": "http://x",
        });
        format!("```json\n{}\n```", body)
    }

    /// Fails `failures` times, then answers with the canned payload.
    struct FlakyLLM {
        answer: String,
        failures: u32,
        calls: Mutex<u32>,
    }

    impl FlakyLLM {
        fn new(answer: String, failures: u32) -> Arc<Self> {
            Arc::new(Self {
                answer,
                failures,
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LLM for FlakyLLM {
        async fn completion<'a>(
            &self,
            _: CompletionRequest<'a>,
        ) -> agent::Result<CompletionResponse> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls <= self.failures {
                return Err(agent::Error::LLMResponseError(
                    "429 Too Many Requests".to_string(),
                ));
            }
            Ok(CompletionResponse {
                content: self.answer.clone(),
                tool_calls: vec![],
            })
        }
    }

    fn test_agent(llm: Arc<dyn LLM + Send + Sync>, dir: &std::path::Path) -> CategoryAgent {
        let store = Arc::new(Mutex::new(
            RecordStore::open(dir.join("satellite_data.json")).unwrap(),
        ));
        CategoryAgent::new(llm, store, "test-key".to_string(), None)
    }

    #[tokio::test]
    async fn test_fetch_parses_and_tags_satellite_name() {
        let dir = tempfile::tempdir().unwrap();
        let llm = FlakyLLM::new(basic_info_answer(), 0);
        let agent = test_agent(llm.clone(), dir.path());

        match agent.fetch("Hubble", Category::BasicInfo).await {
            FetchOutcome::Fetched(data) => {
                assert_eq!(data["altitude"], "540");
                assert_eq!(data["satellite_name"], "Hubble");
                assert_eq!(data.len(), 9);
            }
            other => panic!("expected fetch to succeed, got {:?}", other),
        }
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_basic_info_retries_through_rate_limits() {
        let dir = tempfile::tempdir().unwrap();
        let llm = FlakyLLM::new(basic_info_answer(), 2);
        let agent = test_agent(llm.clone(), dir.path());

        match agent.fetch("Hubble", Category::BasicInfo).await {
            FetchOutcome::Fetched(data) => assert_eq!(data["satellite_name"], "Hubble"),
            other => panic!("expected retries to recover, got {:?}", other),
        }
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_basic_info_gives_up_after_three_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let llm = FlakyLLM::new(basic_info_answer(), 10);
        let agent = test_agent(llm.clone(), dir.path());

        match agent.fetch("Hubble", Category::BasicInfo).await {
            FetchOutcome::Failed { rate_limited, .. } => assert!(rate_limited),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn test_other_categories_fail_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let llm = FlakyLLM::new(String::new(), 10);
        let agent = test_agent(llm.clone(), dir.path());

        match agent.fetch("Hubble", Category::TechnicalSpecs).await {
            FetchOutcome::Failed {
                reason,
                rate_limited,
            } => {
                assert!(rate_limited);
                assert!(reason.contains("try again in a few minutes"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_a_fetch_failure() {
        let dir = tempfile::tempdir().unwrap();
        // answers, but with a field missing from the schema
        let llm = FlakyLLM::new(
            "```json\n{\"altitude\": \"540\"}\n```".to_string(),
            0,
        );
        let agent = test_agent(llm, dir.path());

        match agent.fetch("Hubble", Category::BasicInfo).await {
            FetchOutcome::Failed {
                reason,
                rate_limited,
            } => {
                assert!(!rate_limited);
                assert!(reason.contains("altitude_source"));
            }
            other => panic!("expected parse failure, got {:?}", other),
        }
    }

    #[test]
    fn test_store_lookup_renders_stored_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Mutex::new(
            RecordStore::open(dir.path().join("satellite_data.json")).unwrap(),
        ));

        let mut data = serde_json::Map::new();
        data.insert("altitude".to_string(), json!("540"));
        store
            .lock()
            .unwrap()
            .append("Hubble", Category::BasicInfo, data)
            .unwrap();

        let lookup = StoreLookup::new(store);
        assert!(lookup.lookup("Hubble", "basic_info").contains("540"));
        assert!(
            lookup
                .lookup("Voyager", "basic_info")
                .contains("no stored basic_info record")
        );
        assert!(lookup.lookup("Hubble", "bogus").contains("Unknown category"));
    }

    #[test]
    fn test_prompt_allow_list_matches_tool_surface() {
        let basic = system_prompt(&Category::BasicInfo.descriptor());
        assert!(basic.contains("tavily_search"));
        assert!(basic.contains("satellite_records"));
        assert!(basic.contains("built-in web search"));

        let tech = system_prompt(&Category::TechnicalSpecs.descriptor());
        assert!(tech.contains("tavily_search"));
        assert!(!tech.contains("built-in web search"));
    }

    #[test]
    fn test_rate_limit_detection() {
        assert!(is_rate_limited("Resource has been exhausted"));
        assert!(is_rate_limited("HTTP 429"));
        assert!(is_rate_limited("upstream rate limit hit"));
        assert!(!is_rate_limited("connection refused"));
    }
}
