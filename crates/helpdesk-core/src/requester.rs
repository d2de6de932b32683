//! Asks the language model for a triage candidate or a free-form answer.
//!
//! Triage never fails from the caller's point of view: every failure mode
//! collapses to `None`, and the normalizer takes over from there.

use crate::llm::{ChatMessage, CompletionRequest, LlmClient};
use helpdesk_proto::{CategoryProfile, Error, Result, TriageCandidate};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const EMPTY_ANSWER: &str = "I couldn't generate a response.";

/// Docs context is cut to this many characters before entering the prompt.
pub const DOCS_CONTEXT_CHARS: usize = 4000;

const TRIAGE_MAX_TOKENS: u32 = 400;
const ASK_MAX_TOKENS: u32 = 400;

#[derive(Clone)]
pub struct ModelTriageRequester {
    llm: Option<Arc<dyn LlmClient>>,
    profile: CategoryProfile,
    product: String,
    triage_timeout: Duration,
    ask_timeout: Duration,
}

impl ModelTriageRequester {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, profile: CategoryProfile) -> Self {
        Self {
            llm,
            profile,
            product: "our product".to_string(),
            triage_timeout: Duration::from_secs(20),
            ask_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = product.into();
        self
    }

    pub fn with_timeouts(mut self, triage: Duration, ask: Duration) -> Self {
        self.triage_timeout = triage;
        self.ask_timeout = ask;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.llm.is_some()
    }

    /// One structured completion. `None` on any failure.
    pub async fn request_triage(&self, text: &str) -> Option<TriageCandidate> {
        let Some(llm) = &self.llm else {
            debug!("no model configured, skipping model triage");
            return None;
        };

        let request = CompletionRequest {
            messages: vec![ChatMessage::user(format!(
                "Classify the following {} support text. Be concise.\n\nText:\n{text}",
                self.product
            ))],
            temperature: Some(0.1),
            max_tokens: Some(TRIAGE_MAX_TOKENS),
            response_format: Some(triage_response_format(self.profile)),
        };

        let content = match tokio::time::timeout(self.triage_timeout, llm.complete(request)).await {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => {
                warn!(error = %e, "model triage failed, falling back to heuristics");
                return None;
            }
            Err(_) => {
                warn!(
                    secs = self.triage_timeout.as_secs(),
                    "model triage timed out, falling back to heuristics"
                );
                return None;
            }
        };

        match extract_json(&content) {
            Some(value) => Some(TriageCandidate::from_value(&value)),
            None => {
                warn!(len = content.len(), "model triage returned no parseable JSON");
                None
            }
        }
    }

    /// Conversational answer bounded by the ask deadline.
    pub async fn ask(&self, question: &str, docs_context: Option<&str>) -> Result<String> {
        let llm = self
            .llm
            .as_ref()
            .ok_or(Error::MissingConfig("OPENAI_API_KEY"))?;

        let mut system = format!(
            "You are a {} support expert. Be concise and accurate in your response.",
            self.product
        );
        if let Some(docs) = docs_context.map(str::trim).filter(|d| !d.is_empty()) {
            let docs: String = docs.chars().take(DOCS_CONTEXT_CHARS).collect();
            system.push_str("\n\nRelevant documentation:\n");
            system.push_str(&docs);
        }

        let request = CompletionRequest {
            messages: vec![ChatMessage::system(system), ChatMessage::user(question)],
            max_tokens: Some(ASK_MAX_TOKENS),
            ..CompletionRequest::default()
        };

        let answer = tokio::time::timeout(self.ask_timeout, llm.complete(request))
            .await
            .map_err(|_| Error::Timeout {
                service: "openai",
                secs: self.ask_timeout.as_secs(),
            })??;

        if answer.trim().is_empty() {
            Ok(EMPTY_ANSWER.to_string())
        } else {
            Ok(answer)
        }
    }
}

/// Strict JSON-schema response format whose category enum follows the profile.
pub fn triage_response_format(profile: CategoryProfile) -> Value {
    let categories: Vec<&str> = profile.categories().iter().map(|c| c.as_str()).collect();
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "SupportTriage",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "summary": { "type": "string" },
                    "category": { "type": "string", "enum": categories },
                    "severity": { "type": "string", "enum": ["low", "medium", "high", "critical"] },
                    "needs_human": { "type": "boolean" },
                    "suggested_reply": { "type": "string" }
                },
                "required": ["summary", "category", "severity", "needs_human", "suggested_reply"],
                "additionalProperties": false
            }
        }
    })
}

/// Finds a JSON object in model output: the whole text, a fenced block, or
/// the outermost brace span.
pub fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let unfenced = strip_fences(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the language tag line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;
    use helpdesk_proto::Category;

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json(r#"{"a":1}"#), Some(json!({"a": 1})));
        assert_eq!(
            extract_json("```json\n{\"a\":2}\n```"),
            Some(json!({"a": 2}))
        );
        assert_eq!(
            extract_json("Sure! Here it is: {\"a\":{\"b\":3}} hope that helps"),
            Some(json!({"a": {"b": 3}}))
        );
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
        assert_eq!(extract_json(""), None);
    }

    #[test]
    fn test_schema_enum_follows_profile() {
        let format = triage_response_format(CategoryProfile::Api);
        let cats = &format["json_schema"]["schema"]["properties"]["category"]["enum"];
        assert_eq!(cats[0], "api_error");
        assert_eq!(cats.as_array().unwrap().len(), 6);
        assert_eq!(format["json_schema"]["strict"], true);
    }

    #[tokio::test]
    async fn test_request_triage_parses_candidate() {
        let llm = ScriptedLlm::new()
            .reply(r#"{"summary":"Down","category":"bug","severity":"critical","needs_human":true,"suggested_reply":"On it"}"#);
        let requester = ModelTriageRequester::new(Some(Arc::new(llm.clone())), CategoryProfile::Support);
        let candidate = requester.request_triage("site down").await.unwrap();
        assert_eq!(candidate.category.as_deref(), Some(Category::Bug.as_str()));
        assert_eq!(candidate.needs_human, Some(true));

        let sent = llm.requests();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].response_format.is_some());
        assert!(sent[0].messages[0].content.contains("site down"));
    }

    #[tokio::test]
    async fn test_request_triage_failures_yield_none() {
        let requester = ModelTriageRequester::new(None, CategoryProfile::Support);
        assert!(requester.request_triage("x").await.is_none());

        let llm = ScriptedLlm::new().fail("boom").reply("not json at all");
        let requester = ModelTriageRequester::new(Some(Arc::new(llm)), CategoryProfile::Support);
        assert!(requester.request_triage("x").await.is_none());
        assert!(requester.request_triage("x").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_triage_times_out() {
        let llm = ScriptedLlm::new().delay(Duration::from_secs(60)).reply("{}");
        let requester = ModelTriageRequester::new(Some(Arc::new(llm)), CategoryProfile::Api)
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(1));
        assert!(requester.request_triage("x").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_deadline_is_an_error() {
        let llm = ScriptedLlm::new().delay(Duration::from_secs(60)).reply("late");
        let requester = ModelTriageRequester::new(Some(Arc::new(llm)), CategoryProfile::Support)
            .with_timeouts(Duration::from_secs(20), Duration::from_secs(15));
        let err = requester.ask("hello?", None).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { secs: 15, .. }));
    }

    #[tokio::test]
    async fn test_ask_empty_answer_and_docs_context() {
        let llm = ScriptedLlm::new().reply("   ");
        let requester = ModelTriageRequester::new(Some(Arc::new(llm.clone())), CategoryProfile::Support)
            .with_product("Scrapey");
        let docs = "d".repeat(5000);
        let answer = requester.ask("how?", Some(&docs)).await.unwrap();
        assert_eq!(answer, EMPTY_ANSWER);

        let system = &llm.requests()[0].messages[0].content;
        assert!(system.contains("Scrapey support expert"));
        assert!(system.ends_with(&"d".repeat(DOCS_CONTEXT_CHARS)));
        assert!(!system.contains(&"d".repeat(DOCS_CONTEXT_CHARS + 1)));
    }

    #[tokio::test]
    async fn test_ask_without_model_names_key() {
        let requester = ModelTriageRequester::new(None, CategoryProfile::Support);
        let err = requester.ask("hi", None).await.unwrap_err();
        assert!(matches!(err, Error::MissingConfig("OPENAI_API_KEY")));
    }
}
