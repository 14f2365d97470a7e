//! OpenAI trading agent.
//!
//! Implements the `TradingAgent` trait over the Chat Completions API.
//! Trade decisions use function calling with the platform enum
//! restricted to the agent's permitted platforms; a plain-text reply
//! means hold.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::sse::{self, AnalysisStream, SseFragment};
use super::{build_system_prompt, build_trade_context, decision, MarketAnalysis, TradingAgent};
use crate::types::{AgentConfig, SyrupError, TradeRequest};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

const ANALYSIS_TEMPERATURE: f32 = 0.7;
const DECISION_TEMPERATURE: f32 = 0.3;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    functions: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    #[allow(dead_code)]
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u32,
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

pub struct OpenAiAgent {
    http: Client,
    config: AgentConfig,
    api_key: SecretString,
}

impl OpenAiAgent {
    pub fn new(config: AgentConfig) -> Result<Self, SyrupError> {
        let api_key = config.api_key.clone().ok_or(SyrupError::MissingApiKey {
            provider: "OpenAI".to_string(),
        })?;

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| SyrupError::Config(e.to_string()))?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    fn chat_request(&self, system: &str, user: &str, temperature: f32) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature,
            stream: None,
            functions: None,
            function_call: None,
        }
    }

    /// Function schema for trade execution, with the platform enum
    /// restricted to this agent's permitted platforms.
    fn trade_function(&self) -> serde_json::Value {
        let platforms: Vec<String> = self
            .config
            .platforms
            .iter()
            .map(|p| p.to_string())
            .collect();

        serde_json::json!({
            "name": "execute_trade",
            "description": "Execute a trade on a supported platform",
            "parameters": {
                "type": "object",
                "properties": {
                    "platform": {
                        "type": "string",
                        "enum": platforms,
                        "description": "Trading platform"
                    },
                    "trade_type": {
                        "type": "string",
                        "enum": ["buy", "sell", "swap"],
                        "description": "Type of trade"
                    },
                    "symbol": {
                        "type": "string",
                        "description": "Trading symbol or market identifier"
                    },
                    "amount": {
                        "type": "number",
                        "description": "Amount to trade"
                    },
                    "price": {
                        "type": "number",
                        "description": "Limit price (optional for market orders)"
                    },
                    "slippage": {
                        "type": "number",
                        "description": "Acceptable slippage (0-1)"
                    },
                    "reasoning": {
                        "type": "string",
                        "description": "Reasoning for this trade"
                    }
                },
                "required": ["platform", "trade_type", "symbol", "amount"]
            }
        })
    }

    async fn call_api(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let resp = self
            .http
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .context("OpenAI request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error {status}: {body}");
        }

        resp.json().await.context("Failed to parse OpenAI response")
    }
}

/// Map one SSE payload to its text contribution.
///
/// OpenAI streams bare chunk objects and terminates with `[DONE]`.
fn stream_fragment(payload: &str) -> SseFragment {
    if payload == "[DONE]" {
        return SseFragment::Done;
    }
    let Ok(chunk) = serde_json::from_str::<serde_json::Value>(payload) else {
        return SseFragment::Skip;
    };
    match chunk["choices"][0]["delta"]["content"].as_str() {
        Some(text) => SseFragment::Text(text.to_string()),
        None => SseFragment::Skip,
    }
}

#[async_trait]
impl TradingAgent for OpenAiAgent {
    fn config(&self) -> &AgentConfig {
        &self.config
    }

    async fn analyze_market(
        &self,
        market_data: &serde_json::Value,
        context: &str,
    ) -> MarketAnalysis {
        let system = build_system_prompt(&self.config);
        let market_context = build_trade_context(market_data, None, &self.config);
        let user = format!("{market_context}\n\n{context}\n\nProvide market analysis and insights.");

        let request = self.chat_request(&system, &user, ANALYSIS_TEMPERATURE);

        match self.call_api(&request).await {
            Ok(body) => {
                let analysis = body
                    .choices
                    .first()
                    .and_then(|c| c.message.as_ref())
                    .and_then(|m| m.content.clone())
                    .unwrap_or_default();
                MarketAnalysis::Completed {
                    analysis,
                    model: self.config.model.clone(),
                    tokens_used: body.usage.map(|u| u.total_tokens).unwrap_or(0),
                }
            }
            Err(e) => {
                warn!(agent = %self.config.name, error = %e, "Market analysis failed");
                MarketAnalysis::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn generate_trade_decision(
        &self,
        market_data: &serde_json::Value,
        portfolio: &serde_json::Value,
        context: &str,
    ) -> Option<TradeRequest> {
        let system = build_system_prompt(&self.config);
        let market_context = build_trade_context(market_data, Some(portfolio), &self.config);
        let user = format!(
            "{market_context}\n\n{context}\n\nShould we execute a trade? If yes, provide trade details."
        );

        let mut request = self.chat_request(&system, &user, DECISION_TEMPERATURE);
        request.functions = Some(vec![self.trade_function()]);
        request.function_call = Some("auto".to_string());

        let body = match self.call_api(&request).await {
            Ok(body) => body,
            Err(e) => {
                warn!(agent = %self.config.name, error = %e, "Trade decision call failed");
                return None;
            }
        };

        let message = body.choices.first().and_then(|c| c.message.as_ref())?;

        // No function call means the model chose to hold.
        let call = message.function_call.as_ref()?;

        let payload: decision::DecisionPayload = match serde_json::from_str(&call.arguments) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(agent = %self.config.name, error = %e, "Undecodable function arguments");
                return None;
            }
        };

        decision::request_from_payload(&payload)
    }

    async fn stream_analysis(
        &self,
        market_data: &serde_json::Value,
        context: &str,
    ) -> AnalysisStream {
        let system = build_system_prompt(&self.config);
        let market_context = build_trade_context(market_data, None, &self.config);
        let user = format!("{market_context}\n\n{context}\n\nProvide detailed market analysis.");

        let mut request = self.chat_request(&system, &user, ANALYSIS_TEMPERATURE);
        request.stream = Some(true);

        let resp = match self
            .http
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return sse::once(format!("Error: {e}")),
        };

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return sse::once(format!("Error: OpenAI API error {status}: {body}"));
        }

        sse::stream_response(resp, stream_fragment)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Platform, TradeType};

    fn config() -> AgentConfig {
        serde_json::from_str(
            r#"{
                "name": "omega",
                "agent_type": "openai",
                "api_key": "test-key",
                "model": "gpt-4-turbo-preview",
                "platforms": ["solana", "polymarket"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_agent_construction() {
        let agent = OpenAiAgent::new(config()).unwrap();
        assert_eq!(agent.config().model, "gpt-4-turbo-preview");
    }

    #[test]
    fn test_agent_requires_api_key() {
        let cfg: AgentConfig =
            serde_json::from_str(r#"{"name": "o", "agent_type": "openai"}"#).unwrap();
        assert!(matches!(
            OpenAiAgent::new(cfg),
            Err(SyrupError::MissingApiKey { .. })
        ));
    }

    #[test]
    fn test_trade_function_restricts_platform_enum() {
        let agent = OpenAiAgent::new(config()).unwrap();
        let function = agent.trade_function();
        assert_eq!(function["name"], "execute_trade");

        let platforms = function["parameters"]["properties"]["platform"]["enum"]
            .as_array()
            .unwrap();
        assert_eq!(platforms.len(), 2);
        assert!(platforms.contains(&serde_json::json!("solana")));
        assert!(platforms.contains(&serde_json::json!("polymarket")));
        assert!(!platforms.contains(&serde_json::json!("kalshi")));

        let required = function["parameters"]["required"].as_array().unwrap();
        assert_eq!(required.len(), 4);
    }

    #[test]
    fn test_chat_request_serialization_omits_optional_fields() {
        let agent = OpenAiAgent::new(config()).unwrap();
        let request = agent.chat_request("sys", "user", 0.7);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("stream").is_none());
        assert!(json.get("functions").is_none());
        assert!(json.get("function_call").is_none());
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[test]
    fn test_function_arguments_decode_into_request() {
        let arguments = r#"{
            "platform": "solana",
            "trade_type": "swap",
            "symbol": "SOL/USDC",
            "amount": 0.25,
            "reasoning": "momentum"
        }"#;
        let payload: decision::DecisionPayload = serde_json::from_str(arguments).unwrap();
        let request = decision::request_from_payload(&payload).unwrap();
        assert_eq!(request.platform, Platform::Solana);
        assert_eq!(request.trade_type, TradeType::Swap);
        assert_eq!(request.metadata.get("reasoning").unwrap(), "momentum");
    }

    #[test]
    fn test_function_arguments_with_unknown_platform_are_discarded() {
        let arguments = r#"{"platform": "nyse", "trade_type": "buy", "symbol": "X", "amount": 1}"#;
        let payload: decision::DecisionPayload = serde_json::from_str(arguments).unwrap();
        assert!(decision::request_from_payload(&payload).is_none());
    }

    #[test]
    fn test_stream_fragment_extracts_delta_content() {
        let payload = r#"{"choices":[{"delta":{"content":"Prices are"}}]}"#;
        match stream_fragment(payload) {
            SseFragment::Text(text) => assert_eq!(text, "Prices are"),
            _ => panic!("expected text fragment"),
        }
    }

    #[test]
    fn test_stream_fragment_done_marker() {
        assert!(matches!(stream_fragment("[DONE]"), SseFragment::Done));
    }

    #[test]
    fn test_stream_fragment_skips_empty_deltas() {
        assert!(matches!(
            stream_fragment(r#"{"choices":[{"delta":{}}]}"#),
            SseFragment::Skip
        ));
        assert!(matches!(stream_fragment("garbage"), SseFragment::Skip));
    }
}
