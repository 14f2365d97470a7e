//! Anthropic Claude trading agent.
//!
//! Implements the `TradingAgent` trait using the Anthropic Messages
//! API. Decisions are requested as an embedded JSON object which the
//! shared decoder locates and validates; analysis can be returned whole
//! or streamed as SSE deltas.

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

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const ANALYSIS_MAX_TOKENS: u32 = 2048;
const ANALYSIS_TEMPERATURE: f32 = 0.7;
const DECISION_MAX_TOKENS: u32 = 1024;
const DECISION_TEMPERATURE: f32 = 0.3;

/// Decision output format, appended to the system prompt for
/// trade-decision calls only.
const DECISION_FORMAT: &str = r#"

If you decide to execute a trade, respond with a JSON object in this format:
{
  "action": "trade",
  "platform": "solana|polymarket|kalshi",
  "trade_type": "buy|sell|swap",
  "symbol": "symbol/market identifier",
  "amount": 0.0,
  "price": 0.0 (optional),
  "slippage": 0.01,
  "reasoning": "your reasoning"
}

If you decide not to trade, respond with:
{
  "action": "hold",
  "reasoning": "your reasoning"
}
"#;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    system: String,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

pub struct AnthropicAgent {
    http: Client,
    config: AgentConfig,
    api_key: SecretString,
}

impl AnthropicAgent {
    pub fn new(config: AgentConfig) -> Result<Self, SyrupError> {
        let api_key = config.api_key.clone().ok_or(SyrupError::MissingApiKey {
            provider: "Anthropic".to_string(),
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

    fn request(&self, system: &str, user: &str, max_tokens: u32, temperature: f32, stream: bool)
        -> MessagesRequest
    {
        MessagesRequest {
            model: self.config.model.clone(),
            max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
            system: system.to_string(),
            temperature,
            stream: stream.then_some(true),
        }
    }

    /// Single messages call returning the joined text and token usage.
    async fn call_api(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<(String, u32)> {
        let request = self.request(system, user, max_tokens, temperature, false);

        let resp = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error {status}: {body}");
        }

        let body: MessagesResponse = resp
            .json()
            .await
            .context("Failed to parse Anthropic response")?;

        let text = body
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        let tokens = body
            .usage
            .map(|u| u.input_tokens + u.output_tokens)
            .unwrap_or(0);

        Ok((text, tokens))
    }
}

/// Map one SSE payload to its text contribution.
///
/// Anthropic streams typed events; only `content_block_delta` carries
/// text, and `message_stop` terminates the stream.
fn stream_fragment(payload: &str) -> SseFragment {
    let Ok(event) = serde_json::from_str::<serde_json::Value>(payload) else {
        return SseFragment::Skip;
    };
    match event["type"].as_str() {
        Some("content_block_delta") => match event["delta"]["text"].as_str() {
            Some(text) => SseFragment::Text(text.to_string()),
            None => SseFragment::Skip,
        },
        Some("message_stop") => SseFragment::Done,
        _ => SseFragment::Skip,
    }
}

#[async_trait]
impl TradingAgent for AnthropicAgent {
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

        match self
            .call_api(&system, &user, ANALYSIS_MAX_TOKENS, ANALYSIS_TEMPERATURE)
            .await
        {
            Ok((analysis, tokens_used)) => MarketAnalysis::Completed {
                analysis,
                model: self.config.model.clone(),
                tokens_used,
            },
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
        let system = format!("{}{DECISION_FORMAT}", build_system_prompt(&self.config));
        let market_context = build_trade_context(market_data, Some(portfolio), &self.config);
        let user = format!("{market_context}\n\n{context}\n\nShould we execute a trade?");

        let (text, _) = match self
            .call_api(&system, &user, DECISION_MAX_TOKENS, DECISION_TEMPERATURE)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(agent = %self.config.name, error = %e, "Trade decision call failed");
                return None;
            }
        };

        let parsed = decision::parse_decision(&text);
        debug!(agent = %self.config.name, outcome = ?parsed, "Decision decoded");
        parsed.into_request()
    }

    async fn stream_analysis(
        &self,
        market_data: &serde_json::Value,
        context: &str,
    ) -> AnalysisStream {
        let system = build_system_prompt(&self.config);
        let market_context = build_trade_context(market_data, None, &self.config);
        let user = format!("{market_context}\n\n{context}\n\nProvide detailed market analysis.");

        let request = self.request(&system, &user, ANALYSIS_MAX_TOKENS, ANALYSIS_TEMPERATURE, true);

        let resp = match self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
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
            return sse::once(format!("Error: Anthropic API error {status}: {body}"));
        }

        sse::stream_response(resp, stream_fragment)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
