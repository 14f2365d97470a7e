//! AI trading agents.
//!
//! Defines the `TradingAgent` trait and provides implementations for
//! OpenAI (Chat Completions with function calling) and Anthropic
//! (Messages API with an embedded-JSON decision format).

pub mod decision;
pub mod sse;
pub mod anthropic;
pub mod openai;

use async_trait::async_trait;
use serde::Serialize;

use crate::types::{AgentConfig, AgentProvider, SyrupError, TradeRequest};

pub use sse::AnalysisStream;

/// Result of a market analysis call.
///
/// A tagged success/failure value rather than a fallible return — the
/// analyze path never raises past the agent boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MarketAnalysis {
    Completed {
        analysis: String,
        model: String,
        tokens_used: u32,
    },
    Failed {
        error: String,
    },
}

/// Abstraction over AI trading agents.
///
/// Implementors turn market/portfolio context into analysis text, a
/// validated trade decision, or a stream of text fragments, by
/// delegating to a generative-model capability.
#[async_trait]
pub trait TradingAgent: Send + Sync {
    fn config(&self) -> &AgentConfig;

    /// Analyze market data and return insights. Never raises; failures
    /// arrive as `MarketAnalysis::Failed`.
    async fn analyze_market(&self, market_data: &serde_json::Value, context: &str)
        -> MarketAnalysis;

    /// Generate a trade decision. `None` means hold — whether explicit,
    /// undecodable, or a provider failure.
    async fn generate_trade_decision(
        &self,
        market_data: &serde_json::Value,
        portfolio: &serde_json::Value,
        context: &str,
    ) -> Option<TradeRequest>;

    /// Stream analysis as it is generated. The stream never errors;
    /// failures arrive as one final "Error: ..." fragment.
    async fn stream_analysis(&self, market_data: &serde_json::Value, context: &str)
        -> AnalysisStream;
}

/// Construct the agent matching `config.agent_type`.
pub fn build_agent(config: AgentConfig) -> Result<Box<dyn TradingAgent>, SyrupError> {
    match config.agent_type {
        AgentProvider::OpenAi => Ok(Box::new(openai::OpenAiAgent::new(config)?)),
        AgentProvider::Anthropic => Ok(Box::new(anthropic::AnthropicAgent::new(config)?)),
        AgentProvider::Custom => Err(SyrupError::UnsupportedAgent("custom".to_string())),
    }
}

// ---------------------------------------------------------------------------
// Shared prompt construction
// ---------------------------------------------------------------------------

const TRADING_GUIDELINES: &str = "\n\nTrading Guidelines:\n\
- Always consider risk management and position sizing\n\
- Analyze market conditions before making decisions\n\
- Consider slippage and fees in trade calculations\n\
- Never exceed maximum position size or risk limits\n\
- Provide clear reasoning for each trade decision\n\n\
Available Platforms: ";

/// Base prompt + fixed trading guidelines + permitted platforms, so
/// model behavior is consistently constrained across providers.
pub fn build_system_prompt(config: &AgentConfig) -> String {
    let platforms = config
        .platforms
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}{}{}", config.system_prompt, TRADING_GUIDELINES, platforms)
}

/// Render market data (and optionally portfolio) plus the agent's
/// operating envelope into the user-facing context block.
pub fn build_trade_context(
    market_data: &serde_json::Value,
    portfolio: Option<&serde_json::Value>,
    config: &AgentConfig,
) -> String {
    let mut parts = vec!["Market Data:".to_string()];
    append_entries(&mut parts, market_data);

    if let Some(portfolio) = portfolio {
        parts.push("\nPortfolio:".to_string());
        append_entries(&mut parts, portfolio);
    }

    parts.push(format!("\nMax Position Size: {}", config.max_position_size));
    parts.push(format!("Risk Limit: {}%", config.risk_limit * 100.0));

    parts.join("\n")
}

fn append_entries(parts: &mut Vec<String>, data: &serde_json::Value) {
    match data.as_object() {
        Some(map) => {
            for (key, value) in map {
                parts.push(format!("- {key}: {}", fmt_value(value)));
            }
        }
        None if !data.is_null() => parts.push(format!("- {}", fmt_value(data))),
        None => {}
    }
}

/// Strings render unquoted; everything else as compact JSON.
fn fmt_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
