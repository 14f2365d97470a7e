//! Shared types for the SYRUP trading layer.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that platform, router,
//! and agent modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Supported trading platforms.
///
/// Identity key for adapter registration: at most one live adapter
/// per platform at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Solana,
    Polymarket,
    Kalshi,
}

impl Platform {
    /// All known platforms (useful for iteration).
    pub const ALL: &'static [Platform] =
        &[Platform::Solana, Platform::Polymarket, Platform::Kalshi];
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Solana => write!(f, "solana"),
            Platform::Polymarket => write!(f, "polymarket"),
            Platform::Kalshi => write!(f, "kalshi"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = SyrupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "solana" => Ok(Platform::Solana),
            "polymarket" => Ok(Platform::Polymarket),
            "kalshi" => Ok(Platform::Kalshi),
            _ => Err(SyrupError::UnsupportedPlatform(s.to_string())),
        }
    }
}

/// Trade operation types.
///
/// Venue support is partial: Solana only honors `swap`; the
/// order-driven venues (Polymarket, Kalshi) only honor `buy`/`sell`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    Buy,
    Sell,
    Swap,
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::Buy => write!(f, "buy"),
            TradeType::Sell => write!(f, "sell"),
            TradeType::Swap => write!(f, "swap"),
        }
    }
}

impl std::str::FromStr for TradeType {
    type Err = SyrupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(TradeType::Buy),
            "sell" => Ok(TradeType::Sell),
            "swap" => Ok(TradeType::Swap),
            _ => Err(SyrupError::UnknownTradeType(s.to_string())),
        }
    }
}

/// Trade execution status.
///
/// The synchronous execute path only ever produces `Completed` or
/// `Failed`; the remaining states are observable through the
/// order-status / cancel path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::Pending => write!(f, "pending"),
            TradeStatus::Executing => write!(f, "executing"),
            TradeStatus::Completed => write!(f, "completed"),
            TradeStatus::Failed => write!(f, "failed"),
            TradeStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// AI agent provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentProvider {
    OpenAi,
    Anthropic,
    Custom,
}

impl fmt::Display for AgentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentProvider::OpenAi => write!(f, "openai"),
            AgentProvider::Anthropic => write!(f, "anthropic"),
            AgentProvider::Custom => write!(f, "custom"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trade request & result
// ---------------------------------------------------------------------------

fn default_slippage() -> f64 {
    0.01
}

/// Trade request from an agent or a direct API caller.
///
/// Immutable once constructed; never mutated after dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    pub platform: Platform,
    pub trade_type: TradeType,
    /// Symbol or market identifier (e.g. "SOL/USDC", a market ticker).
    pub symbol: String,
    pub amount: f64,
    /// Limit price. Absence implies a market order.
    #[serde(default)]
    pub price: Option<f64>,
    /// Acceptable slippage fraction in [0, 1].
    #[serde(default = "default_slippage")]
    pub slippage: f64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl fmt::Display for TradeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} x{:.4}",
            self.platform, self.trade_type, self.symbol, self.amount,
        )?;
        if let Some(price) = self.price {
            write!(f, " @ {price:.4}")?;
        }
        Ok(())
    }
}

/// Result of a single trade execution.
///
/// One result is produced per execute call and never updated in
/// place — a later status check yields a new observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeResult {
    pub trade_id: String,
    pub platform: Platform,
    pub status: TradeStatus,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub executed_amount: Option<f64>,
    #[serde(default)]
    pub executed_price: Option<f64>,
    #[serde(default)]
    pub fee: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl TradeResult {
    /// Build a failed result carrying a human-readable error.
    pub fn failure(platform: Platform, error: impl Into<String>) -> Self {
        Self {
            trade_id: String::new(),
            platform,
            status: TradeStatus::Failed,
            transaction_hash: None,
            executed_amount: None,
            executed_price: None,
            fee: None,
            timestamp: Utc::now(),
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }

    /// Build a completed result; optional fill details are set by the
    /// adapter via struct update.
    pub fn completed(trade_id: impl Into<String>, platform: Platform) -> Self {
        Self {
            trade_id: trade_id.into(),
            platform,
            status: TradeStatus::Completed,
            transaction_hash: None,
            executed_amount: None,
            executed_price: None,
            fee: None,
            timestamp: Utc::now(),
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Whether the trade ended in a terminal success state.
    pub fn is_completed(&self) -> bool {
        self.status == TradeStatus::Completed
    }
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(err) => write!(f, "[{}] {} — {}", self.platform, self.status, err),
            None => write!(
                f,
                "[{}] {} {} amt={:.4} price={:.4}",
                self.platform,
                self.status,
                self.trade_id,
                self.executed_amount.unwrap_or(0.0),
                self.executed_price.unwrap_or(0.0),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials & agent configuration
// ---------------------------------------------------------------------------

/// Credentials for a specific platform.
///
/// Opaque to the router; consumed only by the matching adapter at
/// construction time. Secret-bearing fields are wrapped so they never
/// appear in Debug or log output.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformCredentials {
    pub platform: Platform,
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub secret: Option<SecretString>,
    #[serde(default)]
    pub private_key: Option<SecretString>,
    #[serde(default)]
    pub passphrase: Option<SecretString>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PlatformCredentials {
    /// Bare credentials for a platform, all optional fields empty.
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            rpc_url: None,
            api_key: None,
            secret: None,
            private_key: None,
            passphrase: None,
            wallet_address: None,
            metadata: HashMap::new(),
        }
    }
}

fn default_model() -> String {
    "gpt-4-turbo-preview".to_string()
}

fn default_system_prompt() -> String {
    "You are a trading agent.".to_string()
}

fn default_max_position_size() -> f64 {
    1000.0
}

fn default_risk_limit() -> f64 {
    0.1
}

/// Configuration for an AI trading agent.
///
/// Immutable after creation; `name` is the unique registry key.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub agent_type: AgentProvider,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_max_position_size")]
    pub max_position_size: f64,
    #[serde(default = "default_risk_limit")]
    pub risk_limit: f64,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Construction-time error types for SYRUP.
///
/// These are the only errors that ever surface as language-level
/// faults; everything after successful construction reports failure
/// through `TradeResult` or sentinel values.
#[derive(Debug, thiserror::Error)]
pub enum SyrupError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Unknown trade type: {0}")]
    UnknownTradeType(String),

    #[error("Unsupported agent type: {0}")]
    UnsupportedAgent(String),

    #[error("Invalid credentials for {platform}: {message}")]
    InvalidCredentials { platform: Platform, message: String },

    #[error("{provider} API key is required")]
    MissingApiKey { provider: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
