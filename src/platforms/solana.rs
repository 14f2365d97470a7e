//! Solana integration.
//!
//! Swaps are routed through the Jupiter aggregator; balances and
//! transaction lookups go to a Solana JSON-RPC endpoint.
//!
//! Quote API: https://quote-api.jup.ag/v6
//! Price API: https://price.jup.ag/v4
//!
//! The venue only supports `swap` — buy/sell orders have no meaning on
//! an AMM aggregator. Settled transactions cannot be cancelled.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::platforms::PlatformAdapter;
use crate::types::{Platform, PlatformCredentials, SyrupError, TradeRequest, TradeResult, TradeType};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
const JUPITER_QUOTE_URL: &str = "https://quote-api.jup.ag/v6";
const JUPITER_PRICE_URL: &str = "https://price.jup.ag/v4";
const PLATFORM_NAME: &str = "solana";

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Well-known SPL mints the adapter can route between.
fn token_info(ticker: &str) -> Option<(&'static str, u32)> {
    match ticker.to_uppercase().as_str() {
        "SOL" => Some(("So11111111111111111111111111111111111111112", 9)),
        "USDC" => Some(("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", 6)),
        "USDT" => Some(("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", 6)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Swap transport
// ---------------------------------------------------------------------------

/// A quote for a single swap, in human-readable units.
#[derive(Debug, Clone)]
pub struct SwapQuote {
    /// Output units per input unit.
    pub price: f64,
    /// Aggregator fee in input units.
    pub fee: f64,
    /// Raw quote payload, resubmitted verbatim to the swap endpoint.
    pub raw: serde_json::Value,
}

/// Network seam for the Solana adapter.
///
/// The production implementation talks to Jupiter and a JSON-RPC node;
/// tests substitute a counting double.
#[async_trait]
pub trait SwapTransport: Send + Sync {
    async fn get_quote(&self, symbol: &str, amount: f64, slippage: f64) -> Result<SwapQuote>;

    /// Submit the swap for the quoted route. Returns the transaction
    /// signature.
    async fn execute_swap(&self, quote: &SwapQuote, wallet_address: &str) -> Result<String>;

    /// Wallet balance in lamports.
    async fn get_lamports(&self, wallet_address: &str) -> Result<u64>;

    /// Slot of a confirmed transaction, or None if not found.
    async fn get_transaction_slot(&self, signature: &str) -> Result<Option<u64>>;

    async fn get_price(&self, symbol: &str) -> Result<f64>;
}

// ---------------------------------------------------------------------------
// Jupiter HTTP transport
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(rename = "inAmount")]
    in_amount: String,
    #[serde(rename = "outAmount")]
    out_amount: String,
    #[serde(rename = "platformFee", default)]
    platform_fee: Option<PlatformFee>,
}

#[derive(Debug, Deserialize)]
struct PlatformFee {
    #[serde(default)]
    amount: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SwapResponse {
    #[serde(rename = "swapTransaction")]
    swap_transaction: String,
}

/// Production transport: Jupiter quote/swap APIs + Solana JSON-RPC.
pub struct JupiterTransport {
    http: Client,
    rpc_url: String,
}

impl JupiterTransport {
    pub fn new(rpc_url: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build Solana HTTP client")?;
        Ok(Self { http, rpc_url })
    }

    /// Single JSON-RPC call against the configured node.
    async fn rpc(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Solana RPC {method} request failed"))?;

        let value: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse Solana RPC {method} response"))?;

        if let Some(err) = value.get("error") {
            anyhow::bail!("Solana RPC {method} error: {err}");
        }
        Ok(value["result"].clone())
    }

    /// Resolve a "BASE/QUOTE" pair into mint addresses and decimals.
    fn resolve_pair(symbol: &str) -> Result<((&'static str, u32), (&'static str, u32))> {
        let (base, quote) = symbol
            .split_once('/')
            .with_context(|| format!("Expected BASE/QUOTE symbol, got: {symbol}"))?;
        let input = token_info(base).with_context(|| format!("Unknown token: {base}"))?;
        let output = token_info(quote).with_context(|| format!("Unknown token: {quote}"))?;
        Ok((input, output))
    }
}

#[async_trait]
impl SwapTransport for JupiterTransport {
    async fn get_quote(&self, symbol: &str, amount: f64, slippage: f64) -> Result<SwapQuote> {
        let ((input_mint, input_decimals), (output_mint, output_decimals)) =
            Self::resolve_pair(symbol)?;

        let amount_raw = (amount * 10f64.powi(input_decimals as i32)).round() as u64;
        let slippage_bps = (slippage * 10_000.0).round() as u64;

        debug!(symbol, amount, slippage_bps, "Requesting Jupiter quote");

        let resp = self
            .http
            .get(format!("{JUPITER_QUOTE_URL}/quote"))
            .query(&[
                ("inputMint", input_mint),
                ("outputMint", output_mint),
                ("amount", &amount_raw.to_string()),
                ("slippageBps", &slippage_bps.to_string()),
            ])
            .send()
            .await
            .context("Jupiter quote request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Jupiter quote error {status}: {body}");
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .context("Failed to parse Jupiter quote response")?;
        let quote: QuoteResponse = serde_json::from_value(raw.clone())
            .context("Unexpected Jupiter quote shape")?;

        let in_ui = quote.in_amount.parse::<f64>().unwrap_or(0.0)
            / 10f64.powi(input_decimals as i32);
        let out_ui = quote.out_amount.parse::<f64>().unwrap_or(0.0)
            / 10f64.powi(output_decimals as i32);
        if in_ui <= 0.0 {
            anyhow::bail!("Jupiter quote returned zero input amount");
        }

        let fee = quote
            .platform_fee
            .and_then(|f| f.amount)
            .and_then(|a| a.parse::<f64>().ok())
            .map(|raw_fee| raw_fee / 10f64.powi(input_decimals as i32))
            .unwrap_or(0.0);

        Ok(SwapQuote {
            price: out_ui / in_ui,
            fee,
            raw,
        })
    }

    async fn execute_swap(&self, quote: &SwapQuote, wallet_address: &str) -> Result<String> {
        // The swap endpoint builds the transaction for the quoted route;
        // the node rejects it unless signed by `wallet_address`.
        let resp = self
            .http
            .post(format!("{JUPITER_QUOTE_URL}/swap"))
            .json(&serde_json::json!({
                "quoteResponse": quote.raw,
                "userPublicKey": wallet_address,
            }))
            .send()
            .await
            .context("Jupiter swap request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Jupiter swap error {status}: {body}");
        }

        let swap: SwapResponse = resp
            .json()
            .await
            .context("Failed to parse Jupiter swap response")?;

        let result = self
            .rpc(
                "sendTransaction",
                serde_json::json!([swap.swap_transaction, {"encoding": "base64"}]),
            )
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .context("sendTransaction returned no signature")
    }

    async fn get_lamports(&self, wallet_address: &str) -> Result<u64> {
        let result = self
            .rpc("getBalance", serde_json::json!([wallet_address]))
            .await?;
        result["value"]
            .as_u64()
            .context("getBalance returned no value")
    }

    async fn get_transaction_slot(&self, signature: &str) -> Result<Option<u64>> {
        let result = self
            .rpc(
                "getTransaction",
                serde_json::json!([signature, {"commitment": "confirmed"}]),
            )
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(result["slot"].as_u64())
    }

    async fn get_price(&self, symbol: &str) -> Result<f64> {
        let (base, quote) = symbol.split_once('/').unwrap_or((symbol, "USDC"));

        let resp = self
            .http
            .get(format!("{JUPITER_PRICE_URL}/price"))
            .query(&[("ids", base), ("vsToken", quote)])
            .send()
            .await
            .context("Jupiter price request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("Jupiter price error {}", resp.status());
        }

        let value: serde_json::Value = resp
            .json()
            .await
            .context("Failed to parse Jupiter price response")?;
        value["data"][base]["price"]
            .as_f64()
            .with_context(|| format!("No price for {base}"))
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Signing wallet. Present only when a private key was supplied.
#[allow(dead_code)]
struct SolanaWallet {
    address: String,
    signing_key: SecretString,
}

pub struct SolanaAdapter {
    transport: Box<dyn SwapTransport>,
    wallet: Option<SolanaWallet>,
}

impl SolanaAdapter {
    pub fn new(credentials: PlatformCredentials) -> Result<Self, SyrupError> {
        let rpc_url = credentials
            .rpc_url
            .clone()
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());

        let wallet = match credentials.private_key {
            Some(key) => {
                if key.expose_secret().is_empty() {
                    return Err(SyrupError::InvalidCredentials {
                        platform: Platform::Solana,
                        message: "private key is empty".to_string(),
                    });
                }
                let address = credentials.wallet_address.ok_or_else(|| {
                    SyrupError::InvalidCredentials {
                        platform: Platform::Solana,
                        message: "wallet address is required with a private key".to_string(),
                    }
                })?;
                Some(SolanaWallet {
                    address,
                    signing_key: key,
                })
            }
            None => None,
        };

        let transport = JupiterTransport::new(rpc_url).map_err(|e| SyrupError::Config(e.to_string()))?;

        Ok(Self {
            transport: Box::new(transport),
            wallet,
        })
    }

    /// Build an adapter over an explicit transport (for testing).
    pub fn with_transport(transport: Box<dyn SwapTransport>, wallet_address: Option<&str>) -> Self {
        Self {
            transport,
            wallet: wallet_address.map(|address| SolanaWallet {
                address: address.to_string(),
                signing_key: SecretString::new("test-key".to_string()),
            }),
        }
    }
}

#[async_trait]
impl PlatformAdapter for SolanaAdapter {
    async fn execute_trade(&self, trade: &TradeRequest) -> TradeResult {
        // Fail fast without touching the network when no key was supplied.
        let wallet = match &self.wallet {
            Some(w) => w,
            None => return TradeResult::failure(Platform::Solana, "Wallet not initialized"),
        };

        if let Err(reason) = self.validate_trade(trade) {
            return TradeResult::failure(Platform::Solana, reason);
        }

        if trade.trade_type != TradeType::Swap {
            return TradeResult::failure(
                Platform::Solana,
                format!("Trade type {} not supported", trade.trade_type),
            );
        }

        let quote = match self
            .transport
            .get_quote(&trade.symbol, trade.amount, trade.slippage)
            .await
        {
            Ok(q) => q,
            Err(e) => {
                warn!(symbol = %trade.symbol, error = %e, "Quote failed");
                return TradeResult::failure(Platform::Solana, format!("Failed to get quote: {e}"));
            }
        };

        match self.transport.execute_swap(&quote, &wallet.address).await {
            Ok(signature) => TradeResult {
                transaction_hash: Some(signature.clone()),
                executed_amount: Some(trade.amount),
                executed_price: Some(quote.price),
                fee: Some(quote.fee),
                ..TradeResult::completed(signature, Platform::Solana)
            },
            Err(e) => TradeResult::failure(Platform::Solana, e.to_string()),
        }
    }

    async fn get_balance(&self, token: Option<&str>) -> HashMap<String, f64> {
        let wallet = match &self.wallet {
            Some(w) => w,
            None => return HashMap::new(),
        };

        match self.transport.get_lamports(&wallet.address).await {
            Ok(lamports) => {
                let mut balances =
                    HashMap::from([("SOL".to_string(), lamports as f64 / LAMPORTS_PER_SOL)]);
                if let Some(filter) = token {
                    balances.retain(|k, _| k == filter);
                }
                balances
            }
            Err(e) => {
                warn!(error = %e, "Balance lookup failed");
                HashMap::new()
            }
        }
    }

    async fn get_price(&self, symbol: &str) -> f64 {
        match self.transport.get_price(symbol).await {
            Ok(price) => price,
            Err(e) => {
                warn!(symbol, error = %e, "Price lookup failed");
                0.0
            }
        }
    }

    async fn get_order_status(&self, order_id: &str) -> serde_json::Value {
        match self.transport.get_transaction_slot(order_id).await {
            Ok(Some(slot)) => serde_json::json!({
                "status": "confirmed",
                "signature": order_id,
                "slot": slot,
            }),
            Ok(None) => serde_json::json!({"status": "not_found"}),
            Err(e) => serde_json::json!({"status": "error", "error": e.to_string()}),
        }
    }

    async fn cancel_order(&self, _order_id: &str) -> bool {
        // Settled on-chain transactions are not cancellable.
        false
    }

    async fn close(&self) {
        debug!("Solana adapter closed");
    }

    fn name(&self) -> &str {
        PLATFORM_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
