//! Polymarket integration.
//!
//! Every request is signed with HMAC-SHA256 over
//! `timestamp + method + path + body`; the signature, API key,
//! passphrase, and timestamp travel as `POLY-*` headers on every call,
//! including reads.

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::collections::HashMap;
use tracing::{debug, warn};

use async_trait::async_trait;

use crate::platforms::PlatformAdapter;
use crate::types::{Platform, PlatformCredentials, SyrupError, TradeRequest, TradeResult, TradeType};

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://api.polymarket.com";
const PLATFORM_NAME: &str = "polymarket";

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct PolymarketAdapter {
    http: Client,
    base_url: String,
    api_key: String,
    secret: Option<SecretString>,
    passphrase: Option<SecretString>,
}

impl PolymarketAdapter {
    pub fn new(credentials: PlatformCredentials) -> Result<Self, SyrupError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| SyrupError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            api_key: credentials.api_key.unwrap_or_default(),
            secret: credentials.secret,
            passphrase: credentials.passphrase,
        })
    }

    /// HMAC-SHA256 signature over `timestamp + method + path + body`,
    /// hex-encoded. An absent secret signs with an empty key.
    fn sign(&self, timestamp: &str, method: &str, path: &str, body: &str) -> String {
        let key = self
            .secret
            .as_ref()
            .map(|s| s.expose_secret().as_bytes().to_vec())
            .unwrap_or_default();

        // HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(&key).expect("HMAC key of any length");
        mac.update(timestamp.as_bytes());
        mac.update(method.as_bytes());
        mac.update(path.as_bytes());
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Signed request; parses the venue's JSON envelope regardless of
    /// HTTP status (errors arrive as `{"success": false, "error": ...}`).
    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        data: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let body = match data {
            Some(value) => serde_json::to_string(value).context("Failed to encode request body")?,
            None => String::new(),
        };

        let signature = self.sign(&timestamp, method.as_str(), path, &body);

        debug!(method = %method, path, "Polymarket API request");

        let mut req = self
            .http
            .request(method, &url)
            .header("POLY-API-KEY", &self.api_key)
            .header("POLY-SIGNATURE", signature)
            .header("POLY-TIMESTAMP", timestamp)
            .header(
                "POLY-PASSPHRASE",
                self.passphrase
                    .as_ref()
                    .map(|p| p.expose_secret().clone())
                    .unwrap_or_default(),
            )
            .header("Content-Type", "application/json");

        if let Some(value) = data {
            req = req.json(value);
        }

        let resp = req.send().await.context("Polymarket request failed")?;
        let status = resp.status();
        resp.json()
            .await
            .with_context(|| format!("Failed to parse Polymarket response ({status})"))
    }

    /// Translate a venue-agnostic request into Polymarket's order shape.
    fn build_order(trade: &TradeRequest) -> serde_json::Value {
        serde_json::json!({
            "market": trade.symbol,
            "side": if trade.trade_type == TradeType::Buy { "BUY" } else { "SELL" },
            "size": trade.amount,
            "price": trade.price,
            "type": if trade.price.is_some() { "LIMIT" } else { "MARKET" },
        })
    }

    /// Accept both numeric and string-encoded numbers from the venue.
    fn field_f64(value: &serde_json::Value) -> Option<f64> {
        value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
    }
}

#[async_trait]
impl PlatformAdapter for PolymarketAdapter {
    async fn execute_trade(&self, trade: &TradeRequest) -> TradeResult {
        if trade.trade_type == TradeType::Swap {
            return TradeResult::failure(
                Platform::Polymarket,
                format!("Trade type {} not supported", trade.trade_type),
            );
        }

        if let Err(reason) = self.validate_trade(trade) {
            return TradeResult::failure(Platform::Polymarket, reason);
        }

        let order = Self::build_order(trade);

        let response = match self
            .request(reqwest::Method::POST, "/orders", Some(&order))
            .await
        {
            Ok(r) => r,
            Err(e) => return TradeResult::failure(Platform::Polymarket, e.to_string()),
        };

        if response["success"].as_bool().unwrap_or(false) {
            return TradeResult {
                transaction_hash: response["transactionHash"].as_str().map(str::to_string),
                executed_amount: Some(trade.amount),
                executed_price: Self::field_f64(&response["executedPrice"]),
                fee: Self::field_f64(&response["fee"]).or(Some(0.0)),
                ..TradeResult::completed(
                    response["orderId"].as_str().unwrap_or_default(),
                    Platform::Polymarket,
                )
            };
        }

        // Venue rejection: surface its error text verbatim.
        let error = response["error"]
            .as_str()
            .unwrap_or("Unknown error")
            .to_string();
        TradeResult::failure(Platform::Polymarket, error)
    }

    async fn get_balance(&self, token: Option<&str>) -> HashMap<String, f64> {
        let response = match self.request(reqwest::Method::GET, "/balances", None).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Polymarket balance lookup failed");
                return HashMap::new();
            }
        };

        if !response["success"].as_bool().unwrap_or(false) {
            return HashMap::new();
        }

        let mut balances: HashMap<String, f64> = response["balances"]
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| Self::field_f64(v).map(|b| (k.clone(), b)))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(filter) = token {
            balances.retain(|k, _| k == filter);
        }
        balances
    }

    async fn get_price(&self, symbol: &str) -> f64 {
        let path = format!("/markets/{}", urlencoding::encode(symbol));
        match self.request(reqwest::Method::GET, &path, None).await {
            Ok(response) if response["success"].as_bool().unwrap_or(false) => {
                Self::field_f64(&response["lastPrice"]).unwrap_or(0.0)
            }
            Ok(_) => 0.0,
            Err(e) => {
                warn!(symbol, error = %e, "Polymarket price lookup failed");
                0.0
            }
        }
    }

    async fn get_order_status(&self, order_id: &str) -> serde_json::Value {
        let path = format!("/orders/{}", urlencoding::encode(order_id));
        match self.request(reqwest::Method::GET, &path, None).await {
            Ok(response) => response,
            Err(e) => serde_json::json!({"error": e.to_string()}),
        }
    }

    async fn cancel_order(&self, order_id: &str) -> bool {
        let path = format!("/orders/{}", urlencoding::encode(order_id));
        match self.request(reqwest::Method::DELETE, &path, None).await {
            Ok(response) => response["success"].as_bool().unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn close(&self) {
        debug!("Polymarket adapter closed");
    }

    fn name(&self) -> &str {
        PLATFORM_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
