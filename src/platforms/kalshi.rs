//! Kalshi integration.
//!
//! Session-token auth: a login call exchanges the configured
//! credentials for a bearer token, cached in the adapter and reused on
//! every subsequent call. Kalshi quotes prices in cents; this adapter
//! converts to dollars at the boundary.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::platforms::PlatformAdapter;
use crate::types::{Platform, PlatformCredentials, SyrupError, TradeRequest, TradeResult, TradeType};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";
const PLATFORM_NAME: &str = "kalshi";

const CENTS_PER_DOLLAR: f64 = 100.0;

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct KalshiAdapter {
    http: Client,
    base_url: String,
    api_key: String,
    private_key: Option<SecretString>,
    /// Session token, populated lazily on the first authenticated call.
    token: RwLock<Option<String>>,
}

impl KalshiAdapter {
    pub fn new(credentials: PlatformCredentials) -> Result<Self, SyrupError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| SyrupError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            api_key: credentials.api_key.unwrap_or_default(),
            private_key: credentials.private_key,
            token: RwLock::new(None),
        })
    }

    /// Exchange credentials for a session token.
    async fn authenticate(&self) -> Result<String> {
        let auth_data = serde_json::json!({
            "email": self.api_key,
            "password": self
                .private_key
                .as_ref()
                .map(|k| k.expose_secret().clone())
                .unwrap_or_default(),
        });

        let resp = self
            .http
            .post(format!("{}/login", self.base_url))
            .json(&auth_data)
            .send()
            .await
            .context("Kalshi login request failed")?;

        let data: serde_json::Value = resp
            .json()
            .await
            .context("Failed to parse Kalshi login response")?;

        let token = data["token"]
            .as_str()
            .context("Kalshi login returned no token")?
            .to_string();

        info!("Kalshi authentication successful");
        Ok(token)
    }

    /// Cached session token, logging in if none is held yet.
    ///
    /// A 401 on a later call does not trigger re-authentication; the
    /// failure surfaces as a venue rejection like any other.
    async fn ensure_token(&self) -> Option<String> {
        {
            let guard = self.token.read().await;
            if guard.is_some() {
                return guard.clone();
            }
        }

        match self.authenticate().await {
            Ok(token) => {
                let mut guard = self.token.write().await;
                *guard = Some(token.clone());
                Some(token)
            }
            Err(e) => {
                warn!(error = %e, "Kalshi authentication failed");
                None
            }
        }
    }

    /// Authenticated request; parses the venue's JSON envelope.
    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        data: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let token = self.ensure_token().await;
        let url = format!("{}{}", self.base_url, path);

        debug!(method = %method, path, "Kalshi API request");

        let mut req = self
            .http
            .request(method, &url)
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(value) = data {
            req = req.json(value);
        }

        let resp = req.send().await.context("Kalshi request failed")?;
        let status = resp.status();
        resp.json()
            .await
            .with_context(|| format!("Failed to parse Kalshi response ({status})"))
    }

    /// Translate a venue-agnostic request into Kalshi's order shape.
    /// Amounts are whole contracts; limit prices are cents.
    fn build_order(trade: &TradeRequest) -> serde_json::Value {
        let mut order = serde_json::json!({
            "ticker": trade.symbol,
            "action": trade.trade_type.to_string().to_uppercase(),
            "count": trade.amount as i64,
            "type": "market",
            "side": trade
                .metadata
                .get("side")
                .cloned()
                .unwrap_or_else(|| "yes".to_string()),
        });

        if let Some(price) = trade.price {
            order["type"] = serde_json::json!("limit");
            order["yes_price"] = serde_json::json!((price * CENTS_PER_DOLLAR) as i64);
        }

        order
    }

    fn cents_to_dollars(value: &serde_json::Value) -> Option<f64> {
        value.as_f64().map(|cents| cents / CENTS_PER_DOLLAR)
    }
}

#[async_trait]
impl PlatformAdapter for KalshiAdapter {
    async fn execute_trade(&self, trade: &TradeRequest) -> TradeResult {
        if trade.trade_type == TradeType::Swap {
            return TradeResult::failure(
                Platform::Kalshi,
                format!("Trade type {} not supported", trade.trade_type),
            );
        }

        if let Err(reason) = self.validate_trade(trade) {
            return TradeResult::failure(Platform::Kalshi, reason);
        }

        let order = Self::build_order(trade);

        let response = match self
            .request(reqwest::Method::POST, "/portfolio/orders", Some(&order))
            .await
        {
            Ok(r) => r,
            Err(e) => return TradeResult::failure(Platform::Kalshi, e.to_string()),
        };

        if let Some(placed) = response.get("order").filter(|o| o.is_object()) {
            return TradeResult {
                executed_amount: placed["quantity"].as_f64(),
                executed_price: Self::cents_to_dollars(&placed["yes_price"]),
                fee: Self::cents_to_dollars(&placed["fee"]).or(Some(0.0)),
                ..TradeResult::completed(
                    placed["order_id"].as_str().unwrap_or_default(),
                    Platform::Kalshi,
                )
            };
        }

        let error = response["error"]
            .as_str()
            .unwrap_or("Unknown error")
            .to_string();
        TradeResult::failure(Platform::Kalshi, error)
    }

    async fn get_balance(&self, token: Option<&str>) -> HashMap<String, f64> {
        let response = match self
            .request(reqwest::Method::GET, "/portfolio/balance", None)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Kalshi balance lookup failed");
                return HashMap::new();
            }
        };

        let mut balances = match Self::cents_to_dollars(&response["balance"]) {
            Some(dollars) => HashMap::from([("USD".to_string(), dollars)]),
            None => HashMap::new(),
        };

        if let Some(filter) = token {
            balances.retain(|k, _| k == filter);
        }
        balances
    }

    async fn get_price(&self, symbol: &str) -> f64 {
        let path = format!("/markets/{}", urlencoding::encode(symbol));
        match self.request(reqwest::Method::GET, &path, None).await {
            Ok(response) => Self::cents_to_dollars(&response["market"]["last_price"]).unwrap_or(0.0),
            Err(e) => {
                warn!(symbol, error = %e, "Kalshi price lookup failed");
                0.0
            }
        }
    }

    async fn get_order_status(&self, order_id: &str) -> serde_json::Value {
        let path = format!("/portfolio/orders/{}", urlencoding::encode(order_id));
        match self.request(reqwest::Method::GET, &path, None).await {
            Ok(response) => response,
            Err(e) => serde_json::json!({"error": e.to_string()}),
        }
    }

    async fn cancel_order(&self, order_id: &str) -> bool {
        let path = format!("/portfolio/orders/{}", urlencoding::encode(order_id));
        match self.request(reqwest::Method::DELETE, &path, None).await {
            Ok(response) => response["order"]["status"].as_str() == Some("canceled"),
            Err(_) => false,
        }
    }

    async fn close(&self) {
        let mut guard = self.token.write().await;
        *guard = None;
        debug!("Kalshi session released");
    }

    fn name(&self) -> &str {
        PLATFORM_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> KalshiAdapter {
        let mut creds = PlatformCredentials::for_platform(Platform::Kalshi);
        creds.api_key = Some("trader@example.com".to_string());
        creds.private_key = Some(SecretString::new("kalshi-key".to_string()));
        KalshiAdapter::new(creds).unwrap()
    }

    fn order_request(trade_type: TradeType, price: Option<f64>) -> TradeRequest {
        TradeRequest {
            platform: Platform::Kalshi,
            trade_type,
            symbol: "CPI-24DEC-T3.0".to_string(),
            amount: 10.0,
            price,
            slippage: 0.01,
            metadata: HashMap::new(),
        }
    }

    // -- Order construction tests --

    #[test]
    fn test_build_order_market_buy() {
        let order = KalshiAdapter::build_order(&order_request(TradeType::Buy, None));
        assert_eq!(order["ticker"], "CPI-24DEC-T3.0");
        assert_eq!(order["action"], "BUY");
        assert_eq!(order["count"], 10);
        assert_eq!(order["type"], "market");
        assert_eq!(order["side"], "yes");
        assert!(order.get("yes_price").is_none());
    }

    #[test]
    fn test_build_order_limit_converts_price_to_cents() {
        let order = KalshiAdapter::build_order(&order_request(TradeType::Sell, Some(0.45)));
        assert_eq!(order["action"], "SELL");
        assert_eq!(order["type"], "limit");
        assert_eq!(order["yes_price"], 45);
    }

    #[test]
    fn test_build_order_side_from_metadata() {
        let mut request = order_request(TradeType::Buy, None);
        request
            .metadata
            .insert("side".to_string(), "no".to_string());
        let order = KalshiAdapter::build_order(&request);
        assert_eq!(order["side"], "no");
    }

    #[test]
    fn test_build_order_truncates_fractional_contracts() {
        let request = TradeRequest {
            amount: 7.9,
            ..order_request(TradeType::Buy, None)
        };
        let order = KalshiAdapter::build_order(&request);
        assert_eq!(order["count"], 7);
    }

    // -- Unit conversion tests --

    #[test]
    fn test_cents_to_dollars() {
        assert_eq!(
            KalshiAdapter::cents_to_dollars(&serde_json::json!(4550)),
            Some(45.50)
        );
        assert_eq!(
            KalshiAdapter::cents_to_dollars(&serde_json::json!(null)),
            None
        );
    }

    // -- Validation tests --

    #[tokio::test]
    async fn test_execute_rejects_swap() {
        let result = adapter()
            .execute_trade(&order_request(TradeType::Swap, None))
            .await;
        assert_eq!(result.status, crate::types::TradeStatus::Failed);
        assert!(result.error.unwrap().contains("not supported"));
    }

    #[tokio::test]
    async fn test_execute_rejects_bad_amount() {
        let request = TradeRequest {
            amount: 0.0,
            ..order_request(TradeType::Buy, None)
        };
        let result = adapter().execute_trade(&request).await;
        assert!(result.error.unwrap().contains("Amount"));
    }

    #[tokio::test]
    async fn test_execute_rejects_bad_slippage() {
        let request = TradeRequest {
            slippage: -0.5,
            ..order_request(TradeType::Buy, None)
        };
        let result = adapter().execute_trade(&request).await;
        assert!(result.error.unwrap().contains("Slippage"));
    }

    // -- Session tests --

    #[tokio::test]
    async fn test_close_clears_session_token() {
        let a = adapter();
        {
            let mut guard = a.token.write().await;
            *guard = Some("session-token".to_string());
        }
        a.close().await;
        assert!(a.token.read().await.is_none());
    }

    #[tokio::test]
    async fn test_close_idempotent_on_never_opened_session() {
        let a = adapter();
        a.close().await;
        a.close().await;
        assert!(a.token.read().await.is_none());
    }

    #[test]
    fn test_adapter_name() {
        assert_eq!(adapter().name(), "kalshi");
    }
}
