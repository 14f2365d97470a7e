//! Mock platform adapter for integration testing.
//!
//! Provides a deterministic `PlatformAdapter` implementation with
//! controllable balances, forced errors, and call counters — all
//! in-memory with no external dependencies.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use syrup::platforms::PlatformAdapter;
use syrup::types::{Platform, TradeRequest, TradeResult};

/// A mock trading venue for deterministic testing.
pub struct MockAdapter {
    platform: Platform,
    name: String,
    balances: HashMap<String, f64>,
    price: f64,
    /// When set, every operation behaves as a venue/transport fault.
    force_error: Arc<Mutex<Option<String>>>,
    executions: Arc<AtomicU64>,
    closes: Arc<AtomicU64>,
}

impl MockAdapter {
    pub fn new(platform: Platform, balances: HashMap<String, f64>, price: f64) -> Self {
        Self {
            platform,
            name: platform.to_string(),
            balances,
            price,
            force_error: Arc::new(Mutex::new(None)),
            executions: Arc::new(AtomicU64::new(0)),
            closes: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn executions(&self) -> Arc<AtomicU64> {
        self.executions.clone()
    }

    pub fn closes(&self) -> Arc<AtomicU64> {
        self.closes.clone()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    async fn execute_trade(&self, trade: &TradeRequest) -> TradeResult {
        if let Err(reason) = self.validate_trade(trade) {
            return TradeResult::failure(self.platform, reason);
        }

        self.executions.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.force_error.lock().unwrap().clone() {
            return TradeResult::failure(self.platform, err);
        }

        TradeResult {
            executed_amount: Some(trade.amount),
            executed_price: Some(self.price),
            fee: Some(0.0),
            ..TradeResult::completed(format!("MOCK-{}", Uuid::new_v4()), self.platform)
        }
    }

    async fn get_balance(&self, token: Option<&str>) -> HashMap<String, f64> {
        if self.force_error.lock().unwrap().is_some() {
            return HashMap::new();
        }
        let mut balances = self.balances.clone();
        if let Some(filter) = token {
            balances.retain(|k, _| k == filter);
        }
        balances
    }

    async fn get_price(&self, _symbol: &str) -> f64 {
        if self.force_error.lock().unwrap().is_some() {
            return 0.0;
        }
        self.price
    }

    async fn get_order_status(&self, order_id: &str) -> serde_json::Value {
        if let Some(err) = self.force_error.lock().unwrap().clone() {
            return serde_json::json!({"error": err});
        }
        serde_json::json!({"order_id": order_id, "status": "pending"})
    }

    async fn cancel_order(&self, _order_id: &str) -> bool {
        self.force_error.lock().unwrap().is_none()
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Mock self-tests
// ---------------------------------------------------------------------------

use syrup::types::{TradeStatus, TradeType};

fn buy_request(platform: Platform, amount: f64) -> TradeRequest {
    TradeRequest {
        platform,
        trade_type: TradeType::Buy,
        symbol: "TEST-MKT".to_string(),
        amount,
        price: None,
        slippage: 0.01,
        metadata: HashMap::new(),
    }
}

#[tokio::test]
async fn test_mock_executes_valid_trade() {
    let adapter = MockAdapter::new(
        Platform::Kalshi,
        HashMap::from([("USD".to_string(), 100.0)]),
        0.45,
    );

    let result = adapter.execute_trade(&buy_request(Platform::Kalshi, 5.0)).await;
    assert_eq!(result.status, TradeStatus::Completed);
    assert!(result.trade_id.starts_with("MOCK-"));
    assert_eq!(result.executed_price, Some(0.45));
    assert_eq!(adapter.executions().load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mock_rejects_invalid_trade_before_counting() {
    let adapter = MockAdapter::new(Platform::Kalshi, HashMap::new(), 0.45);

    let result = adapter.execute_trade(&buy_request(Platform::Kalshi, -1.0)).await;
    assert_eq!(result.status, TradeStatus::Failed);
    assert_eq!(adapter.executions().load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_mock_forced_error_degrades_every_operation() {
    let adapter = MockAdapter::new(
        Platform::Polymarket,
        HashMap::from([("USDC".to_string(), 50.0)]),
        0.60,
    );
    adapter.set_error("simulated outage");

    let result = adapter.execute_trade(&buy_request(Platform::Polymarket, 1.0)).await;
    assert_eq!(result.error.as_deref(), Some("simulated outage"));

    assert!(adapter.get_balance(None).await.is_empty());
    assert_eq!(adapter.get_price("any").await, 0.0);
    assert!(adapter.get_order_status("x").await.get("error").is_some());
    assert!(!adapter.cancel_order("x").await);
}

#[tokio::test]
async fn test_mock_balance_token_filter() {
    let adapter = MockAdapter::new(
        Platform::Solana,
        HashMap::from([("SOL".to_string(), 2.0), ("USDC".to_string(), 10.0)]),
        147.5,
    );

    assert_eq!(adapter.get_balance(None).await.len(), 2);
    let filtered = adapter.get_balance(Some("SOL")).await;
    assert_eq!(filtered.len(), 1);
    assert!((filtered["SOL"] - 2.0).abs() < 1e-10);
}
