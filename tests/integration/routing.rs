//! Router-level integration tests: dispatch, aggregation, teardown,
//! and the uniform never-raise contract across real and mock adapters.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use syrup::platforms::solana::{SolanaAdapter, SwapQuote, SwapTransport};
use syrup::platforms::{build_adapter, PlatformAdapter};
use syrup::router::TradeRouter;
use syrup::types::{Platform, PlatformCredentials, TradeRequest, TradeStatus, TradeType};

use crate::mock_adapter::MockAdapter;

/// Swap transport double that counts calls and fails them all —
/// any call proves the adapter reached for the network.
struct NoNetworkTransport {
    calls: Arc<AtomicU64>,
}

impl NoNetworkTransport {
    fn new() -> (Self, Arc<AtomicU64>) {
        let calls = Arc::new(AtomicU64::new(0));
        (Self { calls: calls.clone() }, calls)
    }
}

#[async_trait]
impl SwapTransport for NoNetworkTransport {
    async fn get_quote(&self, _: &str, _: f64, _: f64) -> anyhow::Result<SwapQuote> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("network disabled in tests")
    }

    async fn execute_swap(&self, _: &SwapQuote, _: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("network disabled in tests")
    }

    async fn get_lamports(&self, _: &str) -> anyhow::Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("network disabled in tests")
    }

    async fn get_transaction_slot(&self, _: &str) -> anyhow::Result<Option<u64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("network disabled in tests")
    }

    async fn get_price(&self, _: &str) -> anyhow::Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("network disabled in tests")
    }
}

fn request(platform: Platform, trade_type: TradeType, amount: f64, slippage: f64) -> TradeRequest {
    TradeRequest {
        platform,
        trade_type,
        symbol: "TEST".to_string(),
        amount,
        price: None,
        slippage,
        metadata: HashMap::new(),
    }
}

// ---------------------------------------------------------------------------
// Validation contract across every adapter variant
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_non_positive_amount_fails_validation_on_every_adapter() {
    let adapters: Vec<Box<dyn PlatformAdapter>> = vec![
        Box::new(SolanaAdapter::with_transport(
            Box::new(NoNetworkTransport::new().0),
            Some("wallet1"),
        )),
        build_adapter(PlatformCredentials::for_platform(Platform::Polymarket)).unwrap(),
        build_adapter(PlatformCredentials::for_platform(Platform::Kalshi)).unwrap(),
    ];

    for adapter in &adapters {
        let trade_type = if adapter.name() == "solana" {
            TradeType::Swap
        } else {
            TradeType::Buy
        };
        let platform: Platform = adapter.name().parse().unwrap();

        for amount in [0.0, -3.0] {
            let result = adapter
                .execute_trade(&request(platform, trade_type, amount, 0.01))
                .await;
            assert_eq!(result.status, TradeStatus::Failed, "{}", adapter.name());
            assert!(
                result.error.unwrap().contains("Amount"),
                "{} should reject amount {amount}",
                adapter.name()
            );
        }
    }
}

#[tokio::test]
async fn test_out_of_range_slippage_fails_validation_on_every_adapter() {
    let adapters: Vec<Box<dyn PlatformAdapter>> = vec![
        Box::new(SolanaAdapter::with_transport(
            Box::new(NoNetworkTransport::new().0),
            Some("wallet1"),
        )),
        build_adapter(PlatformCredentials::for_platform(Platform::Polymarket)).unwrap(),
        build_adapter(PlatformCredentials::for_platform(Platform::Kalshi)).unwrap(),
    ];

    for adapter in &adapters {
        let trade_type = if adapter.name() == "solana" {
            TradeType::Swap
        } else {
            TradeType::Buy
        };
        let platform: Platform = adapter.name().parse().unwrap();

        for slippage in [-0.01, 1.01] {
            let result = adapter
                .execute_trade(&request(platform, trade_type, 1.0, slippage))
                .await;
            assert_eq!(result.status, TradeStatus::Failed);
            assert!(result.error.unwrap().contains("Slippage"));
        }
    }
}

#[tokio::test]
async fn test_keyless_solana_fails_fast_without_network() {
    let (transport, calls) = NoNetworkTransport::new();
    let adapter = SolanaAdapter::with_transport(Box::new(transport), None);

    let result = adapter
        .execute_trade(&request(Platform::Solana, TradeType::Swap, 0.1, 0.01))
        .await;
    assert_eq!(result.status, TradeStatus::Failed);
    assert_eq!(result.error.as_deref(), Some("Wallet not initialized"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert!(!adapter.cancel_order("any-signature").await);
}

// ---------------------------------------------------------------------------
// Router dispatch and aggregation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_dispatch_to_unregistered_platform_yields_failed_result() {
    let router = TradeRouter::new();
    let result = router
        .execute_trade(&request(Platform::Polymarket, TradeType::Buy, 1.0, 0.01))
        .await;
    assert_eq!(result.status, TradeStatus::Failed);
    let error = result.error.unwrap();
    assert!(error.contains("polymarket"));
    assert!(error.contains("not registered"));
}

#[tokio::test]
async fn test_dispatch_routes_by_request_platform() {
    let kalshi = MockAdapter::new(
        Platform::Kalshi,
        HashMap::from([("USD".to_string(), 100.0)]),
        0.45,
    );
    let kalshi_executions = kalshi.executions();
    let polymarket = MockAdapter::new(
        Platform::Polymarket,
        HashMap::from([("USDC".to_string(), 50.0)]),
        0.60,
    );
    let polymarket_executions = polymarket.executions();

    let mut router = TradeRouter::new();
    router.register_adapter(Platform::Kalshi, Box::new(kalshi)).await;
    router
        .register_adapter(Platform::Polymarket, Box::new(polymarket))
        .await;

    let result = router
        .execute_trade(&request(Platform::Kalshi, TradeType::Buy, 5.0, 0.01))
        .await;
    assert_eq!(result.status, TradeStatus::Completed);
    assert_eq!(result.platform, Platform::Kalshi);
    assert_eq!(kalshi_executions.load(Ordering::SeqCst), 1);
    assert_eq!(polymarket_executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_get_all_balances_survives_single_venue_fault() {
    let healthy_a = MockAdapter::new(
        Platform::Kalshi,
        HashMap::from([("USD".to_string(), 100.0)]),
        0.45,
    );
    let healthy_b = MockAdapter::new(
        Platform::Solana,
        HashMap::from([("SOL".to_string(), 2.0)]),
        147.5,
    );
    let faulty = MockAdapter::new(
        Platform::Polymarket,
        HashMap::from([("USDC".to_string(), 50.0)]),
        0.60,
    );
    faulty.set_error("auth expired");

    let mut router = TradeRouter::new();
    router.register_adapter(Platform::Kalshi, Box::new(healthy_a)).await;
    router.register_adapter(Platform::Solana, Box::new(healthy_b)).await;
    router.register_adapter(Platform::Polymarket, Box::new(faulty)).await;

    let balances = router.get_all_balances().await;
    assert_eq!(balances.len(), 3);
    assert!((balances[&Platform::Kalshi]["USD"] - 100.0).abs() < 1e-10);
    assert!((balances[&Platform::Solana]["SOL"] - 2.0).abs() < 1e-10);
    assert!(balances[&Platform::Polymarket].is_empty());
}

#[tokio::test]
async fn test_balance_and_price_for_unregistered_platform_are_sentinels() {
    let router = TradeRouter::new();
    assert!(router.get_balance(Platform::Solana, None).await.is_empty());
    assert_eq!(router.get_price(Platform::Solana, "SOL/USDC").await, 0.0);
}

#[tokio::test]
async fn test_unregister_is_idempotent_and_closes_adapter() {
    let adapter = MockAdapter::new(Platform::Kalshi, HashMap::new(), 0.45);
    let closes = adapter.closes();

    let mut router = TradeRouter::new();
    router.register_adapter(Platform::Kalshi, Box::new(adapter)).await;

    router.unregister_platform(Platform::Kalshi).await;
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    // Repeated calls are safe no-ops.
    router.unregister_platform(Platform::Kalshi).await;
    router.unregister_platform(Platform::Kalshi).await;
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reregistration_closes_the_superseded_adapter() {
    let first = MockAdapter::new(Platform::Kalshi, HashMap::new(), 0.40);
    let first_closes = first.closes();
    let second = MockAdapter::new(
        Platform::Kalshi,
        HashMap::from([("USD".to_string(), 75.0)]),
        0.55,
    );

    let mut router = TradeRouter::new();
    router.register_adapter(Platform::Kalshi, Box::new(first)).await;
    router.register_adapter(Platform::Kalshi, Box::new(second)).await;

    assert_eq!(first_closes.load(Ordering::SeqCst), 1);
    let balances = router.get_balance(Platform::Kalshi, None).await;
    assert!((balances["USD"] - 75.0).abs() < 1e-10);
}

#[tokio::test]
async fn test_close_all_reaches_every_registered_adapter() {
    let a = MockAdapter::new(Platform::Kalshi, HashMap::new(), 0.45);
    let b = MockAdapter::new(Platform::Polymarket, HashMap::new(), 0.60);
    let (closes_a, closes_b) = (a.closes(), b.closes());

    let mut router = TradeRouter::new();
    router.register_adapter(Platform::Kalshi, Box::new(a)).await;
    router.register_adapter(Platform::Polymarket, Box::new(b)).await;
    router.close_all().await;

    assert_eq!(closes_a.load(Ordering::SeqCst), 1);
    assert_eq!(closes_b.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_register_from_credentials_then_dispatch() {
    let mut router = TradeRouter::new();
    router
        .register_platform(PlatformCredentials::for_platform(Platform::Solana))
        .await
        .unwrap();

    // No wallet key supplied: execution degrades to a failed result
    // before any network activity.
    let result = router
        .execute_trade(&request(Platform::Solana, TradeType::Swap, 0.1, 0.01))
        .await;
    assert_eq!(result.status, TradeStatus::Failed);
    assert_eq!(result.error.as_deref(), Some("Wallet not initialized"));
}
