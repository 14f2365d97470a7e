//! Trade routing.
//!
//! The `TradeRouter` owns the Platform → Adapter registry and
//! dispatches trade, balance, and price calls to the matching adapter.
//! Routing absence is treated identically to adapter-level failure:
//! the caller always receives a usable value.

use std::collections::HashMap;
use tracing::{info, warn};

use crate::platforms::{self, PlatformAdapter};
use crate::types::{Platform, PlatformCredentials, SyrupError, TradeRequest, TradeResult};

/// Routes trades to registered platform adapters.
///
/// A router is a plain value with explicit construction and teardown —
/// tests instantiate isolated routers per case. The router is the only
/// writer to its registry; adapters are exclusively owned.
#[derive(Default)]
pub struct TradeRouter {
    platforms: HashMap<Platform, Box<dyn PlatformAdapter>>,
}

impl TradeRouter {
    pub fn new() -> Self {
        Self {
            platforms: HashMap::new(),
        }
    }

    /// Register a platform from credentials.
    ///
    /// Construction failures (invalid key material) are raised to the
    /// caller; this is the only loud failure path in the router.
    pub async fn register_platform(
        &mut self,
        credentials: PlatformCredentials,
    ) -> Result<(), SyrupError> {
        let platform = credentials.platform;
        let adapter = platforms::build_adapter(credentials)?;
        self.register_adapter(platform, adapter).await;
        info!(platform = %platform, "Platform registered");
        Ok(())
    }

    /// Install a pre-built adapter, closing any superseded one.
    ///
    /// Note: in-flight requests on a superseded adapter are not drained;
    /// re-registering under load races with them.
    pub async fn register_adapter(&mut self, platform: Platform, adapter: Box<dyn PlatformAdapter>) {
        if let Some(old) = self.platforms.insert(platform, adapter) {
            warn!(platform = %platform, "Replacing registered adapter; closing superseded one");
            old.close().await;
        }
    }

    /// Remove and close a platform's adapter. No-op when absent.
    pub async fn unregister_platform(&mut self, platform: Platform) {
        if let Some(adapter) = self.platforms.remove(&platform) {
            adapter.close().await;
            info!(platform = %platform, "Platform unregistered");
        }
    }

    /// Platforms with a live adapter.
    pub fn registered_platforms(&self) -> Vec<Platform> {
        self.platforms.keys().copied().collect()
    }

    /// Route and execute a trade.
    ///
    /// An unregistered platform yields a failed result rather than an
    /// error — the uniform "always returns a TradeResult" contract.
    pub async fn execute_trade(&self, trade: &TradeRequest) -> TradeResult {
        match self.platforms.get(&trade.platform) {
            Some(adapter) => adapter.execute_trade(trade).await,
            None => TradeResult::failure(
                trade.platform,
                format!("Platform {} not registered", trade.platform),
            ),
        }
    }

    /// Balance from one platform. Empty when unregistered or failing.
    pub async fn get_balance(
        &self,
        platform: Platform,
        token: Option<&str>,
    ) -> HashMap<String, f64> {
        match self.platforms.get(&platform) {
            Some(adapter) => adapter.get_balance(token).await,
            None => HashMap::new(),
        }
    }

    /// Price from one platform. `0.0` when unregistered or failing.
    pub async fn get_price(&self, platform: Platform, symbol: &str) -> f64 {
        match self.platforms.get(&platform) {
            Some(adapter) => adapter.get_price(symbol).await,
            None => 0.0,
        }
    }

    /// Balances from every registered platform.
    ///
    /// A faulting venue contributes an empty entry; the rest proceed.
    pub async fn get_all_balances(&self) -> HashMap<Platform, HashMap<String, f64>> {
        let mut balances = HashMap::new();
        for (platform, adapter) in &self.platforms {
            balances.insert(*platform, adapter.get_balance(None).await);
        }
        balances
    }

    /// Close every adapter. Used at process shutdown.
    pub async fn close_all(&self) {
        for adapter in self.platforms.values() {
            adapter.close().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
