//! Platform integrations.
//!
//! Defines the `PlatformAdapter` trait and provides implementations for:
//! - Solana — on-chain swaps via the Jupiter aggregator
//! - Polymarket — prediction market REST API with HMAC request signing
//! - Kalshi — prediction market CLOB with session-token auth

pub mod solana;
pub mod polymarket;
pub mod kalshi;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::types::{Platform, PlatformCredentials, SyrupError, TradeRequest, TradeResult};

/// Abstraction over trading venues.
///
/// Every operation resolves to a usable value: a failed trade is a
/// `TradeResult` with `status = failed`, a failed balance lookup is an
/// empty map, a failed price lookup is `0.0`. Implementors must catch
/// transport errors internally — nothing propagates past this trait.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Execute a trade on the venue.
    ///
    /// Runs `validate_trade` first; a validation failure yields a failed
    /// result carrying the validation message.
    async fn execute_trade(&self, trade: &TradeRequest) -> TradeResult;

    /// Account balances keyed by asset symbol, in the venue's natural
    /// human-readable unit. Empty on any failure.
    async fn get_balance(&self, token: Option<&str>) -> HashMap<String, f64>;

    /// Current price for a symbol. `0.0` on failure.
    async fn get_price(&self, symbol: &str) -> f64;

    /// Free-form status of an order or settlement reference.
    /// `{"error": ...}` on failure.
    async fn get_order_status(&self, order_id: &str) -> serde_json::Value;

    /// Cancel a pending order. `false` on failure or when the venue
    /// does not support cancellation.
    async fn cancel_order(&self, order_id: &str) -> bool;

    /// Release the owned connection/session. Idempotent; safe to call
    /// on a never-opened connection.
    async fn close(&self);

    /// Platform name for logging and identification.
    fn name(&self) -> &str;

    /// Validate trade parameters before execution.
    ///
    /// Venue-specific feasibility checks run in the adapters before
    /// delegating to this shared check.
    fn validate_trade(&self, trade: &TradeRequest) -> Result<(), String> {
        validate_request(trade)
    }
}

/// Shared pre-trade sanity check: positive amount, slippage in [0, 1].
pub fn validate_request(trade: &TradeRequest) -> Result<(), String> {
    if trade.amount <= 0.0 {
        return Err("Amount must be positive".to_string());
    }
    if !(0.0..=1.0).contains(&trade.slippage) {
        return Err("Slippage must be between 0 and 1".to_string());
    }
    Ok(())
}

/// Construct the adapter matching `credentials.platform`.
///
/// This is the only platform operation allowed to fail loudly —
/// invalid key material surfaces here, before any money can move.
pub fn build_adapter(
    credentials: PlatformCredentials,
) -> Result<Box<dyn PlatformAdapter>, SyrupError> {
    match credentials.platform {
        Platform::Solana => Ok(Box::new(solana::SolanaAdapter::new(credentials)?)),
        Platform::Polymarket => Ok(Box::new(polymarket::PolymarketAdapter::new(credentials)?)),
        Platform::Kalshi => Ok(Box::new(kalshi::KalshiAdapter::new(credentials)?)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradeType;

    fn request(amount: f64, slippage: f64) -> TradeRequest {
        TradeRequest {
            platform: Platform::Solana,
            trade_type: TradeType::Swap,
            symbol: "SOL/USDC".to_string(),
            amount,
            price: None,
            slippage,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_validate_request_ok() {
        assert!(validate_request(&request(1.0, 0.01)).is_ok());
        assert!(validate_request(&request(0.001, 0.0)).is_ok());
        assert!(validate_request(&request(100.0, 1.0)).is_ok());
    }

    #[test]
    fn test_validate_request_rejects_non_positive_amount() {
        let err = validate_request(&request(0.0, 0.01)).unwrap_err();
        assert!(err.contains("Amount"));
        assert!(validate_request(&request(-5.0, 0.01)).is_err());
    }

    #[test]
    fn test_validate_request_rejects_out_of_range_slippage() {
        let err = validate_request(&request(1.0, -0.1)).unwrap_err();
        assert!(err.contains("Slippage"));
        assert!(validate_request(&request(1.0, 1.5)).is_err());
    }

    #[test]
    fn test_build_adapter_each_platform() {
        for platform in Platform::ALL {
            let adapter = build_adapter(PlatformCredentials::for_platform(*platform)).unwrap();
            assert_eq!(adapter.name(), format!("{platform}"));
        }
    }
}
