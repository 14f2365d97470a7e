//! Decoding of model output into typed trade decisions.
//!
//! The model is instructed to emit a JSON object; this module locates
//! and decodes it. Decode failures never surface to the caller — an
//! undecodable payload collapses to a hold decision, indistinguishable
//! at the type level from an explicit hold.

use serde::Deserialize;
use std::collections::HashMap;

use crate::types::{Platform, TradeRequest, TradeType};

/// Raw decision fields as the model emits them, before validation.
#[derive(Debug, Default, Deserialize)]
pub struct DecisionPayload {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub trade_type: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub slippage: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Decode outcome, kept distinct for logging only. Callers observe
/// `Option<TradeRequest>` — a hold and a decode failure look the same.
#[derive(Debug)]
pub enum Decision {
    Trade(TradeRequest),
    Hold,
    Undecodable,
}

impl Decision {
    pub fn into_request(self) -> Option<TradeRequest> {
        match self {
            Decision::Trade(request) => Some(request),
            Decision::Hold | Decision::Undecodable => None,
        }
    }
}

/// Locate the first `{` through the last `}` in raw model text and
/// decode it as a decision object with at least an `action` field.
pub fn parse_decision(text: &str) -> Decision {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Decision::Undecodable;
    };
    if end < start {
        return Decision::Undecodable;
    }

    let payload: DecisionPayload = match serde_json::from_str(&text[start..=end]) {
        Ok(payload) => payload,
        Err(_) => return Decision::Undecodable,
    };

    match payload.action.as_deref() {
        Some("trade") => match request_from_payload(&payload) {
            Some(request) => Decision::Trade(request),
            None => Decision::Undecodable,
        },
        Some("hold") => Decision::Hold,
        _ => Decision::Undecodable,
    }
}

/// Validate payload fields into a typed request.
///
/// Any value outside the Platform/TradeType enumerations discards the
/// whole decision. `reasoning`, when present, is carried into the
/// request's metadata.
pub fn request_from_payload(payload: &DecisionPayload) -> Option<TradeRequest> {
    let platform: Platform = payload.platform.as_deref()?.parse().ok()?;
    let trade_type: TradeType = payload.trade_type.as_deref()?.parse().ok()?;
    let symbol = payload.symbol.clone()?;
    let amount = payload.amount?;

    let mut metadata = HashMap::new();
    if let Some(reasoning) = payload.reasoning.as_deref() {
        if !reasoning.is_empty() {
            metadata.insert("reasoning".to_string(), reasoning.to_string());
        }
    }

    Some(TradeRequest {
        platform,
        trade_type,
        symbol,
        amount,
        price: payload.price,
        slippage: payload.slippage.unwrap_or(0.01),
        metadata,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
