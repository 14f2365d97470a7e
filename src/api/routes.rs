//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`.
//! Only construction-time errors (bad credentials, unknown agent type)
//! map to 4xx responses; everything downstream of construction reports
//! failure through the normal result types.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::agents::{self, MarketAnalysis, TradingAgent};
use crate::router::TradeRouter;
use crate::types::{AgentConfig, Platform, PlatformCredentials, TradeRequest, TradeResult};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Process-scoped registries: the trade router and active agents.
/// In-memory only — lost on restart.
#[derive(Default)]
pub struct ApiState {
    pub trade_router: RwLock<TradeRouter>,
    pub agents: RwLock<HashMap<String, Box<dyn TradingAgent>>>,
}

impl ApiState {
    pub fn new() -> Self {
        Self::default()
    }
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// A 4xx/5xx response with a JSON `detail` body.
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(serde_json::json!({"detail": self.detail}))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PlatformResponse {
    pub success: bool,
    pub platform: Platform,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UnregisterRequest {
    pub platform: Platform,
}

#[derive(Debug, Serialize)]
pub struct BalancesResponse {
    pub success: bool,
    pub balances: HashMap<String, HashMap<String, f64>>,
}

#[derive(Debug, Serialize)]
pub struct PlatformBalanceResponse {
    pub success: bool,
    pub platform: Platform,
    pub balance: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub success: bool,
    pub platform: Platform,
    pub symbol: String,
    pub price: f64,
}

#[derive(Debug, Serialize)]
pub struct AgentCreatedResponse {
    pub success: bool,
    pub agent_name: String,
    pub agent_type: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AgentSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: String,
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Serialize)]
pub struct AgentsListResponse {
    pub success: bool,
    pub agents: Vec<AgentSummary>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub market_data: serde_json::Value,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub agent: String,
    pub analysis: MarketAnalysis,
}

#[derive(Debug, Deserialize)]
pub struct AgentTradeRequest {
    #[serde(default)]
    pub market_data: serde_json::Value,
    #[serde(default)]
    pub portfolio: serde_json::Value,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub execute: bool,
}

#[derive(Debug, Serialize)]
pub struct AgentTradeResponse {
    pub success: bool,
    pub agent: String,
    pub decision: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_request: Option<TradeRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<TradeResult>,
}

// ---------------------------------------------------------------------------
// Service handlers
// ---------------------------------------------------------------------------

/// GET /
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "Syrup Trading API",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Platform handlers
// ---------------------------------------------------------------------------

/// POST /api/platforms/register
pub async fn register_platform(
    State(state): State<AppState>,
    Json(credentials): Json<PlatformCredentials>,
) -> Result<Json<PlatformResponse>, ApiError> {
    let platform = credentials.platform;
    state
        .trade_router
        .write()
        .await
        .register_platform(credentials)
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    Ok(Json(PlatformResponse {
        success: true,
        platform,
        message: "Platform registered successfully".to_string(),
    }))
}

/// POST /api/platforms/unregister
pub async fn unregister_platform(
    State(state): State<AppState>,
    Json(request): Json<UnregisterRequest>,
) -> Json<PlatformResponse> {
    state
        .trade_router
        .write()
        .await
        .unregister_platform(request.platform)
        .await;

    Json(PlatformResponse {
        success: true,
        platform: request.platform,
        message: "Platform unregistered successfully".to_string(),
    })
}

/// GET /api/balances
pub async fn get_all_balances(State(state): State<AppState>) -> Json<BalancesResponse> {
    let balances = state.trade_router.read().await.get_all_balances().await;
    Json(BalancesResponse {
        success: true,
        balances: balances
            .into_iter()
            .map(|(platform, balance)| (platform.to_string(), balance))
            .collect(),
    })
}

/// GET /api/balances/:platform
pub async fn get_platform_balance(
    State(state): State<AppState>,
    Path(platform): Path<Platform>,
    Query(query): Query<TokenQuery>,
) -> Json<PlatformBalanceResponse> {
    let balance = state
        .trade_router
        .read()
        .await
        .get_balance(platform, query.token.as_deref())
        .await;

    Json(PlatformBalanceResponse {
        success: true,
        platform,
        balance,
    })
}

/// GET /api/price/:platform/:symbol
pub async fn get_price(
    State(state): State<AppState>,
    Path((platform, symbol)): Path<(Platform, String)>,
) -> Json<PriceResponse> {
    let price = state
        .trade_router
        .read()
        .await
        .get_price(platform, &symbol)
        .await;

    Json(PriceResponse {
        success: true,
        platform,
        symbol,
        price,
    })
}

/// POST /api/trade/execute
pub async fn execute_trade(
    State(state): State<AppState>,
    Json(trade): Json<TradeRequest>,
) -> Json<TradeResult> {
    let result = state.trade_router.read().await.execute_trade(&trade).await;
    info!(trade = %trade, status = %result.status, "Trade dispatched");
    Json(result)
}

// ---------------------------------------------------------------------------
// Agent handlers
// ---------------------------------------------------------------------------

/// POST /api/agent/create
pub async fn create_agent(
    State(state): State<AppState>,
    Json(config): Json<AgentConfig>,
) -> Result<Json<AgentCreatedResponse>, ApiError> {
    let name = config.name.clone();
    let agent_type = config.agent_type.to_string();

    let agent = agents::build_agent(config).map_err(|e| ApiError::bad_request(e.to_string()))?;
    state.agents.write().await.insert(name.clone(), agent);
    info!(agent = %name, agent_type = %agent_type, "Agent created");

    Ok(Json(AgentCreatedResponse {
        success: true,
        agent_name: name,
        agent_type,
        message: "Agent created successfully".to_string(),
    }))
}

/// GET /api/agents
pub async fn list_agents(State(state): State<AppState>) -> Json<AgentsListResponse> {
    let agents = state.agents.read().await;
    Json(AgentsListResponse {
        success: true,
        agents: agents
            .iter()
            .map(|(name, agent)| AgentSummary {
                name: name.clone(),
                agent_type: agent.config().agent_type.to_string(),
                platforms: agent.config().platforms.clone(),
            })
            .collect(),
    })
}

/// DELETE /api/agent/:name
pub async fn delete_agent(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let removed = state.agents.write().await.remove(&name);
    if removed.is_none() {
        return Err(ApiError::not_found(format!("Agent {name} not found")));
    }

    Ok(Json(MessageResponse {
        success: true,
        message: format!("Agent {name} deleted"),
    }))
}

/// POST /api/agent/:name/analyze
pub async fn agent_analyze(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let agents = state.agents.read().await;
    let agent = agents
        .get(&name)
        .ok_or_else(|| ApiError::not_found(format!("Agent {name} not found")))?;

    let analysis = agent
        .analyze_market(&request.market_data, &request.context)
        .await;

    Ok(Json(AnalyzeResponse {
        success: true,
        agent: name,
        analysis,
    }))
}

/// POST /api/agent/:name/trade
pub async fn agent_trade(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<AgentTradeRequest>,
) -> Result<Json<AgentTradeResponse>, ApiError> {
    let agents = state.agents.read().await;
    let agent = agents
        .get(&name)
        .ok_or_else(|| ApiError::not_found(format!("Agent {name} not found")))?;

    let trade_request = agent
        .generate_trade_decision(&request.market_data, &request.portfolio, &request.context)
        .await;

    let Some(trade_request) = trade_request else {
        return Ok(Json(AgentTradeResponse {
            success: true,
            agent: name,
            decision: "hold",
            message: Some("Agent decided not to trade".to_string()),
            trade_request: None,
            execution_result: None,
        }));
    };

    let execution_result = if request.execute {
        Some(
            state
                .trade_router
                .read()
                .await
                .execute_trade(&trade_request)
                .await,
        )
    } else {
        None
    };

    Ok(Json(AgentTradeResponse {
        success: true,
        agent: name,
        decision: "trade",
        message: None,
        trade_request: Some(trade_request),
        execution_result,
    }))
}

/// POST /api/agent/:name/stream
///
/// Forwards analysis fragments verbatim as SSE data events. The
/// underlying stream never errors — failures arrive as a final
/// "Error: ..." fragment — so this response cannot abort mid-way.
pub async fn agent_stream(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>, ApiError> {
    let agents = state.agents.read().await;
    let agent = agents
        .get(&name)
        .ok_or_else(|| ApiError::not_found(format!("Agent {name} not found")))?;

    let stream = agent
        .stream_analysis(&request.market_data, &request.context)
        .await;

    let events: Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> =
        Box::pin(stream.map(|chunk| Ok::<Event, Infallible>(Event::default().data(chunk))));

    Ok(Sse::new(events))
}
