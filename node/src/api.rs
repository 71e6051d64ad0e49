//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the vault node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                   | Description                          |
//! |--------|------------------------|--------------------------------------|
//! | GET    | `/health`              | Liveness probe                       |
//! | GET    | `/status`              | Vault summary                        |
//! | POST   | `/rpc`                 | JSON-RPC 2.0 gateway to the router   |
//! | GET    | `/ws`                  | WebSocket for live vault events      |
//! | GET    | `/accounts/:address`   | Shares, asset balance, and caps      |
//! | GET    | `/events?from=N`       | Event log from position `N`          |
//! | GET    | `/deployments`         | Factory deployment records           |
//!
//! ## JSON-RPC
//!
//! `method` is a canonical signature such as `deposit(uint256,address)`;
//! the node hashes it to a selector and hands the call to the dispatch
//! router. `params` is either a positional array (the call is made by the
//! zero address, which is enough for reads) or an object
//! `{ "caller": "0x…", "args": [...] }`.
//!
//! ## Trust
//!
//! This is an unauthenticated devnet gateway. `caller` is taken as given and
//! never checked against a signature, so any client that can reach `/rpc`
//! can act as any account, the owner included. Owner checks inside the
//! vault and router still hold; the node simply does not prove who is
//! asking. Do not expose it beyond a trusted network.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use coffer_contracts::factory::{Deployment, VaultFactory};
use coffer_contracts::router::{Call, ModuleError, Router as DispatchRouter, RouterError};
use coffer_contracts::vault_module::VaultModule;
use coffer_core::{Address, Amount, Event, Ledger};

use crate::config::NodeConfig;
use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Every routed vault the node has deployed, keyed by address.
pub type Deployments = VaultFactory<DispatchRouter>;

/// Shared application state available to all request handlers.
///
/// Cheap to clone; everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Address of the vault this node serves.
    pub vault: Address,
    /// Deployed routers. Reads share the lock, routed mutations take it
    /// exclusively, which serializes every vault operation.
    pub deployments: Arc<RwLock<Deployments>>,
    /// Broadcast channel for live event notifications.
    pub event_tx: broadcast::Sender<IndexedEvent>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

/// A vault event with its position in the log.
#[derive(Debug, Clone, Serialize)]
pub struct IndexedEvent {
    pub index: usize,
    #[serde(flatten)]
    pub event: Event,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured RPC port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/rpc", post(rpc_handler))
        .route("/ws", get(ws_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/events", get(events_handler))
        .route("/deployments", get(deployments_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    /// Canonical signature of the routed call, or a `coffer_*` node method.
    pub method: String,
    /// Positional arguments, or `{ caller, args }`.
    pub params: Option<Value>,
    /// Request identifier. Echoed back in the response.
    pub id: Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version. Always "2.0".
    pub jsonrpc: String,
    /// The result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier, echoed from the request.
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Short human-readable error description.
    pub message: String,
    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<RouterError> for JsonRpcError {
    fn from(error: RouterError) -> Self {
        let code = match &error {
            RouterError::NoRoute(_) | RouterError::Module(ModuleError::UnknownSelector(_)) => {
                -32601
            }
            RouterError::Module(ModuleError::InvalidArguments(_)) => -32602,
            _ => -32001,
        };
        JsonRpcError::new(code, error.to_string())
    }
}

/// Object form of `params`.
#[derive(Debug, Default, Deserialize)]
struct CallParams {
    #[serde(default)]
    caller: Option<Address>,
    #[serde(default)]
    args: Value,
}

impl CallParams {
    fn parse(params: Option<Value>) -> Result<Self, JsonRpcError> {
        match params {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(args @ Value::Array(_)) => Ok(Self { caller: None, args }),
            Some(object) => serde_json::from_value(object)
                .map_err(|e| JsonRpcError::new(-32602, format!("Invalid params: {e}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    pub vault: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Address of the custodied asset.
    pub asset: Address,
    pub owner: Address,
    pub paused: bool,
    pub total_supply: Amount,
    pub total_assets: Amount,
    /// Assets redeemable for one whole share (`10^decimals` units).
    pub assets_per_share: Amount,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: Address,
    /// Vault shares held.
    pub shares: Amount,
    /// What those shares convert to right now.
    pub share_value: Amount,
    /// Balance on the custodied asset ledger.
    pub asset_balance: Amount,
    pub max_deposit: Amount,
    pub max_mint: Amount,
    pub max_withdraw: Amount,
    pub max_redeem: Amount,
    pub restricted: bool,
}

/// Query string for `GET /events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub from: usize,
}

/// Response payload for `GET /events`.
#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub from: usize,
    /// Position to ask for next time.
    pub next: usize,
    pub events: Vec<IndexedEvent>,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl std::fmt::Display) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Router access
// ---------------------------------------------------------------------------

fn served(deployments: &Deployments, vault: Address) -> Result<&DispatchRouter, ApiError> {
    deployments
        .get(vault)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("no vault at {vault}")))
}

/// Runs a read-only routed call and decodes the answer.
fn view<T: DeserializeOwned>(
    router: &DispatchRouter,
    signature: &str,
    args: Value,
) -> Result<T, ApiError> {
    let answer = router
        .query(&Call::new(signature, Address::ZERO, args))
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    serde_json::from_value(answer).map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))
}

fn indexed(events: &[Event], from: usize) -> Vec<IndexedEvent> {
    events
        .iter()
        .enumerate()
        .map(|(offset, event)| IndexedEvent {
            index: from + offset,
            event: event.clone(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` - returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `GET /status` - returns the vault summary.
async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let deployments = state.deployments.read().await;
    let router = served(&deployments, state.vault)?;

    let decimals: u8 = view(router, "decimals()", Value::Null)?;
    let one_share = 10u64.checked_pow(u32::from(decimals)).unwrap_or(Amount::MAX);

    Ok(Json(StatusResponse {
        version: state.version.clone(),
        vault: state.vault,
        name: view(router, "name()", Value::Null)?,
        symbol: view(router, "symbol()", Value::Null)?,
        decimals,
        asset: view(router, "asset()", Value::Null)?,
        owner: view(router, "owner()", Value::Null)?,
        paused: view(router, "paused()", Value::Null)?,
        total_supply: view(router, "totalSupply()", Value::Null)?,
        total_assets: view(router, "totalAssets()", Value::Null)?,
        assets_per_share: view(router, "convertToAssets(uint256)", json!([one_share]))?,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// `GET /accounts/:address` - shares, asset balance, and current caps.
///
/// Unknown addresses are valid and report zeros.
async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountResponse>, ApiError> {
    let address: Address = address
        .parse()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    let deployments = state.deployments.read().await;
    let router = served(&deployments, state.vault)?;
    let arg = json!([address]);

    let shares: Amount = view(router, "balanceOf(address)", arg.clone())?;
    Ok(Json(AccountResponse {
        address,
        shares,
        share_value: view(router, "convertToAssets(uint256)", json!([shares]))?,
        asset_balance: view(router, "assetBalanceOf(address)", arg.clone())?,
        max_deposit: view(router, "maxDeposit(address)", arg.clone())?,
        max_mint: view(router, "maxMint(address)", arg.clone())?,
        max_withdraw: view(router, "maxWithdraw(address)", arg.clone())?,
        max_redeem: view(router, "maxRedeem(address)", arg.clone())?,
        restricted: view(router, "isRestricted(address)", arg)?,
    }))
}

/// `GET /events?from=N` - the vault event log from position `N`.
async fn events_handler(
    Query(query): Query<EventsQuery>,
    State(state): State<AppState>,
) -> Result<Json<EventsResponse>, ApiError> {
    let deployments = state.deployments.read().await;
    let router = served(&deployments, state.vault)?;
    let events = indexed(router.events_since(state.vault, query.from), query.from);

    Ok(Json(EventsResponse {
        from: query.from,
        next: query.from + events.len(),
        events,
    }))
}

/// `GET /deployments` - every deployment record, oldest first.
async fn deployments_handler(State(state): State<AppState>) -> Json<Vec<Deployment>> {
    Json(state.deployments.read().await.deployments().to_vec())
}

/// `POST /rpc` - JSON-RPC 2.0 gateway.
///
/// Read-only calls are answered under the shared lock. Anything else is
/// dispatched under the exclusive lock; the events it appended are then
/// broadcast to WebSocket subscribers.
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    let outcome = if req.jsonrpc != "2.0" {
        Err(JsonRpcError::new(
            -32600,
            "Invalid Request: jsonrpc must be \"2.0\"",
        ))
    } else {
        match req.method.as_str() {
            "coffer_version" => Ok(json!(state.version)),
            "coffer_vault" => Ok(json!(state.vault)),
            method if method.contains('(') => route_call(&state, method, req.params).await,
            method => Err(JsonRpcError::new(
                -32601,
                format!("Method not found: {method}"),
            )),
        }
    };

    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(error) => (None, Some(error)),
    };
    Json(JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id: req.id,
    })
}

async fn route_call(
    state: &AppState,
    signature: &str,
    params: Option<Value>,
) -> Result<Value, JsonRpcError> {
    let params = CallParams::parse(params)?;
    let call = Call::new(
        signature,
        params.caller.unwrap_or(Address::ZERO),
        params.args,
    );

    {
        let deployments = state.deployments.read().await;
        let router = deployments
            .get(state.vault)
            .ok_or_else(|| JsonRpcError::new(-32603, "served vault is missing"))?;
        match router.query(&call) {
            Err(RouterError::NotQuery(_)) => {}
            answer => return answer.map_err(JsonRpcError::from),
        }
    }

    let started = Instant::now();
    let mut deployments = state.deployments.write().await;
    let router = deployments
        .get_mut(state.vault)
        .ok_or_else(|| JsonRpcError::new(-32603, "served vault is missing"))?;

    let logged = router.events_since(state.vault, 0).len();
    let result = router.dispatch(&call);
    state
        .metrics
        .operation_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    match &result {
        Ok(_) => {
            state
                .metrics
                .operations_total
                .with_label_values(&[signature])
                .inc();
            tracing::debug!(method = signature, caller = %call.caller, "routed call committed");
        }
        Err(error) => {
            state
                .metrics
                .rejected_operations_total
                .with_label_values(&[signature])
                .inc();
            tracing::warn!(method = signature, caller = %call.caller, %error, "routed call rejected");
        }
    }

    publish(state, router, logged);
    result.map_err(JsonRpcError::from)
}

/// Broadcasts events appended since `from` and refreshes the vault gauges.
fn publish(state: &AppState, router: &DispatchRouter, from: usize) {
    for event in indexed(router.events_since(state.vault, from), from) {
        state.metrics.events_total.inc();
        // No subscribers is not an error.
        let _ = state.event_tx.send(event);
    }

    let supply = router.query(&Call::new("totalSupply()", Address::ZERO, Value::Null));
    let assets = router.query(&Call::new("totalAssets()", Address::ZERO, Value::Null));
    if let (Ok(supply), Ok(assets)) = (supply, assets) {
        if let (Some(supply), Some(assets)) = (supply.as_u64(), assets.as_u64()) {
            state.metrics.observe_vault(supply, assets);
        }
    }
}

/// `GET /ws` - WebSocket upgrade for live event streaming.
///
/// Clients receive JSON-encoded [`IndexedEvent`] messages as routed calls
/// commit. The connection is read-only from the server's perspective;
/// client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding broadcast events
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // The log is authoritative; a lagging client can catch up via /events.
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

/// Deploys the configured vault behind a fresh dispatch router.
///
/// The asset ledger is funded from `config.genesis`, the vault lands at its
/// seeded address, and every vault selector is routed to it. Returns the
/// factory holding the router together with the vault address.
pub fn deploy_vault(config: &NodeConfig) -> anyhow::Result<(Deployments, Address)> {
    let deployer = config.deployer();
    let seed = config.seed()?;
    let code = config.vault.instantiation_code()?;

    let mut factory = Deployments::new();
    let address = factory.calculate_address(deployer, &seed, &code);

    let mut asset = Ledger::new();
    for balance in &config.genesis {
        asset.mint(balance.account, balance.amount)?;
    }
    let module = VaultModule::new(address, config.vault.clone(), asset, config.owner);

    let mut router = DispatchRouter::new(config.owner);
    router.mount(config.owner, address, Box::new(module))?;
    factory.deploy_with_seed(deployer, seed, &code, |_| router)?;

    tracing::info!(
        %address,
        %deployer,
        symbol = %config.vault.symbol,
        genesis_accounts = config.genesis.len(),
        "vault deployed"
    );
    Ok((factory, address))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenesisBalance;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn bob() -> Address {
        Address::from_label("bob")
    }

    /// Creates a test AppState serving a devnet vault with alice funded.
    fn test_app_state() -> AppState {
        let mut config = NodeConfig::devnet();
        config.genesis = vec![GenesisBalance {
            account: alice(),
            amount: 10_000,
        }];
        let (factory, vault) = deploy_vault(&config).unwrap();
        let (event_tx, _) = broadcast::channel(16);
        let metrics = Arc::new(crate::metrics::NodeMetrics::new().unwrap());

        AppState {
            version: "0.1.0-test".into(),
            vault,
            deployments: Arc::new(RwLock::new(factory)),
            event_tx,
            metrics,
        }
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Sends a POST request with JSON body and returns (status, body_bytes).
    async fn post_json(router: &Router, path: &str, body: Value) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Sends one JSON-RPC call and returns the decoded envelope.
    async fn rpc(router: &Router, method: &str, params: Value) -> JsonRpcResponse {
        let (status, body) = post_json(
            router,
            "/rpc",
            json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    async fn fund_and_deposit(router: &Router, vault: Address, assets: Amount) {
        let approved = rpc(
            router,
            "assetApprove(address,uint256)",
            json!({ "caller": alice(), "args": [vault, assets] }),
        )
        .await;
        assert!(approved.error.is_none());
        let deposited = rpc(
            router,
            "deposit(uint256,address)",
            json!({ "caller": alice(), "args": [assets, alice()] }),
        )
        .await;
        assert_eq!(deposited.result, Some(json!(assets)));
    }

    // -- REST ---------------------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn status_endpoint_summarizes_empty_vault() {
        let state = test_app_state();
        let vault = state.vault;
        let router = create_router(state);
        let (status, body) = get(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.vault, vault);
        assert_eq!(resp.symbol, "cDEV");
        assert_eq!(resp.total_supply, 0);
        assert_eq!(resp.total_assets, 0);
        assert!(!resp.paused);
        // Empty vault converts one-to-one.
        assert_eq!(resp.assets_per_share, 10u64.pow(u32::from(resp.decimals)));
    }

    #[tokio::test]
    async fn account_endpoint_returns_zeros_for_unknown() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, &format!("/accounts/{}", bob())).await;

        assert_eq!(status, StatusCode::OK);
        let resp: AccountResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.address, bob());
        assert_eq!(resp.shares, 0);
        assert_eq!(resp.asset_balance, 0);
        assert_eq!(resp.max_redeem, 0);
        assert_eq!(resp.max_deposit, coffer_core::config::DEFAULT_OPERATION_CAP);
    }

    #[tokio::test]
    async fn account_endpoint_rejects_bad_address() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/accounts/not-an-address").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(!err.error.is_empty());
    }

    #[tokio::test]
    async fn deployments_endpoint_lists_served_vault() {
        let state = test_app_state();
        let vault = state.vault;
        let router = create_router(state);
        let (status, body) = get(&router, "/deployments").await;

        assert_eq!(status, StatusCode::OK);
        let records: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(records[0]["address"], json!(vault));
    }

    // -- RPC ----------------------------------------------------------------

    #[tokio::test]
    async fn rpc_deposit_updates_account_and_log() {
        let state = test_app_state();
        let vault = state.vault;
        let router = create_router(state.clone());

        fund_and_deposit(&router, vault, 4_000).await;

        let (_, body) = get(&router, &format!("/accounts/{}", alice())).await;
        let account: AccountResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(account.shares, 4_000);
        assert_eq!(account.share_value, 4_000);
        assert_eq!(account.asset_balance, 6_000);
        assert_eq!(account.max_withdraw, 4_000);

        let (_, body) = get(&router, "/events?from=0").await;
        let log: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(log["next"], 2);
        assert_eq!(log["events"][0]["type"], "transfer");
        assert_eq!(log["events"][1]["type"], "deposit");
        assert_eq!(log["events"][1]["index"], 1);

        let (_, body) = get(&router, "/events?from=2").await;
        let tail: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(tail["events"], json!([]));

        assert_eq!(state.metrics.total_supply.get(), 4_000);
    }

    #[tokio::test]
    async fn rpc_positional_params_answer_reads() {
        let state = test_app_state();
        let vault = state.vault;
        let router = create_router(state);

        let resp = rpc(&router, "assetBalanceOf(address)", json!([alice()])).await;
        assert_eq!(resp.result, Some(json!(10_000)));

        let resp = rpc(&router, "coffer_vault", Value::Null).await;
        assert_eq!(resp.result, Some(json!(vault)));
    }

    #[tokio::test]
    async fn rpc_routes_loupe_queries() {
        let state = test_app_state();
        let vault = state.vault;
        let router = create_router(state);

        let resp = rpc(&router, "facetAddresses()", Value::Null).await;
        assert_eq!(resp.result, Some(json!([vault])));
    }

    #[tokio::test]
    async fn rpc_broadcasts_committed_events() {
        let state = test_app_state();
        let vault = state.vault;
        let mut rx = state.event_tx.subscribe();
        let router = create_router(state);

        fund_and_deposit(&router, vault, 100).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.event.name(), "mint");
        assert_eq!(second.event.name(), "deposit");
    }

    #[tokio::test]
    async fn rpc_domain_error_is_reported_and_counted() {
        let state = test_app_state();
        let router = create_router(state.clone());

        // No asset approval, so the vault cannot pull the assets.
        let resp = rpc(
            &router,
            "deposit(uint256,address)",
            json!({ "caller": alice(), "args": [10, alice()] }),
        )
        .await;

        let err = resp.error.unwrap();
        assert_eq!(err.code, -32001);
        assert_eq!(
            state
                .metrics
                .rejected_operations_total
                .with_label_values(&["deposit(uint256,address)"])
                .get(),
            1
        );
        let (_, body) = get(&router, "/events").await;
        let log: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(log["next"], 0);
    }

    #[tokio::test]
    async fn rpc_bad_arguments_are_invalid_params() {
        let router = create_router(test_app_state());
        let resp = rpc(&router, "balanceOf(address)", json!(["nope"])).await;
        assert_eq!(resp.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn rpc_unknown_method_not_found() {
        let router = create_router(test_app_state());

        let resp = rpc(&router, "selfDestruct()", Value::Null).await;
        assert_eq!(resp.error.unwrap().code, -32601);

        let resp = rpc(&router, "coffer_blockHeight", Value::Null).await;
        assert_eq!(resp.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn rpc_invalid_version_returns_error() {
        let router = create_router(test_app_state());
        let (_, body) = post_json(
            &router,
            "/rpc",
            json!({ "jsonrpc": "1.0", "method": "coffer_version", "id": 7 }),
        )
        .await;

        let resp: JsonRpcResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.error.unwrap().code, -32600);
        assert_eq!(resp.id, json!(7));
    }

    #[tokio::test]
    async fn owner_can_pause_through_rpc() {
        let state = test_app_state();
        let router = create_router(state);
        let owner = NodeConfig::devnet().owner;

        let denied = rpc(&router, "pause()", json!({ "caller": alice() })).await;
        assert_eq!(denied.error.unwrap().code, -32001);
        // Without a caller the call is made by the zero address, which
        // never owns anything.
        let anonymous = rpc(&router, "pause()", json!([])).await;
        assert_eq!(anonymous.error.unwrap().code, -32001);

        let paused = rpc(&router, "pause()", json!({ "caller": owner })).await;
        assert!(paused.error.is_none());

        let (_, body) = get(&router, &format!("/accounts/{}", alice())).await;
        let account: AccountResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(account.max_deposit, 0);
    }

    #[test]
    fn deploy_lands_at_precomputed_address() {
        let config = NodeConfig::devnet();
        let (factory, vault) = deploy_vault(&config).unwrap();
        let expected = factory.calculate_address(
            config.deployer(),
            &config.seed().unwrap(),
            &config.vault.instantiation_code().unwrap(),
        );
        assert_eq!(vault, expected);
        assert_eq!(factory.len(), 1);
    }
}
