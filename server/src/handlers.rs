//! HTTP handlers for the node API

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use deepchain_ledger::primitives::{Address, B256};
use deepchain_ledger::{AssetDirectory, Receipt};
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::models::*;
use crate::services::node::{NodeService, MAX_EVENT_PAGE};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub node: Arc<NodeService>,
}

impl AppState {
    pub fn new(config: Config, node: NodeService) -> Self {
        Self {
            config,
            node: Arc::new(node),
        }
    }
}

fn parse_address(raw: &str) -> Result<Address, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid address: {}", raw)))
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.node.health().await)
}

/// Registered assets and their cross-chain symbols
pub async fn list_assets(State(state): State<AppState>) -> Json<AssetDirectory> {
    Json(state.node.assets().await)
}

/// Page through the event log
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<EventsResponse> {
    let since = query.since.unwrap_or_default();
    let (next, events) = state
        .node
        .events_since(since, query.limit.unwrap_or(MAX_EVENT_PAGE))
        .await;

    Json(EventsResponse {
        chain_id: state.config.chain_id,
        next,
        events,
    })
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AccountInfo>, AppError> {
    let address = parse_address(&address)?;
    Ok(Json(state.node.account(address).await))
}

pub async fn get_model(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<ModelView>, AppError> {
    let model_hash: B256 = hash
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid model hash: {}", hash)))?;
    let model = state
        .node
        .model(model_hash)
        .await
        .ok_or_else(|| AppError::NotFound(format!("model {}", model_hash)))?;
    Ok(Json(model))
}

pub async fn get_reputation(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ReputationView>, AppError> {
    let address = parse_address(&address)?;
    Ok(Json(state.node.reputation(address).await))
}

/// Submit a signed transaction
///
/// A call that runs and fails still returns 200 with a failed receipt.
/// Only transactions refused before execution (bad signature, wrong chain,
/// stale nonce) are reported as errors.
pub async fn submit_transaction(
    State(state): State<AppState>,
    Json(request): Json<SubmitTransaction>,
) -> Result<Json<Receipt>, AppError> {
    let signature = hex::decode(request.signature.trim_start_matches("0x"))
        .map_err(|_| AppError::InvalidSignature)?;
    let receipt = state.node.submit(&request.payload, &signature).await?;
    Ok(Json(receipt))
}

/// Store a model artifact; the body is the artifact JSON
pub async fn store_model(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StoredModel>, AppError> {
    let model_id = state.node.store_model(&body).await?;
    Ok(Json(StoredModel { model_id }))
}

pub async fn run_inference(
    State(state): State<AppState>,
    Json(request): Json<InferenceRequest>,
) -> Result<Json<InferenceResponse>, AppError> {
    let results = state.node.infer(&request.model_id, &request.input).await?;
    Ok(Json(InferenceResponse {
        model_id: request.model_id,
        results,
    }))
}
