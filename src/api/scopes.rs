use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{Address, TokenType};
use crate::engine::{ScopeKey, ScopeState, TimeseriesSnapshot};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeQuery {
    pub account: Option<String>,
    pub system: Option<String>,
    pub token_type: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesQuery {
    pub account: Option<String>,
    pub system: Option<String>,
    pub token_type: Option<String>,
    pub token: Option<String>,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDto {
    pub kind: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub total_value_exact: String,
    pub total_value: String,
    pub total_frozen_exact: String,
    pub total_frozen: String,
    pub total_available_exact: String,
    pub total_available: String,
    pub total_value_in_base_currency: String,
    pub balances_count: i64,
    pub token_balances_count: i64,
    pub count: i64,
    pub launched_count: i64,
    pub percentage_of_total_supply: String,
    pub event_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_ms: Option<i64>,
}

impl From<ScopeState> for ScopeDto {
    fn from(state: ScopeState) -> Self {
        let key = &state.key;
        Self {
            kind: key.kind().to_string(),
            id: key.id(),
            account: key.account().map(|a| a.to_string()),
            system: key.system().map(|s| s.to_string()),
            token_type: key.token_type().map(|t| t.to_string()),
            token: key.token().map(|t| t.to_string()),
            total_value_exact: state.total_value_exact.to_string(),
            total_value: state.total_value.to_canonical_string(),
            total_frozen_exact: state.total_frozen_exact.to_string(),
            total_frozen: state.total_frozen.to_canonical_string(),
            total_available_exact: state.total_available_exact.to_string(),
            total_available: state.total_available.to_canonical_string(),
            total_value_in_base_currency: state.total_value_in_base_currency.to_canonical_string(),
            balances_count: state.balances_count,
            token_balances_count: state.token_balances_count,
            count: state.count,
            launched_count: state.launched_count,
            percentage_of_total_supply: state.percentage_of_total_supply.to_canonical_string(),
            event_count: state.event_count,
            last_event: state.last_event.map(|e| e.to_string()),
            last_updated_ms: state.last_updated.map(|t| t.as_ms()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesPointDto {
    pub event: String,
    pub timestamp_ms: i64,
    pub state: ScopeDto,
}

impl From<TimeseriesSnapshot> for TimeseriesPointDto {
    fn from(snapshot: TimeseriesSnapshot) -> Self {
        Self {
            event: snapshot.event.to_string(),
            timestamp_ms: snapshot.timestamp.as_ms(),
            state: snapshot.state.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesResponse {
    pub kind: String,
    pub id: String,
    pub points: Vec<TimeseriesPointDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTypesResponse {
    pub system: String,
    pub token_types: Vec<ScopeDto>,
}

fn parse_address(raw: Option<&str>, name: &str) -> Result<Option<Address>, AppError> {
    raw.map(|s| {
        Address::from_str(s).map_err(|e| AppError::BadRequest(format!("Invalid {}: {}", name, e)))
    })
    .transpose()
}

/// Infer the scope from whichever dimensions the caller supplied.
fn parse_scope_key(
    account: Option<&str>,
    system: Option<&str>,
    token_type: Option<&str>,
    token: Option<&str>,
) -> Result<ScopeKey, AppError> {
    let token_type = match token_type {
        Some(t) if t.trim().is_empty() => {
            return Err(AppError::BadRequest("Invalid tokenType: empty".into()))
        }
        other => other.map(TokenType::new),
    };
    ScopeKey::from_parts(
        parse_address(account, "account")?,
        parse_address(system, "system")?,
        token_type,
        parse_address(token, "token")?,
    )
    .map_err(|e| AppError::BadRequest(format!("Invalid scope: {}", e)))
}

pub async fn get_scope(
    Query(params): Query<ScopeQuery>,
    State(state): State<AppState>,
) -> Result<Json<ScopeDto>, AppError> {
    let key = parse_scope_key(
        params.account.as_deref(),
        params.system.as_deref(),
        params.token_type.as_deref(),
        params.token.as_deref(),
    )?;

    let scope = state
        .repo
        .get_scope_state(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Scope {} not found", key)))?;
    Ok(Json(scope.into()))
}

pub async fn get_timeseries(
    Query(params): Query<TimeseriesQuery>,
    State(state): State<AppState>,
) -> Result<Json<TimeseriesResponse>, AppError> {
    let key = parse_scope_key(
        params.account.as_deref(),
        params.system.as_deref(),
        params.token_type.as_deref(),
        params.token.as_deref(),
    )?;
    if let (Some(from_ms), Some(to_ms)) = (params.from_ms, params.to_ms) {
        if from_ms > to_ms {
            return Err(AppError::BadRequest("fromMs must be <= toMs".into()));
        }
    }

    let points = state
        .repo
        .query_timeseries(&key, params.from_ms, params.to_ms)
        .await?;

    Ok(Json(TimeseriesResponse {
        kind: key.kind().to_string(),
        id: key.id(),
        points: points.into_iter().map(Into::into).collect(),
    }))
}

pub async fn get_token_types(
    Path(system): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TokenTypesResponse>, AppError> {
    let system = Address::from_str(&system)
        .map_err(|e| AppError::BadRequest(format!("Invalid system: {}", e)))?;

    let scopes = state.repo.list_token_type_scopes(&system).await?;
    Ok(Json(TokenTypesResponse {
        system: system.to_string(),
        token_types: scopes.into_iter().map(Into::into).collect(),
    }))
}
