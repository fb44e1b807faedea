//! Dashboard API route handlers.
//!
//! All endpoints return JSON except the weekly summary, which is markdown.
//! State is shared via `Arc<DashboardState>`; every handler goes through the
//! `Club` service so records are reloaded on each request.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::engine::accountant::{AssetValuation, MemberLine};
use crate::engine::{Club, ClubReport, PurchaseRequest};
use crate::export::ExportKind;
use crate::types::{ClubError, ContributionRecord, Member, TransactionRecord};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub club: Club,
    /// Default per-member amount for `POST /api/contributions/weekly`.
    pub weekly_contribution: Decimal,
}

impl DashboardState {
    pub fn new(club: Club, weekly_contribution: Decimal) -> Self {
        Self {
            club,
            weekly_contribution,
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// JSON error response: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let status = match err.downcast_ref::<ClubError>() {
            Some(ClubError::InvalidInput(_)) | Some(ClubError::MalformedRecord(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Some(ClubError::InsufficientCash { .. }) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %err, "Request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl From<ClubError> for ApiError {
    fn from(err: ClubError) -> Self {
        anyhow::Error::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ContributionRequest {
    /// Full or first name.
    pub member: String,
    pub amount: Decimal,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeeklyRoundRequest {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoldingsResponse {
    pub assets: Vec<AssetValuation>,
    pub total_cost_basis: Decimal,
    pub portfolio_value: Decimal,
    pub unrealized_gain: Decimal,
    pub available_cash: Decimal,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

async fn current_report(state: &AppState) -> ApiResult<ClubReport> {
    Ok(state.club.report(Utc::now()).await?)
}

/// GET /api/summary
pub async fn get_summary(State(state): State<AppState>) -> ApiResult<Json<ClubReport>> {
    Ok(Json(current_report(&state).await?))
}

/// GET /api/members
pub async fn get_members(State(state): State<AppState>) -> ApiResult<Json<Vec<MemberLine>>> {
    Ok(Json(current_report(&state).await?.members))
}

/// GET /api/holdings
pub async fn get_holdings(State(state): State<AppState>) -> ApiResult<Json<HoldingsResponse>> {
    let report = current_report(&state).await?;
    Ok(Json(HoldingsResponse {
        assets: report.valuations,
        total_cost_basis: report.total_cost_basis,
        portfolio_value: report.portfolio_value,
        unrealized_gain: report.unrealized_gain,
        available_cash: report.available_cash,
    }))
}

/// GET /api/contributions
pub async fn get_contributions(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ContributionRecord>>> {
    Ok(Json(state.club.contributions()?))
}

/// POST /api/contributions
pub async fn post_contribution(
    State(state): State<AppState>,
    Json(req): Json<ContributionRequest>,
) -> ApiResult<(StatusCode, Json<ContributionRecord>)> {
    let member: Member = req.member.parse()?;
    let record = state.club.record_contribution(member, req.amount, req.date)?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /api/contributions/weekly
pub async fn post_weekly_round(
    State(state): State<AppState>,
    Json(req): Json<WeeklyRoundRequest>,
) -> ApiResult<(StatusCode, Json<Vec<ContributionRecord>>)> {
    let amount = req.amount.unwrap_or(state.weekly_contribution);
    let records = state.club.record_weekly_round(amount, req.date)?;
    Ok((StatusCode::CREATED, Json(records)))
}

/// GET /api/transactions
pub async fn get_transactions(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TransactionRecord>>> {
    Ok(Json(state.club.transactions()?))
}

/// POST /api/transactions
pub async fn post_transaction(
    State(state): State<AppState>,
    Json(req): Json<PurchaseRequest>,
) -> ApiResult<(StatusCode, Json<TransactionRecord>)> {
    let record = state.club.record_purchase(req)?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/weekly-summary
pub async fn get_weekly_summary(State(state): State<AppState>) -> ApiResult<Response> {
    let report = current_report(&state).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        report.render_weekly_summary(),
    )
        .into_response())
}

/// GET /api/export/:file, e.g. `/api/export/holdings.csv`
pub async fn get_export(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<Response> {
    let kind: ExportKind = file
        .parse()
        .map_err(|e: ClubError| ApiError::new(StatusCode::NOT_FOUND, e.to_string()))?;
    let csv = state.club.export_csv(kind)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", kind.file_name()),
            ),
        ],
        csv,
    )
        .into_response())
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::{NoPrices, PriceService, PriceSource};
    use crate::storage::MemoryStore;
    use crate::types::Asset;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Offline;

    #[async_trait]
    impl PriceSource for Offline {
        async fn fetch_price(&self, _asset: Asset) -> anyhow::Result<Decimal> {
            anyhow::bail!("offline")
        }

        fn name(&self) -> &str {
            "offline"
        }
    }

    fn test_state() -> AppState {
        let prices = PriceService::new(Arc::new(Offline), Duration::from_millis(50));
        let club = Club::new("Test Club", Arc::new(MemoryStore::new()), prices);
        Arc::new(DashboardState::new(club, dec!(75)))
    }

    #[test]
    fn test_api_error_status_mapping() {
        let err: ApiError = ClubError::InvalidInput("bad".into()).into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);

        let err: ApiError = ClubError::InsufficientCash { needed: dec!(10), available: dec!(5) }.into();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err: ApiError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_post_contribution_by_first_name() {
        let state = test_state();
        let req = ContributionRequest { member: "ross".into(), amount: dec!(75), date: None };
        let (status, Json(record)) = post_contribution(State(state.clone()), Json(req)).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(record.member, Member::RossParmenter);

        let Json(all) = get_contributions(State(state)).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_post_contribution_unknown_member() {
        let req = ContributionRequest { member: "Dave".into(), amount: dec!(75), date: None };
        let err = post_contribution(State(test_state()), Json(req)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_weekly_round_uses_configured_amount() {
        let state = test_state();
        let (_, Json(records)) =
            post_weekly_round(State(state), Json(WeeklyRoundRequest::default())).await.unwrap();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.amount == dec!(75)));
    }

    #[tokio::test]
    async fn test_members_and_holdings_with_fallback() {
        let state = test_state();
        state.club.record_weekly_round(dec!(75), None).unwrap();

        let Json(members) = get_members(State(state.clone())).await.unwrap();
        assert_eq!(members.len(), 4);
        assert!(members.iter().all(|m| m.fraction == dec!(0.25)));

        let Json(holdings) = get_holdings(State(state)).await.unwrap();
        assert_eq!(holdings.available_cash, dec!(300));
        assert_eq!(holdings.portfolio_value, Decimal::ZERO);
        assert_eq!(
            holdings.assets[0].price,
            crate::engine::accounting::resolve_price(&NoPrices, Asset::Btc).0
        );
    }
}
