//! Axum REST API handlers.

use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Datelike, Local};
use kanemane_core::aggregate::{
    category_breakdown, filter_by_currency, grand_total, monthly_totals, split_by_kind,
    CategoryTotal, KindSplit,
};
use kanemane_core::entitlement::{
    check_feature, feature_access, has_active_plan, FeatureAccess, FeatureCheck, GateState,
    RedirectTracker, RouteGuard,
};
use kanemane_core::{Currency, FeatureKey, ItemKind, LineItem, SubscriptionStatus, Tier};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::client::BackendClient;
use crate::errors::SyncError;
use crate::models::{ExportParams, NewTransaction};
use crate::sync::{self, SyncState};

pub struct ApiState {
    pub sync: Arc<SyncState>,
    pub client: BackendClient,
    pub guard: RouteGuard,
    pub tracker: Mutex<RedirectTracker>,
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RouteQuery {
    pub path: String,
}

#[derive(Deserialize)]
pub struct CurrencyQuery {
    pub currency: Option<String>,
}

#[derive(Deserialize)]
pub struct SummaryQuery {
    pub currency: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Deserialize)]
pub struct CheckoutBody {
    pub plan: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct SubscriptionResponse {
    pub loading: bool,
    pub status: Option<SubscriptionStatus>,
    pub active: bool,
    pub features: FeatureAccess,
}

#[derive(Serialize)]
pub struct RouteResponse {
    pub path: String,
    #[serde(flatten)]
    pub state: GateState,
    /// Target to navigate to, set only the first time this redirect is seen.
    pub navigate: Option<String>,
}

#[derive(Serialize)]
pub struct AssetListResponse {
    pub currency: Currency,
    pub count: usize,
    pub assets: Vec<LineItem>,
}

#[derive(Serialize)]
pub struct TotalResponse {
    pub currency: Currency,
    pub total: f64,
    pub rate: f64,
    pub asset_count: usize,
}

#[derive(Serialize)]
pub struct TransactionListResponse {
    pub currency: Currency,
    #[serde(flatten)]
    pub split: KindSplit,
}

#[derive(Serialize)]
pub struct MonthlySummaryResponse {
    pub currency: Currency,
    pub year: i32,
    pub month: u32,
    pub income: f64,
    pub expense: f64,
    pub ratio: f64,
    pub percentage: f64,
    pub remaining: f64,
    pub categories: Vec<CategoryTotal>,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub applied: bool,
    pub status: Option<SubscriptionStatus>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn backend_error(e: SyncError) -> Response {
    let status = match e {
        SyncError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    error(status, e.to_string())
}

/// Gate for actions behind a paid feature. Loading is 503, a denial is 403
/// carrying the [`FeatureCheck`] so the caller can show the upgrade prompt.
fn require_feature(status: Option<SubscriptionStatus>, feature: FeatureKey) -> Result<(), Response> {
    let Some(status) = status else {
        return Err(error(
            StatusCode::SERVICE_UNAVAILABLE,
            "subscription status is still loading",
        ));
    };
    match check_feature(&status, feature) {
        FeatureCheck::Granted { .. } => Ok(()),
        check => {
            info!("Refused {feature}: plan {:?} does not include it", status.current_plan);
            Err((StatusCode::FORBIDDEN, Json(check)).into_response())
        }
    }
}

/// Missing means JPY, the default tab.
fn currency_param(raw: Option<&str>) -> Result<Currency, Response> {
    match raw {
        None => Ok(Currency::Jpy),
        Some(s) => s
            .parse::<Currency>()
            .map_err(|e| error(StatusCode::BAD_REQUEST, e.to_string())),
    }
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /subscription`
pub async fn get_subscription(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let status = state.sync.status().await;
    Json(SubscriptionResponse {
        loading: status.is_none(),
        status,
        active: status.as_ref().is_some_and(has_active_plan),
        features: status.as_ref().map(feature_access).unwrap_or_default(),
    })
}

/// `GET /features/:feature`
///
/// 503 while the status is still loading: that is neither a grant nor a denial.
pub async fn get_feature(
    State(state): State<Arc<ApiState>>,
    Path(feature): Path<String>,
) -> Response {
    let feature = match feature.parse::<FeatureKey>() {
        Ok(feature) => feature,
        Err(e) => return error(StatusCode::NOT_FOUND, e.to_string()),
    };
    match state.sync.status().await {
        None => error(
            StatusCode::SERVICE_UNAVAILABLE,
            "subscription status is still loading",
        ),
        Some(status) => {
            let check = check_feature(&status, feature);
            if let FeatureCheck::UpgradeRequired { label, .. } = &check {
                info!("Feature {feature} ({label}) requires an upgrade");
            }
            Json(check).into_response()
        }
    }
}

/// `GET /route?path=/dashboard/assets`
pub async fn get_route(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<RouteQuery>,
) -> Response {
    let status = state.sync.status().await;
    let gate = state.guard.state(status.as_ref(), &query.path);

    let navigate = match status {
        Some(status) => {
            let mut tracker = match state.tracker.lock() {
                Ok(tracker) => tracker,
                Err(poisoned) => poisoned.into_inner(),
            };
            tracker.observe(&gate, &status, &query.path)
        }
        None => None,
    };
    if let Some(to) = &navigate {
        info!("Redirecting {} to {to}", query.path);
    }

    Json(RouteResponse {
        path: query.path,
        state: gate,
        navigate,
    })
    .into_response()
}

/// `GET /assets?currency=JPY`
pub async fn get_assets(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<CurrencyQuery>,
) -> Response {
    let currency = match currency_param(query.currency.as_deref()) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let snap = state.sync.snapshot().await;
    let assets = filter_by_currency(&snap.assets, currency);
    Json(AssetListResponse {
        currency,
        count: assets.len(),
        assets,
    })
    .into_response()
}

/// `GET /assets/total?currency=IDR`
///
/// Every asset, whatever its currency, converted into `currency`.
pub async fn get_assets_total(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<CurrencyQuery>,
) -> Response {
    let currency = match currency_param(query.currency.as_deref()) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let snap = state.sync.snapshot().await;
    Json(TotalResponse {
        currency,
        total: grand_total(&snap.assets, currency, &snap.rate),
        rate: snap.rate.rate(),
        asset_count: snap.assets.len(),
    })
    .into_response()
}

/// `GET /transactions?currency=JPY`
pub async fn get_transactions(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<CurrencyQuery>,
) -> Response {
    let currency = match currency_param(query.currency.as_deref()) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let snap = state.sync.snapshot().await;
    let items = filter_by_currency(&snap.transactions, currency);
    Json(TransactionListResponse {
        currency,
        split: split_by_kind(&items),
    })
    .into_response()
}

/// `GET /transactions/summary?currency=JPY&year=2026&month=10`
///
/// Defaults to the current local month.
pub async fn get_transactions_summary(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<SummaryQuery>,
) -> Response {
    let currency = match currency_param(query.currency.as_deref()) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let today = Local::now().date_naive();
    let year = query.year.unwrap_or_else(|| today.year());
    let month = query.month.unwrap_or_else(|| today.month());
    if !(1..=12).contains(&month) {
        return error(StatusCode::BAD_REQUEST, format!("Invalid month: {month}"));
    }

    let snap = state.sync.snapshot().await;
    let totals = monthly_totals(&snap.transactions, currency, year, month);
    let in_month: Vec<LineItem> = snap
        .transactions
        .iter()
        .filter(|tx| tx.date.is_some_and(|d| d.year() == year && d.month() == month))
        .cloned()
        .collect();

    Json(MonthlySummaryResponse {
        currency,
        year,
        month,
        income: totals.income,
        expense: totals.expense,
        ratio: totals.ratio(),
        percentage: totals.percentage(),
        remaining: totals.remaining(),
        categories: category_breakdown(&in_month, currency),
    })
    .into_response()
}

/// `GET /reports/export?start_date=..&end_date=..&currency=JPY&format=xlsx`
///
/// Pro only.
pub async fn get_report_export(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ExportParams>,
) -> Response {
    if let Err(resp) = require_feature(state.sync.status().await, FeatureKey::Export) {
        return resp;
    }
    match state.client.export_report(&params).await {
        Ok(file) => {
            let disposition = format!("attachment; filename=\"{}\"", params.file_name());
            (
                [(CONTENT_TYPE, file.content_type), (CONTENT_DISPOSITION, disposition)],
                file.bytes,
            )
                .into_response()
        }
        Err(e) => {
            warn!("Report export failed: {e}");
            backend_error(e)
        }
    }
}

/// `POST /scan` with the receipt image as the raw body. Pro only.
pub async fn post_scan(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    image: Bytes,
) -> Response {
    if let Err(resp) = require_feature(state.sync.status().await, FeatureKey::Scan) {
        return resp;
    }
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match state.client.scan_receipt(image.to_vec(), &content_type).await {
        Ok(scan) => Json::<Value>(scan).into_response(),
        Err(e) => {
            warn!("Receipt scan failed: {e}");
            backend_error(e)
        }
    }
}

/// `GET /plans`
pub async fn get_plans(State(state): State<Arc<ApiState>>) -> Response {
    match state.client.plans().await {
        Ok(plans) => Json::<Value>(plans).into_response(),
        Err(e) => backend_error(e),
    }
}

/// `GET /payments/:order_id`
pub async fn get_payment_status(
    State(state): State<Arc<ApiState>>,
    Path(order_id): Path<String>,
) -> Response {
    match state.client.payment_status(&order_id).await {
        Ok(payment) => Json::<Value>(payment).into_response(),
        Err(e) => backend_error(e),
    }
}

/// `POST /subscription/cancel`
pub async fn post_cancel(State(state): State<Arc<ApiState>>) -> Response {
    match state.client.cancel_subscription().await {
        Ok(()) => {
            info!("Subscription cancelled");
            sync::refresh(&state.sync, &state.client).await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            warn!("Cancelling subscription failed: {e}");
            backend_error(e)
        }
    }
}

/// `POST /refresh`
///
/// The only way back in after `/logout`: it starts a new session.
pub async fn post_refresh(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    state.sync.resume();
    let applied = sync::refresh(&state.sync, &state.client).await;
    Json(RefreshResponse {
        applied,
        status: state.sync.status().await,
    })
}

/// `POST /logout`
pub async fn post_logout(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    state.sync.clear().await;
    match state.tracker.lock() {
        Ok(mut tracker) => tracker.reset(),
        Err(poisoned) => poisoned.into_inner().reset(),
    }
    info!("Session cleared");
    StatusCode::NO_CONTENT
}

/// `POST /checkout` with `{"plan": "pro"}`
pub async fn post_checkout(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<CheckoutBody>,
) -> Response {
    let plan = Tier::from(body.plan.as_str());
    match state.client.checkout(plan).await {
        Ok(data) => {
            sync::refresh(&state.sync, &state.client).await;
            Json(data).into_response()
        }
        Err(e) => {
            warn!("Checkout for {} failed: {e}", body.plan);
            backend_error(e)
        }
    }
}

/// `POST /transactions/:kind` where `kind` is `income` or `expense`.
pub async fn post_transaction(
    State(state): State<Arc<ApiState>>,
    Path(kind): Path<String>,
    Json(tx): Json<NewTransaction>,
) -> Response {
    let kind = match kind.as_str() {
        "income" => ItemKind::Income,
        "expense" => ItemKind::Expense,
        other => return error(StatusCode::NOT_FOUND, format!("Unknown transaction kind: {other}")),
    };
    if !tx.amount.is_finite() || tx.amount <= 0.0 {
        return error(StatusCode::BAD_REQUEST, "amount must be a positive number");
    }

    match state.client.create_transaction(kind, &tx).await {
        Ok(created) => {
            sync::refresh(&state.sync, &state.client).await;
            (StatusCode::CREATED, Json::<Value>(created)).into_response()
        }
        Err(e) => {
            warn!("Creating {kind:?} transaction failed: {e}");
            backend_error(e)
        }
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
