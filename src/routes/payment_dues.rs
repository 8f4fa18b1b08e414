use axum::{
    extract::{Path, Query, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::{
    auth::require_actor,
    db::db_pool,
    error::{AppError, AppResult},
    models::round_money,
    repository::{
        customers::find_customer,
        payment_dues::{
            count_pending_dues, customer_pending_dues, dues_for_payment, list_paid_batches,
            list_pending_summaries,
        },
        payments::latest_settlement,
    },
    schemas::{validate_input, CustomerPath, DuesQuery, SettleDuesInput, StatementPath},
    scope::AccessScope,
    services::{
        settlement::settle_customer_dues, statement_link::ensure_valid_token,
        statement_pdf::render_statement,
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/payment-dues", axum::routing::get(list_pending))
        .route("/payment-dues/paid", axum::routing::get(list_paid))
        .route(
            "/payment-dues/customers/{customer_id}",
            axum::routing::get(get_customer_dues),
        )
        .route("/payment-dues/settle", axum::routing::post(settle_dues))
        .route(
            "/payment-dues/pdf/{customer_id}/{token}",
            axum::routing::get(download_statement),
        )
}

async fn list_pending(
    State(state): State<AppState>,
    Query(query): Query<DuesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    query.filters.check_range()?;
    let actor = require_actor(&state, &headers).await?;
    let pool = db_pool(&state)?;
    let scope = AccessScope::resolve(pool, &actor).await?;

    let page = query.page_request();
    let (rows, total) = list_pending_summaries(pool, &scope, &query.filters, page).await?;
    Ok(Json(page.envelope(rows, total)))
}

async fn list_paid(
    State(state): State<AppState>,
    Query(query): Query<DuesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    query.filters.check_range()?;
    let actor = require_actor(&state, &headers).await?;
    let pool = db_pool(&state)?;
    let scope = AccessScope::resolve(pool, &actor).await?;

    let page = query.page_request();
    let (rows, total) = list_paid_batches(pool, &scope, &query.filters, page).await?;
    Ok(Json(page.envelope(rows, total)))
}

async fn get_customer_dues(
    State(state): State<AppState>,
    Path(path): Path<CustomerPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let actor = require_actor(&state, &headers).await?;
    let pool = db_pool(&state)?;
    let scope = AccessScope::resolve(pool, &actor).await?;

    // An empty scope is refused before the customer row is read.
    if scope.is_empty() {
        return Err(AppError::Forbidden(
            "Forbidden: your role has no customers to view.".to_string(),
        ));
    }

    let customer = find_customer(pool, path.customer_id).await?;
    let dues = customer_pending_dues(pool, &scope, customer.id).await?;
    if dues.is_empty() && scope != AccessScope::All {
        let pending = count_pending_dues(pool, customer.id).await?;
        scope.ensure_customer_visible(dues.len(), pending)?;
    }
    let total = round_money(dues.iter().map(|due| due.balance_due).sum::<Decimal>());

    Ok(Json(json!({
        "customer": customer,
        "dues": dues,
        "total_balance_due": total,
    })))
}

async fn settle_dues(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SettleDuesInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let actor = require_actor(&state, &headers).await?;
    let outcome = settle_customer_dues(&state, &actor, &payload).await?;
    Ok((StatusCode::CREATED, Json(json!(outcome))))
}

/// Public: the token in the path is the only credential.
async fn download_statement(
    State(state): State<AppState>,
    Path(path): Path<StatementPath>,
) -> AppResult<impl IntoResponse> {
    ensure_valid_token(&state.config, path.customer_id, &path.token)?;
    let pool = db_pool(&state)?;

    let customer = find_customer(pool, path.customer_id).await?;
    let payment = latest_settlement(pool, customer.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No settlement found for this customer.".to_string()))?;
    let dues = dues_for_payment(pool, payment.id).await?;

    let bytes = render_statement(&state.config, &customer, &payment, &dues)?;
    tracing::debug!(customer_id = customer.id, payment_id = payment.id, size = bytes.len(), "Rendered statement");

    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("inline; filename=\"statement-{}-{}.pdf\"", customer.id, payment.id),
            ),
            (CACHE_CONTROL, "private, no-store".to_string()),
        ],
        bytes,
    ))
}
