use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_actor,
    db::db_pool,
    error::AppResult,
    repository::payments::list_payments,
    schemas::{validate_input, PaymentPath, PaymentsQuery, RecordPaymentInput},
    scope::AccessScope,
    services::payments::{get_payment, record_payment},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/payments",
            axum::routing::get(list_payment_history).post(create_payment),
        )
        .route("/payments/{payment_id}", axum::routing::get(show_payment))
}

async fn list_payment_history(
    State(state): State<AppState>,
    Query(query): Query<PaymentsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    query.filters.check_range()?;
    let actor = require_actor(&state, &headers).await?;
    let pool = db_pool(&state)?;
    let scope = AccessScope::resolve(pool, &actor).await?;

    let page = query.page_request();
    let (rows, total) = list_payments(
        pool,
        &scope,
        &query.filters,
        query.payment_mode.as_deref(),
        page,
    )
    .await?;
    Ok(Json(page.envelope(rows, total)))
}

async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RecordPaymentInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let actor = require_actor(&state, &headers).await?;
    let recorded = record_payment(&state, &actor, &payload).await?;
    Ok((StatusCode::CREATED, Json(json!(recorded))))
}

async fn show_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let actor = require_actor(&state, &headers).await?;
    let detail = get_payment(&state, &actor, path.payment_id).await?;
    Ok(Json(json!(detail)))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::{config::AppConfig, state::AppState};

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let app = Router::new()
            .nest("/api", super::router())
            .with_state(AppState::with_pool(AppConfig::for_tests(), None));
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/payments")
            .header("content-type", "application/json")
            .header("x-user-id", "5")
            .body(Body::from(body))
            .expect("request")
    }

    #[tokio::test]
    async fn overpayment_is_rejected_with_field_errors() {
        let (status, body) = send(post(
            r#"{"invoice_id": 1, "customer_id": 3, "service_charge": "100.00",
                "item_amount": "0", "discount": "0", "paid_amount": "150.00",
                "payment_mode": "cash"}"#,
        ))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["__all__"].is_array());
    }

    #[tokio::test]
    async fn valid_payment_needs_a_database() {
        let (status, _) = send(post(
            r#"{"ticket_id": 8, "customer_id": 3, "service_charge": "100.00",
                "paid_amount": "60.00", "payment_mode": "card"}"#,
        ))
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn detail_requires_credentials() {
        let (status, _) = send(
            Request::builder()
                .uri("/api/payments/4")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
