use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppResult,
    models::{NewPayment, Payment, SETTLEMENT_DESCRIPTION},
    repository::table_service::{map_db_error, push_date_range, push_search},
    schemas::{DueFilters, PageRequest},
    scope::AccessScope,
};

const PAYMENT_COLUMNS: &str = "p.id, p.invoice_id, p.ticket_id, p.customer_id, p.branch_id, \
     p.service_charge, p.item_amount, p.total_amount, p.discount, p.net_amount, p.paid_amount, \
     p.balance_due, p.payment_mode, p.description, p.created_by, p.created_at, p.updated_at";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentListItem {
    pub id: i64,
    pub invoice_id: Option<i64>,
    pub ticket_id: Option<i64>,
    pub customer_id: i64,
    pub customer_name: String,
    pub branch_name: Option<String>,
    pub net_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_due: Decimal,
    pub payment_mode: String,
    pub description: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

pub async fn insert_payment(conn: &mut PgConnection, payment: &NewPayment) -> AppResult<Payment> {
    sqlx::query_as::<_, Payment>(
        "INSERT INTO payments
            (invoice_id, ticket_id, customer_id, branch_id, service_charge, item_amount,
             total_amount, discount, net_amount, paid_amount, balance_due, payment_mode,
             description, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
         RETURNING id, invoice_id, ticket_id, customer_id, branch_id, service_charge,
                   item_amount, total_amount, discount, net_amount, paid_amount, balance_due,
                   payment_mode, description, created_by, created_at, updated_at",
    )
    .bind(payment.invoice_id)
    .bind(payment.ticket_id)
    .bind(payment.customer_id)
    .bind(payment.branch_id)
    .bind(payment.service_charge)
    .bind(payment.item_amount)
    .bind(payment.total_amount)
    .bind(payment.discount)
    .bind(payment.net_amount)
    .bind(payment.paid_amount)
    .bind(payment.balance_due)
    .bind(&payment.payment_mode)
    .bind(&payment.description)
    .bind(payment.created_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_db_error)
}

pub async fn find_payment(pool: &PgPool, payment_id: i64) -> AppResult<Option<Payment>> {
    let mut query = QueryBuilder::<Postgres>::new("SELECT ");
    query
        .push(PAYMENT_COLUMNS)
        .push(" FROM payments p WHERE p.id = ")
        .push_bind(payment_id)
        .push(" LIMIT 1");
    query
        .build_query_as::<Payment>()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)
}

/// The most recent dues settlement recorded for a customer.
pub async fn latest_settlement(pool: &PgPool, customer_id: i64) -> AppResult<Option<Payment>> {
    let mut query = QueryBuilder::<Postgres>::new("SELECT ");
    query
        .push(PAYMENT_COLUMNS)
        .push(" FROM payments p WHERE p.customer_id = ")
        .push_bind(customer_id)
        .push(" AND p.description = ")
        .push_bind(SETTLEMENT_DESCRIPTION)
        .push(" AND EXISTS (SELECT 1 FROM payment_dues pd WHERE pd.payment_id = p.id)")
        .push(" ORDER BY p.created_at DESC, p.id DESC LIMIT 1");
    query
        .build_query_as::<Payment>()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)
}

fn push_payment_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    scope: &AccessScope,
    filters: &DueFilters,
    payment_mode: Option<&str>,
) {
    query.push(" WHERE 1=1");
    scope.push_predicate(query, "p");
    if let Some(customer_id) = filters.customer_id {
        query.push(" AND p.customer_id = ").push_bind(customer_id);
    }
    if let Some(mode) = payment_mode.map(str::trim).filter(|mode| !mode.is_empty()) {
        query
            .push(" AND p.payment_mode ILIKE ")
            .push_bind(mode.to_string());
    }
    push_date_range(query, "p.created_at", filters.from_date, filters.to_date);
    push_search(
        query,
        &["c.name", "c.phone", "c.email", "p.description"],
        filters.search.as_deref(),
    );
}

fn payments_page_query<'a>(
    scope: &AccessScope,
    filters: &DueFilters,
    payment_mode: Option<&str>,
    page: PageRequest,
) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(
        "SELECT p.id, p.invoice_id, p.ticket_id, p.customer_id, c.name AS customer_name, \
         b.name AS branch_name, p.net_amount, p.paid_amount, p.balance_due, p.payment_mode, \
         p.description, p.created_by, p.created_at \
         FROM payments p \
         JOIN customers c ON c.id = p.customer_id \
         LEFT JOIN branches b ON b.id = p.branch_id",
    );
    push_payment_filters(&mut query, scope, filters, payment_mode);
    query
        .push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ")
        .push_bind(page.per_page)
        .push(" OFFSET ")
        .push_bind(page.offset());
    query
}

fn payments_count_query<'a>(
    scope: &AccessScope,
    filters: &DueFilters,
    payment_mode: Option<&str>,
) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*)::bigint FROM payments p JOIN customers c ON c.id = p.customer_id",
    );
    push_payment_filters(&mut query, scope, filters, payment_mode);
    query
}

pub async fn list_payments(
    pool: &PgPool,
    scope: &AccessScope,
    filters: &DueFilters,
    payment_mode: Option<&str>,
    page: PageRequest,
) -> AppResult<(Vec<PaymentListItem>, i64)> {
    if scope.is_empty() {
        return Ok((Vec::new(), 0));
    }

    let rows = payments_page_query(scope, filters, payment_mode, page)
        .build_query_as::<PaymentListItem>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)?;
    let total = payments_count_query(scope, filters, payment_mode)
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await
        .map_err(map_db_error)?;
    Ok((rows, total))
}
