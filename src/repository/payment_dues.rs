use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{DueStatus, PaymentDue},
    repository::table_service::{map_db_error, push_date_range, push_search},
    schemas::{DueFilters, PageRequest},
    scope::AccessScope,
};

const DUE_COLUMNS: &str = "pd.id, pd.invoice_id, pd.ticket_id, pd.customer_id, pd.branch_id, \
     pd.balance_due, pd.status, pd.payment_id, pd.created_by, pd.created_at, pd.updated_at";

const CUSTOMER_SEARCH_COLUMNS: &[&str] = &["c.name", "c.phone", "c.email"];

/// One row of the pending-dues listing: everything a customer still owes.
/// `branch_name` is the branch of the newest visible due, not the customer's
/// home branch.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomerDueSummary {
    pub customer_id: i64,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub branch_name: Option<String>,
    pub total_balance_due: Decimal,
    pub dues_count: i64,
    pub last_due_at: DateTime<Utc>,
}

/// One settled batch: the dues a single payment cleared for a customer.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaidDueBatch {
    pub customer_id: i64,
    pub customer_name: String,
    pub payment_id: i64,
    pub payment_mode: String,
    pub payment_date: DateTime<Utc>,
    pub total_paid: Decimal,
    pub dues_count: i64,
}

/// Shared FROM/WHERE for both listings; `status` picks pending or paid rows.
fn push_due_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    status: DueStatus,
    scope: &AccessScope,
    filters: &DueFilters,
) {
    query
        .push(" WHERE pd.status = ")
        .push_bind(status.as_str());
    scope.push_predicate(query, "pd");
    if let Some(customer_id) = filters.customer_id {
        query.push(" AND pd.customer_id = ").push_bind(customer_id);
    }
    push_date_range(query, "pd.created_at", filters.from_date, filters.to_date);
    push_search(query, CUSTOMER_SEARCH_COLUMNS, filters.search.as_deref());
}

fn pending_summary_query<'a>(
    scope: &AccessScope,
    filters: &DueFilters,
    page: PageRequest,
) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(
        "SELECT pd.customer_id, c.name AS customer_name, c.phone AS customer_phone, \
         c.email AS customer_email, \
         (ARRAY_AGG(b.name ORDER BY pd.created_at DESC, pd.id DESC))[1] AS branch_name, \
         SUM(pd.balance_due) AS total_balance_due, COUNT(pd.id)::bigint AS dues_count, \
         MAX(pd.created_at) AS last_due_at \
         FROM payment_dues pd \
         JOIN customers c ON c.id = pd.customer_id \
         LEFT JOIN branches b ON b.id = pd.branch_id",
    );
    push_due_filters(&mut query, DueStatus::Pending, scope, filters);
    query.push(
        " GROUP BY pd.customer_id, c.name, c.phone, c.email \
         ORDER BY total_balance_due DESC, pd.customer_id ASC",
    );
    query
        .push(" LIMIT ")
        .push_bind(page.per_page)
        .push(" OFFSET ")
        .push_bind(page.offset());
    query
}

fn pending_count_query<'a>(scope: &AccessScope, filters: &DueFilters) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*)::bigint FROM (SELECT pd.customer_id \
         FROM payment_dues pd \
         JOIN customers c ON c.id = pd.customer_id",
    );
    push_due_filters(&mut query, DueStatus::Pending, scope, filters);
    query.push(" GROUP BY pd.customer_id) grouped");
    query
}

fn paid_batches_query<'a>(
    scope: &AccessScope,
    filters: &DueFilters,
    page: PageRequest,
) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(
        "SELECT pd.customer_id, c.name AS customer_name, pd.payment_id, \
         p.payment_mode, p.created_at AS payment_date, \
         SUM(pd.balance_due) AS total_paid, COUNT(pd.id)::bigint AS dues_count \
         FROM payment_dues pd \
         JOIN customers c ON c.id = pd.customer_id \
         JOIN payments p ON p.id = pd.payment_id",
    );
    push_due_filters(&mut query, DueStatus::Paid, scope, filters);
    query.push(
        " GROUP BY pd.customer_id, c.name, pd.payment_id, p.payment_mode, p.created_at \
         ORDER BY payment_date DESC, pd.payment_id DESC",
    );
    query
        .push(" LIMIT ")
        .push_bind(page.per_page)
        .push(" OFFSET ")
        .push_bind(page.offset());
    query
}

fn paid_count_query<'a>(scope: &AccessScope, filters: &DueFilters) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*)::bigint FROM (SELECT pd.customer_id, pd.payment_id \
         FROM payment_dues pd \
         JOIN customers c ON c.id = pd.customer_id \
         JOIN payments p ON p.id = pd.payment_id",
    );
    push_due_filters(&mut query, DueStatus::Paid, scope, filters);
    query.push(" GROUP BY pd.customer_id, pd.payment_id) grouped");
    query
}

pub async fn list_pending_summaries(
    pool: &PgPool,
    scope: &AccessScope,
    filters: &DueFilters,
    page: PageRequest,
) -> AppResult<(Vec<CustomerDueSummary>, i64)> {
    if scope.is_empty() {
        return Ok((Vec::new(), 0));
    }

    let rows = pending_summary_query(scope, filters, page)
        .build_query_as::<CustomerDueSummary>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)?;
    let total = pending_count_query(scope, filters)
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await
        .map_err(map_db_error)?;
    Ok((rows, total))
}

pub async fn list_paid_batches(
    pool: &PgPool,
    scope: &AccessScope,
    filters: &DueFilters,
    page: PageRequest,
) -> AppResult<(Vec<PaidDueBatch>, i64)> {
    if scope.is_empty() {
        return Ok((Vec::new(), 0));
    }

    let rows = paid_batches_query(scope, filters, page)
        .build_query_as::<PaidDueBatch>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)?;
    let total = paid_count_query(scope, filters)
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await
        .map_err(map_db_error)?;
    Ok((rows, total))
}

/// Pending rows of one customer that the scope can see, newest first.
pub async fn customer_pending_dues(
    pool: &PgPool,
    scope: &AccessScope,
    customer_id: i64,
) -> AppResult<Vec<PaymentDue>> {
    let mut query = QueryBuilder::<Postgres>::new("SELECT ");
    query
        .push(DUE_COLUMNS)
        .push(" FROM payment_dues pd WHERE pd.customer_id = ")
        .push_bind(customer_id)
        .push(" AND pd.status = ")
        .push_bind(DueStatus::Pending.as_str());
    scope.push_predicate(&mut query, "pd");
    query.push(" ORDER BY pd.created_at DESC, pd.id DESC");

    query
        .build_query_as::<PaymentDue>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

const MARK_PAID_SQL: &str = "UPDATE payment_dues \
     SET status = $1, payment_id = $2, updated_at = now() \
     WHERE id = ANY($3) AND status = $4";

fn lock_pending_query<'a>(customer_id: i64) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new("SELECT ");
    query
        .push(DUE_COLUMNS)
        .push(" FROM payment_dues pd WHERE pd.customer_id = ")
        .push_bind(customer_id)
        .push(" AND pd.status = ")
        .push_bind(DueStatus::Pending.as_str())
        .push(" ORDER BY pd.created_at DESC, pd.id DESC FOR UPDATE");
    query
}

/// Locks every pending due of the customer for the rest of the transaction.
/// A concurrent settlement blocks here and then sees the rows as paid.
pub async fn lock_pending_dues(
    conn: &mut PgConnection,
    customer_id: i64,
) -> AppResult<Vec<PaymentDue>> {
    lock_pending_query(customer_id)
        .build_query_as::<PaymentDue>()
        .fetch_all(&mut *conn)
        .await
        .map_err(map_db_error)
}

/// Only rows still pending are flipped, so the affected count tells the
/// caller whether anything changed underneath it.
pub async fn mark_dues_paid(
    conn: &mut PgConnection,
    due_ids: &[i64],
    payment_id: i64,
) -> AppResult<u64> {
    let result = sqlx::query(MARK_PAID_SQL)
        .bind(DueStatus::Paid.as_str())
        .bind(payment_id)
        .bind(due_ids)
        .bind(DueStatus::Pending.as_str())
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    Ok(result.rows_affected())
}

/// All pending dues of a customer regardless of scope.
pub async fn count_pending_dues(pool: &PgPool, customer_id: i64) -> AppResult<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)::bigint FROM payment_dues WHERE customer_id = $1 AND status = $2",
    )
    .bind(customer_id)
    .bind(DueStatus::Pending.as_str())
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub struct NewDue {
    pub invoice_id: Option<i64>,
    pub ticket_id: Option<i64>,
    pub customer_id: i64,
    pub branch_id: Option<i64>,
    pub balance_due: Decimal,
    pub created_by: i64,
}

pub async fn insert_pending_due(conn: &mut PgConnection, due: &NewDue) -> AppResult<PaymentDue> {
    if due.balance_due <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "A payment due needs a positive balance.".to_string(),
        ));
    }
    sqlx::query_as::<_, PaymentDue>(
        "INSERT INTO payment_dues
            (invoice_id, ticket_id, customer_id, branch_id, balance_due, status, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING id, invoice_id, ticket_id, customer_id, branch_id, balance_due, status,
                   payment_id, created_by, created_at, updated_at",
    )
    .bind(due.invoice_id)
    .bind(due.ticket_id)
    .bind(due.customer_id)
    .bind(due.branch_id)
    .bind(due.balance_due)
    .bind(DueStatus::Pending.as_str())
    .bind(due.created_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_db_error)
}

pub async fn dues_for_payment(pool: &PgPool, payment_id: i64) -> AppResult<Vec<PaymentDue>> {
    let mut query = QueryBuilder::<Postgres>::new("SELECT ");
    query
        .push(DUE_COLUMNS)
        .push(" FROM payment_dues pd WHERE pd.payment_id = ")
        .push_bind(payment_id)
        .push(" ORDER BY pd.created_at ASC, pd.id ASC");

    query
        .build_query_as::<PaymentDue>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}
