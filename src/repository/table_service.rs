use chrono::NaiveDate;
use sqlx::{Postgres, QueryBuilder};

use crate::error::AppError;

/// ` AND (<columns> ILIKE %term%)` over the given fully qualified columns.
pub fn push_search(query: &mut QueryBuilder<'_, Postgres>, columns: &[&str], term: Option<&str>) {
    let Some(term) = term.map(str::trim).filter(|term| !term.is_empty()) else {
        return;
    };
    if columns.is_empty() {
        return;
    }
    let pattern = format!("%{}%", escape_like(term));
    query.push(" AND (");
    for (index, column) in columns.iter().enumerate() {
        if index > 0 {
            query.push(" OR ");
        }
        query
            .push(*column)
            .push(" ILIKE ")
            .push_bind(pattern.clone());
    }
    query.push(")");
}

/// Inclusive date range on a timestamp column.
pub fn push_date_range(
    query: &mut QueryBuilder<'_, Postgres>,
    column: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) {
    if let Some(from) = from {
        query.push(" AND ").push(column).push("::date >= ").push_bind(from);
    }
    if let Some(to) = to {
        query.push(" AND ").push(column).push("::date <= ").push_bind(to);
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for character in term.chars() {
        if matches!(character, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(character);
    }
    escaped
}

pub fn map_db_error(error: sqlx::Error) -> AppError {
    let message = error.to_string();
    tracing::error!(db_error = %message, "Database query failed");

    if message.contains("23505")
        || message
            .to_ascii_lowercase()
            .contains("duplicate key value violates unique constraint")
    {
        return AppError::Conflict("Duplicate value violates a unique constraint.".to_string());
    }
    if message.contains("23503") {
        return AppError::UnprocessableEntity(
            "A referenced record does not exist.".to_string(),
        );
    }
    AppError::Internal(format!("Database operation failed: {message}"))
}
