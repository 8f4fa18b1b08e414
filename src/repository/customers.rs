use sqlx::PgPool;

use crate::{
    error::{AppError, AppResult},
    models::Customer,
    repository::table_service::map_db_error,
};

const CUSTOMER_SQL: &str = "SELECT id, name, phone, email, address, branch_id \
     FROM customers WHERE id = $1 LIMIT 1";

pub async fn find_customer(pool: &PgPool, customer_id: i64) -> AppResult<Customer> {
    sqlx::query_as::<_, Customer>(CUSTOMER_SQL)
        .bind(customer_id)
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Customer not found.".to_string()))
}
