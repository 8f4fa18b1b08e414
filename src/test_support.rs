//! Database fixtures for tests that need Postgres. They run only when
//! `TEST_DATABASE_URL` is set and return early otherwise.

use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::{auth::Actor, config::AppConfig, db, state::AppState};

pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to TEST_DATABASE_URL");
    db::run_migrations(&pool).await.expect("migrations");
    Some(pool)
}

pub fn state_with(pool: &PgPool) -> AppState {
    AppState::with_pool(AppConfig::for_tests(), Some(pool.clone()))
}

pub async fn insert_branch(pool: &PgPool) -> i64 {
    sqlx::query_scalar("INSERT INTO branches (name) VALUES ($1) RETURNING id")
        .bind(format!("Branch {}", Uuid::new_v4()))
        .fetch_one(pool)
        .await
        .expect("insert branch")
}

pub async fn insert_user(pool: &PgPool, role_id: i16, branch_id: Option<i64>) -> Actor {
    let name = format!("User {role_id}");
    let id = sqlx::query_scalar(
        "INSERT INTO users (name, email, role_id, branch_id) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(&name)
    .bind(format!("{}@shop.test", Uuid::new_v4()))
    .bind(role_id)
    .bind(branch_id)
    .fetch_one(pool)
    .await
    .expect("insert user");
    Actor {
        id,
        name,
        role_id,
        branch_id,
    }
}

pub async fn assign_agent(pool: &PgPool, manager_id: i64, agent_id: i64) {
    sqlx::query("INSERT INTO assign_agents (manager_id, agent_id) VALUES ($1, $2)")
        .bind(manager_id)
        .bind(agent_id)
        .execute(pool)
        .await
        .expect("assign agent");
}

pub async fn insert_customer(pool: &PgPool, branch_id: Option<i64>) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO customers (name, phone, email, branch_id) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind("Asha Traders")
    .bind("+91 98450 00000")
    .bind("asha@traders.test")
    .bind(branch_id)
    .fetch_one(pool)
    .await
    .expect("insert customer")
}

pub async fn insert_due(
    pool: &PgPool,
    customer_id: i64,
    branch_id: Option<i64>,
    created_by: i64,
    amount: &str,
) -> i64 {
    let amount: Decimal = amount.parse().expect("decimal");
    sqlx::query_scalar(
        "INSERT INTO payment_dues (customer_id, branch_id, balance_due, created_by)
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(customer_id)
    .bind(branch_id)
    .bind(amount)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .expect("insert due")
}

pub async fn payment_count(pool: &PgPool, customer_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*)::bigint FROM payments WHERE customer_id = $1")
        .bind(customer_id)
        .fetch_one(pool)
        .await
        .expect("count payments")
}
