//! Converts everything a customer owes into one recorded payment.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::{
    auth::Actor,
    db::db_pool,
    error::{AppError, AppResult},
    models::{round_money, DueStatus, NewPayment, Payment, PaymentDue, SETTLEMENT_DESCRIPTION},
    repository::{
        customers::find_customer,
        payment_dues::{lock_pending_dues, mark_dues_paid},
        payments::insert_payment,
    },
    schemas::SettleDuesInput,
    scope::AccessScope,
    services::{
        audit::{write_audit_log, AuditEntry},
        statement_link::statement_url,
    },
    state::AppState,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    pub due_ids: Vec<i64>,
    pub total: Decimal,
    pub branch_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    pub payment: Payment,
    pub settled_dues: Vec<PaymentDue>,
    pub statement_url: String,
}

/// Checks the locked pending dues and totals them. All of the customer's
/// pending dues must be visible to the caller: settlement never leaves a
/// partial balance behind.
pub fn plan_settlement(dues: &[PaymentDue], scope: &AccessScope) -> AppResult<SettlementPlan> {
    if dues.is_empty() {
        return Err(AppError::NotFound(
            "No pending dues found for this customer.".to_string(),
        ));
    }
    if let Some(hidden) = dues.iter().find(|due| !scope.permits(due.scoped())) {
        tracing::warn!(due_id = hidden.id, "Settlement touches a due outside the caller's scope");
        return Err(AppError::Forbidden(
            "Forbidden: some of this customer's dues are outside your access scope.".to_string(),
        ));
    }

    let total = round_money(dues.iter().map(|due| due.balance_due).sum());
    let branch_id = dues
        .iter()
        .max_by_key(|due| (due.created_at, due.id))
        .and_then(|due| due.branch_id);

    Ok(SettlementPlan {
        due_ids: dues.iter().map(|due| due.id).collect(),
        total,
        branch_id,
    })
}

pub fn settlement_payment(
    plan: &SettlementPlan,
    customer_id: i64,
    payment_mode: &str,
    actor_id: i64,
) -> NewPayment {
    NewPayment {
        invoice_id: None,
        ticket_id: None,
        customer_id,
        branch_id: plan.branch_id,
        service_charge: Decimal::ZERO,
        item_amount: plan.total,
        total_amount: plan.total,
        discount: Decimal::ZERO,
        net_amount: plan.total,
        paid_amount: plan.total,
        balance_due: Decimal::ZERO,
        payment_mode: payment_mode.trim().to_string(),
        description: Some(SETTLEMENT_DESCRIPTION.to_string()),
        created_by: actor_id,
    }
}

pub async fn settle_customer_dues(
    state: &AppState,
    actor: &Actor,
    input: &SettleDuesInput,
) -> AppResult<SettlementOutcome> {
    let pool = db_pool(state)?;
    let scope = AccessScope::resolve(pool, actor).await?;
    if scope.is_empty() {
        return Err(AppError::Forbidden(
            "Forbidden: your role has no customers to settle.".to_string(),
        ));
    }
    let customer = find_customer(pool, input.customer_id).await?;
    // Build the link first so a missing APP_KEY fails before anything is written.
    let statement_url = statement_url(&state.config, customer.id)?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::Internal(format!("txn begin: {e}")))?;

    let dues = lock_pending_dues(&mut tx, customer.id).await?;
    let plan = plan_settlement(&dues, &scope)?;
    let payment = insert_payment(
        &mut tx,
        &settlement_payment(&plan, customer.id, &input.payment_mode, actor.id),
    )
    .await?;

    let updated = mark_dues_paid(&mut tx, &plan.due_ids, payment.id).await?;
    if updated != plan.due_ids.len() as u64 {
        return Err(AppError::Conflict(
            "Pending dues changed during settlement; please retry.".to_string(),
        ));
    }

    tx.commit()
        .await
        .map_err(|e| AppError::Internal(format!("txn commit: {e}")))?;

    tracing::info!(
        customer_id = customer.id,
        payment_id = payment.id,
        dues = plan.due_ids.len(),
        total = %plan.total,
        actor_id = actor.id,
        "Settled pending dues"
    );

    let settled_dues = dues
        .into_iter()
        .map(|mut due| {
            due.status = DueStatus::Paid.as_str().to_string();
            due.payment_id = Some(payment.id);
            due
        })
        .collect::<Vec<_>>();

    write_audit_log(
        state.db_pool.as_ref(),
        AuditEntry {
            branch_id: payment.branch_id,
            actor_user_id: Some(actor.id),
            action: "settle",
            entity_name: "payment_dues",
            entity_id: Some(payment.id.to_string()),
            before_state: None,
            after_state: Some(json!({
                "customer_id": customer.id,
                "payment_id": payment.id,
                "due_ids": plan.due_ids,
                "total": plan.total,
                "payment_mode": payment.payment_mode,
            })),
        },
    )
    .await;

    Ok(SettlementOutcome {
        payment,
        settled_dues,
        statement_url,
    })
}
