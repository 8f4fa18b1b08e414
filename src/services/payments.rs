use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::{
    auth::Actor,
    db::db_pool,
    error::{AppError, AppResult},
    models::{round_money, Customer, NewPayment, Payment, PaymentDue},
    repository::{
        customers::find_customer,
        payment_dues::{dues_for_payment, insert_pending_due, NewDue},
        payments::{find_payment, insert_payment},
    },
    schemas::RecordPaymentInput,
    scope::AccessScope,
    services::audit::{write_audit_log, AuditEntry},
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentAmounts {
    pub total: Decimal,
    pub net: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordedPayment {
    pub payment: Payment,
    pub payment_due: Option<PaymentDue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentDetail {
    pub payment: Payment,
    pub customer: Customer,
    pub settled_dues: Vec<PaymentDue>,
}

pub fn compute_amounts(input: &RecordPaymentInput) -> PaymentAmounts {
    let total = round_money(input.service_charge + input.item_amount);
    let net = round_money(total - input.discount);
    PaymentAmounts {
        total,
        net,
        balance: round_money(net - input.paid_amount),
    }
}

/// Explicit branch, then the actor's, then the customer's.
pub fn resolve_branch(input: Option<i64>, actor: &Actor, customer: &Customer) -> Option<i64> {
    input.or(actor.branch_id).or(customer.branch_id)
}

fn new_payment(
    input: &RecordPaymentInput,
    amounts: PaymentAmounts,
    branch_id: Option<i64>,
    actor_id: i64,
) -> NewPayment {
    NewPayment {
        invoice_id: input.invoice_id,
        ticket_id: input.ticket_id,
        customer_id: input.customer_id,
        branch_id,
        service_charge: round_money(input.service_charge),
        item_amount: round_money(input.item_amount),
        total_amount: amounts.total,
        discount: round_money(input.discount),
        net_amount: amounts.net,
        paid_amount: round_money(input.paid_amount),
        balance_due: amounts.balance,
        payment_mode: input.payment_mode.trim().to_string(),
        description: input
            .description
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned),
        created_by: actor_id,
    }
}

pub async fn record_payment(
    state: &AppState,
    actor: &Actor,
    input: &RecordPaymentInput,
) -> AppResult<RecordedPayment> {
    let pool = db_pool(state)?;
    let scope = AccessScope::resolve(pool, actor).await?;
    let customer = find_customer(pool, input.customer_id).await?;

    let branch_id = resolve_branch(input.branch_id, actor, &customer);
    if !scope.permits_branch(branch_id) {
        return Err(AppError::Forbidden(
            "Forbidden: you cannot record payments for this branch.".to_string(),
        ));
    }

    let amounts = compute_amounts(input);
    if amounts.balance < Decimal::ZERO {
        return Err(AppError::UnprocessableEntity(
            "paid_amount cannot exceed the net amount.".to_string(),
        ));
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::Internal(format!("txn begin: {e}")))?;

    let payment = insert_payment(&mut tx, &new_payment(input, amounts, branch_id, actor.id)).await?;
    let payment_due = if amounts.balance > Decimal::ZERO {
        Some(
            insert_pending_due(
                &mut tx,
                &NewDue {
                    invoice_id: payment.invoice_id,
                    ticket_id: payment.ticket_id,
                    customer_id: payment.customer_id,
                    branch_id: payment.branch_id,
                    balance_due: amounts.balance,
                    created_by: actor.id,
                },
            )
            .await?,
        )
    } else {
        None
    };

    tx.commit()
        .await
        .map_err(|e| AppError::Internal(format!("txn commit: {e}")))?;

    tracing::info!(
        payment_id = payment.id,
        customer_id = payment.customer_id,
        net = %amounts.net,
        balance = %amounts.balance,
        actor_id = actor.id,
        "Recorded payment"
    );

    write_audit_log(
        state.db_pool.as_ref(),
        AuditEntry {
            branch_id: payment.branch_id,
            actor_user_id: Some(actor.id),
            action: "create",
            entity_name: "payments",
            entity_id: Some(payment.id.to_string()),
            before_state: None,
            after_state: Some(json!({
                "payment": payment,
                "payment_due_id": payment_due.as_ref().map(|due| due.id),
            })),
        },
    )
    .await;

    Ok(RecordedPayment {
        payment,
        payment_due,
    })
}

pub async fn get_payment(state: &AppState, actor: &Actor, payment_id: i64) -> AppResult<PaymentDetail> {
    let pool = db_pool(state)?;
    let scope = AccessScope::resolve(pool, actor).await?;

    let payment = find_payment(pool, payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found.".to_string()))?;
    scope.ensure_permits(payment.scoped())?;

    let customer = find_customer(pool, payment.customer_id).await?;
    let settled_dues = dues_for_payment(pool, payment.id).await?;

    Ok(PaymentDetail {
        payment,
        customer,
        settled_dues,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use std::str::FromStr;

    use crate::{auth::Actor, models::Customer, schemas::RecordPaymentInput};

    use super::{compute_amounts, new_payment, resolve_branch};

    fn money(raw: &str) -> Decimal {
        Decimal::from_str(raw).expect("decimal")
    }

    fn input() -> RecordPaymentInput {
        RecordPaymentInput {
            invoice_id: Some(11),
            ticket_id: None,
            customer_id: 3,
            branch_id: None,
            service_charge: money("250.00"),
            item_amount: money("1200.50"),
            discount: money("50.50"),
            paid_amount: money("900.00"),
            payment_mode: " cash ".to_string(),
            description: Some("  ".to_string()),
        }
    }

    fn actor(branch_id: Option<i64>) -> Actor {
        Actor {
            id: 5,
            name: "Ravi".to_string(),
            role_id: 2,
            branch_id,
        }
    }

    fn customer(branch_id: Option<i64>) -> Customer {
        Customer {
            id: 3,
            name: "Asha Traders".to_string(),
            phone: None,
            email: None,
            address: None,
            branch_id,
        }
    }

    #[test]
    fn balance_is_net_minus_paid() {
        let amounts = compute_amounts(&input());
        assert_eq!(amounts.total, money("1450.50"));
        assert_eq!(amounts.net, money("1400.00"));
        assert_eq!(amounts.balance, money("500.00"));
    }

    #[test]
    fn fully_paid_leaves_no_balance() {
        let mut input = input();
        input.paid_amount = money("1400.00");
        assert_eq!(compute_amounts(&input).balance, Decimal::ZERO);
    }

    #[test]
    fn branch_falls_back_from_input_to_actor_to_customer() {
        assert_eq!(resolve_branch(Some(1), &actor(Some(2)), &customer(Some(3))), Some(1));
        assert_eq!(resolve_branch(None, &actor(Some(2)), &customer(Some(3))), Some(2));
        assert_eq!(resolve_branch(None, &actor(None), &customer(Some(3))), Some(3));
        assert_eq!(resolve_branch(None, &actor(None), &customer(None)), None);
    }

    #[test]
    fn new_payment_trims_text_fields() {
        let input = input();
        let payment = new_payment(&input, compute_amounts(&input), Some(2), 5);
        assert_eq!(payment.payment_mode, "cash");
        assert_eq!(payment.description, None);
        assert_eq!(payment.balance_due, money("500.00"));
        assert_eq!(payment.created_by, 5);
    }
}
