use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::scope::ScopedRow;

pub const SETTLEMENT_DESCRIPTION: &str = "Previous balance amount";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueStatus {
    Pending,
    Paid,
}

impl DueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DueStatus::Pending => "pending",
            DueStatus::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentDue {
    pub id: i64,
    pub invoice_id: Option<i64>,
    pub ticket_id: Option<i64>,
    pub customer_id: i64,
    pub branch_id: Option<i64>,
    pub balance_due: Decimal,
    pub status: String,
    pub payment_id: Option<i64>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentDue {
    pub fn scoped(&self) -> ScopedRow {
        ScopedRow {
            created_by: self.created_by,
            branch_id: self.branch_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub invoice_id: Option<i64>,
    pub ticket_id: Option<i64>,
    pub customer_id: i64,
    pub branch_id: Option<i64>,
    pub service_charge: Decimal,
    pub item_amount: Decimal,
    pub total_amount: Decimal,
    pub discount: Decimal,
    pub net_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_due: Decimal,
    pub payment_mode: String,
    pub description: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn scoped(&self) -> ScopedRow {
        ScopedRow {
            created_by: self.created_by,
            branch_id: self.branch_id,
        }
    }
}

/// Column values for a new `payments` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub invoice_id: Option<i64>,
    pub ticket_id: Option<i64>,
    pub customer_id: i64,
    pub branch_id: Option<i64>,
    pub service_charge: Decimal,
    pub item_amount: Decimal,
    pub total_amount: Decimal,
    pub discount: Decimal,
    pub net_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_due: Decimal,
    pub payment_mode: String,
    pub description: Option<String>,
    pub created_by: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub branch_id: Option<i64>,
}

/// Rounds to the two fraction digits stored in NUMERIC(12, 2) columns.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp(2)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use std::str::FromStr;

    use super::{round_money, DueStatus};

    #[test]
    fn status_strings_match_column_values() {
        assert_eq!(DueStatus::Pending.as_str(), "pending");
        assert_eq!(DueStatus::Paid.as_str(), "paid");
    }

    #[test]
    fn rounds_half_to_even_at_two_places() {
        assert_eq!(
            round_money(Decimal::from_str("10.005").unwrap()),
            Decimal::from_str("10.00").unwrap()
        );
        assert_eq!(
            round_money(Decimal::from_str("10.015").unwrap()),
            Decimal::from_str("10.02").unwrap()
        );
    }
}
