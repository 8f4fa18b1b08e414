use std::{fmt::Display, str::FromStr};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

use crate::error::AppError;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input.validate().map_err(AppError::from)
}

pub const DEFAULT_PER_PAGE: i64 = 15;
pub const MAX_PER_PAGE: i64 = 100;

fn default_page() -> i64 {
    1
}
fn default_per_page() -> i64 {
    DEFAULT_PER_PAGE
}

/// Treats blank query-string values (`?from_date=`) as absent.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn last_page(&self, total: i64) -> i64 {
        if total <= 0 {
            return 1;
        }
        (total + self.per_page - 1) / self.per_page
    }

    pub fn envelope<T: Serialize>(&self, data: Vec<T>, total: i64) -> Value {
        json!({
            "data": data,
            "total": total,
            "per_page": self.per_page,
            "current_page": self.page,
            "last_page": self.last_page(total),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DueFilters {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub from_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub to_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub customer_id: Option<i64>,
}

impl DueFilters {
    pub fn check_range(&self) -> Result<(), AppError> {
        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            if from > to {
                return Err(AppError::UnprocessableEntity(
                    "from_date must be on or before to_date.".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuesQuery {
    #[serde(flatten)]
    pub filters: DueFilters,
    #[serde(default = "default_page", deserialize_with = "page_number")]
    pub page: i64,
    #[serde(default = "default_per_page", deserialize_with = "page_number")]
    pub per_page: i64,
}

impl DuesQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsQuery {
    #[serde(flatten)]
    pub filters: DueFilters,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub payment_mode: Option<String>,
    #[serde(default = "default_page", deserialize_with = "page_number")]
    pub page: i64,
    #[serde(default = "default_per_page", deserialize_with = "page_number")]
    pub per_page: i64,
}

impl PaymentsQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}

// Flattened query structs receive every value as a string.
fn page_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim().parse::<i64>().map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SettleDuesInput {
    #[validate(range(min = 1))]
    pub customer_id: i64,
    #[validate(length(min = 1, max = 50))]
    pub payment_mode: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_payment_amounts"))]
pub struct RecordPaymentInput {
    pub invoice_id: Option<i64>,
    pub ticket_id: Option<i64>,
    #[validate(range(min = 1))]
    pub customer_id: i64,
    pub branch_id: Option<i64>,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub service_charge: Decimal,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub item_amount: Decimal,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub discount: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub paid_amount: Decimal,
    #[validate(length(min = 1, max = 50))]
    pub payment_mode: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("non_negative"));
    }
    Ok(())
}

fn validate_payment_amounts(input: &RecordPaymentInput) -> Result<(), ValidationError> {
    if input.invoice_id.is_none() && input.ticket_id.is_none() {
        return Err(ValidationError::new("invoice_or_ticket_required"));
    }
    let total = input.service_charge + input.item_amount;
    if input.discount > total {
        return Err(ValidationError::new("discount_exceeds_total"));
    }
    if input.paid_amount > total - input.discount {
        return Err(ValidationError::new("paid_exceeds_net"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerPath {
    pub customer_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentPath {
    pub payment_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatementPath {
    pub customer_id: i64,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;
    use validator::Validate;

    use super::{DuesQuery, PageRequest, RecordPaymentInput};

    fn payment(service: i64, items: i64, discount: i64, paid: i64) -> RecordPaymentInput {
        RecordPaymentInput {
            invoice_id: Some(1),
            ticket_id: None,
            customer_id: 3,
            branch_id: None,
            service_charge: Decimal::from(service),
            item_amount: Decimal::from(items),
            discount: Decimal::from(discount),
            paid_amount: Decimal::from(paid),
            payment_mode: "cash".to_string(),
            description: None,
        }
    }

    #[test]
    fn page_request_clamps_and_offsets() {
        let page = PageRequest::new(0, 1000);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 100);
        assert_eq!(PageRequest::new(3, 15).offset(), 30);
    }

    #[test]
    fn last_page_rounds_up() {
        let page = PageRequest::new(1, 15);
        assert_eq!(page.last_page(0), 1);
        assert_eq!(page.last_page(15), 1);
        assert_eq!(page.last_page(16), 2);
        assert_eq!(page.last_page(31), 3);
    }

    #[test]
    fn envelope_reports_pagination() {
        let page = PageRequest::new(2, 10);
        let body = page.envelope(vec![json!({"id": 1})], 11);
        assert_eq!(body["current_page"], 2);
        assert_eq!(body["last_page"], 2);
        assert_eq!(body["total"], 11);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn query_treats_blank_values_as_absent() {
        let query: DuesQuery = parse_dues_query(
            "search=&from_date=2026-01-01&to_date=&customer_id=&page=2&per_page=5",
        );
        assert_eq!(query.filters.search, None);
        assert_eq!(
            query.filters.from_date,
            chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
        );
        assert_eq!(query.filters.customer_id, None);
        assert_eq!(query.page_request(), PageRequest::new(2, 5));
    }

    fn parse_dues_query(raw: &str) -> DuesQuery {
        let uri: axum::http::Uri = format!("/payment-dues?{raw}").parse().expect("uri");
        axum::extract::Query::<DuesQuery>::try_from_uri(&uri)
            .expect("query parses")
            .0
    }

    #[test]
    fn payment_amount_rules() {
        assert!(payment(100, 50, 10, 140).validate().is_ok());
        assert!(payment(100, 50, 10, 141).validate().is_err());
        assert!(payment(100, 0, 101, 0).validate().is_err());
        assert!(payment(-1, 50, 0, 0).validate().is_err());

        let mut orphan = payment(100, 0, 0, 0);
        orphan.invoice_id = None;
        assert!(orphan.validate().is_err());
    }
}
