//! Unguessable links to a customer's settlement statement.
//!
//! The token is the hex SHA-256 of the customer id followed by the server's
//! `APP_KEY`. Links do not expire.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
};

pub fn statement_token(customer_id: i64, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(customer_id.to_string().as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_statement_token(customer_id: i64, token: &str, secret: &str) -> bool {
    let expected = statement_token(customer_id, secret);
    let presented = token.trim().to_ascii_lowercase();
    if presented.len() != expected.len() {
        return false;
    }
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

pub fn statement_url(config: &AppConfig, customer_id: i64) -> AppResult<String> {
    let secret = app_key(config)?;
    Ok(format!(
        "{}/payment-dues/pdf/{customer_id}/{}",
        config.public_api_base(),
        statement_token(customer_id, secret)
    ))
}

pub fn ensure_valid_token(config: &AppConfig, customer_id: i64, token: &str) -> AppResult<()> {
    let secret = app_key(config)?;
    if verify_statement_token(customer_id, token, secret) {
        return Ok(());
    }
    tracing::warn!(customer_id, "Rejected statement link with a bad token");
    Err(AppError::Forbidden(
        "Forbidden: invalid statement link.".to_string(),
    ))
}

fn app_key(config: &AppConfig) -> AppResult<&str> {
    config.app_key.as_deref().ok_or_else(|| {
        AppError::Dependency("Statement links need APP_KEY to be configured.".to_string())
    })
}

#[cfg(test)]
mod tests {
    use crate::config::AppConfig;

    use super::{ensure_valid_token, statement_token, statement_url, verify_statement_token};

    #[test]
    fn token_is_hex_sha256_of_id_and_secret() {
        let token = statement_token(42, "secret");
        assert_eq!(
            token,
            "bdad923c992c435d3fcfb80623f090776dacdf20a1094d4927b00832c3ff121f"
        );
        assert_ne!(token, statement_token(42, "other"));
    }

    #[test]
    fn token_for_one_customer_is_rejected_for_another() {
        let token_a = statement_token(1, "secret");
        assert!(verify_statement_token(1, &token_a, "secret"));
        assert!(!verify_statement_token(2, &token_a, "secret"));
        assert!(!verify_statement_token(1, "abc", "secret"));
        assert!(verify_statement_token(1, &token_a.to_uppercase(), "secret"));
    }

    #[test]
    fn url_embeds_customer_and_token() {
        let config = AppConfig::for_tests();
        let url = statement_url(&config, 7).expect("url");
        let secret = config.app_key.as_deref().unwrap_or_default();
        assert_eq!(
            url,
            format!(
                "https://shop.test/api/payment-dues/pdf/7/{}",
                statement_token(7, secret)
            )
        );
    }

    #[test]
    fn missing_app_key_is_a_configuration_error() {
        let mut config = AppConfig::for_tests();
        config.app_key = None;
        assert!(statement_url(&config, 7).is_err());
        assert!(ensure_valid_token(&config, 7, "x").is_err());
    }
}
