use axum::{
    extract::{Request, State},
    http::header::HOST,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{error::AppError, state::AppState};

/// Rejects requests whose `Host` is not listed in `TRUSTED_HOSTS`. An empty
/// list trusts every host.
pub async fn enforce_trusted_hosts(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let trusted = &state.config.trusted_hosts;
    if trusted.is_empty() {
        return next.run(request).await;
    }

    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(strip_port)
        .unwrap_or_default()
        .to_ascii_lowercase();

    if is_trusted(trusted, &host) {
        return next.run(request).await;
    }

    tracing::warn!(host = %host, "Rejected request for untrusted host");
    AppError::BadRequest("Invalid host header.".to_string()).into_response()
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port))
            if !port.is_empty()
                && port.chars().all(|c| c.is_ascii_digit())
                && (!name.contains(':') || name.ends_with(']')) =>
        {
            name
        }
        _ => host,
    }
}

fn is_trusted(trusted: &[String], host: &str) -> bool {
    trusted.iter().any(|allowed| {
        let allowed = allowed.trim().to_ascii_lowercase();
        allowed == "*"
            || allowed == host
            || allowed
                .strip_prefix("*.")
                .is_some_and(|suffix| host.ends_with(&format!(".{suffix}")))
    })
}

#[cfg(test)]
mod tests {
    use super::{is_trusted, strip_port};

    #[test]
    fn strips_ports() {
        assert_eq!(strip_port("shop.test:8000"), "shop.test");
        assert_eq!(strip_port("shop.test"), "shop.test");
    }

    #[test]
    fn matches_exact_and_wildcard_hosts() {
        let trusted = vec!["api.shop.test".to_string(), "*.desk.test".to_string()];
        assert!(is_trusted(&trusted, "api.shop.test"));
        assert!(is_trusted(&trusted, "north.desk.test"));
        assert!(!is_trusted(&trusted, "desk.test"));
        assert!(!is_trusted(&trusted, "evil.test"));
    }
}
