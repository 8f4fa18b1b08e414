use serde_json::Value;
use sqlx::PgPool;

/// One `audit_logs` row.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry<'a> {
    pub branch_id: Option<i64>,
    pub actor_user_id: Option<i64>,
    pub action: &'a str,
    pub entity_name: &'a str,
    pub entity_id: Option<String>,
    pub before_state: Option<Value>,
    pub after_state: Option<Value>,
}

/// Records an audit entry. Failures are logged and swallowed: the audited
/// change has already been committed by the time this runs.
pub async fn write_audit_log(pool: Option<&PgPool>, entry: AuditEntry<'_>) {
    let Some(pool) = pool else {
        return;
    };

    let result = sqlx::query(
        "INSERT INTO audit_logs
            (branch_id, actor_user_id, action, entity_name, entity_id, before_state, after_state)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.branch_id)
    .bind(entry.actor_user_id)
    .bind(entry.action)
    .bind(entry.entity_name)
    .bind(&entry.entity_id)
    .bind(&entry.before_state)
    .bind(&entry.after_state)
    .execute(pool)
    .await;

    if let Err(error) = result {
        tracing::warn!(
            action = entry.action,
            entity_name = entry.entity_name,
            error = %error,
            "Could not write audit log"
        );
    }
}
