//! Row-level visibility of payment dues and payments.
//!
//! Every listing, detail fetch and write path resolves one [`AccessScope`] for
//! the acting user and applies it, either as a SQL predicate or against a row
//! that is already loaded.

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    auth::Actor,
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Agent,
    Manager,
    BranchAdmin,
}

impl Role {
    pub fn from_id(role_id: i16) -> Option<Self> {
        match role_id {
            1 => Some(Self::Admin),
            2 => Some(Self::Agent),
            3 => Some(Self::Manager),
            4 => Some(Self::BranchAdmin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Agent => "agent",
            Self::Manager => "manager",
            Self::BranchAdmin => "branch_admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    All,
    CreatedBy(i64),
    CreatedByAny(Vec<i64>),
    Branch(i64),
    Nothing,
}

/// The two columns a scope can constrain.
#[derive(Debug, Clone, Copy)]
pub struct ScopedRow {
    pub created_by: i64,
    pub branch_id: Option<i64>,
}

impl AccessScope {
    /// Pure resolution once the manager's agent ids are known.
    pub fn from_parts(role: Role, user_id: i64, branch_id: Option<i64>, agent_ids: Vec<i64>) -> Self {
        match role {
            Role::Admin => Self::All,
            Role::Agent => Self::CreatedBy(user_id),
            Role::Manager if agent_ids.is_empty() => Self::Nothing,
            Role::Manager => Self::CreatedByAny(agent_ids),
            Role::BranchAdmin => branch_id.map_or(Self::Nothing, Self::Branch),
        }
    }

    pub async fn resolve(pool: &PgPool, actor: &Actor) -> AppResult<Self> {
        let Some(role) = Role::from_id(actor.role_id) else {
            tracing::warn!(
                user_id = actor.id,
                role_id = actor.role_id,
                "Denied access for unrecognised role"
            );
            return Err(AppError::Forbidden(format!(
                "Forbidden: role {} has no payment access.",
                actor.role_id
            )));
        };

        let agent_ids = if role == Role::Manager {
            assigned_agent_ids(pool, actor.id).await?
        } else {
            Vec::new()
        };

        let scope = Self::from_parts(role, actor.id, actor.branch_id, agent_ids);
        tracing::debug!(user_id = actor.id, role = role.as_str(), scope = ?scope, "Resolved access scope");
        Ok(scope)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Nothing)
    }

    /// Appends ` AND <predicate>` for rows aliased as `alias`.
    pub fn push_predicate(&self, query: &mut QueryBuilder<'_, Postgres>, alias: &str) {
        match self {
            Self::All => {}
            Self::CreatedBy(user_id) => {
                query
                    .push(" AND ")
                    .push(alias)
                    .push(".created_by = ")
                    .push_bind(*user_id);
            }
            Self::CreatedByAny(user_ids) => {
                query
                    .push(" AND ")
                    .push(alias)
                    .push(".created_by = ANY(")
                    .push_bind(user_ids.clone())
                    .push(")");
            }
            Self::Branch(branch_id) => {
                query
                    .push(" AND ")
                    .push(alias)
                    .push(".branch_id = ")
                    .push_bind(*branch_id);
            }
            Self::Nothing => {
                query.push(" AND FALSE");
            }
        }
    }

    pub fn permits(&self, row: ScopedRow) -> bool {
        match self {
            Self::All => true,
            Self::CreatedBy(user_id) => row.created_by == *user_id,
            Self::CreatedByAny(user_ids) => user_ids.contains(&row.created_by),
            Self::Branch(branch_id) => row.branch_id == Some(*branch_id),
            Self::Nothing => false,
        }
    }

    /// Whether new records may be filed under `branch_id`. Only branch admins
    /// are pinned to one branch; an empty scope may not write at all.
    pub fn permits_branch(&self, branch_id: Option<i64>) -> bool {
        match self {
            Self::Branch(own) => branch_id == Some(*own),
            Self::Nothing => false,
            Self::All | Self::CreatedBy(_) | Self::CreatedByAny(_) => true,
        }
    }

    /// Whether a customer's dues page may be shown, given how many of the
    /// customer's pending dues the scope can see and how many exist at all.
    /// Callers outside every due get 403 so the customer record stays hidden.
    pub fn ensure_customer_visible(&self, visible_dues: usize, pending_dues: i64) -> AppResult<()> {
        match self {
            Self::Nothing => Err(AppError::Forbidden(
                "Forbidden: your role has no customers to view.".to_string(),
            )),
            Self::All => Ok(()),
            _ if visible_dues > 0 => Ok(()),
            _ if pending_dues > 0 => Err(AppError::Forbidden(
                "Forbidden: this customer's dues are outside your access scope.".to_string(),
            )),
            _ => Err(AppError::NotFound(
                "No pending dues found for this customer.".to_string(),
            )),
        }
    }

    pub fn ensure_permits(&self, row: ScopedRow) -> AppResult<()> {
        if self.permits(row) {
            return Ok(());
        }
        Err(AppError::Forbidden(
            "Forbidden: record is outside your access scope.".to_string(),
        ))
    }
}

async fn assigned_agent_ids(pool: &PgPool, manager_id: i64) -> AppResult<Vec<i64>> {
    sqlx::query_scalar::<_, i64>(
        "SELECT agent_id FROM assign_agents WHERE manager_id = $1 ORDER BY agent_id",
    )
    .bind(manager_id)
    .fetch_all(pool)
    .await
    .map_err(|error| AppError::Internal(format!("assign_agents lookup failed: {error}")))
}
