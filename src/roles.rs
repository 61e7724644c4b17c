//! Role resolution and per-resource authorization.
//!
//! Authentication (a valid token) is handled by `auth::AuthUser`. The helpers
//! here decide what an authenticated caller may see.

use crate::{
    auth::AuthUser,
    error::ApiError,
    models::Role,
    repository::Repository,
};

/// Looks up the stored role for `email`. Unknown emails and users without a
/// role both resolve to `None`.
pub async fn resolve_role(repo: &dyn Repository, email: &str) -> Result<Option<Role>, ApiError> {
    let user = repo.find_user_by_email(email).await?;
    Ok(user.and_then(|u| u.role))
}

/// True when the user stored under `email` holds exactly `role`.
pub async fn has_role(repo: &dyn Repository, email: &str, role: Role) -> Result<bool, ApiError> {
    Ok(resolve_role(repo, email).await? == Some(role))
}

/// Fails with `Forbidden` unless the caller's stored role is `role`.
pub async fn require_role(repo: &dyn Repository, caller: &AuthUser, role: Role) -> Result<(), ApiError> {
    if has_role(repo, &caller.email, role).await? {
        return Ok(());
    }
    tracing::warn!(caller = %caller.email, required = %role, "role check failed");
    Err(ApiError::Forbidden)
}

/// ensure_self
///
/// Owner-only check for endpoints addressed by email: the caller may only ask
/// about their own data. Must run before any query scoped by `email`.
pub fn ensure_self(caller: &AuthUser, email: &str) -> Result<(), ApiError> {
    if caller.email == email {
        return Ok(());
    }
    tracing::warn!(caller = %caller.email, requested = %email, "identity mismatch");
    Err(ApiError::Forbidden)
}
