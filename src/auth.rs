use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::{
    error::ApiError,
    models::Role,
    repository::RepositoryState,
    roles,
    token::TokenCodec,
};

/// AuthUser
///
/// The verified identity of the caller. Only ever constructed from a token that
/// passed `TokenCodec::verify`, so holding one proves a valid token was sent.
/// It says nothing about which resources the caller may touch; handlers layer
/// that on top (see `roles::ensure_self`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub email: String,
}

/// bearer_token
///
/// Returns the second whitespace-delimited field of an `Authorization` header.
/// The scheme name itself is not checked.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value.split_whitespace().nth(1)
}

/// AuthUser Extractor
///
/// 1. Reuses an identity already attached to the request by `auth_middleware`.
/// 2. Otherwise reads the `Authorization` header, extracts the token and
///    verifies it with the shared `TokenCodec`.
/// 3. Attaches the identity to the request extensions for later extractors.
///
/// Rejection: `ApiError::Unauthorized` on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenCodec: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(ApiError::Unauthorized)?
            .to_str()
            .map_err(|_| ApiError::Unauthorized)?;

        let token = bearer_token(header_value).ok_or(ApiError::Unauthorized)?;

        let identity = TokenCodec::from_ref(state).verify(token)?;

        let user = AuthUser {
            email: identity.email,
        };
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

async fn authenticate_with_role<S>(
    parts: &mut Parts,
    state: &S,
    role: Role,
) -> Result<AuthUser, ApiError>
where
    S: Send + Sync,
    TokenCodec: FromRef<S>,
    RepositoryState: FromRef<S>,
{
    let user = AuthUser::from_request_parts(parts, state).await?;
    let repo = RepositoryState::from_ref(state);
    roles::require_role(repo.as_ref(), &user, role).await?;
    Ok(user)
}

/// AdminUser
///
/// An authenticated caller whose stored role is `admin`. Guards role
/// assignment. Rejects with 401 for a bad token and 403 for any other role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    TokenCodec: FromRef<S>,
    RepositoryState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_with_role(parts, state, Role::Admin)
            .await
            .map(AdminUser)
    }
}

/// InstructorUser
///
/// An authenticated caller whose stored role is `instructor`.
#[derive(Debug, Clone)]
pub struct InstructorUser(pub AuthUser);

impl<S> FromRequestParts<S> for InstructorUser
where
    S: Send + Sync,
    TokenCodec: FromRef<S>,
    RepositoryState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_with_role(parts, state, Role::Instructor)
            .await
            .map(InstructorUser)
    }
}
