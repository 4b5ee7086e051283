//! Authentication extractors.
//!
//! Credentials arrive as `Authorization: Bearer <token>` and are checked by
//! the [`IdentityVerifier`](forkful_core::ports::IdentityVerifier) held in
//! [`AppState`].

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use forkful_core::CommerceError;
use forkful_core::ports::AuthenticatedSubject;

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Extractor that requires a valid bearer credential.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(subject): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", subject.id)
/// }
/// ```
pub struct RequireAuth(pub AuthenticatedSubject);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match authenticate(parts, state)? {
            Some(subject) => Ok(Self(subject)),
            None => Err(CommerceError::unauthenticated("missing bearer token").into()),
        }
    }
}

/// Extractor that requires a valid bearer credential with the staff role.
pub struct RequireStaff(pub AuthenticatedSubject);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(subject) = RequireAuth::from_request_parts(parts, state).await?;
        if !subject.is_staff() {
            tracing::warn!(subject = %subject.id, path = %parts.uri.path(), "Staff route refused");
            return Err(AppError::Forbidden("staff access required".to_string()));
        }
        Ok(Self(subject))
    }
}

/// Extractor for routes that also serve anonymous callers.
///
/// No `Authorization` header yields `None`. A header that is present must
/// still verify.
pub struct OptionalAuth(pub Option<AuthenticatedSubject>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(authenticate(parts, state)?))
    }
}

fn authenticate(
    parts: &Parts,
    state: &AppState,
) -> Result<Option<AuthenticatedSubject>, AppError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| CommerceError::unauthenticated("malformed authorization header"))?;

    let subject = state.verifier().verify(token)?;
    set_sentry_user(&subject.id);
    tracing::Span::current().record("subject", tracing::field::display(&subject.id));
    Ok(Some(subject))
}
