use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::auth::{AuthError, JwtService, Principal};

/// Resolves the bearer token into the calling `Principal`.
#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    JwtService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AuthError::MissingAuthHeader)?;

        let jwt = JwtService::from_ref(state);
        jwt.principal(bearer.token())
    }
}
