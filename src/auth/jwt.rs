use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::{AuthError, Claims, Principal, UserRole};

/// Issues and validates the bearer tokens the API accepts
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expires_in: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .field("token_expires_in", &self.token_expires_in)
            .finish()
    }
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_expires_in: Duration::hours(12),
        }
    }

    /// Mint a token. Identity lives outside this service; this is for tooling and tests.
    pub fn issue(&self, user_id: Uuid, role: UserRole) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + self.token_expires_in;

        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    pub fn principal(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.validate_token(token)?;
        Principal::from_claims(&claims).map_err(|_| AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_validate() {
        let jwt_service = JwtService::new("test_secret");
        let user_id = Uuid::new_v4();

        let token = jwt_service.issue(user_id, UserRole::Coach).unwrap();
        let claims = jwt_service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, UserRole::Coach);
    }

    #[test]
    fn test_principal_extraction() {
        let jwt_service = JwtService::new("test_secret");
        let user_id = Uuid::new_v4();

        let token = jwt_service.issue(user_id, UserRole::Athlete).unwrap();
        let principal = jwt_service.principal(&token).unwrap();

        assert_eq!(principal, Principal::athlete(user_id));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let issuer = JwtService::new("one_secret");
        let verifier = JwtService::new("another_secret");

        let token = issuer.issue(Uuid::new_v4(), UserRole::Coach).unwrap();

        assert!(matches!(verifier.validate_token(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let jwt_service = JwtService::new("test_secret");
        assert!(jwt_service.principal("not.a.token").is_err());
    }
}
