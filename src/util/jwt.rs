use bson::oid::ObjectId;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::model::user::{Actor, Role};

/// JWT token claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID, hex ObjectId)
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    /// Token type (access or refresh)
    pub token_type: String,
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

impl Claims {
    /// Resolves the acting identity carried by the token.
    pub fn to_actor(&self) -> Result<Actor, JwtError> {
        let id = ObjectId::parse_str(&self.sub).map_err(|_| {
            warn!("Token subject is not an ObjectId: {}", self.sub);
            JwtError::InvalidClaims(format!("invalid subject: {}", self.sub))
        })?;
        let role = self
            .role
            .parse::<Role>()
            .map_err(JwtError::InvalidClaims)?;
        Ok(Actor::new(id, role))
    }
}

#[derive(Debug, Clone)]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Error types for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to encode JWT token: {0}")]
    EncodingFailed(String),
    #[error("Failed to decode JWT token: {0}")]
    DecodingFailed(String),
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid token format")]
    InvalidToken,
    #[error("Invalid token claims: {0}")]
    InvalidClaims(String),
    #[error("Invalid token type: expected {expected}, got {actual}")]
    InvalidTokenType { expected: String, actual: String },
}

pub trait JwtTokenUtils {
    fn generate_access_token(&self, user_id: &str, email: &str, role: &str) -> Result<String, JwtError>;
    fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError>;
    fn extract_token_from_header(&self, auth_header: &str) -> Result<String, JwtError>;
}

#[derive(Debug, Clone)]
pub struct JwtTokenUtilsImpl {
    pub jwt_config: JwtConfig,
}

impl JwtTokenUtilsImpl {
    pub fn new(jwt_config: JwtConfig) -> Self {
        JwtTokenUtilsImpl { jwt_config }
    }

    fn generate_token(
        &self,
        user_id: &str,
        email: &str,
        role: &str,
        token_type: TokenType,
        expires_in_minutes: i64,
    ) -> Result<String, JwtError> {
        debug!("Generating {} token for user: {} with role: {}", token_type.as_str(), user_id, role);

        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(expires_in_minutes)).timestamp(),
            token_type: token_type.as_str().to_string(),
            jti: Uuid::new_v4().to_string(),
            iss: self.jwt_config.jwt_issuer.clone(),
            aud: self.jwt_config.jwt_audience.clone(),
        };

        let encoding_key = EncodingKey::from_secret(self.jwt_config.jwt_secret.as_ref());
        encode(&Header::new(Algorithm::HS256), &claims, &encoding_key).map_err(|err| {
            error!("Failed to encode JWT token: {}", err);
            JwtError::EncodingFailed(err.to_string())
        })
    }

    pub fn validate_token(&self, token: &str, expected_token_type: Option<TokenType>) -> Result<Claims, JwtError> {
        debug!("Validating JWT token");

        let decoding_key = DecodingKey::from_secret(self.jwt_config.jwt_secret.as_ref());
        let mut validation = Validation::new(Algorithm::HS256);
        match self.jwt_config.jwt_audience {
            Some(ref audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        if let Some(ref issuer) = self.jwt_config.jwt_issuer {
            validation.set_issuer(&[issuer]);
        }

        let claims = match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => token_data.claims,
            Err(err) => {
                if matches!(err.kind(), jsonwebtoken::errors::ErrorKind::ExpiredSignature) {
                    warn!("Token has expired");
                    return Err(JwtError::TokenExpired);
                }
                error!("Failed to decode JWT token: {}", err);
                return Err(JwtError::DecodingFailed(err.to_string()));
            }
        };

        if let Some(expected_type) = expected_token_type {
            if claims.token_type != expected_type.as_str() {
                error!("Invalid token type: expected {}, got {}", expected_type.as_str(), claims.token_type);
                return Err(JwtError::InvalidTokenType {
                    expected: expected_type.as_str().to_string(),
                    actual: claims.token_type.clone(),
                });
            }
        }

        debug!("Token validation successful for user: {}", claims.sub);
        Ok(claims)
    }
}

impl JwtTokenUtils for JwtTokenUtilsImpl {
    fn generate_access_token(&self, user_id: &str, email: &str, role: &str) -> Result<String, JwtError> {
        self.generate_token(user_id, email, role, TokenType::Access, self.jwt_config.access_token_expiration)
    }

    fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate_token(token, Some(TokenType::Access))
    }

    fn extract_token_from_header(&self, auth_header: &str) -> Result<String, JwtError> {
        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or(JwtError::InvalidToken)?;
        if token.is_empty() {
            return Err(JwtError::InvalidToken);
        }
        Ok(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utils() -> JwtTokenUtilsImpl {
        JwtTokenUtilsImpl::new(JwtConfig::default())
    }

    #[test]
    fn issued_token_resolves_to_actor() {
        let id = ObjectId::new();
        let token = utils()
            .generate_access_token(&id.to_hex(), "sup@example.com", "supervisor")
            .unwrap();
        let claims = utils().validate_access_token(&token).unwrap();
        let actor = claims.to_actor().unwrap();
        assert_eq!(actor.id, id);
        assert_eq!(actor.role, Role::Supervisor);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let token = utils()
            .generate_access_token(&ObjectId::new().to_hex(), "x@example.com", "mentor")
            .unwrap();
        let claims = utils().validate_access_token(&token).unwrap();
        assert!(matches!(claims.to_actor(), Err(JwtError::InvalidClaims(_))));
    }

    #[test]
    fn token_signed_with_other_secret_fails() {
        let other = JwtTokenUtilsImpl::new(JwtConfig {
            jwt_secret: "another_secret_key_that_is_definitely_long_enough_here".to_string(),
            ..JwtConfig::default()
        });
        let token = other
            .generate_access_token(&ObjectId::new().to_hex(), "x@example.com", "admin")
            .unwrap();
        assert!(utils().validate_access_token(&token).is_err());
    }

    #[test]
    fn header_requires_bearer_prefix() {
        assert!(utils().extract_token_from_header("Token abc").is_err());
        assert!(utils().extract_token_from_header("Bearer ").is_err());
        assert_eq!(utils().extract_token_from_header("Bearer abc").unwrap(), "abc");
    }

    #[test]
    fn audience_is_enforced_when_configured() {
        let config = JwtConfig {
            jwt_audience: Some("estimates".to_string()),
            ..JwtConfig::default()
        };
        let issuer = JwtTokenUtilsImpl::new(JwtConfig {
            jwt_audience: Some("billing".to_string()),
            ..JwtConfig::default()
        });
        let token = issuer
            .generate_access_token(&ObjectId::new().to_hex(), "x@example.com", "admin")
            .unwrap();
        assert!(JwtTokenUtilsImpl::new(config).validate_access_token(&token).is_err());
    }
}
