use std::env;
use tracing::{debug, error, info, warn};

use crate::config::ConfigError;

/// JWT configuration. Tokens are issued by the account service; this service
/// only verifies them, but keeps the expiries so local tooling can mint tokens
/// with the same lifetime.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HS256 secret
    pub jwt_secret: String,
    /// Access token expiration time in minutes
    pub access_token_expiration: i64,
    /// Refresh token expiration time in minutes
    pub refresh_token_expiration: i64,
    /// Expected issuer, checked when set
    pub jwt_issuer: Option<String>,
    /// Expected audience, checked when set
    pub jwt_audience: Option<String>,
}

impl JwtConfig {
    /// Load JWT configuration from environment variables
    ///
    /// Expected environment variables:
    /// - JWT_SECRET: Secret key for signing JWT tokens (required, >= 32 chars)
    /// - JWT_ACCESS_TOKEN_EXPIRY: Access token expiration in minutes (defaults to 15)
    /// - JWT_REFRESH_TOKEN_EXPIRY: Refresh token expiration in minutes (defaults to 10080)
    /// - JWT_ISSUER / JWT_AUDIENCE: optional claims checks
    pub fn from_env() -> Result<Self, ConfigError> {
        info!("Loading JWT configuration from environment variables");

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| {
                error!("JWT_SECRET environment variable not found");
                ConfigError::EnvVarNotFound("JWT_SECRET".to_string())
            })?;
        debug!("JWT secret loaded (length: {} chars)", jwt_secret.len());

        let access_token_expiration = parse_minutes("JWT_ACCESS_TOKEN_EXPIRY", 15)?;
        let refresh_token_expiration = parse_minutes("JWT_REFRESH_TOKEN_EXPIRY", 10080)?;

        let config = JwtConfig {
            jwt_secret,
            access_token_expiration,
            refresh_token_expiration,
            jwt_issuer: env::var("JWT_ISSUER").ok(),
            jwt_audience: env::var("JWT_AUDIENCE").ok(),
        };

        config.validate()?;
        info!("JWT configuration loaded successfully");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < 32 {
            error!("JWT secret is too short (minimum 32 characters required)");
            return Err(ConfigError::ValidationError(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }
        if self.access_token_expiration <= 0 || self.refresh_token_expiration <= 0 {
            return Err(ConfigError::ValidationError(
                "Token expirations must be greater than 0".to_string(),
            ));
        }
        if self.access_token_expiration >= self.refresh_token_expiration {
            warn!("Access token expiration is greater than or equal to refresh token expiration");
        }
        Ok(())
    }
}

fn parse_minutes(var: &str, default: i64) -> Result<i64, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw.parse::<i64>().map_err(|e| {
            error!("Invalid {} value: {}", var, e);
            ConfigError::ParseError(format!("{}: {}", var, e))
        }),
        Err(_) => {
            warn!("{} not set, using default: {} minutes", var, default);
            Ok(default)
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        JwtConfig {
            jwt_secret: "test_secret_key_for_jwt_testing_should_be_long_enough_for_security_purposes".to_string(),
            access_token_expiration: 15,
            refresh_token_expiration: 10080,
            jwt_issuer: None,
            jwt_audience: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(JwtConfig::default().validate().is_ok());
    }

    #[test]
    fn short_secret_is_rejected() {
        let config = JwtConfig {
            jwt_secret: "short".to_string(),
            ..JwtConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_expiry_is_rejected() {
        let config = JwtConfig {
            access_token_expiration: 0,
            ..JwtConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
