use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, error, info, warn};

use crate::config::ConfigError;

/// Collection names used by the workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionNames {
    pub estimates: String,
    pub quotations: String,
    pub customers: String,
    pub property_leads: String,
    pub mortgage_applications: String,
    pub customer_documents: String,
    pub customer_basic_details: String,
    pub categories: String,
    pub subcategories: String,
    pub users: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        CollectionNames {
            estimates: "estimates".to_string(),
            quotations: "quotations".to_string(),
            customers: "customers".to_string(),
            property_leads: "property_leads".to_string(),
            mortgage_applications: "mortgage_applications".to_string(),
            customer_documents: "customer_documents".to_string(),
            customer_basic_details: "customer_basic_details".to_string(),
            categories: "categories".to_string(),
            subcategories: "subcategories".to_string(),
            users: "users".to_string(),
        }
    }
}

impl CollectionNames {
    /// Reads `MONGO_<NAME>_COLLECTION` overrides, keeping defaults otherwise.
    fn from_env() -> Self {
        let defaults = CollectionNames::default();
        let pick = |var: &str, default: String| -> String {
            match env::var(var) {
                Ok(value) if !value.is_empty() => {
                    debug!("{} = {}", var, value);
                    value
                }
                _ => default,
            }
        };
        CollectionNames {
            estimates: pick("MONGO_ESTIMATE_COLLECTION", defaults.estimates),
            quotations: pick("MONGO_QUOTATION_COLLECTION", defaults.quotations),
            customers: pick("MONGO_CUSTOMER_COLLECTION", defaults.customers),
            property_leads: pick("MONGO_LEAD_COLLECTION", defaults.property_leads),
            mortgage_applications: pick("MONGO_MORTGAGE_COLLECTION", defaults.mortgage_applications),
            customer_documents: pick("MONGO_CUSTOMER_DOCUMENT_COLLECTION", defaults.customer_documents),
            customer_basic_details: pick(
                "MONGO_CUSTOMER_DETAILS_COLLECTION",
                defaults.customer_basic_details,
            ),
            categories: pick("MONGO_CATEGORY_COLLECTION", defaults.categories),
            subcategories: pick("MONGO_SUBCATEGORY_COLLECTION", defaults.subcategories),
            users: pick("MONGO_USER_COLLECTION", defaults.users),
        }
    }

    fn all(&self) -> [&str; 10] {
        [
            self.estimates.as_str(),
            self.quotations.as_str(),
            self.customers.as_str(),
            self.property_leads.as_str(),
            self.mortgage_applications.as_str(),
            self.customer_documents.as_str(),
            self.customer_basic_details.as_str(),
            self.categories.as_str(),
            self.subcategories.as_str(),
            self.users.as_str(),
        ]
    }
}

/// MongoDB configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    /// MongoDB connection URI
    pub uri: String,
    /// Database name
    pub database: String,
    /// Username for authentication (optional)
    pub username: Option<String>,
    /// Password for authentication (optional)
    pub password: Option<String>,
    pub collections: CollectionNames,
    /// Connection pool size
    pub pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,
}

impl MongoConfig {
    /// Load MongoDB configuration from environment variables
    ///
    /// Expected environment variables:
    /// - MONGO_URI: MongoDB connection URI (required)
    /// - MONGO_DATABASE: Database name (required)
    /// - MONGO_USERNAME / MONGO_PASSWORD: credentials (optional)
    /// - MONGO_<NAME>_COLLECTION: collection name overrides (optional)
    /// - MONGO_POOL_SIZE: Connection pool size (defaults to 10)
    /// - MONGO_CONNECTION_TIMEOUT: Connection timeout in seconds (defaults to 5)
    pub fn from_env() -> Result<Self, ConfigError> {
        info!("Loading MongoDB configuration from environment variables");

        let uri = env::var("MONGO_URI")
            .map_err(|_| {
                error!("MONGO_URI environment variable not found");
                ConfigError::EnvVarNotFound("MONGO_URI".to_string())
            })?;

        let database = env::var("MONGO_DATABASE")
            .map_err(|_| {
                error!("MONGO_DATABASE environment variable not found");
                ConfigError::EnvVarNotFound("MONGO_DATABASE".to_string())
            })?;
        debug!("MongoDB database: {}", database);

        let username = env::var("MONGO_USERNAME").ok();
        let password = env::var("MONGO_PASSWORD").ok();
        if username.is_some() {
            debug!("MongoDB credentials provided");
        }

        let pool_size = env::var("MONGO_POOL_SIZE")
            .unwrap_or_else(|_| {
                warn!("MONGO_POOL_SIZE not set, using default: 10");
                "10".to_string()
            })
            .parse::<u32>()
            .map_err(|_| {
                error!("Invalid MONGO_POOL_SIZE value");
                ConfigError::InvalidValue("Invalid MONGO_POOL_SIZE value".to_string())
            })?;

        let connection_timeout_secs = env::var("MONGO_CONNECTION_TIMEOUT")
            .unwrap_or_else(|_| {
                warn!("MONGO_CONNECTION_TIMEOUT not set, using default: 5 seconds");
                "5".to_string()
            })
            .parse::<u64>()
            .map_err(|_| {
                error!("Invalid MONGO_CONNECTION_TIMEOUT value");
                ConfigError::InvalidValue("Invalid MONGO_CONNECTION_TIMEOUT value".to_string())
            })?;

        let config = MongoConfig {
            uri,
            database,
            username,
            password,
            collections: CollectionNames::from_env(),
            pool_size,
            connection_timeout_secs,
        };

        config.validate()?;
        info!("MongoDB configuration loaded successfully");
        Ok(config)
    }

    /// Create MongoConfig for testing
    pub fn from_test_env() -> Self {
        MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "estimates_test".to_string(),
            username: None,
            password: None,
            collections: CollectionNames::default(),
            pool_size: 2,
            connection_timeout_secs: 2,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uri.is_empty() {
            return Err(ConfigError::ValidationError("MongoDB URI cannot be empty".to_string()));
        }
        if self.database.is_empty() {
            return Err(ConfigError::ValidationError("MongoDB database cannot be empty".to_string()));
        }
        if self.pool_size == 0 {
            return Err(ConfigError::ValidationError("MongoDB pool size must be greater than 0".to_string()));
        }
        if self.connection_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "MongoDB connection timeout must be greater than 0".to_string(),
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::ValidationError(
                "MongoDB username and password must be set together".to_string(),
            ));
        }
        if self.collections.all().iter().any(|name| name.is_empty()) {
            return Err(ConfigError::ValidationError("MongoDB collection names cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "estimates".to_string(),
            username: None,
            password: None,
            collections: CollectionNames::default(),
            pool_size: 10,
            connection_timeout_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MongoConfig::default();
        assert_eq!(config.database, "estimates");
        assert_eq!(config.collections.estimates, "estimates");
        assert_eq!(config.pool_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_pool_size() {
        let mut config = MongoConfig::from_test_env();
        config.pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_partial_credentials() {
        let mut config = MongoConfig::from_test_env();
        config.username = Some("svc".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_collection() {
        let mut config = MongoConfig::from_test_env();
        config.collections.quotations = String::new();
        assert!(config.validate().is_err());
    }
}
