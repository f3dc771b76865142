use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, info};

use crate::config::ConfigError;

/// Tunables of the estimate workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowConfig {
    /// A customer with an open lead younger than this cannot be converted again.
    pub duplicate_lead_window_days: i64,
    /// Country code applied to mobile numbers submitted without one.
    pub default_country_code: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl WorkflowConfig {
    /// Expected environment variables (all optional):
    /// - DUPLICATE_LEAD_WINDOW_DAYS (defaults to 30)
    /// - DEFAULT_COUNTRY_CODE (defaults to +971)
    /// - DEFAULT_PAGE_SIZE (defaults to 20)
    /// - MAX_PAGE_SIZE (defaults to 100)
    pub fn from_env() -> Result<Self, ConfigError> {
        info!("Loading workflow configuration from environment variables");
        let defaults = WorkflowConfig::default();

        let duplicate_lead_window_days = parse_or("DUPLICATE_LEAD_WINDOW_DAYS", defaults.duplicate_lead_window_days)?;
        let default_page_size = parse_or("DEFAULT_PAGE_SIZE", defaults.default_page_size)?;
        let max_page_size = parse_or("MAX_PAGE_SIZE", defaults.max_page_size)?;
        let default_country_code = env::var("DEFAULT_COUNTRY_CODE").unwrap_or(defaults.default_country_code);

        let config = WorkflowConfig {
            duplicate_lead_window_days,
            default_country_code,
            default_page_size,
            max_page_size,
        };
        config.validate()?;
        debug!(?config, "Workflow configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duplicate_lead_window_days < 0 {
            return Err(ConfigError::ValidationError(
                "DUPLICATE_LEAD_WINDOW_DAYS cannot be negative".to_string(),
            ));
        }
        let code = self.default_country_code.trim_start_matches('+');
        if code.is_empty() || code.len() > 4 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid DEFAULT_COUNTRY_CODE: {}",
                self.default_country_code
            )));
        }
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(ConfigError::ValidationError("Page sizes must be greater than 0".to_string()));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::ValidationError(
                "DEFAULT_PAGE_SIZE cannot exceed MAX_PAGE_SIZE".to_string(),
            ));
        }
        Ok(())
    }

    /// Clamps client supplied paging to `(page >= 1, 1 <= limit <= max)`.
    pub fn page_bounds(&self, page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        (page, limit)
    }
}

fn parse_or<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(format!("Invalid {} value: {}", var, raw))),
        Err(_) => Ok(default),
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        WorkflowConfig {
            duplicate_lead_window_days: 30,
            default_country_code: "+971".to_string(),
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}
