use std::env;

use crate::config::ConfigError;

pub struct AppConfig {
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);
        AppConfig { host, port }
    }

    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, ConfigError> {
        let ip: std::net::IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("Invalid APP_HOST: {}", self.host)))?;
        Ok(std::net::SocketAddr::new(ip, self.port))
    }
}
